//! The linear procedures: select → build → allocate → write → launch →
//! read → verify.

use std::fmt;
use std::ptr;

use bytemuck::{cast_slice, cast_slice_mut};
use opencl3::{
    command_queue::{CL_QUEUE_PROFILING_ENABLE, CommandQueue},
    context::Context,
    device::{CL_DEVICE_TYPE_GPU, Device},
    event::Event,
    kernel::Kernel,
};
use tracing::{info, warn};

use crate::buffer::{GpuBuffer, GpuEventGuard, Queued, check_size};
use crate::config::{BUILD_OPTIONS, IndexFillConfig, ScaleConfig, SmokeConfig};
use crate::error::{ClError, Result};
use crate::platform::{self, DeviceInfo, PlatformInfo};
use crate::timing::{Timings, time_host};
use crate::verify::{self, Verification};
use crate::{host, kernel};

#[cfg(feature = "metrics")]
use crate::metrics::record;

/// Byte pattern the smoke buffer is pre-filled with, so a kernel that never
/// ran cannot pass by accident.
const SMOKE_FILL: u8 = 100;

/// Context plus an in-order, profiling-enabled queue for one device.
pub struct DeviceSession {
    context: Context,
    queue: CommandQueue,
}

impl DeviceSession {
    pub fn new(device: &Device) -> Result<Self> {
        let context = Context::from_device(device)?;
        let queue = CommandQueue::create(&context, device.id(), CL_QUEUE_PROFILING_ENABLE)?;
        Ok(Self { context, queue })
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Enqueues `kernel` over `global`; `local = None` lets the runtime choose.
    pub fn enqueue(&self, kernel: &Kernel, global: &[usize], local: Option<&[usize]>) -> Result<Event> {
        debug_assert!(local.is_none_or(|l| l.len() == global.len()));
        let local_ptr = local.map_or(ptr::null(), <[usize]>::as_ptr);

        #[allow(unused_unsafe)]
        let evt = unsafe {
            self.queue.enqueue_nd_range_kernel(
                kernel.get(),
                global.len() as u32,
                ptr::null(),
                global.as_ptr(),
                local_ptr,
                &[],
            )?
        };
        Ok(evt)
    }
}

/// Each local edge must divide its global edge, and the group must fit the device.
pub fn check_work_group(global: &[usize], local: &[usize], max: usize) -> Result<()> {
    let invalid = || ClError::InvalidWorkGroup {
        global: global.to_vec(),
        local: local.to_vec(),
        max,
    };

    if global.len() != local.len() {
        return Err(invalid());
    }
    for (&g, &l) in global.iter().zip(local) {
        if l == 0 || g % l != 0 {
            return Err(invalid());
        }
    }
    let group: usize = local.iter().product();
    if group > max {
        return Err(invalid());
    }
    Ok(())
}

/// Launch geometry and buffer size of a run, checked against one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan<const D: usize> {
    pub global: [usize; D],
    pub local: Option<[usize; D]>,
    /// Element count of every host and device array.
    pub elements: usize,
    pub bytes: usize,
}

impl<const D: usize> LaunchPlan<D> {
    fn checked(
        global: [usize; D],
        local: Option<[usize; D]>,
        elements: usize,
        bytes: usize,
        device: &DeviceInfo,
    ) -> Result<Self> {
        check_size(bytes, device.max_mem_alloc_bytes)?;
        if let Some(local) = &local {
            check_work_group(&global, local, device.max_work_group_size)?;
        }
        Ok(Self { global, local, elements, bytes })
    }

    fn local(&self) -> Option<&[usize]> {
        self.local.as_ref().map(|l| l.as_slice())
    }
}

/// Validates an index-fill run on `device` before anything is allocated.
pub fn plan_index_fill(cfg: &IndexFillConfig, device: &DeviceInfo) -> Result<LaunchPlan<2>> {
    let global = [cfg.count_x()?, cfg.count_y()?];
    let local = [cfg.wg_size_x, cfg.wg_size_y];
    LaunchPlan::checked(global, Some(local), cfg.count()?, cfg.size_bytes()?, device)
}

/// Validates a scale run on `device` before anything is allocated.
pub fn plan_scale(cfg: &ScaleConfig, device: &DeviceInfo) -> Result<LaunchPlan<1>> {
    let local = cfg.local_size.map(|l| [l]);
    LaunchPlan::checked([cfg.array_size], local, cfg.array_size, cfg.size_bytes()?, device)
}

// ─── timed runs ──────────────────────────────────────────────────────

/// Outcome of one host-vs-device run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub platform: PlatformInfo,
    pub device: DeviceInfo,
    pub elements: usize,
    pub timings: Timings,
    pub verification: Verification,
}

impl RunReport {
    pub fn is_ok(&self) -> bool {
        self.verification.is_ok()
    }

    pub fn into_result(self) -> Result<Self> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(ClError::Mismatch { errors: self.verification.errors })
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Using platform {} from {} with OpenCL version: {}",
            self.platform.name, self.platform.vendor, self.platform.version
        )?;
        writeln!(
            f,
            "Using device {} from {} with OpenCL version: {}",
            self.device.name, self.device.vendor, self.device.version
        )?;
        writeln!(f, "Elements: {}", self.elements)?;
        writeln!(f, "{}", self.timings)?;
        write!(f, "{}", self.verification)?;
        if self.is_ok() {
            write!(f, "\n{}", self.timings.comparison())?;
        }
        Ok(())
    }
}

/// 2D `output[i] = i + n!` on the selected GPU, compared with the host.
pub fn run_index_fill(cfg: &IndexFillConfig) -> Result<RunReport> {
    let selected = platform::select(&cfg.selector, CL_DEVICE_TYPE_GPU)?;
    let plan = plan_index_fill(cfg, &selected.info)?;
    let count = plan.elements;
    info!(count, "create host and device output arrays");

    /* ---------- CPU / host ---------- */
    let mut host_out = vec![0i32; count];
    let ((), host_ns) = time_host(|| host::index_fill(&mut host_out, cfg.factorial));
    info!(host_ns, "host reference computed");

    /* ---------- GPU / device ---------- */
    let session = DeviceSession::new(&selected.device)?;
    let src = kernel::load_source(cfg.kernel_path.as_deref(), kernel::INDEX_FILL_SRC)?;
    let program = kernel::build(session.context(), &src, BUILD_OPTIONS)?;
    let kern = kernel::create(&program, kernel::FILE_KERNEL)?;

    let out = GpuBuffer::<Queued>::new_checked(session.context(), &selected.info, plan.bytes)?.launch();

    #[allow(unused_unsafe)]
    unsafe {
        kern.set_arg(0, out.raw())?;
        kern.set_arg(1, &cfg.factorial)?;
    }
    let evt = session.enqueue(&kern, &plan.global, plan.local())?;
    let (out, kernel_ns) = out.into_ready_profiled(GpuEventGuard::new(evt))?;

    let mut device_out = vec![0i32; count];
    let (_out, guard) = out.enqueue_read(session.queue(), cast_slice_mut(&mut device_out))?;
    let read_ns = guard.wait_profiled()?;

    let timings = Timings { host_ns, write_ns: None, kernel_ns, read_ns };
    #[cfg(feature = "metrics")]
    {
        record("host", host_ns);
        record("kernel", kernel_ns);
        record("read", read_ns);
    }

    Ok(RunReport {
        platform: selected.platform,
        device: selected.info,
        elements: count,
        timings,
        verification: verify::compare(&host_out, &device_out),
    })
}

/// `output[i] = input[i] * 2` over random input on the selected GPU.
pub fn run_scale(cfg: &ScaleConfig) -> Result<RunReport> {
    let selected = platform::select(&cfg.selector, CL_DEVICE_TYPE_GPU)?;
    let plan = plan_scale(cfg, &selected.info)?;
    let n = plan.elements;
    info!(n, "create input and output arrays");

    let input = host::random_input(n, cfg.seed);
    let mut host_out = vec![0i32; n];
    let ((), host_ns) = time_host(|| host::scale(&input, &mut host_out));
    info!(host_ns, "host reference computed");

    let session = DeviceSession::new(&selected.device)?;
    let src = kernel::load_source(cfg.kernel_path.as_deref(), kernel::SCALE_SRC)?;
    let program = kernel::build(session.context(), &src, BUILD_OPTIONS)?;
    let kern = kernel::create(&program, kernel::FILE_KERNEL)?;

    let bytes = plan.bytes;
    let (input_dev, guard) = GpuBuffer::<Queued>::new_checked(session.context(), &selected.info, bytes)?
        .enqueue_write(session.queue(), cast_slice(&input))?;
    let (input_dev, write_ns) = input_dev.into_ready_profiled(guard)?;
    let out = GpuBuffer::<Queued>::new_checked(session.context(), &selected.info, bytes)?.launch();

    #[allow(unused_unsafe)]
    unsafe {
        kern.set_arg(0, input_dev.raw())?;
        kern.set_arg(1, out.raw())?;
    }
    let evt = session.enqueue(&kern, &plan.global, plan.local())?;
    let (out, kernel_ns) = out.into_ready_profiled(GpuEventGuard::new(evt))?;

    let mut device_out = vec![0i32; n];
    let (_out, guard) = out.enqueue_read(session.queue(), cast_slice_mut(&mut device_out))?;
    let read_ns = guard.wait_profiled()?;

    let timings = Timings { host_ns, write_ns: Some(write_ns), kernel_ns, read_ns };
    #[cfg(feature = "metrics")]
    {
        record("host", host_ns);
        record("write", write_ns);
        record("kernel", kernel_ns);
        record("read", read_ns);
    }

    Ok(RunReport {
        platform: selected.platform,
        device: selected.info,
        elements: n,
        timings,
        verification: verify::compare(&host_out, &device_out),
    })
}

// ─── smoke test over every device ────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SmokeOutcome {
    Unavailable,
    Ran(Verification),
}

/// Runs the index kernel on one device.
pub fn run_smoke(info: &DeviceInfo, device: &Device, cfg: &SmokeConfig) -> Result<SmokeOutcome> {
    if !info.available {
        return Ok(SmokeOutcome::Unavailable);
    }
    let bytes = cfg.size_bytes()?;
    check_size(bytes, info.max_mem_alloc_bytes)?;
    info!(device = %info.name, "run example kernel");

    let session = DeviceSession::new(device)?;
    let program = kernel::build(session.context(), kernel::INDEX_SRC, "")?;
    let kern = kernel::create(&program, kernel::INDEX_KERNEL)?;

    let fill = vec![SMOKE_FILL; bytes];
    let (buf, guard) = GpuBuffer::<Queued>::new_checked(session.context(), info, bytes)?
        .enqueue_write(session.queue(), &fill)?;
    let buf = buf.into_ready(guard)?;

    #[allow(unused_unsafe)]
    unsafe {
        kern.set_arg(0, buf.raw())?;
    }
    let evt = session.enqueue(&kern, &[cfg.size], None)?;
    let buf = buf.launch().into_ready(GpuEventGuard::new(evt))?;

    let mut device_out = vec![0i32; cfg.size];
    let (_buf, guard) = buf.enqueue_read(session.queue(), cast_slice_mut(&mut device_out))?;
    guard.wait()?;

    Ok(SmokeOutcome::Ran(verify::compare(&host::index_identity(cfg.size), &device_out)))
}

/// Smoke results for every device of one platform. `results[i]` belongs to
/// `platform.devices[i]`; unreadable devices have no result.
#[derive(Debug)]
pub struct PlatformSmoke {
    pub platform: PlatformInfo,
    pub results: Vec<Result<SmokeOutcome>>,
}

impl PlatformSmoke {
    /// Every readable device passed or was unavailable, and none was unreadable.
    pub fn is_ok(&self) -> bool {
        self.platform.unreadable.is_empty()
            && self.results.iter().all(|r| match r {
                Ok(SmokeOutcome::Ran(v)) => v.is_ok(),
                Ok(SmokeOutcome::Unavailable) => true,
                Err(_) => false,
            })
    }
}

/// Enumerates everything and smoke-tests each device; a failing device does
/// not stop the others.
pub fn smoke_all(cfg: &SmokeConfig) -> Result<Vec<PlatformSmoke>> {
    let mut out = Vec::new();
    for (platform, devices) in platform::enumerate()? {
        let results = platform
            .devices
            .iter()
            .zip(&devices)
            .map(|(info, device)| {
                let res = run_smoke(info, device, cfg);
                if let Err(err) = &res {
                    warn!(device = %info.name, %err, "example kernel failed");
                }
                res
            })
            .collect();
        out.push(PlatformSmoke { platform, results });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DeviceKind, UnreadableDevice};
    use crate::verify::Mismatch;

    fn sample_device() -> DeviceInfo {
        DeviceInfo {
            index: 0,
            name: "Test GPU".into(),
            kind: DeviceKind::Gpu,
            vendor: "ACME".into(),
            version: "OpenCL 1.2".into(),
            available: true,
            max_compute_units: 24,
            max_work_group_size: 256,
            max_clock_frequency_mhz: 1050,
            global_mem_bytes: 2 << 30,
            local_mem_bytes: 64 << 10,
            max_mem_alloc_bytes: 1 << 30,
        }
    }

    fn sample_platform() -> PlatformInfo {
        PlatformInfo {
            index: 0,
            name: "Test Platform".into(),
            vendor: "ACME Corp".into(),
            version: "OpenCL 3.0".into(),
            profile: "FULL_PROFILE".into(),
            icd_suffix: String::new(),
            extensions: String::new(),
            devices: Vec::new(),
            unreadable: Vec::new(),
        }
    }

    fn sample_report(verification: Verification) -> RunReport {
        RunReport {
            platform: sample_platform(),
            device: sample_device(),
            elements: 4,
            timings: Timings { host_ns: 300, write_ns: Some(10), kernel_ns: 20, read_ns: 70 },
            verification,
        }
    }

    #[test]
    fn default_index_fill_plan_fits_sample_device() {
        let plan = plan_index_fill(&IndexFillConfig::default(), &sample_device()).unwrap();
        assert_eq!(plan.global, [1600, 1600]);
        assert_eq!(plan.local, Some([16, 16]));
        assert_eq!(plan.elements, 2_560_000);
        assert_eq!(plan.bytes, 2_560_000 * 4);
    }

    #[test]
    fn overflowing_index_fill_is_rejected_before_allocation() {
        let cfg = IndexFillConfig {
            groups_x: usize::MAX / 16,
            groups_y: 2,
            ..IndexFillConfig::default()
        };
        let err = plan_index_fill(&cfg, &sample_device()).unwrap_err();
        assert!(matches!(err, ClError::SizeOverflow(_)));
    }

    #[test]
    fn index_fill_over_alloc_limit_is_rejected() {
        // 32768 x 32768 ints = 4 GiB
        let cfg = IndexFillConfig { groups_x: 2048, groups_y: 2048, ..IndexFillConfig::default() };
        let err = plan_index_fill(&cfg, &sample_device()).unwrap_err();
        assert!(matches!(
            err,
            ClError::BufferTooLarge { requested, max } if requested == 1 << 32 && max == 1 << 30
        ));
    }

    #[test]
    fn index_fill_group_over_device_max_is_rejected() {
        let cfg = IndexFillConfig {
            wg_size_x: 32,
            wg_size_y: 32,
            groups_x: 2,
            groups_y: 2,
            ..IndexFillConfig::default()
        };
        let err = plan_index_fill(&cfg, &sample_device()).unwrap_err();
        assert!(matches!(err, ClError::InvalidWorkGroup { max: 256, .. }));
    }

    #[test]
    fn scale_plan_checks_size_before_allocation() {
        let device = sample_device();

        let huge = ScaleConfig { array_size: 1 << (usize::BITS - 2), ..ScaleConfig::default() };
        assert!(matches!(plan_scale(&huge, &device), Err(ClError::SizeOverflow("scale buffer"))));

        let big = ScaleConfig { array_size: 1 << 30, ..ScaleConfig::default() };
        assert!(matches!(plan_scale(&big, &device), Err(ClError::BufferTooLarge { .. })));

        let empty = ScaleConfig { array_size: 0, ..ScaleConfig::default() };
        assert!(matches!(plan_scale(&empty, &device), Err(ClError::InvalidSize(0))));
    }

    #[test]
    fn scale_plan_checks_local_size_only_when_given() {
        let device = sample_device();
        let cfg = ScaleConfig { array_size: 4, ..ScaleConfig::default() };
        let plan = plan_scale(&cfg, &device).unwrap();
        assert_eq!(plan.local, None);
        assert_eq!(plan.local(), None);
        assert_eq!(plan.bytes, 16);

        let cfg = ScaleConfig { local_size: Some(3), ..cfg };
        assert!(matches!(plan_scale(&cfg, &device), Err(ClError::InvalidWorkGroup { .. })));
    }

    #[test]
    fn successful_report_ends_with_speed_comparison() {
        let report = sample_report(verify::compare(&[0, 1, 2, 3], &[0, 1, 2, 3]));
        assert_eq!(
            report.to_string(),
            "Using platform Test Platform from ACME Corp with OpenCL version: OpenCL 3.0\n\
             Using device Test GPU from ACME with OpenCL version: OpenCL 1.2\n\
             Elements: 4\n\
             CPU time:\n\tCalculation: 300ns\n\
             GPU time:\n\tWrite: 10ns\n\tCalculation: 20ns\n\tWrite back: 70ns\n\
             Success, all values are correct\n\
             Speed comparison: CPU=300ns vs GPU=100ns (=> Speedup: 3.0000)"
        );
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn failed_report_lists_errors_without_comparison() {
        let report = sample_report(verify::compare(&[0, 1, 2, 3], &[0, 7, 2, 3]));
        let text = report.to_string();
        assert!(text.contains("Elements: 4\n"));
        assert!(text.ends_with("Error at 1 -> CPU: 1, GPU: 7\nFailure, errors between GPU and CPU: 1"));
        assert!(!text.contains("Speed comparison"));
        assert!(matches!(report.into_result(), Err(ClError::Mismatch { errors: 1 })));
    }

    #[test]
    fn platform_smoke_fails_on_unreadable_or_broken_devices() {
        let passed = SmokeOutcome::Ran(verify::compare(&[0, 1], &[0, 1]));
        let broken = SmokeOutcome::Ran(Verification {
            checked: 2,
            errors: 1,
            mismatches: vec![Mismatch { index: 1, cpu: 1, gpu: Some(100) }],
        });

        let smoke = PlatformSmoke {
            platform: sample_platform(),
            results: vec![Ok(passed.clone()), Ok(SmokeOutcome::Unavailable)],
        };
        assert!(smoke.is_ok());

        let smoke = PlatformSmoke {
            platform: sample_platform(),
            results: vec![Ok(passed.clone()), Ok(broken)],
        };
        assert!(!smoke.is_ok());

        let smoke = PlatformSmoke {
            platform: sample_platform(),
            results: vec![Err(ClError::Api(-5))],
        };
        assert!(!smoke.is_ok());

        let mut platform = sample_platform();
        platform.unreadable.push(UnreadableDevice { index: 0, error: "OpenCL API error: -30".into() });
        let smoke = PlatformSmoke { platform, results: vec![Ok(passed)] };
        assert!(!smoke.is_ok());
    }

    #[test]
    fn smoke_size_over_alloc_limit_is_rejected() {
        let device = sample_device();
        let cfg = SmokeConfig { size: usize::MAX };
        assert!(matches!(cfg.size_bytes(), Err(ClError::SizeOverflow(_))));
        let cfg = SmokeConfig { size: (1 << 28) + 1 };
        assert!(check_size(cfg.size_bytes().unwrap(), device.max_mem_alloc_bytes).is_err());
    }

    #[test]
    fn dividing_work_group_is_accepted() {
        assert!(check_work_group(&[1600, 1600], &[16, 16], 256).is_ok());
        assert!(check_work_group(&[1000], &[8], 1024).is_ok());
    }

    #[test]
    fn non_dividing_work_group_is_rejected() {
        let err = check_work_group(&[4], &[24], 1024).unwrap_err();
        assert!(matches!(err, ClError::InvalidWorkGroup { max: 1024, .. }));
        assert!(check_work_group(&[10], &[0], 1024).is_err());
    }

    #[test]
    fn oversized_work_group_is_rejected() {
        assert!(check_work_group(&[1600, 1600], &[32, 32], 256).is_err());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        assert!(check_work_group(&[16, 16], &[16], 256).is_err());
    }
}
