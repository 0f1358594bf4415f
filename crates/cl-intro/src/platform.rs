//! Platform/device enumeration, pretty-printing and selection by name.

use std::fmt;

use console::style;
use opencl3::device::{CL_DEVICE_TYPE_CPU, CL_DEVICE_TYPE_GPU, Device};
use opencl3::platform::{Platform, get_platforms};
use opencl3::types::{cl_device_id, cl_device_type, cl_platform_info};
use tracing::{debug, info, warn};

use crate::config::DeviceSelector;
use crate::error::{ClError, Result};

const CL_PLATFORM_ICD_SUFFIX_KHR: cl_platform_info = 0x0920;
const CL_DEVICE_NOT_FOUND: i32 = -1;
const CL_PLATFORM_NOT_FOUND_KHR: i32 = -1001;

const GIB: f64 = (1u64 << 30) as f64;
const KIB: f64 = 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Gpu,
    Cpu,
    Other,
}

impl DeviceKind {
    pub fn from_raw(ty: cl_device_type) -> Self {
        if ty & CL_DEVICE_TYPE_GPU != 0 {
            DeviceKind::Gpu
        } else if ty & CL_DEVICE_TYPE_CPU != 0 {
            DeviceKind::Cpu
        } else {
            DeviceKind::Other
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Gpu => write!(f, "{}", style("GPU").green().bold()),
            DeviceKind::Cpu => write!(f, "{}", style("CPU").red().bold()),
            DeviceKind::Other => f.write_str("other"),
        }
    }
}

/// Snapshot of the device queries the programs print or check.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub kind: DeviceKind,
    pub vendor: String,
    pub version: String,
    pub available: bool,
    pub max_compute_units: u32,
    pub max_work_group_size: usize,
    pub max_clock_frequency_mhz: u32,
    pub global_mem_bytes: u64,
    pub local_mem_bytes: u64,
    pub max_mem_alloc_bytes: u64,
}

impl DeviceInfo {
    pub fn query(index: usize, device: &Device) -> Result<Self> {
        Ok(Self {
            index,
            name: trim_info_string(&device.name()?).to_owned(),
            kind: DeviceKind::from_raw(device.dev_type()?),
            vendor: trim_info_string(&device.vendor()?).to_owned(),
            version: trim_info_string(&device.version()?).to_owned(),
            available: device.available()?,
            max_compute_units: device.max_compute_units()?,
            max_work_group_size: device.max_work_group_size()?,
            max_clock_frequency_mhz: device.max_clock_frequency()?,
            global_mem_bytes: device.global_mem_size()?,
            local_mem_bytes: device.local_mem_size()?,
            max_mem_alloc_bytes: device.max_mem_alloc_size()?,
        })
    }

    pub fn global_mem_gib(&self) -> f64 {
        self.global_mem_bytes as f64 / GIB
    }

    pub fn local_mem_kib(&self) -> f64 {
        self.local_mem_bytes as f64 / KIB
    }

    pub fn max_mem_alloc_gib(&self) -> f64 {
        self.max_mem_alloc_bytes as f64 / GIB
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t{}\tName: {}", self.index, self.name)?;
        writeln!(f, "\t\tType: {}", self.kind)?;
        writeln!(f, "\t\tVendor: {}", self.vendor)?;
        writeln!(f, "\t\tVersion: {}", self.version)?;
        writeln!(f, "\t\tAvailable: {}", self.available)?;
        writeln!(f, "\t\tMax compute units: {}", self.max_compute_units)?;
        writeln!(f, "\t\tMax work group size: {}", self.max_work_group_size)?;
        writeln!(f, "\t\tMax clock frequency: {}MHz", self.max_clock_frequency_mhz)?;
        writeln!(f, "\t\tGlobal memory size: {:.3}GB", self.global_mem_gib())?;
        writeln!(f, "\t\tLocal memory size: {:.3}KB", self.local_mem_kib())?;
        write!(f, "\t\tMaximum allocatable memory: {:.3}GB", self.max_mem_alloc_gib())
    }
}

/// A device whose info queries failed while enumerating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableDevice {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct PlatformInfo {
    pub index: usize,
    pub name: String,
    pub vendor: String,
    pub version: String,
    pub profile: String,
    pub icd_suffix: String,
    pub extensions: String,
    pub devices: Vec<DeviceInfo>,
    pub unreadable: Vec<UnreadableDevice>,
}

impl PlatformInfo {
    /// Queries the platform strings only; `devices` stays empty.
    pub fn query(index: usize, platform: &Platform) -> Result<Self> {
        let icd_suffix = platform
            .get_data(CL_PLATFORM_ICD_SUFFIX_KHR)
            .map(|raw| trim_info_string(&String::from_utf8_lossy(&raw)).to_owned())
            .unwrap_or_default();

        Ok(Self {
            index,
            name: trim_info_string(&platform.name()?).to_owned(),
            vendor: trim_info_string(&platform.vendor()?).to_owned(),
            version: trim_info_string(&platform.version()?).to_owned(),
            profile: trim_info_string(&platform.profile()?).to_owned(),
            icd_suffix,
            extensions: trim_info_string(&platform.extensions()?).to_owned(),
            devices: Vec::new(),
            unreadable: Vec::new(),
        })
    }
}

impl fmt::Display for PlatformInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}\tName: {}", self.index, self.name)?;
        writeln!(f, "\tVendor: {}", self.vendor)?;
        writeln!(f, "\tVersion: {}", self.version)?;
        writeln!(f, "\tProfile: {}", self.profile)?;
        writeln!(f, "\tICD suffix KHR: {}", self.icd_suffix)?;
        writeln!(f, "\tExtensions: {}", self.extensions)?;
        write!(
            f,
            "\t{}",
            style("All OpenCL devices of this platform:").blue().bold()
        )?;
        for device in &self.devices {
            write!(f, "\n{device}")?;
        }
        for device in &self.unreadable {
            write!(f, "\n\t{}\tDevice info query failed: {}", device.index, device.error)?;
        }
        Ok(())
    }
}

/// Drivers report info strings with a trailing NUL (and sometimes blanks).
pub fn trim_info_string(raw: &str) -> &str {
    raw.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
}

/// Index of the first name equal to `wanted`, ignoring driver padding.
pub fn find_by_name<S: AsRef<str>>(names: &[S], wanted: &str) -> Option<usize> {
    let wanted = trim_info_string(wanted);
    names
        .iter()
        .position(|name| trim_info_string(name.as_ref()) == wanted)
}

/// The ICD loader reports "no ICD installed" as an error, not an empty list.
fn platform_error(code: i32) -> ClError {
    match code {
        CL_PLATFORM_NOT_FOUND_KHR => ClError::NoPlatforms,
        code => ClError::Api(code),
    }
}

fn platforms() -> Result<Vec<Platform>> {
    let platforms = get_platforms().map_err(|err| platform_error(err.0))?;
    if platforms.is_empty() {
        return Err(ClError::NoPlatforms);
    }
    debug!("{} OpenCL platform(s) found", platforms.len());
    Ok(platforms)
}

/// `clGetDeviceIDs` reports an empty match as an error; treat it as empty.
fn device_ids(platform: &Platform, device_type: cl_device_type) -> Result<Vec<cl_device_id>> {
    match platform.get_devices(device_type) {
        Ok(ids) => Ok(ids),
        Err(err) if err.0 == CL_DEVICE_NOT_FOUND => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

/// Queries each device into `platform.devices` and returns the devices that
/// answered, in the same order. Failures go to `platform.unreadable`.
fn collect_devices<D>(
    platform: &mut PlatformInfo,
    devices: impl IntoIterator<Item = D>,
    mut query: impl FnMut(usize, &D) -> Result<DeviceInfo>,
) -> Vec<D> {
    let mut readable = Vec::new();
    for (index, device) in devices.into_iter().enumerate() {
        match query(index, &device) {
            Ok(info) => {
                debug!("found device: {} ({})", info.name, info.vendor);
                platform.devices.push(info);
                readable.push(device);
            }
            Err(err) => {
                warn!(platform = %platform.name, index, %err, "device info query failed");
                platform.unreadable.push(UnreadableDevice { index, error: err.to_string() });
            }
        }
    }
    readable
}

/// All platforms together with their GPU and CPU devices. `devices[i]` is the
/// handle for `info.devices[i]`; devices that fail their info queries are
/// listed in `info.unreadable` instead.
pub fn enumerate() -> Result<Vec<(PlatformInfo, Vec<Device>)>> {
    let mut out = Vec::new();
    for (index, platform) in platforms()?.iter().enumerate() {
        let mut info = PlatformInfo::query(index, platform)?;
        debug!("scanning OpenCL platform: {}", info.name);

        let ids = device_ids(platform, CL_DEVICE_TYPE_GPU | CL_DEVICE_TYPE_CPU)?;
        let devices = collect_devices(&mut info, ids.into_iter().map(Device::new), DeviceInfo::query);
        out.push((info, devices));
    }
    Ok(out)
}

/// Platform and device chosen for a timed run.
pub struct Selected {
    pub platform: PlatformInfo,
    pub device: Device,
    pub info: DeviceInfo,
}

/// Finds the wanted platform, then the wanted device of `device_type` on it.
pub fn select(selector: &DeviceSelector, device_type: cl_device_type) -> Result<Selected> {
    let platforms = platforms()?;

    let platform_idx = match &selector.platform_name {
        Some(wanted) => {
            let names = platforms
                .iter()
                .map(|p| p.name())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            find_by_name(&names, wanted)
                .ok_or_else(|| ClError::PlatformNotFound(wanted.clone()))?
        }
        None => 0,
    };
    let platform = &platforms[platform_idx];
    let platform_info = PlatformInfo::query(platform_idx, platform)?;

    let ids = device_ids(platform, device_type)?;
    if ids.is_empty() {
        return Err(ClError::NoDevices { platform: platform_info.name });
    }
    let mut devices: Vec<Device> = ids.into_iter().map(Device::new).collect();

    let device_idx = match &selector.device_name {
        Some(wanted) => {
            let names = devices
                .iter()
                .map(|d| d.name())
                .collect::<std::result::Result<Vec<_>, _>>()?;
            find_by_name(&names, wanted)
                .ok_or_else(|| ClError::DeviceNotFound(wanted.clone()))?
        }
        None => 0,
    };
    let device = devices.swap_remove(device_idx);
    let info = DeviceInfo::query(device_idx, &device)?;
    info!(platform = %platform_info.name, device = %info.name, "selected OpenCL device");

    Ok(Selected { platform: platform_info, device, info })
}
