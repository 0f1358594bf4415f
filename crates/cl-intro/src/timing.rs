//! Host stopwatch and profiling-event durations.

use std::fmt;
use std::time::Instant;

use opencl3::event::Event;

use crate::error::Result;

/// `COMMAND_END - COMMAND_START` of a completed event on a profiling queue.
pub fn event_duration_ns(evt: &Event) -> Result<u64> {
    let start = evt.profiling_command_start()?;
    let end = evt.profiling_command_end()?;
    Ok(end.saturating_sub(start))
}

/// Runs `f` and returns its result with the elapsed monotonic time in ns.
pub fn time_host<R>(f: impl FnOnce() -> R) -> (R, u64) {
    let begin = Instant::now();
    let out = f();
    let ns = u64::try_from(begin.elapsed().as_nanos()).unwrap_or(u64::MAX);
    (out, ns)
}

/// Host vs. device timings of one run, all in nanoseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timings {
    pub host_ns: u64,
    /// Host → device upload, when the run has input data.
    pub write_ns: Option<u64>,
    pub kernel_ns: u64,
    /// Device → host write back.
    pub read_ns: u64,
}

impl Timings {
    pub fn device_ns(&self) -> u64 {
        self.write_ns
            .unwrap_or(0)
            .saturating_add(self.kernel_ns)
            .saturating_add(self.read_ns)
    }

    /// `host / device`; `None` if the device reported zero time.
    pub fn speedup(&self) -> Option<f64> {
        match self.device_ns() {
            0 => None,
            device => Some(self.host_ns as f64 / device as f64),
        }
    }

    /// The single comparison line printed after a successful run.
    pub fn comparison(&self) -> String {
        let speedup = match self.speedup() {
            Some(s) => format!("{s:.4}"),
            None => "n/a".to_owned(),
        };
        format!(
            "Speed comparison: CPU={}ns vs GPU={}ns (=> Speedup: {})",
            self.host_ns,
            self.device_ns(),
            speedup
        )
    }
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CPU time:\n\tCalculation: {}ns", self.host_ns)?;
        write!(f, "GPU time:")?;
        if let Some(write_ns) = self.write_ns {
            write!(f, "\n\tWrite: {write_ns}ns")?;
        }
        write!(f, "\n\tCalculation: {}ns", self.kernel_ns)?;
        write!(f, "\n\tWrite back: {}ns", self.read_ns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_time_sums_all_parts() {
        let t = Timings { host_ns: 100, write_ns: Some(5), kernel_ns: 10, read_ns: 35 };
        assert_eq!(t.device_ns(), 50);
        assert_eq!(t.speedup(), Some(2.0));
    }

    #[test]
    fn zero_device_time_has_no_speedup() {
        let t = Timings { host_ns: 100, ..Timings::default() };
        assert_eq!(t.speedup(), None);
        assert!(t.comparison().ends_with("(=> Speedup: n/a)"));
    }

    #[test]
    fn display_omits_missing_upload() {
        let t = Timings { host_ns: 7, write_ns: None, kernel_ns: 3, read_ns: 4 };
        assert_eq!(
            t.to_string(),
            "CPU time:\n\tCalculation: 7ns\nGPU time:\n\tCalculation: 3ns\n\tWrite back: 4ns"
        );
    }

    #[test]
    fn display_shows_upload_before_calculation() {
        let t = Timings { host_ns: 90, write_ns: Some(11), kernel_ns: 3, read_ns: 4 };
        assert_eq!(
            t.to_string(),
            "CPU time:\n\tCalculation: 90ns\n\
             GPU time:\n\tWrite: 11ns\n\tCalculation: 3ns\n\tWrite back: 4ns"
        );
        assert_eq!(t.comparison(), "Speed comparison: CPU=90ns vs GPU=18ns (=> Speedup: 5.0000)");
    }

    #[test]
    fn time_host_returns_closure_output() {
        let (v, _ns) = time_host(|| 21 * 2);
        assert_eq!(v, 42);
    }
}
