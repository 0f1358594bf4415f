//! Elementwise host/device comparison.

use std::fmt;

use crate::error::{ClError, Result};

/// Number of mismatches kept for printing.
pub const MAX_REPORTED: usize = 9;
/// From this many errors on the listing ends with "...".
const ELLIPSIS_AT: usize = MAX_REPORTED + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    pub index: usize,
    pub cpu: i32,
    /// `None` when the device output is shorter than the host reference.
    pub gpu: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verification {
    pub checked: usize,
    pub errors: usize,
    pub mismatches: Vec<Mismatch>,
}

impl Verification {
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(ClError::Mismatch { errors: self.errors })
        }
    }
}

/// Compares `device` against the `host` reference.
pub fn compare(host: &[i32], device: &[i32]) -> Verification {
    let mut report = Verification {
        checked: host.len().max(device.len()),
        ..Verification::default()
    };

    for index in 0..report.checked {
        let cpu = host.get(index).copied();
        let gpu = device.get(index).copied();
        if cpu == gpu {
            continue;
        }
        report.errors += 1;
        if report.mismatches.len() < MAX_REPORTED {
            report.mismatches.push(Mismatch {
                index,
                cpu: cpu.unwrap_or_default(),
                gpu,
            });
        }
    }
    report
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.mismatches {
            match m.gpu {
                Some(gpu) => writeln!(f, "Error at {} -> CPU: {}, GPU: {}", m.index, m.cpu, gpu)?,
                None => writeln!(f, "Error at {} -> CPU: {}, GPU: <missing>", m.index, m.cpu)?,
            }
        }
        if self.errors >= ELLIPSIS_AT {
            writeln!(f, "...")?;
        }
        if self.is_ok() {
            write!(f, "Success, all values are correct")
        } else {
            write!(f, "Failure, errors between GPU and CPU: {}", self.errors)
        }
    }
}
