//! Hard-coded run parameters. The CLI overrides individual fields.

use std::mem::size_of;
use std::path::PathBuf;

use crate::error::{ClError, Result};

pub const DEFAULT_PLATFORM: &str = "Intel(R) OpenCL";
pub const DEFAULT_DEVICE: &str = "Intel(R) Iris(TM) Graphics 550";
pub const DEFAULT_KERNEL_PATH: &str = "kernel.cl";
pub const BUILD_OPTIONS: &str = "-cl-std=CL1.2";

/// Largest work-group edge the Intel iGPU accepts for a 2D range.
pub const MAX_WORK_GROUP_SIZE_INTEL: usize = 16;

/// Which platform/device a run should use. `None` takes the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSelector {
    pub platform_name: Option<String>,
    pub device_name: Option<String>,
}

impl DeviceSelector {
    pub fn named(platform: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            platform_name: Some(platform.into()),
            device_name: Some(device.into()),
        }
    }
}

/// 2D index fill: `output[i] = i + factorial(n)`.
#[derive(Debug, Clone)]
pub struct IndexFillConfig {
    pub selector: DeviceSelector,
    pub wg_size_x: usize,
    pub wg_size_y: usize,
    pub groups_x: usize,
    pub groups_y: usize,
    pub factorial: u32,
    /// `None` means "use `kernel.cl` if it exists, else the embedded source".
    pub kernel_path: Option<PathBuf>,
}

impl Default for IndexFillConfig {
    fn default() -> Self {
        Self {
            selector: DeviceSelector::named(DEFAULT_PLATFORM, DEFAULT_DEVICE),
            wg_size_x: MAX_WORK_GROUP_SIZE_INTEL,
            wg_size_y: MAX_WORK_GROUP_SIZE_INTEL,
            groups_x: 100,
            groups_y: 100,
            factorial: 100,
            kernel_path: None,
        }
    }
}

/// `a * b`, or `SizeOverflow(what)`.
fn mul(a: usize, b: usize, what: &'static str) -> Result<usize> {
    a.checked_mul(b).ok_or(ClError::SizeOverflow(what))
}

impl IndexFillConfig {
    pub fn count_x(&self) -> Result<usize> {
        mul(self.wg_size_x, self.groups_x, "index-fill width")
    }

    pub fn count_y(&self) -> Result<usize> {
        mul(self.wg_size_y, self.groups_y, "index-fill height")
    }

    pub fn count(&self) -> Result<usize> {
        mul(self.count_x()?, self.count_y()?, "index-fill element count")
    }

    pub fn size_bytes(&self) -> Result<usize> {
        mul(self.count()?, size_of::<i32>(), "index-fill buffer")
    }
}

/// 1D scalar multiply: `output[i] = input[i] * 2`.
#[derive(Debug, Clone)]
pub struct ScaleConfig {
    pub selector: DeviceSelector,
    pub array_size: usize,
    pub local_size: Option<usize>,
    /// Fixed RNG seed; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub kernel_path: Option<PathBuf>,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            selector: DeviceSelector::named(DEFAULT_PLATFORM, DEFAULT_DEVICE),
            array_size: 1 << 20,
            local_size: None,
            seed: None,
            kernel_path: None,
        }
    }
}

impl ScaleConfig {
    pub fn size_bytes(&self) -> Result<usize> {
        mul(self.array_size, size_of::<i32>(), "scale buffer")
    }
}

/// Per-device smoke kernel.
#[derive(Debug, Clone, Copy)]
pub struct SmokeConfig {
    pub size: usize,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self { size: 1000 }
    }
}

impl SmokeConfig {
    pub fn size_bytes(&self) -> Result<usize> {
        mul(self.size, size_of::<i32>(), "smoke buffer")
    }
}
