//! Introductory OpenCL host programs.
//!
//! Each run is the same linear procedure: enumerate platforms and devices,
//! build a one-line kernel, move a buffer to the device, launch, read back,
//! compare with a host-computed reference and report the timings.

pub mod buffer;
pub mod config;
pub mod error;
pub mod host;
pub mod kernel;
pub mod platform;
pub mod run;
pub mod timing;
pub mod verify;

// ─── Feature modules ──────────────────────────────────────────────────
#[cfg(feature = "metrics")]
pub mod metrics;

pub use buffer::{GpuBuffer, GpuEventGuard, InFlight, Queued, Ready};
pub use config::{DeviceSelector, IndexFillConfig, ScaleConfig, SmokeConfig};
pub use error::{ClError, Result};
pub use platform::{DeviceInfo, DeviceKind, PlatformInfo, UnreadableDevice};
pub use run::{PlatformSmoke, RunReport, SmokeOutcome};
pub use timing::Timings;
pub use verify::Verification;
