//! Kernel sources and program building.

use std::borrow::Cow;
use std::fs;
use std::path::Path;

use opencl3::context::Context;
use opencl3::kernel::Kernel;
use opencl3::program::Program;
use tracing::{debug, info};

use crate::config::DEFAULT_KERNEL_PATH;
use crate::error::{ClError, Result};

/// `simple`: `output[i] = i`.
pub const INDEX_SRC: &str = include_str!("../kernels/index.cl");
pub const INDEX_KERNEL: &str = "simple";

/// `kernelSimple`: 2D `output[i] = i + n!`.
pub const INDEX_FILL_SRC: &str = include_str!("../kernels/index_fill.cl");

/// `kernelSimple`: `output[i] = input[i] * 2`.
pub const SCALE_SRC: &str = include_str!("../kernels/scale.cl");

/// Entry point name shared by the file-based programs.
pub const FILE_KERNEL: &str = "kernelSimple";

/// Picks the kernel source for a run.
///
/// With an explicit `path` the file must be readable. Without one, a
/// `kernel.cl` in the working directory wins over the embedded `fallback`.
pub fn load_source(path: Option<&Path>, fallback: &'static str) -> Result<Cow<'static, str>> {
    if let Some(path) = path {
        let src = fs::read_to_string(path).map_err(|source| ClError::KernelSource {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "loaded kernel source");
        return Ok(Cow::Owned(src));
    }

    let default = Path::new(DEFAULT_KERNEL_PATH);
    match fs::read_to_string(default) {
        Ok(src) => {
            info!(path = %default.display(), "loaded kernel source");
            Ok(Cow::Owned(src))
        }
        Err(err) => {
            debug!("no {} ({err}), using embedded kernel", default.display());
            Ok(Cow::Borrowed(fallback))
        }
    }
}

/// Compiles `source` for every device of `context`; the error carries the build log.
pub fn build(context: &Context, source: &str, options: &str) -> Result<Program> {
    let program = Program::create_and_build_from_source(context, source, options)
        .map_err(ClError::Build)?;
    debug!(options, "program built");
    Ok(program)
}

pub fn create(program: &Program, name: &str) -> Result<Kernel> {
    Ok(Kernel::create(program, name)?)
}
