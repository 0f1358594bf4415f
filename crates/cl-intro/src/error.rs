use std::path::PathBuf;

/// Everything that can abort a run.
#[derive(thiserror::Error, Debug)]
pub enum ClError {
    #[error("OpenCL API error: {0}")]
    Api(i32),

    #[error("no supported OpenCL platforms found")]
    NoPlatforms,

    #[error("no OpenCL devices found on platform \"{platform}\"")]
    NoDevices { platform: String },

    #[error("no \"{0}\" OpenCL platform found")]
    PlatformNotFound(String),

    #[error("no \"{0}\" OpenCL device found")]
    DeviceNotFound(String),

    #[error("program build error:\n{0}")]
    Build(String),

    #[error("invalid buffer size: {0}")]
    InvalidSize(usize),

    #[error("{0} does not fit in the address space")]
    SizeOverflow(&'static str),

    #[error("buffer of {requested} bytes exceeds the device allocation limit of {max} bytes")]
    BufferTooLarge { requested: u64, max: u64 },

    #[error("invalid work-group size {local:?} for global size {global:?} (device max {max})")]
    InvalidWorkGroup {
        global: Vec<usize>,
        local: Vec<usize>,
        max: usize,
    },

    #[error("cannot read kernel source {}: {source}", path.display())]
    KernelSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("errors between GPU and CPU: {errors}")]
    Mismatch { errors: usize },
}

pub type Result<T> = std::result::Result<T, ClError>;

impl From<opencl3::error_codes::ClError> for ClError {
    #[inline]
    fn from(err: opencl3::error_codes::ClError) -> Self {
        ClError::Api(err.0)
    }
}

impl From<i32> for ClError {
    #[inline]
    fn from(code: i32) -> Self {
        ClError::Api(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_code_roundtrips_from_opencl3() {
        let err: ClError = opencl3::error_codes::ClError(-5).into();
        assert!(matches!(err, ClError::Api(-5)));
        assert_eq!(err.to_string(), "OpenCL API error: -5");
    }

    #[test]
    fn messages_name_the_missing_thing() {
        let err = ClError::DeviceNotFound("Intel(R) Iris(TM) Graphics 550".into());
        assert_eq!(
            err.to_string(),
            "no \"Intel(R) Iris(TM) Graphics 550\" OpenCL device found"
        );

        let err = ClError::BufferTooLarge { requested: 10, max: 4 };
        assert!(err.to_string().contains("10 bytes"));
        assert!(err.to_string().contains("limit of 4 bytes"));

        let err = ClError::SizeOverflow("scale buffer");
        assert_eq!(err.to_string(), "scale buffer does not fit in the address space");
    }
}
