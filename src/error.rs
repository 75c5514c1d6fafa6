//! Error types for device selection, kernel builds, and stream dispatch.

use thiserror::Error;

/// Errors produced by the stream benchmark core.
///
/// Every variant is unrecoverable at the point it is raised: a failed
/// construction leaves no usable stream instance, and a failed operation
/// aborts the current call without retry.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid device index {index} (only {count} devices enumerated)")]
    InvalidDeviceIndex { index: usize, count: usize },

    #[error("device '{device}' does not support double precision")]
    UnsupportedPrecision { device: String },

    #[error("kernel program build failed:\n{log}")]
    KernelBuildFailure { log: String },

    #[error("buffer of {requested} bytes exceeds device max allocation of {max_alloc} bytes")]
    BufferTooLarge { requested: u64, max_alloc: u64 },

    #[error("device memory of {available} bytes cannot hold {required} bytes for all 3 buffers")]
    InsufficientDeviceMemory { required: u64, available: u64 },

    #[error("array size {array_size} is not a positive multiple of work-group size {group_size}")]
    UnalignedArraySize { array_size: usize, group_size: usize },

    #[error("OpenCL error: {0}")]
    Ocl(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, StreamError>;
