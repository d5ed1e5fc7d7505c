//! Error types for the runtime crate.

use crate::program::ProgramSource;
use thiserror::Error;

/// Runtime execution errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No GPU-class or CPU-class compute adapter exists on this host.
    ///
    /// Raised once, at context construction. Unrecoverable: there is nothing
    /// to execute on, so initialization must abort.
    #[error("no compute device available")]
    NoDeviceAvailable,

    /// Kernel source or binary failed to parse or validate.
    ///
    /// Carries the original program text/binary so the caller can inspect
    /// what was submitted. Fatal to that program's construction; the caller
    /// may retry with corrected source.
    #[error("kernel '{name}' failed to build: {log}")]
    BuildFailure {
        /// Entry point name the caller asked for.
        name: String,
        /// Diagnostic output from the shader front-end.
        log: String,
        /// The source or binary that failed, for postmortem inspection.
        source: ProgramSource,
    },

    /// A caller programming error: host transfer on an image-backed buffer,
    /// a size/shape mismatch, or a work-size that contradicts the kernel.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// A native device error during enqueue, dispatch, or transfer.
    ///
    /// Propagated unchanged; this layer never retries or suppresses
    /// device-level failures.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Buffer readback mapping failed.
    #[error("buffer mapping failed: {0}")]
    MapFailed(#[from] wgpu::BufferAsyncError),
}

/// Specialized Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
