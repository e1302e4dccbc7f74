//! Error types for the override pipeline.
//!
//! Every fallible operation in the crate returns [`Result<T>`], an alias for
//! `std::result::Result<T, OverrideError>`. The first four variants are the
//! pipeline's own failure taxonomy; the rest come from the control surface,
//! plugin registration and the wgpu host.

use thiserror::Error;

/// The error type for the override pipeline and its hosts.
#[derive(Error, Debug)]
pub enum OverrideError {
    // ========================================================================
    // Pipeline Errors
    // ========================================================================
    /// The host render target manager is unavailable or refused a target.
    ///
    /// Fatal for the session: the pipeline stays inert.
    #[error("render target acquisition failed: {0}")]
    ResourceAcquisition(String),

    /// The host renderer was not active when `setup` ran.
    ///
    /// Fatal for the current frame only.
    #[error("host renderer is not active")]
    RendererUnavailable,

    /// One or more pipeline slots could not be constructed.
    #[error("render pipeline is incomplete, slots {failed:?} could not be initialized")]
    PipelineIntegrity {
        /// Indices of the slots that are missing a pass.
        failed: Vec<usize>,
    },

    /// A pass shader failed to compile. Non-fatal.
    #[error("shader '{file}' (technique '{technique}') could not be compiled: {reason}")]
    ShaderCompilation {
        file: String,
        technique: String,
        reason: String,
    },

    // ========================================================================
    // Control Surface & Plugin Errors
    // ========================================================================
    /// A control command could not be parsed.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The host refused to register or deregister a plugin component.
    #[error("registration failed: {0}")]
    Registration(String),

    // ========================================================================
    // Host Backend Errors
    // ========================================================================
    /// GPU bring-up or frame acquisition failed.
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Failed to create the GPU device.
    #[error("failed to create wgpu device: {0}")]
    DeviceCreateFailed(#[from] wgpu::RequestDeviceError),

    /// Failed to create the presentation surface.
    #[error("failed to create wgpu surface: {0}")]
    SurfaceCreateFailed(#[from] wgpu::CreateSurfaceError),

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alias for `Result<T, OverrideError>`.
pub type Result<T> = std::result::Result<T, OverrideError>;
