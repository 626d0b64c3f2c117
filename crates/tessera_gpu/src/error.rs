//! GPU layer errors

use thiserror::Error;

/// Errors raised while creating GPU resources
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    AdapterNotFound,

    #[error("Failed to request GPU device: {0}")]
    RequestDevice(String),

    #[error("Shader compilation failed for `{label}`: {message}")]
    ShaderCompile { label: String, message: String },

    #[error("Invalid texture: {0}")]
    InvalidTexture(String),

    #[error("Failed to read back render target: {0}")]
    Readback(String),
}

pub type Result<T> = std::result::Result<T, GpuError>;
