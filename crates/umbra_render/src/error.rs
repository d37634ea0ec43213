//! Render errors
//!
//! Only conditions that end a frame or a bake early are errors. Skipped
//! draws, skipped passes and truncated light lists are counted in
//! [`FrameStats`](crate::stats::FrameStats) instead.

use thiserror::Error;
use umbra_core::DeviceError;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("post-processing stage '{stage}' has no shader '{shader}'")]
    MissingShader {
        stage: &'static str,
        shader: &'static str,
    },

    #[error("invalid settings: {0}")]
    Settings(#[from] serde_json::Error),

    #[error("scene has no irradiance grid to bake")]
    NoIrradianceGrid,

    #[error("capture of {0:?} returned a malformed image")]
    MalformedCapture(umbra_core::TextureId),
}

pub type Result<T> = std::result::Result<T, RenderError>;
