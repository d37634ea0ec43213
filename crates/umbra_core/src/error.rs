//! Error types for graphics device operations

use thiserror::Error;

use crate::resource::{RenderTargetId, TextureId};

/// Graphics device errors
#[derive(Debug, Error, PartialEq)]
pub enum DeviceError {
    /// Texture id was never issued or has been destroyed
    #[error("Unknown texture: {0:?}")]
    UnknownTexture(TextureId),

    /// Render target id was never issued or has been destroyed
    #[error("Unknown render target: {0:?}")]
    UnknownRenderTarget(RenderTargetId),

    /// Zero-sized or oversized surface
    #[error("Invalid surface size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    /// Layer index beyond the texture's face count
    #[error("Face {face} out of range for texture {texture:?}")]
    FaceOutOfRange { texture: TextureId, face: usize },

    /// Copy or upload between textures of different shape
    #[error("Texture size mismatch: expected {expected} floats, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Depth textures have no readable texel storage
    #[error("Texture {0:?} cannot be read back")]
    NotReadable(TextureId),

    /// Attachment slot beyond the target's color attachments
    #[error("Render target {target:?} has no color attachment {index}")]
    MissingAttachment { target: RenderTargetId, index: usize },
}

/// Result type for device operations
pub type Result<T> = std::result::Result<T, DeviceError>;
