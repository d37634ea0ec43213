//! # umbra_core - Graphics Device Contract
//!
//! Backend-agnostic building blocks shared by the Umbra crates:
//! - Generational handles for assets referenced from draw calls
//! - GPU resource identifiers and creation descriptors
//! - Fixed-function pipeline state enums
//! - Named uniform values
//! - The [`GraphicsDevice`] trait every backend implements
//! - [`HeadlessDevice`], a recording implementation for tests and tools
//!
//! ## Example
//!
//! ```ignore
//! use umbra_core::prelude::*;
//!
//! let mut device = HeadlessDevice::new(1280, 720);
//! let target = device.create_render_target(
//!     &RenderTargetDesc::color("hdr", 1280, 720, &[TextureFormat::Rgba32Float]).with_depth(),
//! )?;
//! device.bind_render_target(Some(target));
//! device.clear(ClearMask::ALL, Vec4::new(0.0, 0.0, 0.0, 1.0));
//! ```

pub mod device;
pub mod error;
pub mod handle;
pub mod headless;
pub mod resource;
pub mod state;
pub mod uniform;

pub use device::GraphicsDevice;
pub use error::{DeviceError, Result};
pub use handle::{Handle, HandleMap};
pub use headless::{DeviceCommand, DrawRecord, HeadlessDevice};
pub use resource::{
    BuiltinMesh, ClearMask, CubeFace, FallbackTexture, FilterMode, MeshId, Rect, RenderTargetDesc,
    RenderTargetId, TextureDesc, TextureFormat, TextureId, TextureKind,
};
pub use state::{BlendMode, CullMode, DepthFunc, FrontFace};
pub use uniform::UniformValue;

/// Prelude for common imports
pub mod prelude {
    pub use crate::device::GraphicsDevice;
    pub use crate::handle::{Handle, HandleMap};
    pub use crate::headless::HeadlessDevice;
    pub use crate::resource::*;
    pub use crate::state::*;
    pub use crate::uniform::UniformValue;
    pub use glam::{Mat4, Vec2, Vec3, Vec4};
}
