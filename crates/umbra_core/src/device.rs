//! Graphics Device Contract
//!
//! The renderer never talks to a graphics API directly. Everything it
//! submits goes through [`GraphicsDevice`]: render-target binding, viewport
//! and scissor, masked clears, shader selection with named uniforms, draw
//! submission and the handful of fixed-function toggles the passes need.
//!
//! The contract is a single command stream. Calls take effect in the order
//! they are made and a call never observes a later one, which is the only
//! ordering guarantee the passes rely on.
//!
//! # Usage
//!
//! ```ignore
//! let target = device.create_render_target(&RenderTargetDesc::depth_only("shadow", 1024, 1024))?;
//! device.bind_render_target(Some(target));
//! device.set_color_mask(false);
//! device.clear(ClearMask::DEPTH, Vec4::ONE);
//! if device.enable_shader("shadowmap") {
//!     device.set_uniform("u_viewprojection", light_vp.into());
//!     device.draw_mesh(mesh);
//! }
//! device.set_color_mask(true);
//! device.bind_render_target(None);
//! ```

use glam::Vec4;

use crate::error::Result;
use crate::resource::{
    BuiltinMesh, ClearMask, CubeFace, FallbackTexture, FilterMode, MeshId, Rect, RenderTargetDesc,
    RenderTargetId, TextureDesc, TextureId,
};
use crate::state::{BlendMode, CullMode, DepthFunc, FrontFace};
use crate::uniform::UniformValue;

/// Graphics-submission collaborator
pub trait GraphicsDevice {
    // --- resources ---

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureId>;

    fn destroy_texture(&mut self, texture: TextureId);

    fn texture_desc(&self, texture: TextureId) -> Option<&TextureDesc>;

    /// Create a render target; its attachments are owned by the target
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> Result<RenderTargetId>;

    /// Destroy a render target together with the attachments it created
    fn destroy_render_target(&mut self, target: RenderTargetId);

    fn color_attachment(&self, target: RenderTargetId, index: usize) -> Option<TextureId>;

    fn depth_attachment(&self, target: RenderTargetId) -> Option<TextureId>;

    /// Point color attachment 0 of `target` at one face of a cubemap
    fn attach_cube_face(&mut self, target: RenderTargetId, cubemap: TextureId, face: CubeFace) -> Result<()>;

    // --- output ---

    /// Bind a render target, `None` for the default framebuffer
    fn bind_render_target(&mut self, target: Option<RenderTargetId>);

    /// Restrict writes to a single color attachment, `None` re-enables all
    fn set_draw_buffer(&mut self, buffer: Option<usize>);

    fn set_viewport(&mut self, rect: Rect);

    /// Scissor rectangle, `None` disables the scissor test
    fn set_scissor(&mut self, rect: Option<Rect>);

    fn set_color_mask(&mut self, write_color: bool);

    fn clear(&mut self, mask: ClearMask, color: Vec4);

    // --- shaders ---

    /// Enable a shader by role name; `false` when the device has no such shader
    fn enable_shader(&mut self, name: &str) -> bool;

    fn disable_shader(&mut self);

    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn set_texture(&mut self, name: &str, texture: TextureId, slot: u32);

    // --- state ---

    fn set_blend(&mut self, mode: BlendMode);

    fn set_depth_test(&mut self, enabled: bool);

    fn set_depth_func(&mut self, func: DepthFunc);

    fn set_cull(&mut self, mode: CullMode);

    fn set_front_face(&mut self, face: FrontFace);

    // --- submission ---

    fn draw_mesh(&mut self, mesh: MeshId);

    fn builtin_mesh(&self, kind: BuiltinMesh) -> MeshId;

    fn fallback_texture(&self, kind: FallbackTexture) -> TextureId;

    // --- texture operations ---

    /// Copy every face of `src` into `dst`; both must have the same shape
    fn copy_texture(&mut self, src: TextureId, dst: TextureId) -> Result<()>;

    fn generate_mipmaps(&mut self, texture: TextureId) -> Result<()>;

    fn set_filter(&mut self, texture: TextureId, filter: FilterMode) -> Result<()>;

    /// Read back one face as tightly packed floats
    fn read_pixels(&self, texture: TextureId, face: usize) -> Result<Vec<f32>>;

    fn upload_texture(&mut self, texture: TextureId, face: usize, data: &[f32]) -> Result<()>;

    /// Drain API errors raised since the last call.
    ///
    /// Used at development-time checkpoints only; backends that cannot
    /// report errors return nothing.
    fn take_errors(&mut self) -> Vec<String> {
        Vec::new()
    }
}
