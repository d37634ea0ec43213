//! Post-Processing Chain
//!
//! Fixed stage order over the HDR illumination result:
//!
//! ```text
//! fxaa -> blur -> dof -> motionblur -> bloom -> ca -> grain -> hdr
//! ```
//!
//! Each enabled stage reads the previous output and writes the other half
//! of the ping/pong pair. Bloom is composited additively onto the current
//! output instead of swapping. The blur runs whenever bloom or depth of
//! field consumes it and always leaves its result in the `blurred` target.
//! The final tone-map pass always runs and writes the default framebuffer.
//!
//! An enabled stage whose shader is missing ends the frame with
//! [`RenderError::MissingShader`]; later stages are not run.

use glam::{Mat4, Vec2};
use umbra_core::{BlendMode, BuiltinMesh, FallbackTexture, GraphicsDevice, Rect, RenderTargetId, TextureId};

use crate::error::{RenderError, Result};
use crate::stats::FrameStats;
use crate::targets::{color_texture, depth_texture, ScreenTargets};
use crate::view::FrameView;

pub const FXAA_SHADER: &str = "fxaa";
pub const BLUR_SHADER: &str = "blur";
pub const DOF_SHADER: &str = "dof";
pub const MOTION_BLUR_SHADER: &str = "motionblur";
pub const BLOOM_SHADER: &str = "bloom";
pub const CHROMATIC_ABERRATION_SHADER: &str = "ca";
pub const GRAIN_SHADER: &str = "grain";
pub const HDR_SHADER: &str = "hdr";

/// Per-frame inputs that do not live in the view
#[derive(Clone, Copy, Debug)]
pub struct PostFxFrame {
    /// Camera view-projection of the previous frame
    pub prev_view_projection: Mat4,
    pub time: f32,
}

fn enable(device: &mut dyn GraphicsDevice, stage: &'static str, shader: &'static str) -> Result<()> {
    if device.enable_shader(shader) {
        return Ok(());
    }
    log::error!("Post-processing stage '{}' has no shader '{}', frame aborted", stage, shader);
    Err(RenderError::MissingShader { stage, shader })
}

/// Ping/pong state: where the latest output lives and which slot is next
struct Chain {
    current: TextureId,
    current_target: RenderTargetId,
    slots: [(RenderTargetId, TextureId); 2],
    next: usize,
    viewport: Rect,
    quad: umbra_core::MeshId,
}

impl Chain {
    /// Run one full-screen stage into the next slot
    fn stage(
        &mut self,
        device: &mut dyn GraphicsDevice,
        stats: &mut FrameStats,
        stage: &'static str,
        shader: &'static str,
        uniforms: impl FnOnce(&mut dyn GraphicsDevice, TextureId),
    ) -> Result<()> {
        let (target, output) = self.slots[self.next];
        device.bind_render_target(Some(target));
        device.set_viewport(self.viewport);
        enable(device, stage, shader)?;
        uniforms(device, self.current);
        device.draw_mesh(self.quad);
        device.disable_shader();

        self.current = output;
        self.current_target = target;
        self.next ^= 1;
        stats.postfx_stages += 1;
        log::trace!("Post stage '{}' done", stage);
        Ok(())
    }
}

/// Run every enabled stage and present the tone-mapped result
pub fn run_post_chain(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    targets: &ScreenTargets,
    frame: PostFxFrame,
    stats: &mut FrameStats,
) -> Result<()> {
    let settings = view.settings;
    let (width, height) = targets.size();
    let viewport = Rect::full(width, height);
    let size = Vec2::new(width as f32, height as f32);
    let inv_size = Vec2::ONE / size.max(Vec2::ONE);
    let inv_vp = view.camera.view_projection.inverse();

    let depth = depth_texture(device, targets.illumination)?;
    let blurred = color_texture(device, targets.blurred, 0)?;
    let mut chain = Chain {
        current: color_texture(device, targets.illumination, 0)?,
        current_target: targets.illumination,
        slots: [
            (targets.ping, color_texture(device, targets.ping, 0)?),
            (targets.pong, color_texture(device, targets.pong, 0)?),
        ],
        next: 0,
        viewport,
        quad: device.builtin_mesh(BuiltinMesh::Quad),
    };

    device.set_depth_test(false);
    device.set_blend(BlendMode::Disabled);

    if settings.fxaa {
        chain.stage(device, stats, "fxaa", FXAA_SHADER, |device, input| {
            device.set_texture("tex", input, 0);
            device.set_uniform("u_iViewportSize", inv_size.into());
            device.set_uniform("u_ViewportSize", size.into());
        })?;
    }

    let blur_used = settings.bloom || settings.dof;
    if blur_used && settings.blur_iterations > 0 {
        blur(device, &chain, targets, settings.blur_iterations, stats)?;
    }

    if settings.dof {
        let focus_point = view.camera.eye + view.camera.front() * settings.focal_distance;
        chain.stage(device, stats, "dof", DOF_SHADER, |device, input| {
            device.set_texture("focusTexture", input, 0);
            device.set_texture("outOfFocusTexture", blurred, 1);
            device.set_texture("u_depth_texture", depth, 2);
            device.set_uniform("u_inverse_viewprojection", inv_vp.into());
            device.set_uniform("u_iRes", inv_size.into());
            device.set_uniform("u_focus_point", focus_point.into());
            device.set_uniform("minDistance", settings.dof_near.into());
            device.set_uniform("maxDistance", settings.dof_far.into());
        })?;
    }

    if settings.motion_blur {
        chain.stage(device, stats, "motion blur", MOTION_BLUR_SHADER, |device, input| {
            device.set_uniform("u_prev_vp", frame.prev_view_projection.into());
            device.set_uniform("u_inverse_viewprojection", inv_vp.into());
            device.set_texture("u_texture", input, 0);
            device.set_texture("u_depth_texture", depth, 1);
        })?;
    }

    if settings.bloom {
        device.bind_render_target(Some(chain.current_target));
        device.set_viewport(viewport);
        enable(device, "bloom", BLOOM_SHADER)?;
        device.set_texture("image", blurred, 0);
        device.set_uniform("th", settings.bloom_threshold.into());
        device.set_uniform("soft_th", settings.bloom_soft_threshold.into());
        device.set_blend(BlendMode::Additive);
        device.draw_mesh(chain.quad);
        device.set_blend(BlendMode::Disabled);
        device.disable_shader();
        stats.postfx_stages += 1;
    }

    if settings.chromatic_aberration {
        chain.stage(device, stats, "chromatic aberration", CHROMATIC_ABERRATION_SHADER, |device, input| {
            device.set_uniform("resolution", size.into());
            device.set_texture("tInput", input, 0);
            device.set_uniform("u_lens_dist", settings.lens_distortion.into());
        })?;
    }

    if settings.grain {
        let amount = frame.time.cos().abs();
        chain.stage(device, stats, "grain", GRAIN_SHADER, |device, input| {
            device.set_texture("tDiffuse", input, 0);
            device.set_uniform("amount", amount.into());
            device.set_uniform("noise_amount", settings.noise_amount.into());
        })?;
    }

    device.bind_render_target(None);
    device.set_viewport(viewport);
    enable(device, "tone mapping", HDR_SHADER)?;
    let bloom = if settings.bloom {
        blurred
    } else {
        device.fallback_texture(FallbackTexture::Black)
    };
    device.set_texture("u_texture", chain.current, 0);
    device.set_texture("u_texture_bloom", bloom, 1);
    device.set_uniform("u_hdr", settings.tone_mapping.into());
    device.set_uniform("u_scale", settings.hdr_scale.into());
    device.set_uniform("u_average_lum", settings.average_lum.into());
    device.set_uniform("u_lumwhite2", (settings.white_lum * settings.white_lum).into());
    device.set_uniform("u_igamma", (1.0 / settings.gamma).into());
    device.draw_mesh(chain.quad);
    device.disable_shader();
    stats.postfx_stages += 1;

    device.set_depth_test(true);
    Ok(())
}

/// Separable blur of the current output into `blurred`
fn blur(
    device: &mut dyn GraphicsDevice,
    chain: &Chain,
    targets: &ScreenTargets,
    iterations: u32,
    stats: &mut FrameStats,
) -> Result<()> {
    let blurred = color_texture(device, targets.blurred, 0)?;
    let scratch = color_texture(device, targets.blur_scratch, 0)?;
    device.copy_texture(chain.current, blurred)?;

    enable(device, "blur", BLUR_SHADER)?;
    let pair = [(targets.blurred, blurred), (targets.blur_scratch, scratch)];
    let mut read = 0;
    for i in 0..iterations {
        let (target, _) = pair[read ^ 1];
        device.bind_render_target(Some(target));
        device.set_viewport(chain.viewport);
        device.set_texture("image", pair[read].1, 0);
        device.set_uniform("horizontal", (i % 2 == 0).into());
        device.draw_mesh(chain.quad);
        read ^= 1;
    }
    device.disable_shader();
    if read == 1 {
        device.copy_texture(scratch, blurred)?;
    }
    stats.postfx_stages += 1;
    Ok(())
}
