//! Depth-only shadow pass

use glam::Mat4;
use umbra_core::{ClearMask, CullMode, FallbackTexture, GraphicsDevice, Rect, RenderTargetId, UniformValue};
use umbra_scene::{EntityId, Frustum, Scene};

use crate::render_call::RenderCall;
use crate::stats::FrameStats;

pub const SHADOWMAP_SHADER: &str = "shadowmap";

/// One light's depth render scheduled for this frame
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowJob {
    pub light: EntityId,
    pub target: RenderTargetId,
    pub view_projection: Mat4,
    /// Atlas cell, `None` when the job owns the whole target
    pub cell: Option<Rect>,
    pub resolution: u32,
}

/// Render every job's casters into its target.
///
/// Blended materials never cast. Calls outside the light frustum are culled.
pub fn render_shadow_jobs(
    device: &mut dyn GraphicsDevice,
    scene: &Scene,
    calls: &[RenderCall],
    jobs: &[ShadowJob],
    stats: &mut FrameStats,
) {
    if jobs.is_empty() {
        return;
    }
    if !device.enable_shader(SHADOWMAP_SHADER) {
        stats.skip_pass("shadow", "shader 'shadowmap' unavailable");
        return;
    }

    let white = device.fallback_texture(FallbackTexture::White);
    device.set_color_mask(false);
    device.set_depth_test(true);

    for job in jobs {
        device.bind_render_target(Some(job.target));
        let viewport = job.cell.unwrap_or(Rect::full(job.resolution, job.resolution));
        device.set_viewport(viewport);
        device.set_scissor(job.cell);
        device.clear(ClearMask::DEPTH, glam::Vec4::ONE);

        let frustum = Frustum::from_view_projection(&job.view_projection);
        device.set_uniform("u_viewprojection", job.view_projection.into());

        for call in calls.iter().filter(|c| !c.is_blended()) {
            let (Some(mesh), Some(material)) = (
                scene.assets.mesh(call.mesh),
                scene.assets.material(call.material),
            ) else {
                continue;
            };
            if !frustum.intersects_aabb(&call.world_bounds) {
                stats.draws_culled += 1;
                continue;
            }

            device.set_uniform("u_model", call.model.into());
            device.set_uniform(
                "u_alpha_cutoff",
                UniformValue::Float(material.effective_alpha_cutoff()),
            );
            device.set_texture("u_texture", material.color_texture.unwrap_or(white), 0);
            device.set_cull(if material.two_sided {
                CullMode::None
            } else {
                CullMode::Back
            });
            device.draw_mesh(mesh.gpu);
            stats.draws_submitted += 1;
        }

        stats.shadow_passes += 1;
        log::trace!("Shadow pass for {:?} into {:?}", job.light, job.target);
    }

    device.set_scissor(None);
    device.set_color_mask(true);
    device.set_cull(CullMode::Back);
    device.bind_render_target(None);
    device.disable_shader();
}
