//! Screen-space ambient occlusion
//!
//! Reads the g-buffer normal and depth, writes a single-channel occlusion
//! term at half resolution and optionally blurs it into a second target.

use glam::{Vec2, Vec3};
use umbra_core::{
    BlendMode, BuiltinMesh, ClearMask, GraphicsDevice, Rect, RenderTargetDesc, RenderTargetId, Result,
    TextureFormat, TextureId,
};

use crate::settings::SsaoSettings;
use crate::stats::FrameStats;
use crate::targets::{color_texture, depth_texture};
use crate::view::FrameView;

pub const SSAO_SHADER: &str = "ssao";
pub const SSAO_BLUR_SHADER: &str = "ssao_blur";

const KERNEL_SEED: u32 = 0x9e37_79b9;

/// Xorshift generator, enough for fixed sample kernels and noise
pub(crate) struct KernelRng(u32);

impl KernelRng {
    pub(crate) fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    pub(crate) fn next_f32(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        (x >> 8) as f32 / (1u32 << 24) as f32
    }

    fn signed(&mut self) -> f32 {
        self.next_f32() * 2.0 - 1.0
    }
}

/// Sample kernel of `count` points inside the unit sphere, or the +Z
/// hemisphere when `hemisphere` is set. Points cluster towards the origin.
pub fn generate_kernel(count: u32, hemisphere: bool) -> Vec<Vec3> {
    let mut rng = KernelRng::new(KERNEL_SEED);
    (0..count)
        .map(|i| {
            let mut dir = Vec3::new(rng.signed(), rng.signed(), rng.signed());
            if hemisphere {
                dir.z = dir.z.abs();
            }
            let dir = dir.try_normalize().unwrap_or(Vec3::Z);
            let t = i as f32 / count.max(1) as f32;
            let scale = 0.1 + 0.9 * t * t;
            dir * (rng.next_f32() * scale)
        })
        .collect()
}

#[derive(Debug)]
struct SsaoTargets {
    raw: RenderTargetId,
    blurred: RenderTargetId,
    width: u32,
    height: u32,
}

#[derive(Debug)]
pub struct Ssao {
    points: Vec<Vec3>,
    samples: u32,
    plus: bool,
    targets: Option<SsaoTargets>,
}

impl Ssao {
    pub fn new(settings: &SsaoSettings) -> Self {
        Self {
            points: generate_kernel(settings.samples, settings.plus),
            samples: settings.samples,
            plus: settings.plus,
            targets: None,
        }
    }

    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Half-resolution size of the occlusion targets
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.targets.as_ref().map(|t| (t.width, t.height))
    }

    /// Recreate the occlusion targets for a `width` x `height` screen
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        self.release(device);
        let (w, h) = ((width / 2).max(1), (height / 2).max(1));
        let formats = [TextureFormat::R8Unorm];
        let raw = device.create_render_target(&RenderTargetDesc::color("ssao", w, h, &formats))?;
        let blurred = match device.create_render_target(&RenderTargetDesc::color("ssao_blur", w, h, &formats)) {
            Ok(id) => id,
            Err(err) => {
                device.destroy_render_target(raw);
                return Err(err);
            }
        };
        self.targets = Some(SsaoTargets {
            raw,
            blurred,
            width: w,
            height: h,
        });
        Ok(())
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(targets) = self.targets.take() {
            device.destroy_render_target(targets.raw);
            device.destroy_render_target(targets.blurred);
        }
    }

    /// Occlusion texture for this frame, `None` when disabled or skipped
    pub fn compute(
        &mut self,
        device: &mut dyn GraphicsDevice,
        view: &FrameView,
        gbuffers: RenderTargetId,
        stats: &mut FrameStats,
    ) -> Option<TextureId> {
        let settings = &view.settings.ssao;
        if !settings.enabled {
            return None;
        }
        if settings.samples != self.samples || settings.plus != self.plus {
            self.points = generate_kernel(settings.samples, settings.plus);
            self.samples = settings.samples;
            self.plus = settings.plus;
        }
        let Some(targets) = self.targets.as_ref() else {
            stats.skip_pass("ssao", "targets not allocated");
            return None;
        };
        let (Ok(normals), Ok(depth)) = (color_texture(device, gbuffers, 1), depth_texture(device, gbuffers)) else {
            stats.skip_pass("ssao", "g-buffer attachments missing");
            return None;
        };
        let (Ok(raw), Ok(blurred)) = (
            color_texture(device, targets.raw, 0),
            color_texture(device, targets.blurred, 0),
        ) else {
            stats.skip_pass("ssao", "occlusion attachments missing");
            return None;
        };

        let quad = device.builtin_mesh(BuiltinMesh::Quad);
        let viewport = Rect::full(targets.width, targets.height);
        let inv_res = Vec2::new(1.0 / targets.width as f32, 1.0 / targets.height as f32);

        device.bind_render_target(Some(targets.raw));
        device.set_viewport(viewport);
        device.clear(ClearMask::COLOR, glam::Vec4::ONE);
        if !device.enable_shader(SSAO_SHADER) {
            stats.skip_pass("ssao", "shader unavailable");
            device.bind_render_target(None);
            return None;
        }
        device.set_depth_test(false);
        device.set_blend(BlendMode::Disabled);
        device.set_uniform("u_inverse_viewprojection", view.camera.view_projection.inverse().into());
        device.set_uniform("u_viewprojection", view.camera.view_projection.into());
        device.set_texture("u_normal_texture", normals, 0);
        device.set_texture("u_depth_texture", depth, 1);
        device.set_uniform("u_iRes", inv_res.into());
        device.set_uniform("u_points", self.points.clone().into());
        device.set_uniform("u_samples", (self.points.len() as i32).into());
        device.set_uniform("u_ssao_plus", settings.plus.into());
        device.set_uniform("u_bias", settings.bias.into());
        device.set_uniform("u_intensity", settings.intensity.into());
        device.draw_mesh(quad);
        stats.draws_submitted += 1;

        let mut output = raw;
        if settings.blur {
            device.bind_render_target(Some(targets.blurred));
            device.set_viewport(viewport);
            if device.enable_shader(SSAO_BLUR_SHADER) {
                device.set_texture("u_texture", raw, 0);
                device.set_uniform("u_iRes", inv_res.into());
                device.draw_mesh(quad);
                stats.draws_submitted += 1;
                output = blurred;
            } else {
                stats.skip_pass("ssao_blur", "shader unavailable");
            }
        }

        device.disable_shader();
        device.set_depth_test(true);
        device.bind_render_target(None);
        Some(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_deterministic_and_bounded() {
        let a = generate_kernel(64, false);
        let b = generate_kernel(64, false);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.iter().all(|p| p.length() <= 1.0 + 1e-5));
    }

    #[test]
    fn test_hemisphere_kernel() {
        let points = generate_kernel(128, true);
        assert!(points.iter().all(|p| p.z >= 0.0));
        let sphere = generate_kernel(128, false);
        assert!(sphere.iter().any(|p| p.z < 0.0));
    }

    #[test]
    fn test_targets_are_half_resolution() {
        let mut device = umbra_core::HeadlessDevice::new(8, 8);
        let mut ssao = Ssao::new(&SsaoSettings::default());
        ssao.resize(&mut device, 101, 50).unwrap();
        assert_eq!(ssao.target_size(), Some((50, 25)));
        assert_eq!(device.render_target_count(), 2);
        ssao.release(&mut device);
        assert_eq!(device.render_target_count(), 0);
    }
}
