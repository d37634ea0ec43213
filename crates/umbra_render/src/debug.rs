//! Debug views
//!
//! Probe gizmos are drawn into the lit scene before post-processing. The
//! g-buffer split and the shadow depth viewport are drawn over the final
//! image. A missing debug shader only skips its view.

use glam::{Mat4, Vec2, Vec3};
use umbra_core::{BlendMode, BuiltinMesh, CullMode, GraphicsDevice, Rect, TextureId, UniformValue};
use umbra_scene::{EntityKind, LightType};

use crate::deferred::GBufferTextures;
use crate::settings::LightMode;
use crate::stats::FrameStats;
use crate::view::FrameView;

pub const TEXTURE_SHADER: &str = "texture";
pub const DEPTH_SHADER: &str = "depth";
pub const ATLAS_SHADER: &str = "atlas";
pub const OMR_SHADER: &str = "omr";
pub const PROBE_SHADER: &str = "probe";
pub const REFLECTION_PROBE_SHADER: &str = "reflection_probe";

/// Scale of the sphere drawn at each reflection probe
pub const REFLECTION_GIZMO_SCALE: f32 = 10.0;

/// Screen textures the overlays can show
#[derive(Clone, Copy, Debug)]
pub struct OverlaySources {
    pub gbuffers: Option<GBufferTextures>,
    pub blurred: TextureId,
    pub illumination_depth: TextureId,
    pub ao: Option<TextureId>,
}

/// Spheres for irradiance probes and reflection probes
pub fn render_probe_gizmos(device: &mut dyn GraphicsDevice, view: &FrameView, stats: &mut FrameStats) {
    let debug = &view.settings.debug;
    let sphere = device.builtin_mesh(BuiltinMesh::Sphere);

    if debug.show_probes {
        if device.enable_shader(PROBE_SHADER) {
            device.set_cull(CullMode::Back);
            device.set_blend(BlendMode::Disabled);
            device.set_depth_test(true);
            device.set_uniform("u_viewprojection", view.camera.view_projection.into());
            device.set_uniform("u_camera_position", view.camera.eye.into());
            for entity in view.scene.visible_entities() {
                let EntityKind::IrradianceGrid(grid) = &entity.kind else {
                    continue;
                };
                for probe in grid.probes() {
                    device.set_uniform("u_model", probe.model.into());
                    device.set_uniform("u_coeffs", probe.sh.to_vec3s().into());
                    device.draw_mesh(sphere);
                    stats.draws_submitted += 1;
                }
            }
            device.disable_shader();
        } else {
            stats.skip_pass("probe gizmos", "shader unavailable");
        }
    }

    if debug.show_reflection_probes {
        if device.enable_shader(REFLECTION_PROBE_SHADER) {
            device.set_blend(BlendMode::Disabled);
            device.set_depth_test(false);
            device.set_uniform("u_viewprojection", view.camera.view_projection.into());
            device.set_uniform("u_camera_position", view.camera.eye.into());
            for entity in view.scene.visible_entities() {
                let Some(cubemap) = entity.as_reflection_probe().and_then(|p| p.cubemap()) else {
                    continue;
                };
                let model = entity.model * Mat4::from_scale(Vec3::splat(REFLECTION_GIZMO_SCALE));
                device.set_uniform("u_model", model.into());
                device.set_texture("u_texture", cubemap, 0);
                device.draw_mesh(sphere);
                stats.draws_submitted += 1;
            }
            device.set_depth_test(true);
            device.disable_shader();
        } else {
            stats.skip_pass("reflection probe gizmos", "shader unavailable");
        }
    }
}

fn blit(
    device: &mut dyn GraphicsDevice,
    shader: &str,
    texture: TextureId,
    rect: Rect,
    uniforms: &[(&str, UniformValue)],
    stats: &mut FrameStats,
) {
    if !device.enable_shader(shader) {
        stats.skip_pass("debug view", "shader unavailable");
        return;
    }
    device.set_viewport(rect);
    device.set_texture("u_texture", texture, 0);
    for (name, value) in uniforms {
        device.set_uniform(name, value.clone());
    }
    let quad = device.builtin_mesh(BuiltinMesh::Quad);
    device.draw_mesh(quad);
    stats.draws_submitted += 1;
    device.disable_shader();
}

/// G-buffer split and shadow depth viewport over the default framebuffer
pub fn render_overlays(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    sources: &OverlaySources,
    stats: &mut FrameStats,
) {
    let debug = &view.settings.debug;
    if !debug.show_gbuffers && debug.depth_viewport.is_none() {
        return;
    }

    device.bind_render_target(None);
    device.set_depth_test(false);
    device.set_blend(BlendMode::Disabled);

    if debug.show_gbuffers {
        match sources.gbuffers {
            Some(gbuffers) => render_gbuffer_split(device, view, &gbuffers, sources, stats),
            None => stats.skip_pass("g-buffer view", "no g-buffers in this pipeline"),
        }
    }
    if let Some(index) = debug.depth_viewport {
        render_depth_viewport(device, view, index, stats);
    }

    device.set_viewport(view.viewport);
    device.set_depth_test(true);
}

fn render_gbuffer_split(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    gbuffers: &GBufferTextures,
    sources: &OverlaySources,
    stats: &mut FrameStats,
) {
    let (w, h) = (view.viewport.width / 2, view.viewport.height / 2);
    let bottom_left = Rect::new(0, 0, w, h);
    let top_right = Rect::new(w, h, w, h);
    let top_left = Rect::new(0, h, w, h);
    let bottom_right = Rect::new(w, 0, w, h);

    if view.settings.debug.show_material_channels {
        blit(device, OMR_SHADER, gbuffers.color[2], bottom_left, &[], stats);
        blit(device, OMR_SHADER, gbuffers.color[1], top_right, &[], stats);
        blit(device, OMR_SHADER, gbuffers.color[0], top_left, &[], stats);
        if let Some(ao) = sources.ao {
            blit(device, TEXTURE_SHADER, ao, bottom_right, &[], stats);
        }
        return;
    }

    let nearfar = Vec2::new(view.camera.near, view.camera.far);
    blit(device, TEXTURE_SHADER, sources.blurred, bottom_left, &[], stats);
    blit(device, TEXTURE_SHADER, gbuffers.color[1], top_right, &[], stats);
    blit(device, TEXTURE_SHADER, gbuffers.color[2], bottom_right, &[], stats);
    blit(
        device,
        DEPTH_SHADER,
        sources.illumination_depth,
        top_left,
        &[("u_camera_nearfar", nearfar.into())],
        stats,
    );
}

fn render_depth_viewport(device: &mut dyn GraphicsDevice, view: &FrameView, index: usize, stats: &mut FrameStats) {
    let (w, h) = (view.viewport.width, view.viewport.height);
    let mut lights = view
        .lights
        .iter()
        .chain(view.directional.iter())
        .filter_map(|id| view.scene.entity(*id))
        .filter_map(|e| e.as_light());

    match view.settings.light_mode {
        LightMode::MultiPass => {
            let Some(light) = lights.nth(index) else {
                return;
            };
            let Some(map) = light.shadow_map().filter(|_| light.needs_shadow_map()) else {
                return;
            };
            let cam_type = if light.light_type == LightType::Directional { 0 } else { 1 };
            blit(
                device,
                DEPTH_SHADER,
                map.depth_texture(),
                Rect::new(20, 20, w / 4, h / 4),
                &[
                    ("u_cam_type", UniformValue::Int(cam_type)),
                    (
                        "u_camera_nearfar",
                        Vec2::new(light.camera.near, light.camera.far).into(),
                    ),
                ],
                stats,
            );
        }
        LightMode::SinglePass => {
            let Some(atlas) = view.atlas_depth else {
                return;
            };
            let placed: Vec<_> = lights.filter(|l| l.atlas_rect.is_some()).collect();
            if placed.is_empty() {
                return;
            }
            let nearfars: Vec<Vec2> = placed.iter().map(|l| Vec2::new(l.camera.near, l.camera.far)).collect();
            let types: Vec<i32> = placed.iter().map(|l| l.light_type.as_uniform()).collect();
            let offset = 30;
            blit(
                device,
                ATLAS_SHADER,
                atlas,
                Rect::new(offset, offset, (w / 2).saturating_sub(offset), (h / 2).saturating_sub(offset)),
                &[
                    ("u_camera_nearfars", nearfars.into()),
                    ("u_light_types", types.into()),
                    ("u_total_lights", UniformValue::Int(placed.len() as i32)),
                ],
                stats,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::UVec3;
    use umbra_core::HeadlessDevice;
    use umbra_scene::{Camera, Entity, IrradianceGrid, Scene, DEFAULT_PROBE_SCALE};

    use crate::settings::RenderSettings;

    fn camera() -> Camera {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        camera
    }

    #[test]
    fn test_probe_gizmo_per_probe() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut scene = Scene::new();
        scene.add_entity(Entity::new(
            "grid",
            Mat4::IDENTITY,
            EntityKind::IrradianceGrid(IrradianceGrid::new(UVec3::new(2, 2, 1), DEFAULT_PROBE_SCALE, &Mat4::IDENTITY)),
        ));
        let mut settings = RenderSettings::default();
        settings.debug.show_probes = true;
        let camera = camera();
        let view = FrameView::new(&scene, &camera, &settings, &[], Rect::full(8, 8));

        let mut stats = FrameStats::default();
        render_probe_gizmos(&mut device, &view, &mut stats);
        assert_eq!(device.draws_with_shader(PROBE_SHADER).count(), 4);
        let coeffs = device.draws()[0].uniform("u_coeffs").map(UniformValue::len);
        assert_eq!(coeffs, Some(9));
    }

    #[test]
    fn test_gbuffer_split_uses_four_viewports() {
        let mut device = HeadlessDevice::new(8, 8);
        let scene = Scene::new();
        let mut settings = RenderSettings::default();
        settings.debug.show_gbuffers = true;
        let camera = camera();
        let view = FrameView::new(&scene, &camera, &settings, &[], Rect::full(8, 8));
        let white = device.fallback_texture(umbra_core::FallbackTexture::White);
        let sources = OverlaySources {
            gbuffers: Some(GBufferTextures {
                color: [white; 4],
                depth: white,
            }),
            blurred: white,
            illumination_depth: white,
            ao: None,
        };

        let mut stats = FrameStats::default();
        render_overlays(&mut device, &view, &sources, &mut stats);
        let viewports: Vec<Rect> = device.draws().iter().map(|d| d.viewport).collect();
        assert_eq!(viewports.len(), 4);
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert!(!viewports[i].overlaps(&viewports[j]));
            }
        }
        assert_eq!(device.draws_with_shader(DEPTH_SHADER).count(), 1);
    }

    #[test]
    fn test_missing_debug_shader_skips() {
        let mut device = HeadlessDevice::new(8, 8).with_missing_shader(PROBE_SHADER);
        let scene = Scene::new();
        let mut settings = RenderSettings::default();
        settings.debug.show_probes = true;
        let camera = camera();
        let view = FrameView::new(&scene, &camera, &settings, &[], Rect::full(8, 8));

        let mut stats = FrameStats::default();
        render_probe_gizmos(&mut device, &view, &mut stats);
        assert_eq!(stats.passes_skipped, 1);
    }
}
