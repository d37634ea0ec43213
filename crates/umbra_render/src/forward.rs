//! Forward Surface Shading
//!
//! Draws each call with full lighting applied while rasterizing. The same
//! per-surface uniform setup also feeds the deferred g-buffer pass and the
//! alpha overlay drawn after a deferred resolve.
//!
//! Multi-pass draws a surface once per light: the first draw carries the
//! ambient and emissive terms, later draws zero them and add on top with
//! depth function less-or-equal. Single-pass packs every light into arrays
//! and draws once. With no lights at all the surface is still drawn once
//! with the "no light" sentinels so base color and emissive show.

use glam::{Mat4, Vec3};
use umbra_core::{
    BlendMode, BuiltinMesh, ClearMask, CullMode, DepthFunc, FallbackTexture, GraphicsDevice, Rect,
    RenderTargetId, UniformValue,
};
use umbra_scene::{Camera, LightType, Material, Scene};

use crate::lighting::{linearize, upload_light_params, PackedLights, MAX_LIGHTS};
use crate::lights::GatheredLights;
use crate::render_call::{RenderCall, RenderCallList};
use crate::settings::{LightEquation, LightMode, RenderMode, RenderSettings};
use crate::stats::FrameStats;
use crate::view::FrameView;

pub const LIGHT_MULTI_SHADER: &str = "light_multi";
pub const LIGHT_SINGLE_SHADER: &str = "light_single";
pub const GBUFFERS_SHADER: &str = "gbuffers";
pub const SKYBOX_SHADER: &str = "skybox";

const ATLAS_TEXTURE_SLOT: u32 = 9;

/// Which pass a surface is drawn for
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfacePass {
    Forward,
    /// Deferred geometry pass
    GBuffer,
    /// Blended calls drawn over a deferred resolve
    AlphaOverlay,
}

impl SurfacePass {
    pub fn shader(&self, settings: &RenderSettings) -> &'static str {
        match self {
            Self::GBuffer => GBUFFERS_SHADER,
            Self::AlphaOverlay => LIGHT_MULTI_SHADER,
            Self::Forward => match settings.light_mode {
                LightMode::SinglePass => LIGHT_SINGLE_SHADER,
                LightMode::MultiPass => LIGHT_MULTI_SHADER,
            },
        }
    }
}

/// Clear the bound target to the scene background and draw the sky
pub fn begin_scene_target(device: &mut dyn GraphicsDevice, view: &FrameView, stats: &mut FrameStats) {
    device.set_viewport(view.viewport);
    device.set_scissor(None);
    device.clear(ClearMask::ALL, view.scene.background_color);
    render_skybox(device, view, stats);
}

/// Environment cubemap on a sphere around the eye, without depth
pub fn render_skybox(device: &mut dyn GraphicsDevice, view: &FrameView, stats: &mut FrameStats) {
    let Some(environment) = view.scene.environment else {
        return;
    };
    if !device.enable_shader(SKYBOX_SHADER) {
        stats.skip_pass("skybox", "shader unavailable");
        return;
    }

    let model = Mat4::from_translation(view.camera.eye) * Mat4::from_scale(Vec3::splat(2.0));
    device.set_uniform("u_model", model.into());
    device.set_uniform("u_viewprojection", view.camera.view_projection.into());
    device.set_uniform("u_camera_position", view.camera.eye.into());
    device.set_texture("u_texture", environment, 0);
    device.set_depth_test(false);
    device.set_cull(CullMode::None);

    let sphere = device.builtin_mesh(BuiltinMesh::Sphere);
    device.draw_mesh(sphere);
    stats.draws_submitted += 1;

    device.set_depth_test(true);
    device.set_cull(CullMode::Back);
    device.disable_shader();
}

/// Draw every call accepted by `filter` for `pass`
pub fn render_calls(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    pass: SurfacePass,
    filter: impl Fn(&RenderCall) -> bool,
    stats: &mut FrameStats,
) {
    let shader = pass.shader(view.settings);
    if !device.enable_shader(shader) {
        stats.skip_pass(shader, "shader unavailable");
        return;
    }

    for call in view.calls.iter().filter(|c| filter(c)) {
        draw_surface(device, view, call, pass, shader, stats);
    }
    device.disable_shader();
}

fn draw_surface(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    call: &RenderCall,
    pass: SurfacePass,
    shader: &str,
    stats: &mut FrameStats,
) {
    let scene = view.scene;
    let (Some(mesh), Some(material)) = (scene.assets.mesh(call.mesh), scene.assets.material(call.material)) else {
        log::debug!("Draw call lost its mesh or material, skipped");
        stats.draws_skipped += 1;
        return;
    };
    if mesh.vertex_count == 0 {
        stats.draws_skipped += 1;
        return;
    }
    if !view.camera.test_box(&call.world_bounds) {
        stats.draws_culled += 1;
        return;
    }

    upload_surface_uniforms(device, view, call, material, pass);
    device.set_cull(if material.two_sided {
        CullMode::None
    } else {
        CullMode::Back
    });
    device.set_blend(if call.is_blended() {
        BlendMode::Alpha
    } else {
        BlendMode::Disabled
    });

    match shader {
        LIGHT_SINGLE_SHADER => {
            draw_single_pass(device, view, stats);
            device.draw_mesh(mesh.gpu);
            stats.draws_submitted += 1;
        }
        LIGHT_MULTI_SHADER => draw_multi_pass(device, view, call, mesh.gpu, stats),
        _ => {
            device.draw_mesh(mesh.gpu);
            stats.draws_submitted += 1;
        }
    }

    device.set_blend(BlendMode::Disabled);
    device.set_depth_func(DepthFunc::Less);
    device.set_cull(CullMode::Back);
}

fn set_no_light(device: &mut dyn GraphicsDevice) {
    device.set_uniform("u_light_type", LightType::NO_LIGHT.into());
    device.set_uniform("u_light_eq", LightEquation::NO_EQ.into());
    device.set_uniform("u_shadows", false.into());
}

fn draw_multi_pass(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    call: &RenderCall,
    mesh: umbra_core::MeshId,
    stats: &mut FrameStats,
) {
    device.set_uniform("u_pcf", view.settings.pcf.into());

    let mut drawn = 0;
    for id in view.lights {
        let Some(entity) = view.scene.entity(*id) else {
            continue;
        };
        let Some(light) = entity.as_light() else {
            continue;
        };

        if drawn == 1 {
            device.set_uniform("u_ambient_light", Vec3::ZERO.into());
            device.set_uniform("u_emissive", Vec3::ZERO.into());
            device.set_uniform("u_irr", false.into());
            device.set_uniform("u_reflections", false.into());
            device.set_blend(if call.is_blended() {
                BlendMode::AlphaAdditive
            } else {
                BlendMode::Additive
            });
            device.set_depth_func(DepthFunc::LessEqual);
        }

        upload_light_params(device, light, &entity.model, view.gamma());
        device.draw_mesh(mesh);
        stats.draws_submitted += 1;
        drawn += 1;
    }

    if drawn == 0 {
        set_no_light(device);
        device.draw_mesh(mesh);
        stats.draws_submitted += 1;
    }
}

fn draw_single_pass(device: &mut dyn GraphicsDevice, view: &FrameView, stats: &mut FrameStats) {
    let packed = PackedLights::pack(view.scene, view.lights, view.gamma(), MAX_LIGHTS);
    if packed.truncated && !stats.lights_truncated {
        log::warn!(
            "{} lights offered to single-pass shading, only {} uploaded",
            view.lights.len(),
            MAX_LIGHTS
        );
    }
    stats.lights_truncated |= packed.truncated;
    stats.lights_packed = packed.len() as u32;

    packed.upload(device);
    let atlas = match view.atlas_depth {
        Some(depth) if packed.shadow_count > 0 => depth,
        _ => device.fallback_texture(FallbackTexture::Black),
    };
    device.set_texture("u_texture_atlas", atlas, ATLAS_TEXTURE_SLOT);
    device.set_uniform("u_pcf", view.settings.pcf.into());
    if packed.is_empty() {
        set_no_light(device);
    }
}

fn upload_surface_uniforms(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    call: &RenderCall,
    material: &Material,
    pass: SurfacePass,
) {
    let settings = view.settings;
    let gamma = view.gamma();
    let camera = view.camera;

    device.set_uniform("u_viewprojection", camera.view_projection.into());
    device.set_uniform("u_camera_position", camera.eye.into());
    device.set_uniform("u_viewmatrix", camera.view.into());
    device.set_uniform("u_model", call.model.into());

    let color = linearize(material.color.truncate(), gamma).extend(material.color.w);
    device.set_uniform("u_color", color.into());
    device.set_uniform("u_emissive", linearize(material.emissive_factor, gamma).into());
    device.set_uniform("u_ambient_light", linearize(view.scene.ambient_light, gamma).into());
    device.set_uniform("u_light_eq", settings.light_eq.as_uniform().into());
    device.set_uniform("u_gamma", settings.gamma.into());
    device.set_uniform("u_metallic", material.metallic_factor.into());
    device.set_uniform("u_roughness", material.roughness_factor.into());
    device.set_uniform("u_alpha_cutoff", material.effective_alpha_cutoff().into());

    let white = device.fallback_texture(FallbackTexture::White);
    let black = device.fallback_texture(FallbackTexture::Black);
    let green = device.fallback_texture(FallbackTexture::Green);
    device.set_texture("u_texture", material.color_texture.unwrap_or(white), 0);
    device.set_texture("u_texture_em", material.emissive_texture.unwrap_or(white), 1);
    device.set_texture(
        "u_texture_metallic_roughness",
        material.metallic_roughness_texture.unwrap_or(green),
        2,
    );
    device.set_texture("u_texture_normals", material.normal_texture.unwrap_or(black), 3);

    let environment = call
        .reflection_probe
        .and_then(|id| view.scene.entity(id))
        .and_then(|e| e.as_reflection_probe())
        .and_then(|p| p.cubemap());
    device.set_texture("u_environment_texture", environment.unwrap_or(white), 4);
    let reflections = settings.reflections && view.reflections_ready && environment.is_some();
    device.set_uniform("u_reflections", reflections.into());

    match view.irradiance.filter(|_| settings.irradiance) {
        Some(cache) => cache.upload_uniforms(device, settings.trilinear),
        None => device.set_uniform("u_irr", false.into()),
    }

    let overlay = pass == SurfacePass::AlphaOverlay;
    device.set_uniform("u_deferred", overlay.into());
    match view.ao_texture.filter(|_| overlay) {
        Some(ao) => {
            device.set_uniform("u_ao", true.into());
            device.set_texture("u_ao_texture", ao, 6);
        }
        None => device.set_uniform("u_ao", UniformValue::Bool(false)),
    }
}

/// Forward pipeline: clear, sky, then every visible call lit in place
pub fn render_forward_pipeline(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    target: RenderTargetId,
    stats: &mut FrameStats,
) {
    log::trace!("Forward pipeline: {} calls, {} lights", view.calls.len(), view.lights.len());
    device.bind_render_target(Some(target));
    begin_scene_target(device, view, stats);
    render_calls(device, view, SurfacePass::Forward, |_| true, stats);
}

/// Render the opaque scene from `camera` into the bound capture target.
///
/// Used by the probe bakes: forward multi-pass with whatever shadow maps
/// the lights already own, no irradiance and no reflections.
pub fn render_capture(
    device: &mut dyn GraphicsDevice,
    scene: &Scene,
    camera: &Camera,
    settings: &RenderSettings,
    size: u32,
    stats: &mut FrameStats,
) {
    let capture_settings = RenderSettings {
        render_mode: RenderMode::Forward,
        light_mode: LightMode::MultiPass,
        irradiance: false,
        reflections: false,
        ..settings.clone()
    };
    let calls = RenderCallList::build(scene, camera, capture_settings.composition);
    let lights = GatheredLights::gather(scene, camera, RenderMode::Forward);

    let view = FrameView::new(scene, camera, &capture_settings, &calls.calls, Rect::full(size, size))
        .with_lights(&lights.lights, None);
    begin_scene_target(device, &view, stats);
    render_calls(device, &view, SurfacePass::Forward, |c| !c.is_blended(), stats);
}
