//! Deferred Pipeline
//!
//! Pass order within one frame:
//!
//! 1. geometry: each g-buffer attachment is cleared on its own so it can
//!    have its own clear value; the sky goes into the albedo target only,
//!    then opaque calls fill all four
//! 2. decals: albedo, normal and extra are snapshotted, decal boxes are
//!    composited into the snapshot, and the snapshot is copied back
//! 3. ambient occlusion from normal and depth, when enabled
//! 4. resolve: g-buffer depth is copied into the illumination target, a
//!    full-screen pass applies ambient light and the directional light,
//!    and one additive sphere per remaining light is drawn with its winding
//!    reversed so the camera may sit inside the volume
//! 5. forward overlay of blended calls, unless dithering replaces blending
//! 6. volumetric scattering of the directional light, when enabled

use glam::{Mat4, Vec2, Vec3, Vec4};
use umbra_core::{
    BlendMode, BuiltinMesh, ClearMask, CullMode, FallbackTexture, GraphicsDevice, RenderTargetId, TextureDesc,
    TextureFormat, TextureId, UniformValue,
};
use umbra_scene::{light_position, EntityId, EntityKind, LightType};

use crate::forward::{render_calls, render_skybox, SurfacePass};
use crate::lighting::{linearize, upload_light_params};
use crate::settings::LightEquation;
use crate::ssao::{KernelRng, Ssao};
use crate::stats::FrameStats;
use crate::targets::{color_texture, depth_texture, ScreenTargets, DECAL_TARGETS, GBUFFER_FORMATS};
use crate::view::FrameView;

pub const DECALS_SHADER: &str = "decals";
pub const DEFERRED_MULTI_SHADER: &str = "deferred_multi";
pub const DEFERRED_WS_SHADER: &str = "deferred_ws";
pub const VOLUME_SHADER: &str = "volume";

/// Side of the jitter texture sampled by the volumetric pass
pub const NOISE_SIZE: u32 = 64;

/// G-buffer attachments as sampled by the resolve and decal shaders
#[derive(Clone, Copy, Debug)]
pub struct GBufferTextures {
    pub color: [TextureId; 4],
    pub depth: TextureId,
}

impl GBufferTextures {
    pub fn fetch(device: &dyn GraphicsDevice, target: RenderTargetId) -> umbra_core::Result<Self> {
        Ok(Self {
            color: [
                color_texture(device, target, 0)?,
                color_texture(device, target, 1)?,
                color_texture(device, target, 2)?,
                color_texture(device, target, 3)?,
            ],
            depth: depth_texture(device, target)?,
        })
    }

    fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.set_texture("u_color_texture", self.color[0], 0);
        device.set_texture("u_normal_texture", self.color[1], 1);
        device.set_texture("u_extra_texture", self.color[2], 2);
        device.set_texture("u_depth_texture", self.depth, 4);
    }
}

/// Single-channel jitter texture for the volumetric pass
pub fn create_noise_texture(device: &mut dyn GraphicsDevice) -> umbra_core::Result<TextureId> {
    let texture = device.create_texture(&TextureDesc::new_2d(
        "volume_noise",
        NOISE_SIZE,
        NOISE_SIZE,
        TextureFormat::R8Unorm,
    ))?;
    let mut rng = KernelRng::new(0x51f1_5eed);
    let texels: Vec<f32> = (0..NOISE_SIZE * NOISE_SIZE).map(|_| rng.next_f32()).collect();
    if let Err(err) = device.upload_texture(texture, 0, &texels) {
        device.destroy_texture(texture);
        return Err(err);
    }
    Ok(texture)
}

/// Run the deferred pipeline into `targets.illumination`
pub fn render_deferred_pipeline(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    targets: &ScreenTargets,
    ssao: &mut Ssao,
    noise: Option<TextureId>,
    stats: &mut FrameStats,
) -> Option<TextureId> {
    let gbuffers = match GBufferTextures::fetch(device, targets.gbuffers) {
        Ok(textures) => textures,
        Err(err) => {
            log::debug!("G-buffers unavailable: {}", err);
            stats.skip_pass("deferred", "g-buffer attachments missing");
            return None;
        }
    };
    log::trace!(
        "Deferred pipeline: {} calls, {} volume lights, directional {:?}",
        view.calls.len(),
        view.lights.len(),
        view.directional
    );

    geometry_pass(device, view, targets.gbuffers, stats);
    if let Err(err) = decal_pass(device, view, targets, &gbuffers, stats) {
        log::debug!("Decal pass aborted: {}", err);
        stats.skip_pass("decals", "snapshot copy failed");
    }

    let ao = ssao.compute(device, view, targets.gbuffers, stats);
    let view = FrameView { ao_texture: ao, ..*view };

    device.bind_render_target(Some(targets.illumination));
    device.set_viewport(view.viewport);
    let depth = depth_texture(device, targets.illumination).ok();
    if let Some(depth) = depth {
        if let Err(err) = device.copy_texture(gbuffers.depth, depth) {
            log::debug!("G-buffer depth copy failed: {}", err);
        }
    }
    device.clear(ClearMask::COLOR, Vec4::new(0.0, 0.0, 0.0, 1.0));

    resolve_pass(device, &view, &gbuffers, stats);
    light_volume_pass(device, &view, &gbuffers, stats);

    // The directional light joins the forward lights for the overlay
    let mut merged: Vec<EntityId> = view.lights.to_vec();
    merged.extend(view.directional);
    let overlay = view.with_lights(&merged, None);

    if !view.settings.dithering {
        render_calls(device, &overlay, SurfacePass::AlphaOverlay, |c| c.is_blended(), stats);
    }
    if view.settings.volumetric {
        volumetric_pass(device, &view, depth, noise, stats);
    }

    device.set_blend(BlendMode::Disabled);
    device.set_depth_test(true);
    ao
}

fn geometry_pass(device: &mut dyn GraphicsDevice, view: &FrameView, target: RenderTargetId, stats: &mut FrameStats) {
    device.bind_render_target(Some(target));
    device.set_viewport(view.viewport);
    device.set_scissor(None);

    device.set_draw_buffer(Some(0));
    device.clear(ClearMask::ALL, view.scene.background_color.truncate().extend(1.0));
    render_skybox(device, view, stats);
    for buffer in 1..GBUFFER_FORMATS.len() {
        device.set_draw_buffer(Some(buffer));
        device.clear(ClearMask::COLOR, Vec4::new(0.0, 0.0, 0.0, 1.0));
    }
    device.set_draw_buffer(None);

    let dithering = view.settings.dithering;
    render_calls(
        device,
        view,
        SurfacePass::GBuffer,
        |c| dithering || !c.is_blended(),
        stats,
    );
}

fn decal_pass(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    targets: &ScreenTargets,
    gbuffers: &GBufferTextures,
    stats: &mut FrameStats,
) -> umbra_core::Result<()> {
    let decals: Vec<(Mat4, TextureId)> = view
        .scene
        .visible_entities()
        .filter_map(|e| match &e.kind {
            EntityKind::Decal(decal) => decal.albedo.map(|albedo| (e.model, albedo)),
            _ => None,
        })
        .collect();
    if decals.is_empty() {
        return Ok(());
    }

    let mut snapshot = [gbuffers.color[0]; DECAL_TARGETS];
    for (i, slot) in snapshot.iter_mut().enumerate() {
        *slot = color_texture(device, targets.decals, i)?;
        device.copy_texture(gbuffers.color[i], *slot)?;
    }

    device.bind_render_target(Some(targets.decals));
    device.set_viewport(view.viewport);
    if !device.enable_shader(DECALS_SHADER) {
        stats.skip_pass("decals", "shader unavailable");
        return Ok(());
    }

    gbuffers.bind(device);
    let vp = view.camera.view_projection;
    device.set_uniform("u_inverse_viewprojection", vp.inverse().into());
    device.set_uniform("u_iRes", inverse_resolution(view).into());
    device.set_uniform("u_viewprojection", vp.into());
    device.set_depth_test(false);
    device.set_blend(BlendMode::Disabled);

    let cube = device.builtin_mesh(BuiltinMesh::Cube);
    for (model, albedo) in decals {
        device.set_uniform("u_model", model.into());
        device.set_uniform("u_iModel", model.inverse().into());
        device.set_texture("u_decal_texture", albedo, 5);
        device.draw_mesh(cube);
        stats.draws_submitted += 1;
    }
    device.disable_shader();
    device.set_depth_test(true);

    for (i, slot) in snapshot.iter().enumerate() {
        device.copy_texture(*slot, gbuffers.color[i])?;
    }
    Ok(())
}

fn inverse_resolution(view: &FrameView) -> Vec2 {
    Vec2::new(
        1.0 / view.viewport.width.max(1) as f32,
        1.0 / view.viewport.height.max(1) as f32,
    )
}

fn upload_common(device: &mut dyn GraphicsDevice, view: &FrameView, gbuffers: &GBufferTextures) {
    gbuffers.bind(device);
    device.set_uniform("u_inverse_viewprojection", view.camera.view_projection.inverse().into());
    device.set_uniform("u_iRes", inverse_resolution(view).into());
    device.set_uniform("u_light_eq", view.settings.light_eq.as_uniform().into());
    device.set_uniform("u_camera_position", view.camera.eye.into());
    device.set_uniform("u_gamma", view.settings.gamma.into());
    device.set_uniform("u_pcf", view.settings.pcf.into());
}

/// Full-screen ambient plus directional light
fn resolve_pass(device: &mut dyn GraphicsDevice, view: &FrameView, gbuffers: &GBufferTextures, stats: &mut FrameStats) {
    if !device.enable_shader(DEFERRED_MULTI_SHADER) {
        stats.skip_pass("deferred resolve", "shader unavailable");
        return;
    }
    upload_common(device, view, gbuffers);

    let gamma = view.gamma();
    device.set_uniform("u_ambient_light", linearize(view.scene.ambient_light, gamma).into());
    device.set_uniform("u_emissive", true.into());
    device.set_uniform("u_back", true.into());
    device.set_texture("u_irr_texture", gbuffers.color[3], 11);
    let irradiance = view.settings.irradiance && view.irradiance.is_some();
    device.set_uniform("u_irr", irradiance.into());

    match view.ao_texture {
        Some(ao) => {
            device.set_uniform("u_ao", true.into());
            device.set_texture("u_ao_texture", ao, 5);
            device.set_uniform("u_ao_factor", view.settings.ssao.intensity.into());
        }
        None => {
            let white = device.fallback_texture(FallbackTexture::White);
            device.set_uniform("u_ao", false.into());
            device.set_texture("u_ao_texture", white, 5);
        }
    }

    let directional = view
        .directional
        .and_then(|id| view.scene.entity(id))
        .and_then(|e| e.as_light().map(|l| (l, e.model)));
    match directional {
        Some((light, model)) => upload_light_params(device, light, &model, gamma),
        None => {
            device.set_uniform("u_light_eq", LightEquation::NO_EQ.into());
            device.set_uniform("u_light_type", LightType::NO_LIGHT.into());
            device.set_uniform("u_shadows", UniformValue::Bool(false));
        }
    }

    device.set_depth_test(false);
    device.set_blend(BlendMode::Disabled);
    let quad = device.builtin_mesh(BuiltinMesh::Quad);
    device.draw_mesh(quad);
    stats.draws_submitted += 1;
    device.disable_shader();
}

/// One additive sphere per non-directional light, scaled to its range
fn light_volume_pass(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    gbuffers: &GBufferTextures,
    stats: &mut FrameStats,
) {
    if view.lights.is_empty() {
        return;
    }
    if !device.enable_shader(DEFERRED_WS_SHADER) {
        stats.skip_pass("light volumes", "shader unavailable");
        return;
    }
    upload_common(device, view, gbuffers);
    device.set_uniform("u_ambient_light", Vec3::ZERO.into());
    device.set_uniform("u_emissive", false.into());
    device.set_uniform("u_back", false.into());
    device.set_uniform("u_ao", false.into());
    device.set_uniform("u_viewprojection", view.camera.view_projection.into());

    device.set_blend(BlendMode::Additive);
    device.set_depth_test(false);
    device.set_cull(CullMode::Back);
    device.set_front_face(umbra_core::FrontFace::Cw);

    let sphere = device.builtin_mesh(BuiltinMesh::Sphere);
    for id in view.lights {
        let Some(entity) = view.scene.entity(*id) else {
            continue;
        };
        let Some(light) = entity.as_light() else {
            continue;
        };
        let model = Mat4::from_translation(light_position(&entity.model))
            * Mat4::from_scale(Vec3::splat(light.max_distance));
        device.set_uniform("u_model", model.into());
        upload_light_params(device, light, &entity.model, view.gamma());
        device.draw_mesh(sphere);
        stats.draws_submitted += 1;
    }

    device.set_front_face(umbra_core::FrontFace::Ccw);
    device.set_blend(BlendMode::Disabled);
    device.set_depth_test(true);
    device.disable_shader();
}

/// Scattering along the directional light, then each point light
fn volumetric_pass(
    device: &mut dyn GraphicsDevice,
    view: &FrameView,
    depth: Option<TextureId>,
    noise: Option<TextureId>,
    stats: &mut FrameStats,
) {
    let Some(directional) = view
        .directional
        .and_then(|id| view.scene.entity(id))
        .filter(|e| e.as_light().is_some())
    else {
        stats.skip_pass("volumetric", "no directional light");
        return;
    };
    let Some(depth) = depth else {
        stats.skip_pass("volumetric", "depth unavailable");
        return;
    };
    if !device.enable_shader(VOLUME_SHADER) {
        stats.skip_pass("volumetric", "shader unavailable");
        return;
    }

    let noise = noise.unwrap_or_else(|| device.fallback_texture(FallbackTexture::Black));
    device.set_uniform("u_camera_position", view.camera.eye.into());
    device.set_uniform("u_inverse_viewprojection", view.camera.view_projection.inverse().into());
    device.set_uniform("u_air_density", view.settings.air_density.into());
    device.set_texture("u_depth_texture", depth, 0);
    device.set_texture("u_noise_texture", noise, 1);

    device.set_blend(BlendMode::Premultiplied);
    device.set_depth_test(false);
    let quad = device.builtin_mesh(BuiltinMesh::Quad);

    let gamma = view.gamma();
    let point_lights = view.lights.iter().filter_map(|id| view.scene.entity(*id));
    for entity in std::iter::once(directional).chain(point_lights) {
        let Some(light) = entity.as_light() else {
            continue;
        };
        if entity.id != directional.id && light.light_type != LightType::Point {
            continue;
        }
        upload_light_params(device, light, &entity.model, gamma);
        device.draw_mesh(quad);
        stats.draws_submitted += 1;
    }

    device.set_blend(BlendMode::Disabled);
    device.set_depth_test(true);
    device.disable_shader();
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::{DeviceCommand, FrontFace, HeadlessDevice, MeshId, Rect};
    use umbra_scene::{
        Aabb, AlphaMode, Camera, DecalEntity, Entity, LightEntity, Material, Mesh, Node, Prefab, Scene,
    };

    use crate::forward::{GBUFFERS_SHADER, LIGHT_MULTI_SHADER, SKYBOX_SHADER};
    use crate::render_call::RenderCallList;
    use crate::settings::RenderSettings;

    const SIZE: u32 = 16;

    struct Fixture {
        device: HeadlessDevice,
        scene: Scene,
        camera: Camera,
        targets: ScreenTargets,
        opaque: MeshId,
        blended: MeshId,
    }

    fn add_cube(device: &mut HeadlessDevice, scene: &mut Scene, name: &str, alpha_mode: AlphaMode) -> MeshId {
        let gpu = device.create_mesh(36);
        let mesh = scene.assets.add_mesh(Mesh::new(
            name,
            gpu,
            36,
            Aabb::from_center_half_extents(Vec3::ZERO, Vec3::ONE),
        ));
        let material = scene.assets.add_material(
            Material::default()
                .with_color(Vec4::new(0.5, 0.5, 0.5, 0.5))
                .with_alpha_mode(alpha_mode),
        );
        scene.add_entity(Entity::new(
            name,
            Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
            EntityKind::Prefab(Prefab::new(name, Node::new("root").with_mesh(mesh, material))),
        ));
        gpu
    }

    fn fixture() -> Fixture {
        let mut device = HeadlessDevice::new(SIZE, SIZE);
        let mut scene = Scene::new();
        let opaque = add_cube(&mut device, &mut scene, "wall", AlphaMode::Opaque);
        let blended = add_cube(&mut device, &mut scene, "glass", AlphaMode::Blend);
        let targets = ScreenTargets::create(&mut device, SIZE, SIZE).unwrap();
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        device.reset_log();
        Fixture {
            device,
            scene,
            camera,
            targets,
            opaque,
            blended,
        }
    }

    fn settings() -> RenderSettings {
        let mut settings = RenderSettings::deferred();
        settings.ssao.enabled = false;
        settings
    }

    fn sun(scene: &mut Scene) -> EntityId {
        // +Z of the model is the light's front, pointing down
        let model = Mat4::from_translation(Vec3::new(0.0, 20.0, 0.0)) * Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2);
        scene.add_light("sun", model, LightEntity::directional(Vec3::ONE, 1.0, 50.0, 100.0))
    }

    fn bulb(scene: &mut Scene, max_distance: f32) -> EntityId {
        scene.add_light(
            "bulb",
            Mat4::from_translation(Vec3::new(0.0, 1.0, -5.0)),
            LightEntity::point(Vec3::ONE, 1.0, max_distance),
        )
    }

    fn spot(scene: &mut Scene) -> EntityId {
        scene.add_light(
            "spot",
            Mat4::from_translation(Vec3::new(0.0, 3.0, -5.0)) * Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2),
            LightEntity::spot(Vec3::ONE, 1.0, 20.0, 30.0),
        )
    }

    fn render(
        f: &mut Fixture,
        settings: &RenderSettings,
        lights: &[EntityId],
        directional: Option<EntityId>,
    ) -> FrameStats {
        let calls = RenderCallList::build(&f.scene, &f.camera, settings.composition);
        let view = FrameView::new(&f.scene, &f.camera, settings, &calls.calls, Rect::full(SIZE, SIZE))
            .with_lights(lights, directional);
        let mut ssao = Ssao::new(&settings.ssao);
        let mut stats = FrameStats::default();
        render_deferred_pipeline(&mut f.device, &view, &f.targets, &mut ssao, None, &mut stats);
        stats
    }

    fn shaders(device: &HeadlessDevice) -> Vec<&str> {
        device.draws().iter().filter_map(|d| d.shader.as_deref()).collect()
    }

    #[test]
    fn test_gbuffer_attachments_cleared_one_at_a_time() {
        let mut f = fixture();
        f.scene.environment = Some(f.device.fallback_texture(FallbackTexture::White));
        let gbuffers = f.targets.gbuffers;
        render(&mut f, &settings(), &[], None);

        let mut buffer = None;
        let mut cleared = Vec::new();
        let mut sky = Vec::new();
        for command in f.device.commands() {
            match command {
                DeviceCommand::DrawBuffer(b) => buffer = *b,
                DeviceCommand::Clear { target, .. } if *target == Some(gbuffers) => cleared.push(buffer),
                DeviceCommand::Draw(i) if f.device.draws()[*i].shader.as_deref() == Some(SKYBOX_SHADER) => {
                    sky.push(buffer)
                }
                _ => {}
            }
        }
        assert_eq!(cleared, vec![Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(sky, vec![Some(0)]);

        // Opaque surfaces write every attachment
        let geometry: Vec<_> = f.device.draws_with_shader(GBUFFERS_SHADER).collect();
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].mesh, f.opaque);
    }

    #[test]
    fn test_decals_composite_into_snapshot_and_copy_back() {
        let mut f = fixture();
        let albedo = f.device.fallback_texture(FallbackTexture::White);
        f.scene.add_entity(Entity::new(
            "sticker",
            Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0)),
            EntityKind::Decal(DecalEntity { albedo: Some(albedo) }),
        ));
        f.scene.add_entity(Entity::new(
            "blank",
            Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0)),
            EntityKind::Decal(DecalEntity::default()),
        ));
        let gbuffers = GBufferTextures::fetch(&f.device, f.targets.gbuffers).unwrap();
        render(&mut f, &settings(), &[], None);

        let decals: Vec<_> = f.device.draws_with_shader(DECALS_SHADER).collect();
        assert_eq!(decals.len(), 1);
        assert_eq!(decals[0].target, Some(f.targets.decals));
        assert_eq!(decals[0].texture("u_decal_texture"), Some(albedo));
        assert!(!decals[0].depth_test);

        let draw_at = f
            .device
            .commands()
            .iter()
            .position(|c| matches!(c, DeviceCommand::Draw(i) if f.device.draws()[*i].shader.as_deref() == Some(DECALS_SHADER)))
            .unwrap();
        let mut snapshots = Vec::new();
        let mut write_backs = Vec::new();
        for (at, command) in f.device.commands().iter().enumerate() {
            let DeviceCommand::Copy { src, dst } = command else {
                continue;
            };
            if gbuffers.color[..DECAL_TARGETS].contains(src) {
                assert!(at < draw_at);
                snapshots.push(*src);
            }
            if gbuffers.color[..DECAL_TARGETS].contains(dst) {
                assert!(at > draw_at);
                write_backs.push(*dst);
            }
        }
        assert_eq!(snapshots, gbuffers.color[..DECAL_TARGETS].to_vec());
        assert_eq!(write_backs, gbuffers.color[..DECAL_TARGETS].to_vec());
        assert!(f.device.take_errors().is_empty());
    }

    #[test]
    fn test_decal_without_albedo_skips_pass() {
        let mut f = fixture();
        f.scene.add_entity(Entity::new(
            "blank",
            Mat4::from_translation(Vec3::new(0.0, 0.0, -4.0)),
            EntityKind::Decal(DecalEntity::default()),
        ));
        render(&mut f, &settings(), &[], None);

        assert_eq!(f.device.draws_with_shader(DECALS_SHADER).count(), 0);
        let gbuffers = GBufferTextures::fetch(&f.device, f.targets.gbuffers).unwrap();
        let copies_from_gbuffer = f
            .device
            .commands()
            .iter()
            .filter(|c| matches!(c, DeviceCommand::Copy { src, .. } if gbuffers.color.contains(src)))
            .count();
        assert_eq!(copies_from_gbuffer, 0);
    }

    #[test]
    fn test_overlay_draws_blended_calls_with_directional_merged() {
        let mut f = fixture();
        let bulb = bulb(&mut f.scene, 10.0);
        let sun = sun(&mut f.scene);
        render(&mut f, &settings(), &[bulb], Some(sun));

        let overlay: Vec<_> = f.device.draws_with_shader(LIGHT_MULTI_SHADER).collect();
        assert_eq!(overlay.len(), 2);
        assert!(overlay.iter().all(|d| d.mesh == f.blended));
        assert!(overlay.iter().all(|d| d.target == Some(f.targets.illumination)));
        assert_eq!(overlay[0].blend, BlendMode::Alpha);
        assert_eq!(overlay[1].blend, BlendMode::AlphaAdditive);
        assert_eq!(
            overlay[0].uniform("u_light_type").and_then(UniformValue::as_int),
            Some(LightType::Point.as_uniform())
        );
        assert_eq!(
            overlay[1].uniform("u_light_type").and_then(UniformValue::as_int),
            Some(LightType::Directional.as_uniform())
        );
        assert_eq!(overlay[0].uniform("u_deferred").and_then(UniformValue::as_bool), Some(true));

        // The blended surface stays out of the g-buffer
        let geometry: Vec<_> = f.device.draws_with_shader(GBUFFERS_SHADER).collect();
        assert_eq!(geometry.len(), 1);
        assert_eq!(geometry[0].mesh, f.opaque);
    }

    #[test]
    fn test_dithering_moves_blended_calls_into_gbuffer() {
        let mut f = fixture();
        let bulb = bulb(&mut f.scene, 10.0);
        let mut settings = settings();
        settings.dithering = true;
        render(&mut f, &settings, &[bulb], None);

        assert_eq!(f.device.draws_with_shader(LIGHT_MULTI_SHADER).count(), 0);
        let meshes: Vec<MeshId> = f.device.draws_with_shader(GBUFFERS_SHADER).map(|d| d.mesh).collect();
        assert_eq!(meshes.len(), 2);
        assert!(meshes.contains(&f.opaque));
        assert!(meshes.contains(&f.blended));
    }

    #[test]
    fn test_light_volumes_reverse_winding_and_scale_to_range() {
        let mut f = fixture();
        let bulb = bulb(&mut f.scene, 12.0);
        let spot = spot(&mut f.scene);
        render(&mut f, &settings(), &[bulb, spot], None);

        let volumes: Vec<_> = f.device.draws_with_shader(DEFERRED_WS_SHADER).collect();
        assert_eq!(volumes.len(), 2);
        for volume in &volumes {
            assert_eq!(volume.front_face, FrontFace::Cw);
            assert_eq!(volume.blend, BlendMode::Additive);
            assert!(!volume.depth_test);
        }
        let model = volumes[0].uniform("u_model").and_then(UniformValue::as_mat4).unwrap();
        assert!((model.x_axis.truncate().length() - 12.0).abs() < 1e-4);
        assert!((model.w_axis.truncate() - Vec3::new(0.0, 1.0, -5.0)).length() < 1e-5);
        let model = volumes[1].uniform("u_model").and_then(UniformValue::as_mat4).unwrap();
        assert!((model.y_axis.truncate().length() - 20.0).abs() < 1e-4);

        // Winding is restored for whatever draws next
        let last_winding = f.device.commands().iter().rev().find_map(|c| match c {
            DeviceCommand::FrontFace(face) => Some(*face),
            _ => None,
        });
        assert_eq!(last_winding, Some(FrontFace::Ccw));
    }

    #[test]
    fn test_resolve_carries_directional_light() {
        let mut f = fixture();
        let sun = sun(&mut f.scene);
        render(&mut f, &settings(), &[], Some(sun));

        let resolve: Vec<_> = f.device.draws_with_shader(DEFERRED_MULTI_SHADER).collect();
        assert_eq!(resolve.len(), 1);
        assert_eq!(
            resolve[0].uniform("u_light_type").and_then(UniformValue::as_int),
            Some(LightType::Directional.as_uniform())
        );
        assert_eq!(resolve[0].uniform("u_ao").and_then(UniformValue::as_bool), Some(false));
        assert_eq!(f.device.draws_with_shader(DEFERRED_WS_SHADER).count(), 0);
    }

    #[test]
    fn test_volumetric_covers_directional_and_point_lights() {
        let mut f = fixture();
        let bulb = bulb(&mut f.scene, 10.0);
        let spot = spot(&mut f.scene);
        let sun = sun(&mut f.scene);
        let mut settings = settings();
        settings.volumetric = true;
        render(&mut f, &settings, &[bulb, spot], Some(sun));

        let passes: Vec<_> = f.device.draws_with_shader(VOLUME_SHADER).collect();
        assert_eq!(passes.len(), 2);
        let types: Vec<_> = passes
            .iter()
            .filter_map(|d| d.uniform("u_light_type").and_then(UniformValue::as_int))
            .collect();
        assert_eq!(
            types,
            vec![LightType::Directional.as_uniform(), LightType::Point.as_uniform()]
        );
        assert!(passes.iter().all(|d| d.blend == BlendMode::Premultiplied));
        assert_eq!(
            passes[0].texture("u_noise_texture"),
            Some(f.device.fallback_texture(FallbackTexture::Black))
        );

        let order = shaders(&f.device);
        let last_overlay = order.iter().rposition(|s| *s == LIGHT_MULTI_SHADER).unwrap();
        let first_volume = order.iter().position(|s| *s == VOLUME_SHADER).unwrap();
        assert!(last_overlay < first_volume);
    }

    #[test]
    fn test_volumetric_needs_directional_light() {
        let mut f = fixture();
        let bulb = bulb(&mut f.scene, 10.0);
        let mut settings = settings();
        settings.volumetric = true;
        let stats = render(&mut f, &settings, &[bulb], None);

        assert_eq!(f.device.draws_with_shader(VOLUME_SHADER).count(), 0);
        assert_eq!(stats.passes_skipped, 1);
    }
}
