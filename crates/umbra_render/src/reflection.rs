//! Reflection probe bake
//!
//! Renders the opaque scene in the six axis directions from every
//! reflection probe straight into the faces of the probe's cubemap, then
//! builds the mip chain used for rough reflections.

use glam::Vec3;
use umbra_core::{CubeFace, FilterMode, GraphicsDevice, RenderTargetDesc, TextureFormat, TextureId};
use umbra_scene::{EntityKind, Scene};

use crate::error::Result;
use crate::forward::render_capture;
use crate::irradiance::face_camera;
use crate::settings::RenderSettings;
use crate::stats::FrameStats;

/// Bake every reflection probe of `scene`, returning how many were baked
pub fn bake_reflections(
    device: &mut dyn GraphicsDevice,
    scene: &mut Scene,
    settings: &RenderSettings,
    stats: &mut FrameStats,
) -> Result<usize> {
    let mut probes: Vec<(Vec3, u32, TextureId)> = Vec::new();
    for entity in scene.entities_mut() {
        let position = entity.model.w_axis.truncate();
        if let EntityKind::ReflectionProbe(probe) = &mut entity.kind {
            let cubemap = probe.ensure_cubemap(device)?;
            probes.push((position, probe.size, cubemap));
        }
    }
    if probes.is_empty() {
        log::debug!("No reflection probes to bake");
        return Ok(0);
    }

    log::info!("Baking {} reflection probes", probes.len());
    for (position, size, cubemap) in &probes {
        capture_cubemap(device, scene, settings, *position, *size, *cubemap, stats)?;
        device.generate_mipmaps(*cubemap)?;
        device.set_filter(*cubemap, FilterMode::LinearMipmap)?;
    }
    log::info!("Reflection bake finished");
    Ok(probes.len())
}

fn capture_cubemap(
    device: &mut dyn GraphicsDevice,
    scene: &Scene,
    settings: &RenderSettings,
    position: Vec3,
    size: u32,
    cubemap: TextureId,
    stats: &mut FrameStats,
) -> Result<()> {
    let target = device.create_render_target(
        &RenderTargetDesc::color("reflection_capture", size, size, &[TextureFormat::Rgb8Unorm]).with_depth(),
    )?;

    let mut result = Ok(());
    for face in CubeFace::ALL {
        if let Err(err) = device.attach_cube_face(target, cubemap, face) {
            result = Err(err.into());
            break;
        }
        device.bind_render_target(Some(target));
        render_capture(device, scene, &face_camera(position, face.index()), settings, size, stats);
    }

    device.bind_render_target(None);
    device.destroy_render_target(target);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec4};
    use umbra_core::HeadlessDevice;
    use umbra_scene::{Entity, ReflectionProbeEntity};

    #[test]
    fn test_bake_allocates_cubemap_and_mipmaps() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut scene = Scene::new();
        scene.background_color = Vec4::new(0.2, 0.4, 0.6, 1.0);
        let id = scene.add_entity(Entity::new(
            "probe",
            Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0)),
            EntityKind::ReflectionProbe(ReflectionProbeEntity::new(16)),
        ));

        let baked = bake_reflections(&mut device, &mut scene, &RenderSettings::default(), &mut FrameStats::default())
            .unwrap();
        assert_eq!(baked, 1);

        let cubemap = scene
            .entity(id)
            .and_then(|e| e.as_reflection_probe())
            .and_then(|p| p.cubemap())
            .unwrap();
        assert_eq!(device.mipmap_generations(cubemap), 1);
        let face = device.read_pixels(cubemap, CubeFace::NegativeZ.index()).unwrap();
        assert!((face[2] - 0.6).abs() < 0.01);
        // Only the cubemap outlives the bake
        assert_eq!(device.render_target_count(), 0);
    }

    #[test]
    fn test_no_probes() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut scene = Scene::new();
        let baked = bake_reflections(&mut device, &mut scene, &RenderSettings::default(), &mut FrameStats::default())
            .unwrap();
        assert_eq!(baked, 0);
    }
}
