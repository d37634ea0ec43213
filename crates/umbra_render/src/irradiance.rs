//! Irradiance Probe Bake
//!
//! Each probe of the scene's irradiance grid captures the opaque scene into
//! six small float cube faces. The faces are read back and projected onto
//! second-order spherical harmonics, and every probe's nine RGB
//! coefficients become one row of a nearest-filtered float texture that
//! surface shaders index by probe.

use glam::{Mat4, UVec3, Vec3};
use umbra_core::{
    FilterMode, GraphicsDevice, RenderTargetDesc, TextureDesc, TextureFormat, TextureId, UniformValue,
};
use umbra_scene::{
    compute_sh, Camera, EntityId, EntityKind, FloatImage, Scene, SphericalHarmonics, CUBE_FACE_ORIENTATION,
    SH_COEFFICIENTS,
};

use crate::error::{RenderError, Result};
use crate::forward::render_capture;
use crate::settings::RenderSettings;
use crate::stats::FrameStats;
use crate::targets::color_texture;

/// Side of each captured cube face
pub const IRRADIANCE_CAPTURE_SIZE: u32 = 64;
pub const CAPTURE_FOV: f32 = 90.0;
pub const CAPTURE_NEAR: f32 = 0.1;
pub const CAPTURE_FAR: f32 = 1000.0;

const PROBES_TEXTURE_SLOT: u32 = 5;

/// Baked coefficients as the runtime shaders consume them
#[derive(Debug)]
pub struct IrradianceCache {
    texture: TextureId,
    probe_count: usize,
    dims: UVec3,
    inv_model: Mat4,
}

impl IrradianceCache {
    pub fn texture(&self) -> TextureId {
        self.texture
    }

    pub fn probe_count(&self) -> usize {
        self.probe_count
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn upload_uniforms(&self, device: &mut dyn GraphicsDevice, trilinear: bool) {
        device.set_uniform("u_invmodel_grid", self.inv_model.into());
        device.set_uniform("u_irr_dims", self.dims.as_vec3().into());
        device.set_uniform("u_trilinear", trilinear.into());
        device.set_texture("u_texture_probes", self.texture, PROBES_TEXTURE_SLOT);
        device.set_uniform("u_irr", UniformValue::Bool(true));
    }

    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.destroy_texture(self.texture);
    }
}

/// Camera looking down cube face `face` from `position`
pub fn face_camera(position: Vec3, face: usize) -> Camera {
    let (front, up) = CUBE_FACE_ORIENTATION[face];
    let mut camera = Camera::perspective(CAPTURE_FOV, 1.0, CAPTURE_NEAR, CAPTURE_FAR);
    camera.look_at(position, position + front, up);
    camera
}

fn first_grid(scene: &Scene) -> Option<EntityId> {
    scene
        .entities()
        .iter()
        .find(|e| matches!(e.kind, EntityKind::IrradianceGrid(_)))
        .map(|e| e.id)
}

/// Bake the first irradiance grid of `scene`.
///
/// `cache` is reused while the probe count stays the same and replaced
/// otherwise. On error the grid keeps its previous coefficients.
pub fn bake_irradiance(
    device: &mut dyn GraphicsDevice,
    scene: &mut Scene,
    settings: &RenderSettings,
    cache: &mut Option<IrradianceCache>,
    stats: &mut FrameStats,
) -> Result<()> {
    let grid_id = first_grid(scene).ok_or(RenderError::NoIrradianceGrid)?;
    let (positions, dims, inv_model) = {
        let entity = scene.entity_mut(grid_id).ok_or(RenderError::NoIrradianceGrid)?;
        let model = entity.model;
        let grid = entity.as_grid_mut().ok_or(RenderError::NoIrradianceGrid)?;
        grid.update_grid(&model);
        let positions: Vec<Vec3> = grid.probes().iter().map(|p| p.position()).collect();
        (positions, grid.dim(), grid.inv_model())
    };
    if positions.is_empty() {
        return Err(RenderError::NoIrradianceGrid);
    }

    log::info!("Baking irradiance for {} probes", positions.len());
    let coefficients = capture_probes(device, scene, settings, &positions, stats)?;

    if let Some(grid) = scene.entity_mut(grid_id).and_then(|e| e.as_grid_mut()) {
        for (probe, sh) in grid.probes_mut().iter_mut().zip(coefficients.iter()) {
            probe.sh = *sh;
        }
    }

    let texture = match cache.take() {
        Some(existing) if existing.probe_count == coefficients.len() => existing.texture,
        stale => {
            if let Some(stale) = stale {
                stale.release(device);
            }
            device.create_texture(
                &TextureDesc::new_2d(
                    "irradiance_probes",
                    SH_COEFFICIENTS as u32,
                    coefficients.len() as u32,
                    TextureFormat::Rgb32Float,
                )
                .with_filter(FilterMode::Nearest),
            )?
        }
    };
    let uploaded = device.upload_texture(texture, 0, bytemuck::cast_slice(&coefficients));
    *cache = Some(IrradianceCache {
        texture,
        probe_count: coefficients.len(),
        dims,
        inv_model,
    });
    uploaded?;

    log::info!("Irradiance bake finished");
    Ok(())
}

fn capture_probes(
    device: &mut dyn GraphicsDevice,
    scene: &Scene,
    settings: &RenderSettings,
    positions: &[Vec3],
    stats: &mut FrameStats,
) -> Result<Vec<SphericalHarmonics>> {
    let size = IRRADIANCE_CAPTURE_SIZE;
    let target = device.create_render_target(
        &RenderTargetDesc::color("irradiance_capture", size, size, &[TextureFormat::Rgb32Float]).with_depth(),
    )?;

    let mut capture = || -> Result<Vec<SphericalHarmonics>> {
        let color = color_texture(device, target, 0)?;
        let mut coefficients = Vec::with_capacity(positions.len());
        for position in positions {
            let mut faces = Vec::with_capacity(6);
            for face in 0..6 {
                device.bind_render_target(Some(target));
                render_capture(device, scene, &face_camera(*position, face), settings, size, stats);
                let texels = device.read_pixels(color, 0)?;
                let image = FloatImage::from_texels(size, size, TextureFormat::Rgb32Float.channels(), texels)
                    .ok_or(RenderError::MalformedCapture(color))?;
                faces.push(image);
            }
            let faces: [FloatImage; 6] = faces
                .try_into()
                .map_err(|_| RenderError::MalformedCapture(color))?;
            coefficients.push(compute_sh(&faces));
        }
        Ok(coefficients)
    };
    let result = capture();

    device.bind_render_target(None);
    device.destroy_render_target(target);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;
    use umbra_core::HeadlessDevice;
    use umbra_scene::{Aabb, Entity, IrradianceGrid, Material, Mesh, Node, Prefab, DEFAULT_PROBE_SCALE};

    fn lit_scene(device: &mut HeadlessDevice) -> Scene {
        let mut scene = Scene::new();
        let gpu = device.create_mesh(36);
        let mesh = scene.assets.add_mesh(Mesh::new(
            "wall",
            gpu,
            36,
            Aabb::from_center_half_extents(Vec3::ZERO, Vec3::new(50.0, 50.0, 1.0)),
        ));
        let material = scene
            .assets
            .add_material(Material::default().with_color(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        scene.add_entity(Entity::new(
            "wall",
            Mat4::from_translation(Vec3::new(0.0, 0.0, -10.0)),
            EntityKind::Prefab(Prefab::new("wall", Node::new("root").with_mesh(mesh, material))),
        ));
        scene
    }

    #[test]
    fn test_face_cameras_look_along_axes() {
        let camera = face_camera(Vec3::new(1.0, 2.0, 3.0), 5);
        assert!((camera.front() - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
        let camera = face_camera(Vec3::ZERO, 2);
        assert!((camera.front() - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_bake_without_grid() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut scene = lit_scene(&mut device);
        let mut cache = None;
        let result = bake_irradiance(
            &mut device,
            &mut scene,
            &RenderSettings::default(),
            &mut cache,
            &mut FrameStats::default(),
        );
        assert!(matches!(result, Err(RenderError::NoIrradianceGrid)));
        assert!(cache.is_none());
    }

    #[test]
    fn test_bake_fills_probe_rows() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut scene = lit_scene(&mut device);
        let grid_model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        scene.add_entity(Entity::new(
            "grid",
            grid_model,
            EntityKind::IrradianceGrid(IrradianceGrid::new(UVec3::new(2, 1, 1), DEFAULT_PROBE_SCALE, &grid_model)),
        ));
        let targets_before = device.render_target_count();

        let mut cache = None;
        bake_irradiance(
            &mut device,
            &mut scene,
            &RenderSettings::default(),
            &mut cache,
            &mut FrameStats::default(),
        )
        .unwrap();

        let cache = cache.unwrap();
        assert_eq!(cache.probe_count(), 2);
        assert_eq!(cache.dims(), UVec3::new(2, 1, 1));
        let desc = device.texture_desc(cache.texture()).unwrap();
        assert_eq!((desc.width, desc.height), (9, 2));
        assert_eq!(desc.filter, FilterMode::Nearest);
        assert_eq!(device.render_target_count(), targets_before);

        let rows = device.read_pixels(cache.texture(), 0).unwrap();
        assert_eq!(rows.len(), 2 * SH_COEFFICIENTS * 3);
        // The red wall dominates the DC term of every probe
        assert!(rows[0] > 0.0);
        assert!(rows[0] > rows[1]);
    }

    #[test]
    fn test_rebake_reuses_texture() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut scene = lit_scene(&mut device);
        scene.add_entity(Entity::new(
            "grid",
            Mat4::IDENTITY,
            EntityKind::IrradianceGrid(IrradianceGrid::new(UVec3::new(1, 1, 1), DEFAULT_PROBE_SCALE, &Mat4::IDENTITY)),
        ));

        let mut cache = None;
        let settings = RenderSettings::default();
        bake_irradiance(&mut device, &mut scene, &settings, &mut cache, &mut FrameStats::default()).unwrap();
        let first = cache.as_ref().map(IrradianceCache::texture);
        bake_irradiance(&mut device, &mut scene, &settings, &mut cache, &mut FrameStats::default()).unwrap();
        assert_eq!(cache.as_ref().map(IrradianceCache::texture), first);
    }
}
