//! Lighting Uniform Assembly
//!
//! Two ways to hand lights to a surface shader:
//! - multi-pass: [`upload_light_params`] sets one light's scalar uniforms
//!   before each additive draw
//! - single-pass: [`PackedLights`] gathers up to [`MAX_LIGHTS`] records into
//!   parallel arrays uploaded once
//!
//! Records are `Pod` so the same packing can back a uniform buffer upload
//! on backends that have one.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use umbra_core::{GraphicsDevice, UniformValue};
use umbra_scene::{light_direction, light_position, EntityId, LightEntity, LightType, Scene};

/// Capacity of the single-pass light arrays
pub const MAX_LIGHTS: usize = 100;

/// Texture unit used for a light's shadow map
pub const SHADOW_TEXTURE_SLOT: u32 = 8;

/// Raise an sRGB color to `gamma`
pub fn linearize(color: Vec3, gamma: f32) -> Vec3 {
    color.powf(gamma)
}

/// Upload one light for a multi-pass draw or a deferred resolve.
///
/// The shadow map is bound only when the light casts and owns one; `u_shadows`
/// tells the shader whether to sample it.
pub fn upload_light_params(device: &mut dyn GraphicsDevice, light: &LightEntity, model: &Mat4, gamma: f32) {
    let shadow = light.shadow_map().filter(|_| light.needs_shadow_map());
    if let Some(map) = shadow {
        device.set_texture("shadowmap", map.depth_texture(), SHADOW_TEXTURE_SLOT);
        device.set_uniform("u_shadow_viewproj", light.camera.view_projection.into());
        device.set_uniform("u_shadow_bias", light.shadow_bias.into());
    }

    device.set_uniform("u_light_color", linearize(light.color, gamma).into());
    device.set_uniform("u_light_cutoff", light.cutoff().into());
    device.set_uniform("u_light_exp", light.spot_exponent.into());
    device.set_uniform("u_light_vector", light_direction(model).into());
    device.set_uniform("u_shadows", shadow.is_some().into());
    device.set_uniform("u_light_position", light_position(model).into());
    device.set_uniform("u_light_maxdist", light.max_distance.into());
    device.set_uniform("u_light_type", light.light_type.as_uniform().into());
    device.set_uniform("u_light_intensity", light.intensity.into());
}

/// One light as laid out for single-pass shading
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct LightRecord {
    pub position: [f32; 3],
    pub max_distance: f32,
    /// Linear color
    pub color: [f32; 3],
    pub intensity: f32,
    pub vector: [f32; 3],
    pub cutoff: f32,
    /// Atlas cell as `(u, v, scale)`
    pub atlas_uv: [f32; 3],
    pub exponent: f32,
    pub light_type: i32,
    pub shadows: i32,
    pub shadow_bias: f32,
    pub _pad: f32,
    pub shadow_viewproj: [[f32; 4]; 4],
}

impl LightRecord {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(light: &LightEntity, model: &Mat4, gamma: f32) -> Self {
        let cell = light
            .atlas_rect
            .filter(|_| light.needs_shadow_map());
        Self {
            position: light_position(model).to_array(),
            max_distance: light.max_distance,
            color: linearize(light.color, gamma).to_array(),
            intensity: light.intensity,
            vector: light_direction(model).to_array(),
            cutoff: light.cutoff(),
            atlas_uv: cell.map(|c| c.to_vec3()).unwrap_or(Vec3::ZERO).to_array(),
            exponent: light.spot_exponent,
            light_type: light.light_type.as_uniform(),
            shadows: cell.is_some() as i32,
            shadow_bias: light.shadow_bias,
            _pad: 0.0,
            shadow_viewproj: light.camera.view_projection.to_cols_array_2d(),
        }
    }

    pub fn casts_shadow(&self) -> bool {
        self.shadows != 0 && self.light_type != LightType::Point.as_uniform()
    }
}

/// Lights packed for one single-pass draw
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PackedLights {
    pub records: Vec<LightRecord>,
    pub shadow_count: i32,
    /// More lights were offered than fit
    pub truncated: bool,
}

impl PackedLights {
    /// Pack `lights` in order, keeping at most `capacity`
    pub fn pack(scene: &Scene, lights: &[EntityId], gamma: f32, capacity: usize) -> Self {
        let mut packed = Self::default();
        for id in lights {
            let Some(entity) = scene.entity(*id) else {
                continue;
            };
            let Some(light) = entity.as_light() else {
                continue;
            };
            if packed.records.len() == capacity {
                packed.truncated = true;
                break;
            }
            let record = LightRecord::new(light, &entity.model, gamma);
            if record.casts_shadow() {
                packed.shadow_count += 1;
            }
            packed.records.push(record);
        }
        packed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records as raw bytes for buffer uploads
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.records)
    }

    /// Upload the per-attribute arrays and counts
    pub fn upload(&self, device: &mut dyn GraphicsDevice) {
        let vec3s = |f: fn(&LightRecord) -> [f32; 3]| -> UniformValue {
            UniformValue::Vec3Array(self.records.iter().map(|r| Vec3::from_array(f(r))).collect())
        };
        let floats = |f: fn(&LightRecord) -> f32| -> UniformValue {
            UniformValue::FloatArray(self.records.iter().map(f).collect())
        };
        let ints = |f: fn(&LightRecord) -> i32| -> UniformValue {
            UniformValue::IntArray(self.records.iter().map(f).collect())
        };

        device.set_uniform(
            "u_shadow_viewproj",
            UniformValue::Mat4Array(
                self.records
                    .iter()
                    .map(|r| Mat4::from_cols_array_2d(&r.shadow_viewproj))
                    .collect(),
            ),
        );
        device.set_uniform("u_light_position", vec3s(|r| r.position));
        device.set_uniform("u_light_color", vec3s(|r| r.color));
        device.set_uniform("u_light_vector", vec3s(|r| r.vector));
        device.set_uniform("u_light_uvs", vec3s(|r| r.atlas_uv));
        device.set_uniform("u_light_maxdist", floats(|r| r.max_distance));
        device.set_uniform("u_light_type", ints(|r| r.light_type));
        device.set_uniform("u_light_intensity", floats(|r| r.intensity));
        device.set_uniform("u_light_cutoff", floats(|r| r.cutoff));
        device.set_uniform("u_light_exp", floats(|r| r.exponent));
        device.set_uniform("u_shadows", ints(|r| r.shadows));
        device.set_uniform("u_shadow_bias", floats(|r| r.shadow_bias));
        device.set_uniform("u_num_lights", (self.records.len() as i32).into());
        device.set_uniform("u_shadow_count", self.shadow_count.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use umbra_core::HeadlessDevice;
    use umbra_scene::AtlasRect;

    fn scene_with_points(count: usize) -> (Scene, Vec<EntityId>) {
        let mut scene = Scene::new();
        let ids = (0..count)
            .map(|i| {
                scene.add_light(
                    format!("p{}", i),
                    Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)),
                    LightEntity::point(Vec3::new(1.0, 0.5, 0.0), 2.0, 10.0),
                )
            })
            .collect();
        (scene, ids)
    }

    #[test]
    fn test_record_layout_is_tightly_packed() {
        assert_eq!(LightRecord::SIZE, 36 * 4);
        let (scene, ids) = scene_with_points(3);
        let packed = PackedLights::pack(&scene, &ids, 2.2, MAX_LIGHTS);
        assert_eq!(packed.as_bytes().len(), 3 * LightRecord::SIZE);
    }

    #[test]
    fn test_pack_truncates_at_capacity() {
        let (scene, ids) = scene_with_points(MAX_LIGHTS + 5);
        let packed = PackedLights::pack(&scene, &ids, 2.2, MAX_LIGHTS);
        assert_eq!(packed.len(), MAX_LIGHTS);
        assert!(packed.truncated);

        let exact = PackedLights::pack(&scene, &ids[..MAX_LIGHTS], 2.2, MAX_LIGHTS);
        assert!(!exact.truncated);
    }

    #[test]
    fn test_color_is_linearized() {
        let (scene, ids) = scene_with_points(1);
        let packed = PackedLights::pack(&scene, &ids, 2.0, MAX_LIGHTS);
        assert_eq!(packed.records[0].color, [1.0, 0.25, 0.0]);
        assert_eq!(packed.records[0].light_type, LightType::Point.as_uniform());
    }

    #[test]
    fn test_shadow_count_needs_atlas_cell() {
        let mut scene = Scene::new();
        let mut with_cell = LightEntity::spot(Vec3::ONE, 1.0, 10.0, 30.0).with_shadows(true);
        with_cell.atlas_rect = Some(AtlasRect {
            offset: Vec2::new(0.5, 0.0),
            scale: 0.5,
        });
        let without_cell = LightEntity::spot(Vec3::ONE, 1.0, 10.0, 30.0).with_shadows(true);
        let ids = vec![
            scene.add_light("a", Mat4::IDENTITY, with_cell),
            scene.add_light("b", Mat4::IDENTITY, without_cell),
        ];

        let packed = PackedLights::pack(&scene, &ids, 2.2, MAX_LIGHTS);
        assert_eq!(packed.shadow_count, 1);
        assert_eq!(packed.records[0].atlas_uv, [0.5, 0.0, 0.5]);
        assert_eq!(packed.records[1].shadows, 0);
    }

    #[test]
    fn test_upload_sets_arrays() {
        let (scene, ids) = scene_with_points(5);
        let packed = PackedLights::pack(&scene, &ids, 2.2, MAX_LIGHTS);

        let mut device = HeadlessDevice::new(4, 4);
        device.enable_shader("light_single");
        packed.upload(&mut device);
        let quad = device.builtin_mesh(umbra_core::BuiltinMesh::Quad);
        device.draw_mesh(quad);

        let draw = &device.draws()[0];
        assert_eq!(draw.uniform("u_num_lights").and_then(UniformValue::as_int), Some(5));
        assert_eq!(draw.uniform("u_light_position").map(UniformValue::len), Some(5));
        assert_eq!(draw.uniform("u_shadow_count").and_then(UniformValue::as_int), Some(0));
    }

    #[test]
    fn test_multi_pass_params_without_shadow_map() {
        let light = LightEntity::spot(Vec3::ONE, 3.0, 25.0, 60.0).with_shadows(true);
        let mut device = HeadlessDevice::new(4, 4);
        device.enable_shader("light_multi");
        upload_light_params(&mut device, &light, &Mat4::IDENTITY, 2.2);
        let quad = device.builtin_mesh(umbra_core::BuiltinMesh::Quad);
        device.draw_mesh(quad);

        let draw = &device.draws()[0];
        assert_eq!(draw.uniform("u_shadows").and_then(UniformValue::as_bool), Some(false));
        assert!(draw.texture("shadowmap").is_none());
        let cutoff = draw.uniform("u_light_cutoff").and_then(UniformValue::as_float).unwrap();
        assert!((cutoff - 0.5).abs() < 1e-5);
        assert_eq!(draw.uniform("u_light_vector").and_then(UniformValue::as_vec3), Some(Vec3::Z));
    }
}
