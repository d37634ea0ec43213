//! Light entities and their shadow resources
//!
//! A light owns the camera it renders its shadow from and, when it casts
//! shadows, a depth-only render target. Point lights never get one. The
//! target is released explicitly through the device because the light
//! cannot reach the device from `Drop`.

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use umbra_core::{GraphicsDevice, RenderTargetDesc, RenderTargetId, Result, TextureId};

use crate::bounds::Sphere;
use crate::camera::Camera;

/// Light kind, values match the shader-side `u_light_type` encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum LightType {
    Point = 0,
    Spot = 1,
    Directional = 2,
}

impl LightType {
    /// Sentinel `u_light_type` value for "no light bound"
    pub const NO_LIGHT: i32 = 3;

    pub fn as_uniform(&self) -> i32 {
        *self as i32
    }
}

/// Where a light's cell sits in the shadow atlas, in UV space
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtlasRect {
    pub offset: Vec2,
    pub scale: f32,
}

impl AtlasRect {
    /// Packed as `(u, v, scale)` for the shader
    pub fn to_vec3(&self) -> Vec3 {
        Vec3::new(self.offset.x, self.offset.y, self.scale)
    }

    /// Whether two rectangles share any area
    pub fn overlaps(&self, other: &AtlasRect) -> bool {
        let eps = 1e-6;
        self.offset.x + self.scale > other.offset.x + eps
            && other.offset.x + other.scale > self.offset.x + eps
            && self.offset.y + self.scale > other.offset.y + eps
            && other.offset.y + other.scale > self.offset.y + eps
    }
}

/// Depth-only shadow target owned by a single light
#[derive(Debug)]
pub struct ShadowMap {
    target: RenderTargetId,
    depth: TextureId,
    resolution: u32,
}

impl ShadowMap {
    pub fn allocate(device: &mut dyn GraphicsDevice, resolution: u32) -> Result<Self> {
        let target = device.create_render_target(&RenderTargetDesc::depth_only(
            "shadow_map",
            resolution,
            resolution,
        ))?;
        let depth = match device.depth_attachment(target) {
            Some(depth) => depth,
            None => {
                device.destroy_render_target(target);
                return Err(umbra_core::DeviceError::UnknownRenderTarget(target));
            }
        };
        log::info!("Allocated {}x{} shadow map", resolution, resolution);
        Ok(Self {
            target,
            depth,
            resolution,
        })
    }

    pub fn release(self, device: &mut dyn GraphicsDevice) {
        device.destroy_render_target(self.target);
    }

    pub fn target(&self) -> RenderTargetId {
        self.target
    }

    pub fn depth_texture(&self) -> TextureId {
        self.depth
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }
}

/// Point, spot or directional light
#[derive(Debug)]
pub struct LightEntity {
    pub light_type: LightType,
    /// sRGB color, linearized at upload
    pub color: Vec3,
    pub intensity: f32,
    pub max_distance: f32,
    /// Spot half-angle in degrees
    pub cone_angle: f32,
    /// Half-extent of the directional shadow box
    pub area_size: f32,
    pub spot_exponent: f32,
    pub shadow_bias: f32,
    pub cast_shadows: bool,
    /// Light-space camera used for the shadow pass
    pub camera: Camera,
    /// Cell assigned this frame in atlas mode
    pub atlas_rect: Option<AtlasRect>,
    shadow_map: Option<ShadowMap>,
}

impl LightEntity {
    pub fn new(light_type: LightType) -> Self {
        let shadow_bias = match light_type {
            LightType::Spot => 0.03,
            LightType::Directional => 0.005,
            LightType::Point => 0.0,
        };
        Self {
            light_type,
            color: Vec3::ONE,
            intensity: 1.0,
            max_distance: 100.0,
            cone_angle: 45.0,
            area_size: 1000.0,
            spot_exponent: 10.0,
            shadow_bias,
            cast_shadows: false,
            camera: Camera::default(),
            atlas_rect: None,
            shadow_map: None,
        }
    }

    pub fn point(color: Vec3, intensity: f32, max_distance: f32) -> Self {
        Self {
            color,
            intensity,
            max_distance,
            ..Self::new(LightType::Point)
        }
    }

    pub fn spot(color: Vec3, intensity: f32, max_distance: f32, cone_angle: f32) -> Self {
        Self {
            color,
            intensity,
            max_distance,
            cone_angle,
            ..Self::new(LightType::Spot)
        }
    }

    pub fn directional(color: Vec3, intensity: f32, area_size: f32, max_distance: f32) -> Self {
        Self {
            color,
            intensity,
            area_size,
            max_distance,
            ..Self::new(LightType::Directional)
        }
    }

    pub fn with_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    /// Shadow-casting and not a point light
    pub fn needs_shadow_map(&self) -> bool {
        self.cast_shadows && self.light_type != LightType::Point
    }

    pub fn shadow_map(&self) -> Option<&ShadowMap> {
        self.shadow_map.as_ref()
    }

    /// Make the owned shadow target match `resolution`.
    ///
    /// Lights that do not need a shadow map have theirs released. Returns
    /// whether a new target was allocated.
    pub fn ensure_shadow_map(&mut self, device: &mut dyn GraphicsDevice, resolution: u32) -> Result<bool> {
        if !self.needs_shadow_map() {
            self.release_shadow_map(device);
            return Ok(false);
        }
        if let Some(map) = &self.shadow_map {
            if map.resolution() == resolution {
                return Ok(false);
            }
        }
        self.release_shadow_map(device);
        self.shadow_map = Some(ShadowMap::allocate(device, resolution)?);
        Ok(true)
    }

    pub fn release_shadow_map(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(map) = self.shadow_map.take() {
            map.release(device);
        }
    }

    /// Cosine of the cone angle, as compared against in the shader
    pub fn cutoff(&self) -> f32 {
        self.cone_angle.to_radians().cos()
    }

    /// Influence volume used for camera culling
    pub fn bounding_sphere(&self, model: &Mat4) -> Sphere {
        let position = light_position(model);
        match self.light_type {
            LightType::Spot => Sphere::from_cone(
                position,
                light_direction(model),
                self.max_distance,
                self.cone_angle.to_radians(),
            ),
            _ => Sphere::new(position, self.max_distance),
        }
    }

    /// Directional lights always pass; the rest are sphere-culled
    pub fn is_visible(&self, model: &Mat4, camera: &Camera) -> bool {
        match self.light_type {
            LightType::Directional => true,
            _ => camera.test_sphere(&self.bounding_sphere(model)),
        }
    }
}

/// World position of a light
pub fn light_position(model: &Mat4) -> Vec3 {
    model.w_axis.truncate()
}

/// Direction a light points along, the model's +Z axis
pub fn light_direction(model: &Mat4) -> Vec3 {
    model.z_axis.truncate().normalize_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_core::HeadlessDevice;

    #[test]
    fn test_default_bias_by_type() {
        assert!((LightEntity::new(LightType::Spot).shadow_bias - 0.03).abs() < 1e-6);
        assert!((LightEntity::new(LightType::Directional).shadow_bias - 0.005).abs() < 1e-6);
    }

    #[test]
    fn test_point_light_never_allocates() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut light = LightEntity::point(Vec3::ONE, 1.0, 10.0).with_shadows(true);
        assert!(!light.ensure_shadow_map(&mut device, 1024).unwrap());
        assert!(light.shadow_map().is_none());
        assert_eq!(device.render_target_count(), 0);
    }

    #[test]
    fn test_non_casting_light_never_allocates() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut light = LightEntity::spot(Vec3::ONE, 1.0, 10.0, 30.0);
        assert!(!light.ensure_shadow_map(&mut device, 1024).unwrap());
        assert!(light.shadow_map().is_none());
    }

    #[test]
    fn test_resolution_change_reallocates() {
        let mut device = HeadlessDevice::new(8, 8);
        let mut light = LightEntity::directional(Vec3::ONE, 1.0, 100.0, 500.0).with_shadows(true);
        assert!(light.ensure_shadow_map(&mut device, 1024).unwrap());
        assert!(!light.ensure_shadow_map(&mut device, 1024).unwrap());
        assert!(light.ensure_shadow_map(&mut device, 4096).unwrap());

        assert_eq!(light.shadow_map().map(ShadowMap::resolution), Some(4096));
        assert_eq!(device.render_target_count(), 1);
        assert_eq!(device.depth_targets_with_size(4096), 1);
    }

    #[test]
    fn test_atlas_rect_overlap() {
        let a = AtlasRect { offset: Vec2::new(0.0, 0.0), scale: 0.5 };
        let b = AtlasRect { offset: Vec2::new(0.5, 0.0), scale: 0.5 };
        let c = AtlasRect { offset: Vec2::new(0.25, 0.25), scale: 0.5 };
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
    }

    #[test]
    fn test_light_culling() {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);

        let light = LightEntity::point(Vec3::ONE, 1.0, 5.0);
        let ahead = Mat4::from_translation(Vec3::new(0.0, 0.0, -20.0));
        let behind = Mat4::from_translation(Vec3::new(0.0, 0.0, 50.0));
        assert!(light.is_visible(&ahead, &camera));
        assert!(!light.is_visible(&behind, &camera));

        let sun = LightEntity::directional(Vec3::ONE, 1.0, 100.0, 500.0);
        assert!(sun.is_visible(&behind, &camera));
    }
}
