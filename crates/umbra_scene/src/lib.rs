//! # umbra_scene - Scene Model
//!
//! The data the renderer consumes:
//! - [`Scene`]: ordered entities plus the asset store
//! - [`Entity`]/[`EntityKind`]: prefabs, lights, probes, grids, reflection probes, decals
//! - [`Camera`], [`Aabb`] and [`Frustum`] for culling
//! - [`LightEntity`] with its owned shadow map
//! - [`IrradianceGrid`] and spherical-harmonics projection
//!
//! ## Example
//!
//! ```ignore
//! use umbra_scene::prelude::*;
//!
//! let mut scene = Scene::new();
//! let light = LightEntity::directional(Vec3::ONE, 1.0, 100.0, 500.0).with_shadows(true);
//! scene.add_light("sun", Mat4::IDENTITY, light);
//! ```

pub mod assets;
pub mod bounds;
pub mod camera;
pub mod entity;
pub mod light;
pub mod prefab;
pub mod probe;
pub mod scene;
pub mod sh;

pub use assets::{AlphaMode, Assets, Material, MaterialHandle, Mesh, MeshHandle};
pub use bounds::{Aabb, Frustum, Plane, Sphere};
pub use camera::{Camera, Projection};
pub use entity::{Entity, EntityId, EntityKind};
pub use light::{light_direction, light_position, AtlasRect, LightEntity, LightType, ShadowMap};
pub use prefab::{Node, Prefab};
pub use probe::{
    DecalEntity, IrradianceGrid, Probe, ReflectionProbeEntity, DEFAULT_PROBE_SCALE,
    REFLECTION_PROBE_SIZE,
};
pub use scene::Scene;
pub use sh::{compute_sh, FloatImage, SphericalHarmonics, CUBE_FACE_ORIENTATION, SH_COEFFICIENTS};

/// Prelude for common imports
pub mod prelude {
    pub use crate::assets::*;
    pub use crate::bounds::{Aabb, Sphere};
    pub use crate::camera::Camera;
    pub use crate::entity::{Entity, EntityId, EntityKind};
    pub use crate::light::{LightEntity, LightType};
    pub use crate::prefab::{Node, Prefab};
    pub use crate::probe::{DecalEntity, IrradianceGrid, ReflectionProbeEntity};
    pub use crate::scene::Scene;
    pub use glam::{Mat4, UVec3, Vec3, Vec4};
}
