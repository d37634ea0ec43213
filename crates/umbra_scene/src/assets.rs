//! Meshes, materials and the handle store that owns them
//!
//! Loading is someone else's job; by the time an asset lands here its
//! geometry already lives on the device and only the bounding box, vertex
//! count and material parameters are kept on the CPU side.

use glam::{Vec3, Vec4};
use serde::{Deserialize, Serialize};
use umbra_core::{Handle, HandleMap, MeshId, TextureId};

use crate::bounds::Aabb;

pub type MeshHandle = Handle<Mesh>;
pub type MaterialHandle = Handle<Material>;

/// Material transparency mode, ordered from opaque to blended
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Alpha-tested against `alpha_cutoff`
    Mask,
    Blend,
}

/// Renderable geometry already uploaded to the device
#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub gpu: MeshId,
    pub vertex_count: u32,
    /// Object-space bounds
    pub bounds: Aabb,
}

impl Mesh {
    pub fn new(name: impl Into<String>, gpu: MeshId, vertex_count: u32, bounds: Aabb) -> Self {
        Self {
            name: name.into(),
            gpu,
            vertex_count,
            bounds,
        }
    }
}

/// Surface parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Base color (sRGB, alpha in `w`)
    pub color: Vec4,
    pub emissive_factor: Vec3,
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub two_sided: bool,
    pub color_texture: Option<TextureId>,
    pub emissive_texture: Option<TextureId>,
    pub metallic_roughness_texture: Option<TextureId>,
    pub normal_texture: Option<TextureId>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Vec4::ONE,
            emissive_factor: Vec3::ZERO,
            metallic_factor: 0.0,
            roughness_factor: 1.0,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            two_sided: false,
            color_texture: None,
            emissive_texture: None,
            metallic_roughness_texture: None,
            normal_texture: None,
        }
    }
}

impl Material {
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    pub fn with_alpha_mode(mut self, alpha_mode: AlphaMode) -> Self {
        self.alpha_mode = alpha_mode;
        self
    }

    pub fn with_emissive(mut self, emissive: Vec3) -> Self {
        self.emissive_factor = emissive;
        self
    }

    /// Cutoff uploaded to shaders, zero unless alpha-tested
    pub fn effective_alpha_cutoff(&self) -> f32 {
        if self.alpha_mode == AlphaMode::Mask {
            self.alpha_cutoff
        } else {
            0.0
        }
    }
}

/// Owner of every mesh and material in a scene
#[derive(Default)]
pub struct Assets {
    pub meshes: HandleMap<Mesh>,
    pub materials: HandleMap<Material>,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshHandle {
        self.meshes.insert(mesh)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.materials.insert(material)
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_mode_order() {
        assert!(AlphaMode::Opaque < AlphaMode::Mask);
        assert!(AlphaMode::Mask < AlphaMode::Blend);
    }

    #[test]
    fn test_effective_cutoff() {
        let mut material = Material::default();
        material.alpha_cutoff = 0.3;
        assert_eq!(material.effective_alpha_cutoff(), 0.0);
        material.alpha_mode = AlphaMode::Mask;
        assert_eq!(material.effective_alpha_cutoff(), 0.3);
    }

    #[test]
    fn test_removed_material_is_unresolvable() {
        let mut assets = Assets::new();
        let handle = assets.add_material(Material::default());
        assert!(assets.material(handle).is_some());
        assets.materials.remove(handle);
        assert!(assets.material(handle).is_none());
    }
}
