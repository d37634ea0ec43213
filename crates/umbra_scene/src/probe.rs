//! Irradiance grids, their probes, and reflection probes
//!
//! Grid probes are stored flattened in `i + dim.x * (j + dim.y * k)` order,
//! which is also the row they occupy in the baked coefficient texture.

use glam::{Mat4, UVec3, Vec3};
use umbra_core::{GraphicsDevice, Result, TextureDesc, TextureFormat, TextureId};

use crate::sh::SphericalHarmonics;

/// Default gizmo scale for grid probes
pub const DEFAULT_PROBE_SCALE: f32 = 5.0;

/// Default reflection cubemap side
pub const REFLECTION_PROBE_SIZE: u32 = 512;

/// One irradiance sample point
#[derive(Clone, Debug, PartialEq)]
pub struct Probe {
    /// Lattice position in grid space, each axis in `[0, 1)`
    pub local: Vec3,
    /// Flattened lattice index
    pub index: usize,
    /// World placement (translation and gizmo scale)
    pub model: Mat4,
    pub sh: SphericalHarmonics,
}

impl Probe {
    pub fn position(&self) -> Vec3 {
        self.model.w_axis.truncate()
    }
}

/// Regular 3D lattice of irradiance probes
#[derive(Clone, Debug)]
pub struct IrradianceGrid {
    dim: UVec3,
    pub probe_scale: f32,
    probes: Vec<Probe>,
    inv_model: Mat4,
}

impl IrradianceGrid {
    /// Build the lattice for `dim` placed by `model`
    pub fn new(dim: UVec3, probe_scale: f32, model: &Mat4) -> Self {
        let count = (dim.x * dim.y * dim.z) as usize;
        let mut probes = Vec::with_capacity(count);
        for k in 0..dim.z {
            for j in 0..dim.y {
                for i in 0..dim.x {
                    let local = Vec3::new(
                        i as f32 / dim.x as f32,
                        j as f32 / dim.y as f32,
                        k as f32 / dim.z as f32,
                    );
                    probes.push(Probe {
                        local,
                        index: (i + dim.x * (j + dim.y * k)) as usize,
                        model: Mat4::IDENTITY,
                        sh: SphericalHarmonics::default(),
                    });
                }
            }
        }

        let mut grid = Self {
            dim,
            probe_scale,
            probes,
            inv_model: Mat4::IDENTITY,
        };
        grid.update_grid(model);
        grid
    }

    pub fn dim(&self) -> UVec3 {
        self.dim
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    pub fn probes_mut(&mut self) -> &mut [Probe] {
        &mut self.probes
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Flattened index of lattice cell `(i, j, k)`
    pub fn index_of(&self, i: u32, j: u32, k: u32) -> usize {
        (i + self.dim.x * (j + self.dim.y * k)) as usize
    }

    /// World-to-grid transform
    pub fn inv_model(&self) -> Mat4 {
        self.inv_model
    }

    /// Refresh the world-to-grid transform and every probe placement
    pub fn update_grid(&mut self, model: &Mat4) {
        self.inv_model = model.inverse();
        let scale = Mat4::from_scale(Vec3::splat(self.probe_scale));
        for probe in &mut self.probes {
            let world = model.transform_point3(probe.local);
            probe.model = Mat4::from_translation(world) * scale;
        }
    }

    /// Coefficients of every probe, one row each
    pub fn coefficient_rows(&self) -> Vec<SphericalHarmonics> {
        self.probes.iter().map(|p| p.sh).collect()
    }
}

/// Baked environment cubemap placed in the scene
#[derive(Debug)]
pub struct ReflectionProbeEntity {
    pub size: u32,
    cubemap: Option<TextureId>,
}

impl Default for ReflectionProbeEntity {
    fn default() -> Self {
        Self::new(REFLECTION_PROBE_SIZE)
    }
}

impl ReflectionProbeEntity {
    pub fn new(size: u32) -> Self {
        Self { size, cubemap: None }
    }

    /// Cubemap, `None` until the first bake
    pub fn cubemap(&self) -> Option<TextureId> {
        self.cubemap
    }

    /// Allocate the cubemap on first use
    pub fn ensure_cubemap(&mut self, device: &mut dyn GraphicsDevice) -> Result<TextureId> {
        if let Some(cubemap) = self.cubemap {
            return Ok(cubemap);
        }
        let cubemap = device.create_texture(&TextureDesc::cubemap(
            "reflection_probe",
            self.size,
            TextureFormat::Rgb8Unorm,
        ))?;
        self.cubemap = Some(cubemap);
        Ok(cubemap)
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(cubemap) = self.cubemap.take() {
            device.destroy_texture(cubemap);
        }
    }
}

/// Projected decal volume
#[derive(Clone, Debug, Default)]
pub struct DecalEntity {
    pub albedo: Option<TextureId>,
}
