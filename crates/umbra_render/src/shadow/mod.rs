//! Shadow Subsystem
//!
//! Per frame, every visible shadow-casting spot or directional light goes
//! through three steps:
//!
//! 1. its depth target is made ready: a per-light map at the quality tier's
//!    resolution in multi-pass mode, or a cell of the shared atlas in
//!    single-pass mode
//! 2. its light-space camera is fitted ([`fit_shadow_camera`])
//! 3. opaque casters inside its frustum are drawn depth-only
//!
//! With no shadow casters the whole subsystem is a no-op and the atlas is
//! never allocated.

mod atlas;
mod fit;
mod pass;

pub use atlas::{cells_per_side, ShadowAtlas};
pub use fit::{fit_shadow_camera, SHADOW_NEAR};
pub use pass::{render_shadow_jobs, ShadowJob, SHADOWMAP_SHADER};

use umbra_core::GraphicsDevice;
use umbra_scene::Scene;

use crate::lights::GatheredLights;
use crate::settings::{LightMode, RenderSettings};
use crate::stats::FrameStats;

/// Owner of the shadow atlas and scheduler of shadow jobs
#[derive(Debug, Default)]
pub struct ShadowSystem {
    atlas: Option<ShadowAtlas>,
}

impl ShadowSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atlas(&self) -> Option<&ShadowAtlas> {
        self.atlas.as_ref()
    }

    /// Drop the atlas; it is reallocated on next use
    pub fn invalidate_atlas(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(atlas) = self.atlas.take() {
            atlas.release(device);
        }
    }

    /// Ready depth targets and light cameras, returning the passes to run
    pub fn prepare(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        lights: &GatheredLights,
        settings: &RenderSettings,
        stats: &mut FrameStats,
    ) -> Vec<ShadowJob> {
        if lights.shadow_casters == 0 {
            return Vec::new();
        }
        match settings.light_mode {
            LightMode::MultiPass => self.prepare_maps(device, scene, lights, settings, stats),
            LightMode::SinglePass => self.prepare_atlas(device, scene, lights, settings, stats),
        }
    }

    fn prepare_maps(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        lights: &GatheredLights,
        settings: &RenderSettings,
        stats: &mut FrameStats,
    ) -> Vec<ShadowJob> {
        let resolution = settings.quality.shadow_resolution();
        let mut jobs = Vec::new();

        for id in lights.all() {
            let Some(entity) = scene.entity_mut(id) else {
                continue;
            };
            let model = entity.model;
            let Some(light) = entity.as_light_mut() else {
                continue;
            };
            if !light.needs_shadow_map() {
                continue;
            }
            if let Err(err) = light.ensure_shadow_map(device, resolution) {
                log::warn!("Shadow map for {:?} unavailable: {}", id, err);
                stats.skip_pass("shadow", "shadow map allocation failed");
                continue;
            }
            let Some(target) = light.shadow_map().map(|m| m.target()) else {
                continue;
            };

            fit_shadow_camera(light, &model, resolution);
            jobs.push(ShadowJob {
                light: id,
                target,
                view_projection: light.camera.view_projection,
                cell: None,
                resolution,
            });
        }
        jobs
    }

    fn prepare_atlas(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        lights: &GatheredLights,
        settings: &RenderSettings,
        stats: &mut FrameStats,
    ) -> Vec<ShadowJob> {
        if self.atlas.is_none() {
            let resolution = settings.quality.shadow_resolution();
            match ShadowAtlas::allocate(device, resolution, lights.shadow_casters) {
                Ok(atlas) => self.atlas = Some(atlas),
                Err(err) => {
                    log::warn!("Shadow atlas unavailable: {}", err);
                    stats.skip_pass("shadow", "atlas allocation failed");
                    return Vec::new();
                }
            }
        }
        let Some(atlas) = self.atlas.as_ref() else {
            return Vec::new();
        };

        let mut jobs = Vec::new();
        let mut cell = 0;
        for id in lights.all() {
            let Some(entity) = scene.entity_mut(id) else {
                continue;
            };
            let model = entity.model;
            let Some(light) = entity.as_light_mut() else {
                continue;
            };
            light.atlas_rect = None;
            if !light.needs_shadow_map() {
                continue;
            }
            let (Some(uv), Some(rect)) = (atlas.cell_uv(cell), atlas.cell_rect(cell)) else {
                log::debug!("Shadow atlas full, {:?} renders without shadow", id);
                continue;
            };

            light.atlas_rect = Some(uv);
            fit_shadow_camera(light, &model, atlas.cell_resolution());
            jobs.push(ShadowJob {
                light: id,
                target: atlas.target(),
                view_projection: light.camera.view_projection,
                cell: Some(rect),
                resolution: atlas.cell_resolution(),
            });
            cell += 1;
        }

        stats.atlas_cells = cell as u32;
        jobs
    }
}
