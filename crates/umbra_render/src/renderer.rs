//! Renderer - per-frame orchestration
//!
//! Owns everything that outlives a frame: screen-sized targets, the SSAO
//! targets and kernel, the shadow atlas, baked irradiance and the previous
//! view-projection used by motion blur. Lights keep their own shadow maps.
//!
//! A frame runs in a fixed order:
//!
//! 1. draw-call list and light gathering
//! 2. shadow maps or atlas cells
//! 3. forward or deferred pipeline into the illumination target
//! 4. probe gizmos
//! 5. post-processing, ending in the default framebuffer
//! 6. debug overlays

use glam::Mat4;
use umbra_core::{GraphicsDevice, Rect, TextureId};
use umbra_scene::{Camera, Scene};

use crate::context::RenderContext;
use crate::debug::{render_overlays, render_probe_gizmos, OverlaySources};
use crate::deferred::{create_noise_texture, render_deferred_pipeline, GBufferTextures};
use crate::error::Result;
use crate::forward::render_forward_pipeline;
use crate::irradiance::IrradianceCache;
use crate::lights::GatheredLights;
use crate::postfx::{run_post_chain, PostFxFrame};
use crate::render_call::RenderCallList;
use crate::settings::{LightMode, QualityTier, RenderMode, RenderSettings};
use crate::shadow::{render_shadow_jobs, ShadowSystem};
use crate::ssao::Ssao;
use crate::stats::FrameStats;
use crate::targets::{color_texture, depth_texture, ScreenTargets};
use crate::view::FrameView;

#[derive(Debug)]
pub struct Renderer {
    settings: RenderSettings,
    shadows: ShadowSystem,
    targets: Option<ScreenTargets>,
    ssao: Ssao,
    irradiance: Option<IrradianceCache>,
    noise: Option<TextureId>,
    reflections_calculated: bool,
    prev_view_projection: Option<Mat4>,
    stats: FrameStats,
}

impl Renderer {
    pub fn new(mut settings: RenderSettings) -> Self {
        settings.validate();
        Self {
            ssao: Ssao::new(&settings.ssao),
            settings,
            shadows: ShadowSystem::new(),
            targets: None,
            irradiance: None,
            noise: None,
            reflections_calculated: false,
            prev_view_projection: None,
            stats: FrameStats::default(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Statistics of the last rendered frame
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn shadows(&self) -> &ShadowSystem {
        &self.shadows
    }

    pub fn targets(&self) -> Option<&ScreenTargets> {
        self.targets.as_ref()
    }

    pub fn irradiance(&self) -> Option<&IrradianceCache> {
        self.irradiance.as_ref()
    }

    pub fn reflections_calculated(&self) -> bool {
        self.reflections_calculated
    }

    /// Replace every setting at once, applying the same side effects as
    /// the individual setters.
    pub fn apply_settings(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        mut settings: RenderSettings,
    ) -> Result<()> {
        settings.validate();
        let old = std::mem::replace(&mut self.settings, settings);
        if old.quality != self.settings.quality {
            self.reallocate_shadow_maps(device, scene)?;
            self.shadows.invalidate_atlas(device);
        } else if old.light_mode != self.settings.light_mode {
            self.shadows.invalidate_atlas(device);
        }
        Ok(())
    }

    /// Change the quality tier, reallocating every shadow target
    pub fn set_quality(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene, quality: QualityTier) -> Result<()> {
        self.settings.quality = quality;
        self.reallocate_shadow_maps(device, scene)?;
        self.shadows.invalidate_atlas(device);
        Ok(())
    }

    pub fn set_render_mode(&mut self, device: &mut dyn GraphicsDevice, mode: RenderMode) {
        let light_mode = self.settings.light_mode;
        self.settings.render_mode = mode;
        self.settings.validate();
        if self.settings.light_mode != light_mode {
            self.shadows.invalidate_atlas(device);
        }
    }

    /// Change the light mode; deferred rendering stays multi-pass
    pub fn set_light_mode(&mut self, device: &mut dyn GraphicsDevice, mode: LightMode) {
        if self.settings.render_mode == RenderMode::Deferred && mode == LightMode::SinglePass {
            log::warn!("Deferred rendering is always multi-pass, ignoring single-pass");
            return;
        }
        if self.settings.light_mode != mode {
            self.settings.light_mode = mode;
            self.shadows.invalidate_atlas(device);
        }
    }

    fn reallocate_shadow_maps(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) -> Result<()> {
        let resolution = self.settings.quality.shadow_resolution();
        let mut count = 0;
        for entity in scene.entities_mut() {
            if let Some(light) = entity.as_light_mut() {
                if light.ensure_shadow_map(device, resolution)? {
                    count += 1;
                }
            }
        }
        log::info!("Reallocated {} shadow maps at {}x{}", count, resolution, resolution);
        Ok(())
    }

    /// Rebuild every screen-sized target for a new surface size
    pub fn resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        if let Some(targets) = self.targets.take() {
            targets.release(device);
        }
        self.targets = Some(ScreenTargets::create(device, width, height)?);
        self.ssao.resize(device, width, height)?;
        Ok(())
    }

    fn ensure_targets(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Result<()> {
        if self.targets.as_ref().map(ScreenTargets::size) == Some((width, height)) {
            return Ok(());
        }
        self.resize(device, width, height)
    }

    /// Destroy every GPU resource the renderer owns
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(targets) = self.targets.take() {
            targets.release(device);
        }
        self.ssao.release(device);
        self.shadows.invalidate_atlas(device);
        if let Some(cache) = self.irradiance.take() {
            cache.release(device);
        }
        if let Some(noise) = self.noise.take() {
            device.destroy_texture(noise);
        }
        self.prev_view_projection = None;
    }

    /// Bake the scene's first irradiance grid into spherical harmonics
    pub fn bake_irradiance(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) -> Result<()> {
        let mut stats = FrameStats::default();
        crate::irradiance::bake_irradiance(device, scene, &self.settings, &mut self.irradiance, &mut stats)?;
        log::debug!("Irradiance bake submitted {} draws", stats.draws_submitted);
        Ok(())
    }

    /// Capture every reflection probe, returning how many were baked
    pub fn bake_reflections(&mut self, device: &mut dyn GraphicsDevice, scene: &mut Scene) -> Result<usize> {
        let mut stats = FrameStats::default();
        let baked = crate::reflection::bake_reflections(device, scene, &self.settings, &mut stats)?;
        self.reflections_calculated = true;
        Ok(baked)
    }

    /// Render one frame of `scene` seen from `camera` to the default framebuffer.
    ///
    /// Recoverable problems are counted in the returned statistics. A
    /// post-processing stage without its shader ends the frame with an
    /// error and nothing is presented.
    pub fn render_frame(
        &mut self,
        device: &mut dyn GraphicsDevice,
        scene: &mut Scene,
        camera: &Camera,
        ctx: &RenderContext,
    ) -> Result<FrameStats> {
        let mut stats = FrameStats::default();
        self.ensure_targets(device, ctx.width, ctx.height)?;
        if self.settings.volumetric && self.noise.is_none() {
            match create_noise_texture(device) {
                Ok(noise) => self.noise = Some(noise),
                Err(err) => log::debug!("Volumetric noise unavailable: {}", err),
            }
        }

        let list = RenderCallList::build(scene, camera, self.settings.composition);
        stats.draw_calls_built = list.calls.len() as u32;
        stats.draws_skipped += list.skipped;
        let lights = GatheredLights::gather(scene, camera, self.settings.render_mode);
        stats.lights_gathered = lights.len() as u32;

        let jobs = self.shadows.prepare(device, scene, &lights, &self.settings, &mut stats);
        render_shadow_jobs(device, scene, &list.calls, &jobs, &mut stats);

        let Some(targets) = self.targets.as_ref() else {
            return Ok(stats);
        };
        let scene: &Scene = scene;
        let mut view = FrameView::new(scene, camera, &self.settings, &list.calls, Rect::full(ctx.width, ctx.height))
            .with_lights(&lights.lights, lights.directional);
        if self.settings.light_mode == LightMode::SinglePass {
            view.atlas_depth = self.shadows.atlas().map(|atlas| atlas.depth_texture());
        }
        view.irradiance = self.irradiance.as_ref();
        view.reflections_ready = self.reflections_calculated;

        let ao = match self.settings.render_mode {
            RenderMode::Forward => {
                render_forward_pipeline(device, &view, targets.illumination, &mut stats);
                None
            }
            RenderMode::Deferred => {
                render_deferred_pipeline(device, &view, targets, &mut self.ssao, self.noise, &mut stats)
            }
        };

        device.bind_render_target(Some(targets.illumination));
        device.set_viewport(view.viewport);
        render_probe_gizmos(device, &view, &mut stats);

        let frame = PostFxFrame {
            prev_view_projection: self.prev_view_projection.unwrap_or(camera.view_projection),
            time: ctx.time,
        };
        let post = run_post_chain(device, &view, targets, frame, &mut stats);
        self.prev_view_projection = Some(camera.view_projection);
        if let Err(err) = post {
            self.stats = stats;
            return Err(err);
        }

        let debug = &self.settings.debug;
        if debug.show_gbuffers || debug.depth_viewport.is_some() {
            match (
                color_texture(device, targets.blurred, 0),
                depth_texture(device, targets.illumination),
            ) {
                (Ok(blurred), Ok(illumination_depth)) => {
                    let gbuffers = match self.settings.render_mode {
                        RenderMode::Deferred => GBufferTextures::fetch(device, targets.gbuffers).ok(),
                        RenderMode::Forward => None,
                    };
                    let sources = OverlaySources {
                        gbuffers,
                        blurred,
                        illumination_depth,
                        ao,
                    };
                    render_overlays(device, &view, &sources, &mut stats);
                }
                _ => stats.skip_pass("debug overlays", "screen attachments missing"),
            }
        }

        for err in device.take_errors() {
            log::warn!("Device reported: {}", err);
        }
        log::trace!(
            "Frame done: {} draws, {} skipped passes",
            stats.draws_submitted,
            stats.passes_skipped
        );
        self.stats = stats.clone();
        Ok(stats)
    }
}
