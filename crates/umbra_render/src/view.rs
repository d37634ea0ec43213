//! Read-only inputs shared by the passes of one frame
//!
//! The draw-call list and light list are built once per frame and only
//! read afterwards; passes receive them through a [`FrameView`].

use umbra_core::{Rect, TextureId};
use umbra_scene::{Camera, EntityId, Scene};

use crate::irradiance::IrradianceCache;
use crate::render_call::RenderCall;
use crate::settings::RenderSettings;

#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    pub settings: &'a RenderSettings,
    pub calls: &'a [RenderCall],
    /// Lights shaded per surface or per volume
    pub lights: &'a [EntityId],
    /// Deferred full-screen directional light
    pub directional: Option<EntityId>,
    pub atlas_depth: Option<TextureId>,
    pub irradiance: Option<&'a IrradianceCache>,
    pub reflections_ready: bool,
    pub ao_texture: Option<TextureId>,
    pub viewport: Rect,
}

impl<'a> FrameView<'a> {
    pub fn new(
        scene: &'a Scene,
        camera: &'a Camera,
        settings: &'a RenderSettings,
        calls: &'a [RenderCall],
        viewport: Rect,
    ) -> Self {
        Self {
            scene,
            camera,
            settings,
            calls,
            lights: &[],
            directional: None,
            atlas_depth: None,
            irradiance: None,
            reflections_ready: false,
            ao_texture: None,
            viewport,
        }
    }

    pub fn with_lights(mut self, lights: &'a [EntityId], directional: Option<EntityId>) -> Self {
        self.lights = lights;
        self.directional = directional;
        self
    }

    /// Gamma for color linearization
    pub fn gamma(&self) -> f32 {
        self.settings.color_gamma()
    }
}
