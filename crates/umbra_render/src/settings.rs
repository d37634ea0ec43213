//! Render Settings
//!
//! Everything the caller can configure about a frame, with serde support so
//! a settings file can be loaded and saved as JSON.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which pipeline renders opaque geometry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RenderMode {
    Forward,
    #[default]
    Deferred,
}

/// How forward shading iterates lights
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LightMode {
    /// Every light packed into one draw, shadows from the shared atlas
    SinglePass,
    /// One additive draw per light, shadows from per-light maps
    #[default]
    MultiPass,
}

/// Lighting equation selector, values match `u_light_eq`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(i32)]
pub enum LightEquation {
    Phong = 0,
    DirectLambert = 1,
    #[default]
    DirectBurley = 2,
}

impl LightEquation {
    /// Sentinel `u_light_eq` value: skip direct lighting entirely
    pub const NO_EQ: i32 = 3;

    pub fn as_uniform(&self) -> i32 {
        *self as i32
    }
}

/// Quality tier, drives shadow map and atlas cell resolution
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum QualityTier {
    #[default]
    Low = 0,
    Medium = 1,
    High = 2,
    Ultra = 3,
}

impl QualityTier {
    pub fn index(&self) -> u32 {
        *self as u32
    }

    /// Shadow map side: `1024 * 2^tier`
    pub fn shadow_resolution(&self) -> u32 {
        1024 << self.index()
    }

    pub fn from_index(index: u32) -> Self {
        match index {
            0 => Self::Low,
            1 => Self::Medium,
            2 => Self::High,
            _ => Self::Ultra,
        }
    }
}

/// How prefab node transforms are combined while building draw calls
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransformComposition {
    /// `root * node.local` at every depth; intermediate levels do not compose
    #[default]
    RootOnly,
    /// `parent_world * node.local`, full hierarchy composition
    Accumulated,
}

/// Screen-space ambient occlusion parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsaoSettings {
    pub enabled: bool,
    /// Kernel sample count (1-256)
    pub samples: u32,
    pub intensity: f32,
    /// Hemisphere kernel oriented by the surface normal
    pub plus: bool,
    pub bias: f32,
    pub blur: bool,
}

impl Default for SsaoSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            samples: 64,
            intensity: 1.0,
            plus: true,
            bias: 0.005,
            blur: true,
        }
    }
}

/// Debug overlays drawn after post-processing
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugViews {
    /// Four-way split of the g-buffer targets
    pub show_gbuffers: bool,
    /// Split metallic/occlusion/roughness instead of the raw targets
    pub show_material_channels: bool,
    pub show_probes: bool,
    pub show_reflection_probes: bool,
    /// Shadow map of the light at this index in the frame's light list
    pub depth_viewport: Option<usize>,
}

/// Global render configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub render_mode: RenderMode,
    pub light_mode: LightMode,
    pub light_eq: LightEquation,
    pub quality: QualityTier,
    /// Percentage-closer filtering of shadow lookups
    pub pcf: bool,
    /// Raise colors to `gamma` before upload
    pub linearize_colors: bool,
    pub composition: TransformComposition,

    // Tone mapping
    pub tone_mapping: bool,
    pub hdr_scale: f32,
    pub average_lum: f32,
    pub white_lum: f32,
    pub gamma: f32,

    // Indirect lighting
    pub irradiance: bool,
    pub trilinear: bool,
    pub reflections: bool,

    /// Dithered transparency in the g-buffer instead of a forward overlay
    pub dithering: bool,
    pub volumetric: bool,
    pub air_density: f32,

    pub ssao: SsaoSettings,

    // Post-processing
    pub fxaa: bool,
    pub bloom: bool,
    pub bloom_threshold: f32,
    pub bloom_soft_threshold: f32,
    /// Separable blur passes feeding bloom and depth of field
    pub blur_iterations: u32,
    pub dof: bool,
    pub focal_distance: f32,
    pub dof_near: f32,
    pub dof_far: f32,
    pub motion_blur: bool,
    pub chromatic_aberration: bool,
    pub lens_distortion: f32,
    pub grain: bool,
    pub noise_amount: f32,

    pub debug: DebugViews,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Deferred,
            light_mode: LightMode::MultiPass,
            light_eq: LightEquation::DirectBurley,
            quality: QualityTier::Low,
            pcf: false,
            linearize_colors: true,
            composition: TransformComposition::RootOnly,
            tone_mapping: true,
            hdr_scale: 1.0,
            average_lum: 2.5,
            white_lum: 10.0,
            gamma: 2.2,
            irradiance: false,
            trilinear: true,
            reflections: false,
            dithering: false,
            volumetric: false,
            air_density: 0.002,
            ssao: SsaoSettings::default(),
            fxaa: false,
            bloom: false,
            bloom_threshold: 1.0,
            bloom_soft_threshold: 0.5,
            blur_iterations: 10,
            dof: false,
            focal_distance: 500.0,
            dof_near: 100.0,
            dof_far: 500.0,
            motion_blur: false,
            chromatic_aberration: false,
            lens_distortion: 0.5,
            grain: false,
            noise_amount: 0.5,
            debug: DebugViews::default(),
        }
    }
}

impl RenderSettings {
    /// Forward pipeline with the given light mode, everything else default
    pub fn forward(light_mode: LightMode) -> Self {
        Self {
            render_mode: RenderMode::Forward,
            light_mode,
            ..Default::default()
        }
    }

    /// Deferred pipeline (always multi-pass)
    pub fn deferred() -> Self {
        Self::default()
    }

    /// Clamp values to valid ranges and resolve conflicting modes
    pub fn validate(&mut self) {
        if self.render_mode == RenderMode::Deferred {
            self.light_mode = LightMode::MultiPass;
        }
        self.blur_iterations = self.blur_iterations.min(64);
        self.ssao.samples = self.ssao.samples.clamp(1, 256);
        if self.gamma.is_nan() || self.gamma <= 0.0 {
            self.gamma = 2.2;
        }
        self.air_density = self.air_density.max(0.0);
        self.noise_amount = self.noise_amount.max(0.0);
        self.dof_far = self.dof_far.max(self.dof_near);
    }

    /// Parse and validate settings from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.validate();
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Gamma applied when linearizing colors, 1 when disabled
    pub fn color_gamma(&self) -> f32 {
        if self.linearize_colors {
            self.gamma
        } else {
            1.0
        }
    }
}
