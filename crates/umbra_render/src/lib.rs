//! # umbra_render - Render Orchestration
//!
//! Turns a [`Scene`](umbra_scene::Scene) into device commands through one of
//! two pipelines:
//! - Forward, multi-pass (one additive draw per light, per-light shadow maps)
//! - Forward, single-pass (packed light list, shared shadow atlas)
//! - Deferred (g-buffers, decals, SSAO, full-screen resolve, light volumes)
//!
//! Both end in the same post-processing chain, and both read the offline
//! irradiance and reflection bakes when they exist.
//!
//! ## Example
//!
//! ```ignore
//! use umbra_render::prelude::*;
//!
//! let mut renderer = Renderer::new(RenderSettings::deferred());
//! renderer.bake_irradiance(&mut device, &mut scene)?;
//! let stats = renderer.render_frame(&mut device, &mut scene, &camera, &RenderContext::new(1280, 720))?;
//! log::debug!("{} draws", stats.draws_submitted);
//! ```

pub mod context;
pub mod debug;
pub mod deferred;
pub mod error;
pub mod forward;
pub mod irradiance;
pub mod lighting;
pub mod lights;
pub mod postfx;
pub mod reflection;
pub mod render_call;
pub mod renderer;
pub mod settings;
pub mod shadow;
pub mod ssao;
pub mod stats;
pub mod targets;
pub mod view;

pub use context::RenderContext;
pub use error::{RenderError, Result};
pub use irradiance::IrradianceCache;
pub use lights::GatheredLights;
pub use render_call::{RenderCall, RenderCallList};
pub use renderer::Renderer;
pub use settings::{
    DebugViews, LightEquation, LightMode, QualityTier, RenderMode, RenderSettings, SsaoSettings,
    TransformComposition,
};
pub use shadow::{ShadowAtlas, ShadowSystem};
pub use stats::FrameStats;

/// Prelude for common imports
pub mod prelude {
    pub use crate::context::RenderContext;
    pub use crate::error::{RenderError, Result};
    pub use crate::renderer::Renderer;
    pub use crate::settings::*;
    pub use crate::stats::FrameStats;
}
