//! Per-frame render context passed explicitly into every frame

use serde::{Deserialize, Serialize};

/// Window dimensions and time for one frame
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderContext {
    pub width: u32,
    pub height: u32,
    /// Seconds since start, drives time-varying effects such as grain
    pub time: f32,
}

impl RenderContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            time: 0.0,
        }
    }

    pub fn with_time(mut self, time: f32) -> Self {
        self.time = time;
        self
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}
