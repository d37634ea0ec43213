//! Frame Statistics
//!
//! Counters for one rendered frame. Recoverable problems (malformed draw
//! calls, passes skipped for a missing shader, truncated light lists) end up
//! here rather than in an error.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameStats {
    /// Calls produced by scene traversal
    pub draw_calls_built: u32,
    /// Mesh draws handed to the device, all passes included
    pub draws_submitted: u32,
    /// Calls dropped for a missing mesh, material or zero vertices
    pub draws_skipped: u32,
    /// Calls outside the view frustum of the pass camera
    pub draws_culled: u32,
    /// Passes not run because their shader or target was unavailable
    pub passes_skipped: u32,
    pub shadow_passes: u32,
    pub atlas_cells: u32,
    pub lights_gathered: u32,
    /// Lights uploaded by the last single-pass draw
    pub lights_packed: u32,
    /// The single-pass light list exceeded its capacity
    pub lights_truncated: bool,
    pub postfx_stages: u32,
}

impl FrameStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub(crate) fn skip_pass(&mut self, pass: &str, reason: &str) {
        self.passes_skipped += 1;
        log::debug!("Skipping {} pass: {}", pass, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset() {
        let mut stats = FrameStats {
            draws_submitted: 10,
            lights_truncated: true,
            ..Default::default()
        };
        stats.skip_pass("ssao", "no shader");
        assert_eq!(stats.passes_skipped, 1);
        stats.reset();
        assert_eq!(stats, FrameStats::default());
    }

    #[test]
    fn test_serializes_to_json() {
        let stats = FrameStats {
            shadow_passes: 2,
            ..Default::default()
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["shadow_passes"], serde_json::json!(2));
        assert_eq!(value["lights_truncated"], serde_json::json!(false));
    }
}
