//! Fixed-function pipeline state
//!
//! The renderer resets blend and depth state after every mesh-with-material
//! draw, so none of these values are assumed to persist between unrelated
//! draws.

use serde::{Deserialize, Serialize};

/// Blend equation presets used by the passes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BlendMode {
    /// Blending off, source replaces destination
    #[default]
    Disabled,
    /// `SRC_ALPHA, ONE_MINUS_SRC_ALPHA`
    Alpha,
    /// `ONE, ONE`
    Additive,
    /// `SRC_ALPHA, ONE`
    AlphaAdditive,
    /// `ONE, ONE_MINUS_SRC_ALPHA`
    Premultiplied,
}

impl BlendMode {
    /// Combine a source texel with the destination texel.
    pub fn apply(&self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0; 4];
        for i in 0..4 {
            out[i] = match self {
                Self::Disabled => src[i],
                Self::Alpha => src[i] * src[3] + dst[i] * (1.0 - src[3]),
                Self::Additive => src[i] + dst[i],
                Self::AlphaAdditive => src[i] * src[3] + dst[i],
                Self::Premultiplied => src[i] + dst[i] * (1.0 - src[3]),
            };
        }
        out
    }
}

/// Depth comparison function
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
    Equal,
    Greater,
    GreaterEqual,
    Always,
}

/// Face culling
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CullMode {
    None,
    #[default]
    Back,
    Front,
}

/// Winding that defines a front face
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrontFace {
    #[default]
    Ccw,
    Cw,
}
