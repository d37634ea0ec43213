//! Render Resources - GPU resource descriptors
//!
//! Opaque identifiers and creation descriptors for the resources the
//! renderer asks a [`GraphicsDevice`](crate::GraphicsDevice) to manage.
//! Identifiers are plain indices issued by the device; the device owns the
//! underlying storage.

use serde::{Deserialize, Serialize};

/// Device-issued texture identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextureId(pub u32);

/// Device-issued render target (framebuffer) identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RenderTargetId(pub u32);

/// Device-issued geometry buffer identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MeshId(pub u32);

/// Texture format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    R8Unorm,
    Rgb8Unorm,
    Rgba8Unorm,
    Rgb16Float,
    Rgba16Float,
    Rgb32Float,
    Rgba32Float,
    Depth24Plus,
    Depth32Float,
}

impl TextureFormat {
    /// Check if this is a depth format
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth24Plus | Self::Depth32Float)
    }

    /// Check if this format stores unclamped floats
    pub fn is_float(&self) -> bool {
        matches!(
            self,
            Self::Rgb16Float | Self::Rgba16Float | Self::Rgb32Float | Self::Rgba32Float | Self::Depth32Float
        )
    }

    /// Number of stored channels per texel
    pub fn channels(&self) -> usize {
        match self {
            Self::R8Unorm | Self::Depth24Plus | Self::Depth32Float => 1,
            Self::Rgb8Unorm | Self::Rgb16Float | Self::Rgb32Float => 3,
            Self::Rgba8Unorm | Self::Rgba16Float | Self::Rgba32Float => 4,
        }
    }
}

/// Texture dimensionality
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureKind {
    Texture2D,
    Cubemap,
}

impl TextureKind {
    /// Number of array layers (faces) backing this kind
    pub fn layers(&self) -> usize {
        match self {
            Self::Texture2D => 1,
            Self::Cubemap => 6,
        }
    }
}

/// Sampling filter
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
    /// Trilinear filtering through the mip chain
    LinearMipmap,
}

/// Cubemap face, in the conventional +X, -X, +Y, -Y, +Z, -Z order
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// Texture creation descriptor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub kind: TextureKind,
    pub filter: FilterMode,
}

impl TextureDesc {
    /// 2D texture with linear filtering
    pub fn new_2d(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
            kind: TextureKind::Texture2D,
            filter: FilterMode::Linear,
        }
    }

    /// Square cubemap
    pub fn cubemap(label: impl Into<String>, size: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width: size,
            height: size,
            format,
            kind: TextureKind::Cubemap,
            filter: FilterMode::LinearMipmap,
        }
    }

    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }

    /// Number of floats backing one face
    pub fn face_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.channels()
    }
}

/// Render target creation descriptor
///
/// Each entry of `color` becomes one color attachment, in order. The
/// optional depth attachment is shared by every color attachment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderTargetDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub color: Vec<TextureFormat>,
    pub depth: Option<TextureFormat>,
}

impl RenderTargetDesc {
    /// Target with the given color attachments and no depth
    pub fn color(label: impl Into<String>, width: u32, height: u32, color: &[TextureFormat]) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            color: color.to_vec(),
            depth: None,
        }
    }

    /// Depth-only target (shadow maps, atlas)
    pub fn depth_only(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            color: Vec::new(),
            depth: Some(TextureFormat::Depth24Plus),
        }
    }

    pub fn with_depth(mut self) -> Self {
        self.depth = Some(TextureFormat::Depth24Plus);
        self
    }
}

/// Pixel rectangle, origin at the bottom-left corner
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle covering a whole surface
    pub const fn full(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    /// Intersection of two rectangles, `None` when disjoint
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.intersect(other).is_some()
    }
}

/// Which attachments a clear touches
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClearMask {
    pub color: bool,
    pub depth: bool,
}

impl ClearMask {
    pub const COLOR: Self = Self { color: true, depth: false };
    pub const DEPTH: Self = Self { color: false, depth: true };
    pub const ALL: Self = Self { color: true, depth: true };
}

/// Meshes every backend provides without asset loading
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinMesh {
    /// Full-screen quad in clip space
    Quad,
    /// Unit sphere, used for light volumes, sky and probe gizmos
    Sphere,
    /// Unit cube, used for decal volumes
    Cube,
}

/// 1x1 textures bound when a material slot is empty
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallbackTexture {
    White,
    Black,
    /// Metallic 0, roughness 1 in the green channel
    Green,
}

impl FallbackTexture {
    pub fn rgba(&self) -> [f32; 4] {
        match self {
            Self::White => [1.0, 1.0, 1.0, 1.0],
            Self::Black => [0.0, 0.0, 0.0, 1.0],
            Self::Green => [0.0, 1.0, 0.0, 1.0],
        }
    }
}
