//! Second-order spherical harmonics and cube-face radiance images
//!
//! A probe capture produces six [`FloatImage`]s, one per cube face in
//! [`CUBE_FACE_ORIENTATION`] order. [`compute_sh`] projects them onto the
//! nine real SH basis functions (bands L0 to L2), weighting every texel by
//! the solid angle it subtends.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Capture direction (`front`, `up`) of each cube face: +X, -X, +Y, -Y, +Z, -Z
pub const CUBE_FACE_ORIENTATION: [(Vec3, Vec3); 6] = [
    (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
    (Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, -1.0, 0.0)),
    (Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    (Vec3::new(0.0, -1.0, 0.0), Vec3::new(0.0, 0.0, -1.0)),
    (Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.0, -1.0, 0.0)),
    (Vec3::new(0.0, 0.0, -1.0), Vec3::new(0.0, -1.0, 0.0)),
];

/// Number of SH coefficients per color channel
pub const SH_COEFFICIENTS: usize = 9;

/// Nine RGB coefficients, 27 floats, laid out as one texture row
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
pub struct SphericalHarmonics {
    pub coeffs: [[f32; 3]; SH_COEFFICIENTS],
}

impl SphericalHarmonics {
    pub fn coefficient(&self, i: usize) -> Vec3 {
        Vec3::from_array(self.coeffs[i])
    }

    /// Coefficients as a flat vector list for `u_coeffs`
    pub fn to_vec3s(&self) -> Vec<Vec3> {
        self.coeffs.iter().map(|c| Vec3::from_array(*c)).collect()
    }

    /// Reconstructed radiance towards `dir`
    pub fn evaluate(&self, dir: Vec3) -> Vec3 {
        let basis = sh_basis(dir.normalize_or_zero());
        basis
            .iter()
            .zip(self.coeffs.iter())
            .fold(Vec3::ZERO, |acc, (b, c)| acc + Vec3::from_array(*c) * *b)
    }
}

/// Real SH basis, bands 0 to 2, evaluated for a unit direction
pub fn sh_basis(d: Vec3) -> [f32; SH_COEFFICIENTS] {
    [
        0.282095,
        0.488603 * d.y,
        0.488603 * d.z,
        0.488603 * d.x,
        1.092548 * d.x * d.y,
        1.092548 * d.y * d.z,
        0.315392 * (3.0 * d.z * d.z - 1.0),
        1.092548 * d.x * d.z,
        0.546274 * (d.x * d.x - d.y * d.y),
    ]
}

/// Floating-point image read back from a capture target
#[derive(Clone, Debug, PartialEq)]
pub struct FloatImage {
    pub width: u32,
    pub height: u32,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl FloatImage {
    /// Wrap tightly packed texels; `None` when the length does not match
    pub fn from_texels(width: u32, height: u32, channels: usize, data: Vec<f32>) -> Option<Self> {
        if channels == 0 || data.len() != width as usize * height as usize * channels {
            return None;
        }
        Some(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Texel as RGB; single-channel images are splatted
    pub fn rgb(&self, x: u32, y: u32) -> Vec3 {
        let base = (y as usize * self.width as usize + x as usize) * self.channels;
        match self.channels {
            1 | 2 => Vec3::splat(self.data[base]),
            _ => Vec3::new(self.data[base], self.data[base + 1], self.data[base + 2]),
        }
    }
}

/// World direction through texel `(u, v)` of a face, `u`,`v` in `[-1, 1]`
/// with `v` growing upwards in image rows
pub fn cube_face_direction(face: usize, u: f32, v: f32) -> Vec3 {
    let (front, up) = CUBE_FACE_ORIENTATION[face];
    let right = front.cross(up);
    (front + right * u + up * v).normalize()
}

/// Project six cube-face radiance images onto spherical harmonics
pub fn compute_sh(images: &[FloatImage; 6]) -> SphericalHarmonics {
    let mut accum = [Vec3::ZERO; SH_COEFFICIENTS];
    let mut total_weight = 0.0f32;

    for (face, image) in images.iter().enumerate() {
        let inv_w = 1.0 / image.width as f32;
        let inv_h = 1.0 / image.height as f32;
        for y in 0..image.height {
            for x in 0..image.width {
                let u = (x as f32 + 0.5) * inv_w * 2.0 - 1.0;
                let v = (y as f32 + 0.5) * inv_h * 2.0 - 1.0;
                let tmp = 1.0 + u * u + v * v;
                let weight = 4.0 / (tmp.sqrt() * tmp);

                let dir = cube_face_direction(face, u, v);
                let radiance = image.rgb(x, y);
                for (c, b) in accum.iter_mut().zip(sh_basis(dir).iter()) {
                    *c += radiance * (*b * weight);
                }
                total_weight += weight;
            }
        }
    }

    let mut sh = SphericalHarmonics::default();
    if total_weight <= 0.0 {
        return sh;
    }
    let norm = 4.0 * std::f32::consts::PI / total_weight;
    for (dst, c) in sh.coeffs.iter_mut().zip(accum.iter()) {
        *dst = (*c * norm).to_array();
    }
    sh
}
