//! Bounding volumes and frustum tests
//!
//! Mesh bounds are stored in object space and moved to world space with
//! [`Aabb::transform`] before culling. Frustum planes are extracted from a
//! view-projection matrix with the Gribb/Hartmann method and point inward.

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Inverted box that any point expands
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_to_include(self, point: Vec3) -> Self {
        Self {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// World-space box enclosing this box under `matrix`
    pub fn transform(&self, matrix: &Mat4) -> Self {
        self.corners()
            .iter()
            .fold(Self::EMPTY, |acc, c| acc.expand_to_include(matrix.transform_point3(*c)))
    }
}

/// Bounding sphere
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Tightest sphere around a cone with apex `origin`, axis `direction`,
    /// length `length` and half-angle `half_angle` (radians)
    pub fn from_cone(origin: Vec3, direction: Vec3, length: f32, half_angle: f32) -> Self {
        let direction = direction.normalize_or_zero();
        if half_angle > std::f32::consts::FRAC_PI_4 {
            Self::new(
                origin + half_angle.cos() * length * direction,
                half_angle.sin() * length,
            )
        } else {
            let radius = length / (2.0 * half_angle.cos());
            Self::new(origin + radius * direction, radius)
        }
    }
}

/// Plane `normal . p + distance = 0`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    /// Normalized plane from raw `(a, b, c, d)` coefficients
    fn from_coefficients(v: Vec4) -> Self {
        let normal = v.truncate();
        let len = normal.length();
        if len > 1e-10 {
            Self {
                normal: normal / len,
                distance: v.w / len,
            }
        } else {
            Self {
                normal: Vec3::Y,
                distance: 0.0,
            }
        }
    }

    #[inline]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }
}

/// Six inward-facing planes: left, right, bottom, top, near, far
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let r0 = vp.row(0);
        let r1 = vp.row(1);
        let r2 = vp.row(2);
        let r3 = vp.row(3);

        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Conservative box test using the corner furthest along each normal
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.planes.iter().all(|plane| {
            let p = Vec3::new(
                if plane.normal.x >= 0.0 { aabb.max.x } else { aabb.min.x },
                if plane.normal.y >= 0.0 { aabb.max.y } else { aabb.min.y },
                if plane.normal.z >= 0.0 { aabb.max.z } else { aabb.min.z },
            );
            plane.distance_to_point(p) >= 0.0
        })
    }

    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(point) >= 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_frustum() -> Frustum {
        let proj = Mat4::perspective_rh_gl(60f32.to_radians(), 1.0, 0.1, 100.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_transform_aabb() {
        let unit = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let moved = unit.transform(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert!((moved.center() - Vec3::new(10.0, 0.0, 0.0)).length() < 0.001);
        assert!((moved.half_extents() - Vec3::ONE).length() < 0.001);
    }

    #[test]
    fn test_frustum_aabb() {
        let frustum = test_frustum();
        let ahead = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE);
        let behind = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        let far_away = Aabb::from_center_half_extents(Vec3::new(0.0, 0.0, -500.0), Vec3::ONE);

        assert!(frustum.intersects_aabb(&ahead));
        assert!(!frustum.intersects_aabb(&behind));
        assert!(!frustum.intersects_aabb(&far_away));
    }

    #[test]
    fn test_frustum_sphere() {
        let frustum = test_frustum();
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, -5.0), 1.0)));
        // Behind the eye but large enough to reach the near plane
        assert!(frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 2.0), 3.0)));
        assert!(!frustum.intersects_sphere(&Sphere::new(Vec3::new(0.0, 0.0, 5.0), 1.0)));
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -50.0)));
    }

    #[test]
    fn test_cone_sphere() {
        let narrow = Sphere::from_cone(Vec3::ZERO, Vec3::Z, 10.0, 10f32.to_radians());
        assert!(narrow.center.z > 0.0);
        // The cone tip and the far end of the axis are both inside
        assert!(narrow.center.distance(Vec3::ZERO) <= narrow.radius + 0.001);
        assert!(narrow.center.distance(Vec3::new(0.0, 0.0, 10.0)) <= narrow.radius + 0.001);

        let wide = Sphere::from_cone(Vec3::ZERO, Vec3::Z, 10.0, 80f32.to_radians());
        assert!((wide.radius - 80f32.to_radians().sin() * 10.0).abs() < 0.001);
    }
}
