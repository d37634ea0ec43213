//! Camera used for the main view, shadow casters and probe captures
//!
//! Matrices follow the OpenGL clip-space convention (right handed, depth in
//! `[-1, 1]`). The view-projection is cached and must be refreshed with
//! [`Camera::update_view_projection`] after editing `view` directly, which
//! the shadow fit does when it snaps the view translation to texels.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::bounds::{Aabb, Frustum, Sphere};

/// Projection type
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Projection {
    Perspective {
        /// Vertical field of view in degrees
        fov: f32,
        aspect: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
    },
}

/// Camera for rendering
#[derive(Clone, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub center: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub near: f32,
    pub far: f32,
    pub view: Mat4,
    pub proj: Mat4,
    pub view_projection: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        let mut camera = Self {
            eye: Vec3::new(0.0, 0.0, 1.0),
            center: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::Perspective {
                fov: 45.0,
                aspect: 1.0,
            },
            near: 0.1,
            far: 10000.0,
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
        };
        camera.update_view();
        camera.update_projection();
        camera
    }
}

impl Camera {
    /// Perspective camera, `fov` in degrees
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self::default();
        camera.set_perspective(fov, aspect, near, far);
        camera
    }

    pub fn look_at(&mut self, eye: Vec3, center: Vec3, up: Vec3) {
        self.eye = eye;
        self.center = center;
        self.up = up;
        self.update_view();
    }

    pub fn set_perspective(&mut self, fov: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective { fov, aspect };
        self.near = near;
        self.far = far;
        self.update_projection();
    }

    pub fn set_orthographic(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.projection = Projection::Orthographic {
            left,
            right,
            bottom,
            top,
        };
        self.near = near;
        self.far = far;
        self.update_projection();
    }

    fn update_view(&mut self) {
        self.view = Mat4::look_at_rh(self.eye, self.center, self.up);
        self.update_view_projection();
    }

    fn update_projection(&mut self) {
        self.proj = match self.projection {
            Projection::Perspective { fov, aspect } => {
                Mat4::perspective_rh_gl(fov.to_radians(), aspect, self.near, self.far)
            }
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
            } => Mat4::orthographic_rh_gl(left, right, bottom, top, self.near, self.far),
        };
        self.update_view_projection();
    }

    pub fn update_view_projection(&mut self) {
        self.view_projection = self.proj * self.view;
    }

    /// Unit vector from eye towards center
    pub fn front(&self) -> Vec3 {
        (self.center - self.eye).normalize_or_zero()
    }

    /// Horizontal extent of an orthographic projection, `None` for perspective
    pub fn ortho_width(&self) -> Option<f32> {
        match self.projection {
            Projection::Orthographic { left, right, .. } => Some(right - left),
            Projection::Perspective { .. } => None,
        }
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection)
    }

    pub fn test_box(&self, aabb: &Aabb) -> bool {
        self.frustum().intersects_aabb(aabb)
    }

    pub fn test_sphere(&self, sphere: &Sphere) -> bool {
        self.frustum().intersects_sphere(sphere)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_front() {
        let mut camera = Camera::perspective(60.0, 1.0, 0.1, 100.0);
        camera.look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        assert!((camera.front() - Vec3::new(0.0, 0.0, -1.0)).length() < 0.001);

        // The target projects to the center of clip space
        let clip = camera.view_projection.project_point3(Vec3::ZERO);
        assert!(clip.x.abs() < 0.001 && clip.y.abs() < 0.001);
    }

    #[test]
    fn test_orthographic_width() {
        let mut camera = Camera::default();
        camera.set_orthographic(-50.0, 50.0, -50.0, 50.0, 0.1, 500.0);
        assert_eq!(camera.ortho_width(), Some(100.0));
        assert!(camera.test_box(&Aabb::from_center_half_extents(
            Vec3::new(0.0, 0.0, -10.0),
            Vec3::ONE
        )));
    }
}
