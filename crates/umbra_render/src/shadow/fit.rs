//! Light-space camera fitting

use glam::Mat4;
use umbra_scene::{light_direction, light_position, LightEntity, LightType};

/// Near plane of every shadow camera
pub const SHADOW_NEAR: f32 = 0.1;

/// Point the light's camera along its model and fit the projection.
///
/// Spot lights get a square perspective covering twice the cone angle.
/// Directional lights get an orthographic box of `area_size` whose view
/// translation is snapped to whole shadow-map texels, so the map does not
/// shimmer while the light moves. Point lights are left untouched.
pub fn fit_shadow_camera(light: &mut LightEntity, model: &Mat4, resolution: u32) {
    let position = light_position(model);
    let front = light_direction(model);
    let up = model.y_axis.truncate().normalize_or_zero();
    let camera = &mut light.camera;

    match light.light_type {
        LightType::Point => {}
        LightType::Spot => {
            camera.set_perspective(light.cone_angle * 2.0, 1.0, SHADOW_NEAR, light.max_distance);
            camera.look_at(position, position + front, up);
        }
        LightType::Directional => {
            let half = light.area_size;
            camera.set_orthographic(-half, half, -half, half, SHADOW_NEAR, light.max_distance);
            camera.look_at(position, position + front, up);

            let width = camera.ortho_width().unwrap_or(half * 2.0);
            let grid = width / resolution.max(1) as f32;
            if grid > 0.0 {
                camera.view.w_axis.x = (camera.view.w_axis.x / grid).round() * grid;
                camera.view.w_axis.y = (camera.view.w_axis.y / grid).round() * grid;
                camera.update_view_projection();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use umbra_scene::Projection;

    #[test]
    fn test_spot_uses_double_cone_angle() {
        let mut light = LightEntity::spot(Vec3::ONE, 1.0, 40.0, 30.0);
        let model = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
        fit_shadow_camera(&mut light, &model, 1024);

        assert_eq!(
            light.camera.projection,
            Projection::Perspective {
                fov: 60.0,
                aspect: 1.0
            }
        );
        assert_eq!(light.camera.far, 40.0);
        assert!((light.camera.front() - Vec3::Z).length() < 1e-5);
    }

    #[test]
    fn test_directional_view_is_texel_snapped() {
        let mut light = LightEntity::directional(Vec3::ONE, 1.0, 64.0, 500.0);
        let model = Mat4::from_translation(Vec3::new(3.3, 7.7, 0.0));
        fit_shadow_camera(&mut light, &model, 128);

        let grid = 128.0 / 128.0;
        let x = light.camera.view.w_axis.x / grid;
        let y = light.camera.view.w_axis.y / grid;
        assert!((x - x.round()).abs() < 1e-4);
        assert!((y - y.round()).abs() < 1e-4);
        assert_eq!(light.camera.view_projection, light.camera.proj * light.camera.view);
    }

    #[test]
    fn test_snapping_is_stable_under_subtexel_motion() {
        let mut a = LightEntity::directional(Vec3::ONE, 1.0, 64.0, 500.0);
        let mut b = LightEntity::directional(Vec3::ONE, 1.0, 64.0, 500.0);
        fit_shadow_camera(&mut a, &Mat4::from_translation(Vec3::new(10.1, 0.0, 0.0)), 128);
        fit_shadow_camera(&mut b, &Mat4::from_translation(Vec3::new(10.2, 0.0, 0.0)), 128);
        assert_eq!(a.camera.view.w_axis.x, b.camera.view.w_axis.x);
    }

    #[test]
    fn test_point_light_untouched() {
        let mut light = LightEntity::point(Vec3::ONE, 1.0, 10.0);
        let before = light.camera.view_projection;
        fit_shadow_camera(&mut light, &Mat4::from_translation(Vec3::X), 1024);
        assert_eq!(light.camera.view_projection, before);
    }
}
