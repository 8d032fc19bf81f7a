//! Orbit camera for the volume scene.
//!
//! The camera sits on a sphere around a fixed orbit center and always looks
//! at a fixed focus point inside the volume. Its inputs are two angles, a
//! radius scale and the surface size; everything derived (eye position and
//! the combined view-projection matrix) is recomputed on every input change,
//! so readers always see a consistent pair.

use glam::{Mat4, Vec3};

/// Point the eye orbits around.
const ORBIT_CENTER: Vec3 = Vec3::new(0.0, 0.5, 0.5);
/// Point the view axis goes through.
const FOCUS: Vec3 = Vec3::new(0.0, 0.0, 0.5);
/// Orbit radius at scale 1.0.
const BASE_RADIUS: f32 = 3.0;
const FOV_Y_DEGREES: f32 = 50.0;
const Z_NEAR: f32 = 0.1;
const Z_FAR: f32 = 10.0;

/// Camera state derived from orbit angles and the surface size.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    elevation: f32,
    azimuth: f32,
    radius_scale: f32,
    width: i32,
    height: i32,
    eye: Vec3,
    view_proj: Mat4,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new()
    }
}

impl OrbitCamera {
    /// A camera at the default viewing angle, sized 1x1 until the first
    /// surface-size update.
    #[must_use]
    pub fn new() -> Self {
        let mut camera = Self {
            elevation: 1.0472,
            azimuth: 0.0,
            radius_scale: 1.0,
            width: 1,
            height: 1,
            eye: Vec3::ZERO,
            view_proj: Mat4::IDENTITY,
        };
        camera.rebuild();
        camera
    }

    pub fn set_surface_size(&mut self, width: i32, height: i32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.rebuild();
    }

    /// Elevation from the vertical axis, in degrees.
    pub fn set_elevation_degrees(&mut self, degrees: f32) {
        self.elevation = degrees.to_radians();
        self.rebuild();
    }

    /// Rotation around the vertical axis, in degrees.
    pub fn set_azimuth_degrees(&mut self, degrees: f32) {
        self.azimuth = degrees.to_radians();
        self.rebuild();
    }

    /// Scale factor on the base orbit radius.
    pub fn set_radius_scale(&mut self, scale: f32) {
        self.radius_scale = scale;
        self.rebuild();
    }

    #[must_use]
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    #[must_use]
    pub fn view_proj(&self) -> Mat4 {
        self.view_proj
    }

    #[must_use]
    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    #[must_use]
    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    #[must_use]
    pub fn radius_scale(&self) -> f32 {
        self.radius_scale
    }

    fn rebuild(&mut self) {
        let radius = BASE_RADIUS * self.radius_scale;
        let offset = Vec3::new(
            self.elevation.sin() * self.azimuth.sin(),
            self.elevation.cos(),
            self.elevation.sin() * self.azimuth.cos(),
        );
        self.eye = ORBIT_CENTER + radius * offset;

        let view = Mat4::look_at_rh(self.eye, FOCUS, Vec3::Y);
        let aspect = self.width as f32 / self.height as f32;
        let proj = Mat4::perspective_rh_gl(FOV_Y_DEGREES.to_radians(), aspect, Z_NEAR, Z_FAR);
        self.view_proj = proj * view;
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_eye_follows_spherical_offset() {
        let mut camera = OrbitCamera::new();
        camera.set_elevation_degrees(90.0);
        camera.set_azimuth_degrees(0.0);

        // sin(90)*sin(0) = 0, cos(90) = 0, sin(90)*cos(0) = 1
        let eye = camera.eye();
        assert!(approx(eye.x, 0.0));
        assert!(approx(eye.y, 0.5));
        assert!(approx(eye.z, 3.5));
    }

    #[test]
    fn test_radius_scale_moves_eye_along_its_ray() {
        let mut camera = OrbitCamera::new();
        camera.set_elevation_degrees(90.0);
        let near = camera.eye();
        camera.set_radius_scale(2.0);
        let far = camera.eye();

        let near_dist = (near - ORBIT_CENTER).length();
        let far_dist = (far - ORBIT_CENTER).length();
        assert!(approx(near_dist, BASE_RADIUS));
        assert!(approx(far_dist, 2.0 * BASE_RADIUS));
    }

    #[test]
    fn test_focus_projects_to_screen_center() {
        let mut camera = OrbitCamera::new();
        camera.set_surface_size(800, 600);

        let clip = camera.view_proj() * FOCUS.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(approx(ndc.x, 0.0));
        assert!(approx(ndc.y, 0.0));
    }

    #[test]
    fn test_degree_setters_store_radians() {
        let mut camera = OrbitCamera::new();
        camera.set_elevation_degrees(60.0);
        camera.set_azimuth_degrees(45.0);
        assert!(approx(camera.elevation(), std::f32::consts::FRAC_PI_3));
        assert!(approx(camera.azimuth(), std::f32::consts::FRAC_PI_4));
    }

    #[test]
    fn test_default_matches_startup_view() {
        let camera = OrbitCamera::new();
        // Defaults sit slightly above the horizon, no azimuth swing.
        assert!(approx(camera.elevation(), 1.0472));
        assert!(approx(camera.azimuth(), 0.0));
        assert!(approx(camera.radius_scale(), 1.0));
        assert!(camera.view_proj().is_finite());
        assert!(camera.elevation() < FRAC_PI_2);
    }

    #[test]
    fn test_aspect_ratio_changes_projection() {
        let mut wide = OrbitCamera::new();
        wide.set_surface_size(1600, 600);
        let mut tall = OrbitCamera::new();
        tall.set_surface_size(600, 1600);
        assert_ne!(wide.view_proj(), tall.view_proj());
    }
}
