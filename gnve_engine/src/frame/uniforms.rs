//! Per-frame uniform block and the orbit camera that fills it

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

use super::window::Extent2D;

/// Uniform buffer contents bound at descriptor binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

/// Camera orbiting `target` on the horizontal plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub target: Vec3,
    pub distance: f32,
    pub height: f32,
    /// Radians per second
    pub orbit_speed: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: 3.0,
            height: 1.0,
            orbit_speed: 0.5,
            fov_y: 45f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Eye position after `time` seconds of orbiting
    pub fn eye(&self, time: f32) -> Vec3 {
        let angle = time * self.orbit_speed;
        self.target + Vec3::new(angle.sin() * self.distance, self.height, angle.cos() * self.distance)
    }

    /// Matrices for a frame rendered at `extent`
    ///
    /// The projection flips Y: Vulkan clip space points down.
    pub fn uniforms(&self, time: f32, extent: Extent2D) -> FrameUniforms {
        let view = Mat4::look_at_rh(self.eye(time), self.target, Vec3::Y);
        let mut projection =
            Mat4::perspective_rh(self.fov_y, extent.aspect_ratio(), self.near, self.far);
        projection.y_axis.y *= -1.0;

        FrameUniforms {
            model: Mat4::IDENTITY,
            view,
            projection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_block_is_three_matrices() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 3 * 64);
        let uniforms = FrameUniforms::default();
        assert_eq!(bytemuck::bytes_of(&uniforms).len(), 192);
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let flipped = camera.uniforms(0.0, Extent2D::new(800, 600));
        let plain = Mat4::perspective_rh(camera.fov_y, 800.0 / 600.0, camera.near, camera.far);
        assert_eq!(flipped.projection.y_axis.y, -plain.y_axis.y);
        assert_eq!(flipped.projection.x_axis.x, plain.x_axis.x);
    }

    #[test]
    fn test_zero_extent_does_not_produce_nan() {
        let uniforms = Camera::default().uniforms(1.0, Extent2D::new(0, 0));
        assert!(!uniforms.projection.is_nan());
    }

    #[test]
    fn test_eye_stays_at_orbit_distance() {
        let camera = Camera::default();
        for t in [0.0, 1.0, 2.5] {
            let eye = camera.eye(t);
            let flat = Vec3::new(eye.x, 0.0, eye.z);
            assert!((flat.length() - camera.distance).abs() < 1e-4);
        }
    }
}
