use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::camera::CameraPoseSample;

/// A world-space ray from a frozen camera through a viewport pixel.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn point_at(&self, distance: f32) -> Vec3 {
        self.origin + self.direction * distance
    }
}

/// Projection matrix and world transform of the device camera at the moment
/// a photo was taken.
///
/// Frozen so that later geometric queries use the viewpoint that produced
/// the image, not the live (moved) viewpoint. Write-once: constructed from
/// the capture's pose sample and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct FrozenPose {
    pub projection: Mat4,
    pub position: Vec3,
    pub rotation: Quat,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl FrozenPose {
    /// Freeze the camera state out of a capture's pose sample.
    ///
    /// Camera space matches the OpenGL convention: forward is the negative
    /// Z axis. Position and orientation are derived from the camera-to-world
    /// matrix (position = M * origin, forward = -column 2, up = column 1).
    pub fn from_sample(sample: &CameraPoseSample) -> Self {
        let m = sample.camera_to_world;
        let position = m.transform_point3(Vec3::ZERO);

        let forward = (-m.col(2).xyz()).normalize();
        let up_raw = m.col(1).xyz();
        // Re-orthonormalize in case the platform matrix carries drift.
        let up = (up_raw - forward * forward.dot(up_raw)).normalize();
        let right = forward.cross(up);
        let rotation = Quat::from_mat3(&Mat3::from_cols(right, up, -forward));

        Self {
            projection: sample.projection,
            position,
            rotation,
            pixel_width: sample.viewport_width,
            pixel_height: sample.viewport_height,
        }
    }

    /// Build a world ray from the frozen camera through a viewport pixel.
    ///
    /// `point` is in the frozen camera's pixel space with a bottom-left
    /// origin (image-space detections get flipped before they reach here).
    pub fn screen_point_to_ray(&self, point: Vec2) -> Ray {
        let ndc = Vec2::new(
            (point.x / self.pixel_width as f32) * 2.0 - 1.0,
            (point.y / self.pixel_height as f32) * 2.0 - 1.0,
        );

        // Unproject a near-plane point into camera space.
        let clip = Vec4::new(ndc.x, ndc.y, -1.0, 1.0);
        let eye = self.projection.inverse() * clip;
        let eye = if eye.w.abs() > f32::EPSILON {
            eye.xyz() / eye.w
        } else {
            eye.xyz()
        };

        let direction = (self.rotation * eye.normalize()).normalize();
        Ray {
            origin: self.position,
            direction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn sample_at(position: Vec3) -> CameraPoseSample {
        CameraPoseSample {
            projection: Mat4::perspective_rh_gl(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0),
            camera_to_world: Mat4::from_translation(position),
            viewport_width: 1280,
            viewport_height: 720,
        }
    }

    #[test]
    fn identity_transform_keeps_camera_at_origin_facing_minus_z() {
        let pose = FrozenPose::from_sample(&sample_at(Vec3::ZERO));
        assert!(pose.position.length() < 1e-6);

        let forward = pose.rotation * Vec3::NEG_Z;
        assert!((forward - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn center_pixel_ray_points_along_camera_forward() {
        let pose = FrozenPose::from_sample(&sample_at(Vec3::new(0.5, 1.2, -0.3)));
        let ray = pose.screen_point_to_ray(Vec2::new(640.0, 360.0));

        assert!((ray.origin - Vec3::new(0.5, 1.2, -0.3)).length() < 1e-5);
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-4);
    }

    #[test]
    fn off_center_pixels_diverge_in_the_expected_direction() {
        let pose = FrozenPose::from_sample(&sample_at(Vec3::ZERO));

        // Right half of the viewport bends the ray toward +X.
        let right = pose.screen_point_to_ray(Vec2::new(1280.0, 360.0));
        assert!(right.direction.x > 0.1);

        // Top of the viewport (bottom-left origin) bends toward +Y.
        let top = pose.screen_point_to_ray(Vec2::new(640.0, 720.0));
        assert!(top.direction.y > 0.1);
    }

    #[test]
    fn rotated_camera_rotates_the_ray() {
        // Camera turned 90 degrees to the left: forward becomes -X.
        let sample = CameraPoseSample {
            projection: Mat4::perspective_rh_gl(60f32.to_radians(), 16.0 / 9.0, 0.1, 100.0),
            camera_to_world: Mat4::from_rotation_y(90f32.to_radians()),
            viewport_width: 1280,
            viewport_height: 720,
        };
        let pose = FrozenPose::from_sample(&sample);
        let ray = pose.screen_point_to_ray(Vec2::new(640.0, 360.0));
        assert!((ray.direction - Vec3::NEG_X).length() < 1e-4);
    }
}
