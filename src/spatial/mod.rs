pub mod mesh;

pub use mesh::TriangleMesh;

use glam::{Vec2, Vec3};

use crate::pose::{FrozenPose, Ray};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Rays further than this are treated as misses. The environment mesh only
/// extends a few meters around the user anyway.
pub const MAX_RAY_DISTANCE: f32 = 20.0;

/// Which geometry a ray-cast is allowed to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLayer {
    /// The reconstructed environment mesh; cues are only placed on it.
    Spatial,
    /// Everything else (hands, UI panels, debug geometry).
    Other,
}

/// Where a detection ray met the environment.
#[derive(Debug, Clone, Copy)]
pub struct SpatialHit {
    pub point: Vec3,
    pub normal: Vec3,
    pub distance: f32,
}

/// Read-only view of the live environment mesh.
pub trait EnvironmentMesh: Send + Sync {
    /// Nearest intersection of `ray` with geometry on `layer`, if any.
    fn raycast(&self, ray: &Ray, layer: SurfaceLayer) -> Option<SpatialHit>;
}

/// Convert a 2D detection into a 3D surface hit using the frozen pose of
/// the capture that produced the image.
///
/// `image_point` is in detection-image pixel space with a top-left origin;
/// `image_size` is that image's resolution, which may differ from the
/// frozen camera's viewport.
pub fn resolve(
    image_point: Vec2,
    image_size: (u32, u32),
    pose: &FrozenPose,
    mesh: &dyn EnvironmentMesh,
    layer: SurfaceLayer,
) -> Option<SpatialHit> {
    let screen = image_to_screen(image_point, image_size, pose);
    let ray = pose.screen_point_to_ray(screen);

    match mesh.raycast(&ray, layer) {
        Some(hit) if hit.distance <= MAX_RAY_DISTANCE => {
            log_info!(
                "detection ({:.0}, {:.0}) resolved to ({:.2}, {:.2}, {:.2}) at {:.2}m",
                image_point.x,
                image_point.y,
                hit.point.x,
                hit.point.y,
                hit.point.z,
                hit.distance
            );
            Some(hit)
        }
        Some(hit) => {
            log_warn!(
                "surface hit at {:.1}m is beyond the {:.0}m limit, treating as miss",
                hit.distance,
                MAX_RAY_DISTANCE
            );
            None
        }
        None => {
            log_warn!("no depth was found for detection ray");
            None
        }
    }
}

/// Rescale a detection-image pixel into the frozen camera's pixel space and
/// flip the vertical axis (image origin is top-left, screen rays use a
/// bottom-left origin).
pub fn image_to_screen(image_point: Vec2, image_size: (u32, u32), pose: &FrozenPose) -> Vec2 {
    let width_scale = pose.pixel_width as f32 / image_size.0 as f32;
    let height_scale = pose.pixel_height as f32 / image_size.1 as f32;

    Vec2::new(
        image_point.x * width_scale,
        pose.pixel_height as f32 - image_point.y * height_scale,
    )
}
