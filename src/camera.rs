use anyhow::Result;
use glam::Mat4;

/// Camera pose reported by the device for the exact frame a photo was taken.
///
/// Matrices follow the OpenGL convention: the camera looks down its negative
/// Z axis, and `camera_to_world` maps camera-space points into world space.
#[derive(Debug, Clone, Copy)]
pub struct CameraPoseSample {
    pub projection: Mat4,
    pub camera_to_world: Mat4,
    /// Pixel size of the interactive camera's viewport. This is generally
    /// not the photo resolution; detections are rescaled between the two.
    pub viewport_width: u32,
    pub viewport_height: u32,
}

/// One photo taken by the device camera.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Absent when the platform could not provide location data for the
    /// frame. The pipeline treats that as recoverable: the image is still
    /// stored, spatial resolution is skipped.
    pub pose: Option<CameraPoseSample>,
}

/// Boundary to the physical camera hardware.
///
/// `capture` blocks until the photo is ready; callers run it through
/// `tokio::task::spawn_blocking` so other chains keep making progress.
pub trait CameraRig: Send + Sync {
    fn capture(&self) -> Result<CapturedFrame>;
}
