use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds of a single capture -> detect -> resolve -> anchor chain.
///
/// Every variant is recovered at the chain level: the failing chain's
/// instruction is left without an updated cue and the shell is notified,
/// but the workflow state machine keeps running.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The camera failed to produce a photo, or the photo could not be
    /// written to disk.
    #[error("capture failed: {0}")]
    Capture(String),

    /// The capture carried no location data; spatial resolution is skipped.
    #[error("capture has no location data")]
    MissingPose,

    /// Network or server failure while talking to the vision service.
    /// Not retried automatically.
    #[error("detection request failed: {0}")]
    DetectionTransport(String),

    /// The ray-cast found no surface within the maximum distance.
    #[error("no surface hit for detection ray")]
    NoSurfaceHit,

    /// Submission referenced an instruction outside the current set.
    /// Rejected before any network call.
    #[error("instruction index {index} out of range ({count} instructions)")]
    OutOfRangeInstruction { index: usize, count: usize },

    /// Submission referenced an image file that is absent or empty.
    /// Rejected before any network call.
    #[error("image file missing or empty: {}", .0.display())]
    MissingImageFile(PathBuf),
}

impl PipelineError {
    /// Short machine-readable tag used in events surfaced to the shell.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::Capture(_) => "capture-failed",
            PipelineError::MissingPose => "missing-pose",
            PipelineError::DetectionTransport(_) => "detection-failed",
            PipelineError::NoSurfaceHit => "no-surface-hit",
            PipelineError::OutOfRangeInstruction { .. } => "instruction-out-of-range",
            PipelineError::MissingImageFile(_) => "missing-image-file",
        }
    }
}
