pub mod registry;
pub mod snapshot;

pub use registry::{PoseKey, PoseRegistry};
pub use snapshot::{FrozenPose, Ray};
