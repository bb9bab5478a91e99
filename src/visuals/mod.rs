pub mod manager;
pub mod scene;
pub mod transfer;

pub use manager::{PlacementResult, VisualAnchorEntry, VisualAnchorManager};
pub use scene::{AnchorId, EntityId, EntityKind, RecordingScene, ScenePort, SharedScene};
pub use transfer::{TransferAnimator, TransferPath, TransferPhase};
