use std::collections::HashMap;

use super::FrozenPose;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Identifies one capture: which instruction, which picture within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoseKey {
    pub instruction: usize,
    pub picture: usize,
}

impl PoseKey {
    pub fn new(instruction: usize, picture: usize) -> Self {
        Self {
            instruction,
            picture,
        }
    }
}

/// Owns the frozen poses of in-flight captures.
///
/// At most one live pose per key. Poses are write-once, read-once: `freeze`
/// installs, `take` consumes for spatial resolution, `release` drops
/// whatever is left and is safe to call repeatedly.
#[derive(Debug, Default)]
pub struct PoseRegistry {
    poses: HashMap<PoseKey, FrozenPose>,
}

impl PoseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn freeze(&mut self, key: PoseKey, pose: FrozenPose) {
        if self.poses.insert(key, pose).is_some() {
            log_warn!(
                "replaced live pose snapshot for instruction {} picture {}",
                key.instruction,
                key.picture
            );
        }
    }

    pub fn take(&mut self, key: PoseKey) -> Option<FrozenPose> {
        self.poses.remove(&key)
    }

    pub fn release(&mut self, key: PoseKey) {
        self.poses.remove(&key);
    }

    pub fn contains(&self, key: PoseKey) -> bool {
        self.poses.contains_key(&key)
    }

    pub fn live_count(&self) -> usize {
        self.poses.len()
    }
}
