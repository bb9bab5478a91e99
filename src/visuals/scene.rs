use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use glam::{Quat, Vec3};

use crate::detection::ActionKind;

/// Handle to a visual entity owned by the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId(pub u64);

/// Handle to a persistent spatial anchor owned by the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorId(pub u64);

/// What a spawned entity represents. The host decides how each kind is
/// rendered; the pipeline only positions and toggles them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A hand cue demonstrating one action.
    HandCue(ActionKind),
    /// Small diamond marking the exact surface intersection.
    IntersectionMarker,
    /// The cue that travels the arched transfer path.
    TransferCue,
}

/// Minimal contract with the rendering engine: create, position and destroy
/// visual entities, and pin groups of them to persistent spatial anchors so
/// they stay fixed under environment re-localization.
pub trait ScenePort: Send {
    fn spawn(&mut self, kind: EntityKind) -> EntityId;
    fn set_transform(&mut self, id: EntityId, position: Vec3, rotation: Quat);
    fn set_visible(&mut self, id: EntityId, visible: bool);
    fn set_parent(&mut self, child: EntityId, parent: EntityId);
    fn destroy(&mut self, id: EntityId);

    fn create_anchor(&mut self, position: Vec3) -> AnchorId;
    fn attach_to_anchor(&mut self, anchor: AnchorId, entity: EntityId);
    fn destroy_anchor(&mut self, anchor: AnchorId);
}

/// Clone-able handle sharing one scene between the anchor manager and its
/// host (or a test inspecting placements).
#[derive(Debug)]
pub struct SharedScene<S: ScenePort>(Arc<Mutex<S>>);

impl<S: ScenePort> Clone for SharedScene<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S: ScenePort> SharedScene<S> {
    pub fn new(scene: S) -> Self {
        Self(Arc::new(Mutex::new(scene)))
    }

    pub fn lock(&self) -> MutexGuard<'_, S> {
        self.0.lock().unwrap()
    }
}

impl<S: ScenePort> ScenePort for SharedScene<S> {
    fn spawn(&mut self, kind: EntityKind) -> EntityId {
        self.lock().spawn(kind)
    }

    fn set_transform(&mut self, id: EntityId, position: Vec3, rotation: Quat) {
        self.lock().set_transform(id, position, rotation);
    }

    fn set_visible(&mut self, id: EntityId, visible: bool) {
        self.lock().set_visible(id, visible);
    }

    fn set_parent(&mut self, child: EntityId, parent: EntityId) {
        self.lock().set_parent(child, parent);
    }

    fn destroy(&mut self, id: EntityId) {
        self.lock().destroy(id);
    }

    fn create_anchor(&mut self, position: Vec3) -> AnchorId {
        self.lock().create_anchor(position)
    }

    fn attach_to_anchor(&mut self, anchor: AnchorId, entity: EntityId) {
        self.lock().attach_to_anchor(anchor, entity);
    }

    fn destroy_anchor(&mut self, anchor: AnchorId) {
        self.lock().destroy_anchor(anchor);
    }
}

/// In-memory scene: every placement allocates a fresh entity and records
/// its state. This is the injectable pool used by tests and headless hosts;
/// core logic never branches on whether the scene is "real".
#[derive(Debug, Default)]
pub struct RecordingScene {
    next_id: u64,
    entities: HashMap<EntityId, RecordedEntity>,
    anchors: HashMap<AnchorId, Vec3>,
}

#[derive(Debug, Clone)]
pub struct RecordedEntity {
    pub kind: EntityKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub visible: bool,
    pub parent: Option<EntityId>,
    pub anchor: Option<AnchorId>,
}

impl RecordingScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, id: EntityId) -> Option<RecordedEntity> {
        self.entities.get(&id).cloned()
    }

    pub fn live_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn live_anchors(&self) -> usize {
        self.anchors.len()
    }

    pub fn anchor_position(&self, anchor: AnchorId) -> Option<Vec3> {
        self.anchors.get(&anchor).copied()
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.kind == kind)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_by_key(|id| id.0);
        ids
    }
}

impl ScenePort for RecordingScene {
    fn spawn(&mut self, kind: EntityKind) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(
            id,
            RecordedEntity {
                kind,
                position: Vec3::ZERO,
                rotation: Quat::IDENTITY,
                visible: true,
                parent: None,
                anchor: None,
            },
        );
        id
    }

    fn set_transform(&mut self, id: EntityId, position: Vec3, rotation: Quat) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.position = position;
            entity.rotation = rotation;
        }
    }

    fn set_visible(&mut self, id: EntityId, visible: bool) {
        if let Some(entity) = self.entities.get_mut(&id) {
            entity.visible = visible;
        }
    }

    fn set_parent(&mut self, child: EntityId, parent: EntityId) {
        if let Some(entity) = self.entities.get_mut(&child) {
            entity.parent = Some(parent);
        }
    }

    fn destroy(&mut self, id: EntityId) {
        self.entities.remove(&id);
    }

    fn create_anchor(&mut self, position: Vec3) -> AnchorId {
        self.next_id += 1;
        let id = AnchorId(self.next_id);
        self.anchors.insert(id, position);
        id
    }

    fn attach_to_anchor(&mut self, anchor: AnchorId, entity: EntityId) {
        if let Some(stored) = self.entities.get_mut(&entity) {
            stored.anchor = Some(anchor);
        }
    }

    fn destroy_anchor(&mut self, anchor: AnchorId) {
        self.anchors.remove(&anchor);
    }
}
