use std::collections::HashMap;

use glam::{Mat3, Quat, Vec3};

use super::scene::{AnchorId, EntityId, EntityKind, ScenePort};
use super::transfer::{TransferAnimator, TransferPath, TransferPhase};
use crate::detection::{ActionKind, TransferEndpoint};
use crate::spatial::SpatialHit;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Surface standoff per action kind, in meters. Fixed constants, never
/// computed.
fn standoff(kind: ActionKind) -> f32 {
    match kind {
        ActionKind::Press => 0.20,
        ActionKind::Twist => 0.10,
        ActionKind::Pull => 0.10,
        ActionKind::PickUp => 0.10,
        ActionKind::PutDown => 0.10,
    }
}

/// Roll applied to the intersection marker so the square reads as a diamond.
const MARKER_ROLL_DEGREES: f32 = 45.0;

/// The visual entities representing one instruction's cue, pinned to a
/// persistent spatial anchor.
#[derive(Debug, Clone)]
pub struct VisualAnchorEntry {
    pub entities: Vec<EntityId>,
    pub anchor: AnchorId,
}

/// What `place` did with a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementResult {
    /// A cue entry now exists for the instruction.
    Placed,
    /// One end of a two-point transfer was recorded; the cue appears when
    /// the other end resolves.
    PendingTransfer,
}

#[derive(Debug, Default, Clone, Copy)]
struct TransferDraft {
    source: Option<SpatialHit>,
    destination: Option<SpatialHit>,
}

struct ActiveTransfer {
    cue: EntityId,
    rotation: Quat,
    animator: TransferAnimator,
}

/// Creates, re-parents and destroys the visual entities of each
/// instruction's cue, keyed by instruction index.
///
/// Replacing an instruction's entry always destroys the prior entities and
/// anchor before installing new ones.
pub struct VisualAnchorManager {
    scene: Box<dyn ScenePort>,
    entries: HashMap<usize, VisualAnchorEntry>,
    drafts: HashMap<usize, TransferDraft>,
    transfers: HashMap<usize, ActiveTransfer>,
}

impl VisualAnchorManager {
    pub fn new(scene: Box<dyn ScenePort>) -> Self {
        Self {
            scene,
            entries: HashMap::new(),
            drafts: HashMap::new(),
            transfers: HashMap::new(),
        }
    }

    /// Place (or contribute to) the cue for an instruction from a resolved
    /// surface hit.
    pub fn place(
        &mut self,
        instruction: usize,
        hit: SpatialHit,
        kind: ActionKind,
    ) -> PlacementResult {
        match kind.transfer_endpoint() {
            Some(endpoint) => self.record_transfer_point(instruction, endpoint, hit),
            None => {
                self.place_single(instruction, hit, kind);
                PlacementResult::Placed
            }
        }
    }

    /// Single-point cue: offset from the surface along its normal by the
    /// action's standoff, oriented to face the surface, plus an
    /// intersection marker at the hit point.
    fn place_single(&mut self, instruction: usize, hit: SpatialHit, kind: ActionKind) {
        let position = hit.point + hit.normal * standoff(kind);
        let rotation = look_rotation(-hit.normal, Vec3::Y);

        let cue = self.scene.spawn(EntityKind::HandCue(kind));
        self.scene.set_transform(cue, position, rotation);

        let marker = self.spawn_marker(hit);

        self.install_entry(instruction, vec![cue, marker], position);
        log_info!(
            "placed {:?} cue for instruction {} at ({:.2}, {:.2}, {:.2})",
            kind,
            instruction,
            position.x,
            position.y,
            position.z
        );
    }

    /// Hold one end of a pick-up/put-down pair; once both ends are present,
    /// build exactly one combined arched cue and clear the half-state.
    fn record_transfer_point(
        &mut self,
        instruction: usize,
        endpoint: TransferEndpoint,
        hit: SpatialHit,
    ) -> PlacementResult {
        let draft = self.drafts.entry(instruction).or_default();
        match endpoint {
            TransferEndpoint::Source => draft.source = Some(hit),
            TransferEndpoint::Destination => draft.destination = Some(hit),
        }

        let (Some(source), Some(destination)) = (draft.source, draft.destination) else {
            log_info!(
                "transfer for instruction {} waiting for its other endpoint",
                instruction
            );
            return PlacementResult::PendingTransfer;
        };
        self.drafts.remove(&instruction);

        // Cue travels between lifted endpoints so it never clips the
        // surfaces it starts and ends on.
        let lift_a = source.point + Vec3::Y * standoff(ActionKind::PickUp);
        let lift_b = destination.point + Vec3::Y * standoff(ActionKind::PutDown);
        let path = TransferPath::new(lift_a, lift_b);

        let travel = lift_b - lift_a;
        let rotation = if travel.length_squared() > 1e-6 {
            look_rotation(travel.normalize(), Vec3::Y)
        } else {
            Quat::IDENTITY
        };

        let cue = self.scene.spawn(EntityKind::TransferCue);
        self.scene.set_transform(cue, path.position_at(0.0), rotation);

        let marker_source = self.spawn_marker(source);
        let marker_destination = self.spawn_marker(destination);

        self.install_entry(
            instruction,
            vec![cue, marker_source, marker_destination],
            path.position_at(0.0),
        );
        self.transfers.insert(
            instruction,
            ActiveTransfer {
                cue,
                rotation,
                animator: TransferAnimator::new(path),
            },
        );

        log_info!("placed transfer cue for instruction {}", instruction);
        PlacementResult::Placed
    }

    fn spawn_marker(&mut self, hit: SpatialHit) -> EntityId {
        let marker = self.scene.spawn(EntityKind::IntersectionMarker);
        let rotation = look_rotation(-hit.normal, Vec3::Y)
            * Quat::from_rotation_z(MARKER_ROLL_DEGREES.to_radians());
        self.scene.set_transform(marker, hit.point, rotation);
        marker
    }

    /// First entity of the group is the anchor root: a persistent anchor is
    /// created at its world position, the root attaches to it and the
    /// siblings parent to the root, so the whole group stays fixed under
    /// re-localization.
    fn install_entry(&mut self, instruction: usize, entities: Vec<EntityId>, root_position: Vec3) {
        self.destroy_entry(instruction);

        let anchor = self.scene.create_anchor(root_position);
        if let Some((root, siblings)) = entities.split_first() {
            self.scene.attach_to_anchor(anchor, *root);
            for sibling in siblings {
                self.scene.set_parent(*sibling, *root);
            }
        }

        self.entries
            .insert(instruction, VisualAnchorEntry { entities, anchor });
    }

    fn destroy_entry(&mut self, instruction: usize) {
        if let Some(entry) = self.entries.remove(&instruction) {
            for entity in entry.entities {
                self.scene.destroy(entity);
            }
            self.scene.destroy_anchor(entry.anchor);
        }
        self.transfers.remove(&instruction);
    }

    /// Drop an instruction's cue entirely (entities, anchor, half-state).
    pub fn remove(&mut self, instruction: usize) {
        self.destroy_entry(instruction);
        self.drafts.remove(&instruction);
    }

    /// Show only the given instruction's entities; everything else is
    /// hidden, not destroyed. Returns whether that instruction has any
    /// visuals to show.
    pub fn show_only(&mut self, instruction: usize) -> bool {
        for (index, entry) in &self.entries {
            let visible = *index == instruction;
            for entity in &entry.entities {
                self.scene.set_visible(*entity, visible);
            }
        }
        self.entries
            .get(&instruction)
            .map(|entry| !entry.entities.is_empty())
            .unwrap_or(false)
    }

    pub fn hide_all(&mut self) {
        for entry in self.entries.values() {
            for entity in &entry.entities {
                self.scene.set_visible(*entity, false);
            }
        }
    }

    /// Advance all looping transfer animations by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        for transfer in self.transfers.values_mut() {
            let (position, _) = transfer.animator.advance(dt);
            self.scene
                .set_transform(transfer.cue, position, transfer.rotation);
        }
    }

    pub fn transfer_phase(&self, instruction: usize) -> Option<TransferPhase> {
        self.transfers
            .get(&instruction)
            .map(|transfer| transfer.animator.phase())
    }

    pub fn has_visuals(&self, instruction: usize) -> bool {
        self.entries
            .get(&instruction)
            .map(|entry| !entry.entities.is_empty())
            .unwrap_or(false)
    }

    pub fn has_pending_transfer(&self, instruction: usize) -> bool {
        self.drafts.contains_key(&instruction)
    }

    pub fn entry(&self, instruction: usize) -> Option<&VisualAnchorEntry> {
        self.entries.get(&instruction)
    }
}

/// Rotation whose forward axis (-Z) points along `forward`, keeping the up
/// hint as vertical as possible.
fn look_rotation(forward: Vec3, up_hint: Vec3) -> Quat {
    let f = forward.normalize();
    let mut up = up_hint - f * f.dot(up_hint);
    if up.length_squared() < 1e-6 {
        let fallback = if f.y.abs() < 0.9 { Vec3::Y } else { Vec3::X };
        up = fallback - f * f.dot(fallback);
    }
    let up = up.normalize();
    let right = f.cross(up);
    Quat::from_mat3(&Mat3::from_cols(right, up, -f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visuals::scene::{RecordingScene, SharedScene};

    fn hit_at(point: Vec3, normal: Vec3) -> SpatialHit {
        SpatialHit {
            point,
            normal,
            distance: 1.0,
        }
    }

    fn manager_with_scene() -> (VisualAnchorManager, SharedScene<RecordingScene>) {
        let scene = SharedScene::new(RecordingScene::new());
        (VisualAnchorManager::new(Box::new(scene.clone())), scene)
    }

    #[test]
    fn press_cue_stands_off_along_the_normal_facing_the_surface() {
        let (mut manager, scene) = manager_with_scene();

        let result = manager.place(
            0,
            hit_at(Vec3::new(0.0, 0.0, -1.0), Vec3::Z),
            ActionKind::Press,
        );
        assert_eq!(result, PlacementResult::Placed);

        let entry = manager.entry(0).expect("entry installed");
        assert_eq!(entry.entities.len(), 2);

        let cue = scene.lock().entity(entry.entities[0]).unwrap();
        assert_eq!(cue.kind, EntityKind::HandCue(ActionKind::Press));
        // 0.20m press standoff along +Z away from the wall at z = -1.
        assert!((cue.position - Vec3::new(0.0, 0.0, -0.8)).length() < 1e-4);
        // Facing the surface: cue forward (-Z axis) points toward -Z world.
        let facing = cue.rotation * Vec3::NEG_Z;
        assert!((facing - Vec3::NEG_Z).length() < 1e-4);

        // Marker sits on the surface, parented to the cue root.
        let marker = scene.lock().entity(entry.entities[1]).unwrap();
        assert_eq!(marker.kind, EntityKind::IntersectionMarker);
        assert!((marker.position - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-4);
        assert_eq!(marker.parent, Some(entry.entities[0]));

        // Anchor pinned at the root's world position, root attached to it.
        let root = scene.lock().entity(entry.entities[0]).unwrap();
        assert_eq!(root.anchor, Some(entry.anchor));
        let anchor_pos = scene.lock().anchor_position(entry.anchor).unwrap();
        assert!((anchor_pos - cue.position).length() < 1e-4);
    }

    #[test]
    fn replacing_an_entry_destroys_the_old_entities_first() {
        let (mut manager, scene) = manager_with_scene();

        manager.place(0, hit_at(Vec3::new(0.0, 0.0, -1.0), Vec3::Z), ActionKind::Press);
        let first = manager.entry(0).unwrap().entities.clone();

        manager.place(0, hit_at(Vec3::new(1.0, 0.0, -2.0), Vec3::Z), ActionKind::Twist);

        for old in &first {
            assert!(scene.lock().entity(*old).is_none(), "stale cue leaked");
        }
        // Exactly one cue + one marker + one anchor remain.
        assert_eq!(scene.lock().live_entities(), 2);
        assert_eq!(scene.lock().live_anchors(), 1);
    }

    #[test]
    fn transfer_waits_for_both_endpoints() {
        let (mut manager, scene) = manager_with_scene();

        let result = manager.place(
            1,
            hit_at(Vec3::new(-0.5, 0.8, -1.0), Vec3::Y),
            ActionKind::PickUp,
        );
        assert_eq!(result, PlacementResult::PendingTransfer);
        assert!(manager.has_pending_transfer(1));
        assert!(!manager.has_visuals(1));
        assert_eq!(scene.lock().live_entities(), 0);

        let result = manager.place(
            1,
            hit_at(Vec3::new(0.5, 0.8, -1.0), Vec3::Y),
            ActionKind::PutDown,
        );
        assert_eq!(result, PlacementResult::Placed);
        assert!(!manager.has_pending_transfer(1));

        // Exactly one combined cue plus two endpoint markers.
        let entry = manager.entry(1).unwrap();
        assert_eq!(entry.entities.len(), 3);
        assert_eq!(
            scene.lock().entities_of_kind(EntityKind::TransferCue).len(),
            1
        );
    }

    #[test]
    fn transfer_cue_travels_the_arch_on_tick() {
        let (mut manager, scene) = manager_with_scene();

        manager.place(0, hit_at(Vec3::new(-0.5, 0.8, -1.0), Vec3::Y), ActionKind::PickUp);
        manager.place(0, hit_at(Vec3::new(0.5, 0.8, -1.0), Vec3::Y), ActionKind::PutDown);

        let cue_id = manager.entry(0).unwrap().entities[0];
        let start = scene.lock().entity(cue_id).unwrap().position;

        assert_eq!(manager.transfer_phase(0), Some(TransferPhase::Approach));
        manager.tick(2.0); // half the cycle: mid-arch, Transit phase
        assert_eq!(manager.transfer_phase(0), Some(TransferPhase::Transit));

        let mid = scene.lock().entity(cue_id).unwrap().position;
        assert!(mid.y > start.y + 0.05, "cue should ride the elevated arch");
    }

    #[test]
    fn show_only_toggles_visibility_without_destroying() {
        let (mut manager, scene) = manager_with_scene();

        manager.place(0, hit_at(Vec3::new(0.0, 0.0, -1.0), Vec3::Z), ActionKind::Press);
        manager.place(1, hit_at(Vec3::new(1.0, 0.0, -1.0), Vec3::Z), ActionKind::Pull);

        assert!(manager.show_only(1));

        let hidden = manager.entry(0).unwrap().entities.clone();
        let shown = manager.entry(1).unwrap().entities.clone();
        for id in hidden {
            assert!(!scene.lock().entity(id).unwrap().visible);
        }
        for id in shown {
            assert!(scene.lock().entity(id).unwrap().visible);
        }

        // Instruction with no entry reports no visuals but hides the rest.
        assert!(!manager.show_only(7));
        assert_eq!(scene.lock().live_entities(), 4);
    }
}
