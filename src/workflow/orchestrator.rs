use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::{mpsc, Mutex};

use super::events::WorkflowEvent;
use super::state::{Phase, WorkflowState};
use crate::camera::CameraRig;
use crate::config::{GuideConfig, ScanEndBehavior};
use crate::detection::{ActionKind, DetectionClient, DetectionOutcome};
use crate::error::PipelineError;
use crate::instructions::{build_instructions, FetchKind, ImageManifest, Instruction, InstructionSource};
use crate::pose::{FrozenPose, PoseKey, PoseRegistry};
use crate::spatial::{self, EnvironmentMesh, SurfaceLayer};
use crate::visuals::{PlacementResult, VisualAnchorManager};
use crate::visuals::scene::ScenePort;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Drives the whole session: phase transitions, capture chains and the
/// shell event stream.
///
/// Commands take `&self` and finish quickly; the slow capture -> detect ->
/// resolve -> anchor work runs in spawned chains that copy their indices
/// out at spawn time. The per-instruction `processing` flag is the single
/// guard against overlapping captures and is cleared exactly once per
/// chain, success or failure.
#[derive(Clone)]
pub struct Orchestrator {
    config: GuideConfig,
    state: Arc<Mutex<WorkflowState>>,
    instructions: Arc<Mutex<Vec<Instruction>>>,
    poses: Arc<Mutex<PoseRegistry>>,
    visuals: Arc<Mutex<VisualAnchorManager>>,
    manifest: Arc<Mutex<ImageManifest>>,
    camera: Arc<dyn CameraRig>,
    mesh: Arc<dyn EnvironmentMesh>,
    detector: DetectionClient,
    source: InstructionSource,
    events: mpsc::UnboundedSender<WorkflowEvent>,
}

impl Orchestrator {
    pub fn new(
        config: GuideConfig,
        camera: Arc<dyn CameraRig>,
        mesh: Arc<dyn EnvironmentMesh>,
        scene: Box<dyn ScenePort>,
    ) -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let orchestrator = Self {
            detector: DetectionClient::new(&config),
            source: InstructionSource::new(&config),
            manifest: Arc::new(Mutex::new(ImageManifest::new(config.manifest_path.clone()))),
            config,
            state: Arc::new(Mutex::new(WorkflowState::new())),
            instructions: Arc::new(Mutex::new(Vec::new())),
            poses: Arc::new(Mutex::new(PoseRegistry::new())),
            visuals: Arc::new(Mutex::new(VisualAnchorManager::new(scene))),
            camera,
            mesh,
            events,
        };
        (orchestrator, receiver)
    }

    /// Start a fresh authoring session: fetch a new instruction list,
    /// discard any stored images and enter the operator phase.
    pub async fn begin_operator(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.phase == Phase::UserPrescan {
                self.emit(WorkflowEvent::Notice(
                    "finish or abandon the scan before re-authoring".into(),
                ));
                return Ok(());
            }
        }
        let texts = self.source.fetch(FetchKind::New).await?;
        self.manifest.lock().await.clear()?;
        *self.instructions.lock().await = build_instructions(texts);

        self.state.lock().await.begin_operator();
        self.emit(WorkflowEvent::PhaseChanged(Phase::Operator));
        self.emit_guidance(0).await;
        Ok(())
    }

    /// Resume from a previous operator session: fetch the stored
    /// instruction list, load the image manifest and enter the prescan
    /// phase at the first stored picture. With nothing stored the session
    /// goes straight to the guided phase. Only accepted before a session
    /// has started; mid-session it is refused with a notice.
    pub async fn resume_stored(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.phase != Phase::Init {
                self.emit(WorkflowEvent::Notice(
                    "a session is already running".into(),
                ));
                return Ok(());
            }
        }
        let texts = self.source.fetch(FetchKind::Current).await?;
        *self.instructions.lock().await = build_instructions(texts);
        self.manifest.lock().await.load()?;

        let target = first_scan_target(&*self.manifest.lock().await, None);
        match target {
            Some(instruction) => {
                self.state.lock().await.begin_prescan(instruction);
                self.emit(WorkflowEvent::PhaseChanged(Phase::UserPrescan));
                self.emit(WorkflowEvent::ScanImage {
                    instruction,
                    picture: 0,
                });
                self.emit_guidance(instruction).await;
            }
            None => {
                log_warn!("no stored pictures to scan, entering guided phase directly");
                self.state.lock().await.begin_user();
                self.emit(WorkflowEvent::PhaseChanged(Phase::User));
                self.emit_guidance(0).await;
            }
        }
        Ok(())
    }

    /// Operator command: photograph the current instruction's step.
    ///
    /// The photo is stored, recorded in the manifest and sent to the
    /// server's instruction parser in a background chain.
    pub async fn capture_for_current_instruction(&self) {
        let instruction = {
            let state = self.state.lock().await;
            if state.phase != Phase::Operator {
                return;
            }
            state.current_instruction
        };
        let Some(count) = self.try_mark_processing(instruction).await else {
            return;
        };

        let this = self.clone();
        tokio::spawn(async move {
            this.operator_chain(instruction, count).await;
        });
    }

    /// Operator command: move to the next instruction. At the end of the
    /// list the finish command is unlocked instead.
    pub async fn advance_instruction(&self) {
        let count = self.instructions.lock().await.len();
        let next = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Operator {
                return;
            }
            if state.current_instruction + 1 < count {
                state.current_instruction += 1;
                Some(state.current_instruction)
            } else {
                state.allow_done = true;
                None
            }
        };
        match next {
            Some(instruction) => self.emit_guidance(instruction).await,
            None => self.emit(WorkflowEvent::DonePrompt),
        }
    }

    /// Operator command: move back one instruction.
    pub async fn retreat_instruction(&self) {
        let previous = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Operator || state.current_instruction == 0 {
                return;
            }
            state.current_instruction -= 1;
            state.current_instruction
        };
        self.emit_guidance(previous).await;
    }

    /// Operator command: end the authoring pass. Only accepted after the
    /// operator has walked to the end of the list. Persists the manifest
    /// and enters the prescan phase at the first recorded picture.
    pub async fn finish_operator(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.phase != Phase::Operator {
                bail!("finish_operator is only valid in the operator phase");
            }
            if !state.allow_done {
                self.emit(WorkflowEvent::Notice(
                    "walk through every instruction before finishing".into(),
                ));
                return Ok(());
            }
        }
        self.manifest.lock().await.store()?;

        let target = {
            let state = self.state.lock().await;
            let manifest = self.manifest.lock().await;
            let updated = state
                .update_mode
                .then(|| state.updated_instructions.clone());
            first_scan_target(&manifest, updated.as_deref())
        };
        match target {
            Some(instruction) => {
                self.state.lock().await.begin_prescan(instruction);
                self.emit(WorkflowEvent::PhaseChanged(Phase::UserPrescan));
                self.emit(WorkflowEvent::ScanImage {
                    instruction,
                    picture: 0,
                });
                self.emit_guidance(instruction).await;
            }
            None => {
                log_warn!("operator finished without any pictures, skipping prescan");
                self.finish_prescan_unchecked().await;
            }
        }
        Ok(())
    }

    /// Prescan command: photograph the area of the current stored picture.
    ///
    /// Spawns the capture -> detect -> resolve -> anchor chain for the
    /// (instruction, picture) pair the session is positioned on, then
    /// advances to the next stored picture so the user keeps moving while
    /// the chain runs.
    pub async fn capture_for_current_picture(&self) {
        let (instruction, picture) = {
            let state = self.state.lock().await;
            if state.phase != Phase::UserPrescan {
                return;
            }
            (state.current_instruction, state.current_picture)
        };
        let Some(count) = self.try_mark_processing(instruction).await else {
            return;
        };

        let this = self.clone();
        tokio::spawn(async move {
            this.prescan_chain(PoseKey::new(instruction, picture), count)
                .await;
        });

        self.advance_picture().await;
    }

    /// Prescan command: step to the next stored picture, crossing into the
    /// next instruction that has pictures when the current one runs out.
    /// At the very end the configured end-of-scan behavior applies.
    pub async fn advance_picture(&self) {
        enum Next {
            Picture(usize, usize),
            Instruction(usize),
            Done,
        }

        let decision = {
            let state = self.state.lock().await;
            if state.phase != Phase::UserPrescan {
                return;
            }
            let manifest = self.manifest.lock().await;
            let instruction = state.current_instruction;
            let pictures = manifest.picture_count(instruction).unwrap_or(0);
            if state.current_picture + 1 < pictures {
                Next::Picture(instruction, state.current_picture + 1)
            } else {
                let updated = state
                    .update_mode
                    .then(|| state.updated_instructions.clone());
                match next_scan_target(&manifest, updated.as_deref(), instruction) {
                    Some(next) => Next::Instruction(next),
                    None => Next::Done,
                }
            }
        };

        match decision {
            Next::Picture(instruction, picture) => {
                self.state.lock().await.current_picture = picture;
                self.emit(WorkflowEvent::ScanImage {
                    instruction,
                    picture,
                });
            }
            Next::Instruction(instruction) => {
                {
                    let mut state = self.state.lock().await;
                    state.current_instruction = instruction;
                    state.current_picture = 0;
                }
                self.emit(WorkflowEvent::ScanImage {
                    instruction,
                    picture: 0,
                });
                self.emit_guidance(instruction).await;
            }
            Next::Done => match self.config.scan_end {
                ScanEndBehavior::PromptDone => {
                    self.state.lock().await.allow_done = true;
                    self.emit(WorkflowEvent::DonePrompt);
                }
                ScanEndBehavior::AutoFinish => self.finish_prescan().await,
            },
        }
    }

    /// Prescan command: end scanning and enter the guided phase at the
    /// first instruction. Accepted at any point of the scan; pictures not
    /// scanned simply have no cue.
    pub async fn finish_prescan(&self) {
        {
            let state = self.state.lock().await;
            if state.phase != Phase::UserPrescan {
                return;
            }
        }
        self.finish_prescan_unchecked().await;
    }

    async fn finish_prescan_unchecked(&self) {
        self.state.lock().await.begin_user();
        self.emit(WorkflowEvent::PhaseChanged(Phase::User));
        self.focus_instruction(0).await;
    }

    /// Guided command: step forward one instruction.
    pub async fn advance_guidance(&self) {
        let count = self.instructions.lock().await.len();
        let instruction = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::User {
                return;
            }
            if state.current_instruction + 1 < count {
                state.current_instruction += 1;
            }
            state.current_instruction
        };
        self.focus_instruction(instruction).await;
    }

    /// Guided command: step back one instruction.
    pub async fn retreat_guidance(&self) {
        let instruction = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::User {
                return;
            }
            state.current_instruction = state.current_instruction.saturating_sub(1);
            state.current_instruction
        };
        self.focus_instruction(instruction).await;
    }

    /// Jump straight to an instruction. Valid in the operator and guided
    /// phases; out-of-range indices are ignored with a notice.
    pub async fn select_instruction(&self, instruction: usize) {
        let count = self.instructions.lock().await.len();
        if instruction >= count {
            self.emit(WorkflowEvent::Notice(format!(
                "instruction {instruction} does not exist ({count} instructions)"
            )));
            return;
        }
        let phase = {
            let mut state = self.state.lock().await;
            match state.phase {
                Phase::Operator | Phase::User => {
                    state.current_instruction = instruction;
                    state.current_picture = 0;
                    state.phase
                }
                _ => return,
            }
        };
        match phase {
            Phase::User => self.focus_instruction(instruction).await,
            _ => self.emit_guidance(instruction).await,
        }
    }

    /// Guided command: start an update pass. Fetches the revised
    /// instruction list, hides all cues and re-enters the operator phase;
    /// only instructions the operator then re-captures lose their old
    /// images and cues.
    pub async fn begin_update(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.phase != Phase::User {
                bail!("updates start from the guided phase");
            }
        }
        let texts = self.source.fetch(FetchKind::Updated).await?;
        *self.instructions.lock().await = build_instructions(texts);
        self.visuals.lock().await.hide_all();

        self.state.lock().await.begin_update();
        self.emit(WorkflowEvent::PhaseChanged(Phase::Operator));
        self.emit_guidance(0).await;
        Ok(())
    }

    /// Advance looping cue animations. Called once per frame by the shell.
    pub async fn tick(&self, dt: f32) {
        self.visuals.lock().await.tick(dt);
    }

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn state_snapshot(&self) -> WorkflowState {
        self.state.lock().await.clone()
    }

    pub async fn is_processing(&self, instruction: usize) -> bool {
        self.instructions
            .lock()
            .await
            .get(instruction)
            .map(|entry| entry.processing)
            .unwrap_or(false)
    }

    pub async fn live_pose_count(&self) -> usize {
        self.poses.lock().await.live_count()
    }

    pub async fn has_cue(&self, instruction: usize) -> bool {
        self.visuals.lock().await.has_visuals(instruction)
    }

    // ---- capture chains ------------------------------------------------

    async fn operator_chain(&self, instruction: usize, count: usize) {
        let result = self.operator_chain_inner(instruction, count).await;
        self.clear_processing(instruction).await;
        if let Err(err) = result {
            log_warn!("operator capture for instruction {instruction} failed: {err}");
            self.emit(WorkflowEvent::Notice(format!(
                "image for instruction {instruction} was not processed: {err}"
            )));
        }
    }

    async fn operator_chain_inner(
        &self,
        instruction: usize,
        count: usize,
    ) -> Result<(), PipelineError> {
        let frame = self.capture_frame().await?;
        let path = self.store_capture(&frame.jpeg).await?;

        {
            let mut state = self.state.lock().await;
            let update_mode = state.update_mode;
            let mut manifest = self.manifest.lock().await;
            manifest.add_path(
                instruction,
                path.clone(),
                update_mode,
                &mut state.updated_instructions,
            );
        }
        if let Some(entry) = self.instructions.lock().await.get_mut(instruction) {
            entry.add_image(path.clone());
        }

        self.detector
            .submit_to_parser(&path, instruction, count)
            .await?;
        log_info!("operator image for instruction {instruction} stored and parsed");
        Ok(())
    }

    async fn prescan_chain(&self, key: PoseKey, count: usize) {
        let result = self.prescan_chain_inner(key, count).await;
        // Whatever happened, no pose may outlive its chain.
        self.poses.lock().await.release(key);
        self.clear_processing(key.instruction).await;
        if let Err(err) = result {
            log_warn!(
                "cue for instruction {} picture {} not placed: {err}",
                key.instruction,
                key.picture
            );
            self.emit(WorkflowEvent::CueMissing {
                instruction: key.instruction,
                reason: err.reason(),
            });
        }
    }

    async fn prescan_chain_inner(&self, key: PoseKey, count: usize) -> Result<(), PipelineError> {
        let frame = self.capture_frame().await?;
        // Store first: a frame without location data still lands on disk,
        // only spatial resolution is skipped.
        let path = self.store_capture(&frame.jpeg).await?;
        let sample = frame.pose.ok_or(PipelineError::MissingPose)?;
        self.poses
            .lock()
            .await
            .freeze(key, FrozenPose::from_sample(&sample));

        let outcome = self
            .detector
            .submit(&path, key.instruction, key.picture, count)
            .await?;

        let detection = match outcome {
            DetectionOutcome::Detected(detection) => detection,
            DetectionOutcome::Empty => {
                self.emit(WorkflowEvent::CueMissing {
                    instruction: key.instruction,
                    reason: "empty-detection",
                });
                return Ok(());
            }
        };
        let Some(kind) = ActionKind::from_label(&detection.action_label) else {
            log_warn!("unknown action label {:?}, skipping cue", detection.action_label);
            self.emit(WorkflowEvent::CueMissing {
                instruction: key.instruction,
                reason: "unknown-action",
            });
            return Ok(());
        };

        let pose = self
            .poses
            .lock()
            .await
            .take(key)
            .ok_or(PipelineError::MissingPose)?;
        let hit = spatial::resolve(
            detection.image_point,
            detection.image_size,
            &pose,
            self.mesh.as_ref(),
            SurfaceLayer::Spatial,
        )
        .ok_or(PipelineError::NoSurfaceHit)?;

        let placement = self.visuals.lock().await.place(key.instruction, hit, kind);
        match placement {
            PlacementResult::Placed => self.emit(WorkflowEvent::CuePlaced {
                instruction: key.instruction,
            }),
            PlacementResult::PendingTransfer => self.emit(WorkflowEvent::Notice(format!(
                "one end of instruction {}'s transfer recorded",
                key.instruction
            ))),
        }
        Ok(())
    }

    // ---- shared helpers ------------------------------------------------

    /// Mark an instruction as processing. Returns the instruction count
    /// for submission, or `None` when a capture is already in flight (the
    /// shell gets a notice) or the instruction does not exist.
    async fn try_mark_processing(&self, instruction: usize) -> Option<usize> {
        let mut instructions = self.instructions.lock().await;
        let count = instructions.len();
        let entry = instructions.get_mut(instruction)?;
        if entry.processing {
            self.emit(WorkflowEvent::Notice(
                "wait for the previous image to finish processing".into(),
            ));
            return None;
        }
        entry.processing = true;
        Some(count)
    }

    async fn clear_processing(&self, instruction: usize) {
        if let Some(entry) = self.instructions.lock().await.get_mut(instruction) {
            entry.processing = false;
        }
    }

    async fn capture_frame(&self) -> Result<crate::camera::CapturedFrame, PipelineError> {
        let camera = Arc::clone(&self.camera);
        tokio::task::spawn_blocking(move || camera.capture())
            .await
            .map_err(|err| PipelineError::Capture(err.to_string()))?
            .map_err(|err| PipelineError::Capture(err.to_string()))
    }

    async fn store_capture(&self, jpeg: &[u8]) -> Result<PathBuf, PipelineError> {
        tokio::fs::create_dir_all(&self.config.capture_dir)
            .await
            .map_err(|err| PipelineError::Capture(err.to_string()))?;
        let name = format!(
            "capture_{}_{}.jpg",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            uuid::Uuid::new_v4().simple()
        );
        let path = self.config.capture_dir.join(name);
        tokio::fs::write(&path, jpeg)
            .await
            .map_err(|err| PipelineError::Capture(err.to_string()))?;
        Ok(path)
    }

    /// Show only one instruction's cue and re-announce its text. Used by
    /// every guided-phase movement.
    async fn focus_instruction(&self, instruction: usize) {
        let shown = self.visuals.lock().await.show_only(instruction);
        self.emit_guidance(instruction).await;
        if !shown {
            self.emit(WorkflowEvent::CueMissing {
                instruction,
                reason: "no-cue",
            });
        }
    }

    async fn emit_guidance(&self, instruction: usize) {
        let text = self
            .instructions
            .lock()
            .await
            .get(instruction)
            .map(|entry| entry.text.clone())
            .unwrap_or_default();
        self.emit(WorkflowEvent::Guidance { instruction, text });
    }

    fn emit(&self, event: WorkflowEvent) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.events.send(event);
    }
}

/// First instruction with stored pictures. In an update pass only the
/// re-captured instructions are scanned, in the order they were touched.
fn first_scan_target(manifest: &ImageManifest, updated: Option<&[usize]>) -> Option<usize> {
    match updated {
        Some(list) => list
            .iter()
            .copied()
            .find(|&i| manifest.picture_count(i).unwrap_or(0) > 0),
        None => (0..manifest.instruction_count())
            .find(|&i| manifest.picture_count(i).unwrap_or(0) > 0),
    }
}

/// Next instruction with stored pictures after `current`, under the same
/// update-pass restriction as [`first_scan_target`].
fn next_scan_target(
    manifest: &ImageManifest,
    updated: Option<&[usize]>,
    current: usize,
) -> Option<usize> {
    match updated {
        Some(list) => {
            let position = list.iter().position(|&i| i == current)?;
            list[position + 1..]
                .iter()
                .copied()
                .find(|&i| manifest.picture_count(i).unwrap_or(0) > 0)
        }
        None => (current + 1..manifest.instruction_count())
            .find(|&i| manifest.picture_count(i).unwrap_or(0) > 0),
    }
}
