use super::state::Phase;

/// Notifications pushed to the shell (HUD, voice prompts, debug console).
///
/// Emitted on an unbounded channel; the pipeline never blocks on a slow
/// consumer, and a dropped receiver simply discards events.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    PhaseChanged(Phase),
    /// Display text for the instruction the session is positioned on.
    Guidance { instruction: usize, text: String },
    /// Free-form status line (capture rejected, transfer half done, ...).
    Notice(String),
    /// A cue now exists for the instruction.
    CuePlaced { instruction: usize },
    /// A capture chain ended without a cue. `reason` is a short
    /// machine-readable tag.
    CueMissing {
        instruction: usize,
        reason: &'static str,
    },
    /// The stored picture the user should re-photograph next.
    ScanImage { instruction: usize, picture: usize },
    /// End of the list was reached; the finish command is now accepted.
    DonePrompt,
}
