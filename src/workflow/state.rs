/// Phases of a guidance session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing loaded yet; waiting for the operator/user choice.
    Init,
    /// The operator walks the instructions and photographs each step.
    Operator,
    /// The user re-photographs each stored picture so cues can be placed.
    UserPrescan,
    /// The user follows the instructions with the placed cues.
    User,
}

/// Mutable workflow position shared by every command handler.
///
/// Indices here are the single source of truth for "where the session is";
/// capture chains copy them out at spawn time and never read them again.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub phase: Phase,
    pub current_instruction: usize,
    pub current_picture: usize,
    /// True while the operator is re-authoring a subset of instructions.
    pub update_mode: bool,
    /// Instructions touched during the current update pass, in the order
    /// the operator first re-captured them.
    pub updated_instructions: Vec<usize>,
    /// Set once the end of the list was reached; gates the finish commands.
    pub allow_done: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: Phase::Init,
            current_instruction: 0,
            current_picture: 0,
            update_mode: false,
            updated_instructions: Vec::new(),
            allow_done: false,
        }
    }
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter the operator phase at the first instruction. Leaves
    /// `update_mode` and the updated set alone so an update pass keeps its
    /// bookkeeping.
    pub fn begin_operator(&mut self) {
        self.phase = Phase::Operator;
        self.current_instruction = 0;
        self.current_picture = 0;
        self.allow_done = false;
    }

    /// Enter an update pass: operator phase with the updated set reset.
    pub fn begin_update(&mut self) {
        self.update_mode = true;
        self.updated_instructions.clear();
        self.begin_operator();
    }

    /// Enter the prescan phase at a specific stored picture.
    pub fn begin_prescan(&mut self, instruction: usize) {
        self.phase = Phase::UserPrescan;
        self.current_instruction = instruction;
        self.current_picture = 0;
        self.allow_done = false;
    }

    /// Enter the guided user phase at the first instruction. Ends any
    /// update pass.
    pub fn begin_user(&mut self) {
        self.phase = Phase::User;
        self.current_instruction = 0;
        self.current_picture = 0;
        self.update_mode = false;
        self.updated_instructions.clear();
        self.allow_done = false;
    }
}
