pub mod events;
pub mod orchestrator;
pub mod state;

pub use events::WorkflowEvent;
pub use orchestrator::Orchestrator;
pub use state::{Phase, WorkflowState};
