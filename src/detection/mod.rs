pub mod client;
pub mod types;

pub use client::DetectionClient;
pub use types::{ActionKind, DetectionOutcome, DetectionResult, TransferEndpoint};
