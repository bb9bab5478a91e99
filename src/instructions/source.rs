use anyhow::{Context, Result};

use crate::config::GuideConfig;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_info;

/// Which instruction list to ask the server for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// The stored list from the last operator session.
    Current,
    /// A freshly generated list (operator is re-authoring).
    New,
    /// The list for an update pass over a subset of instructions.
    Updated,
}

/// Client for the instruction endpoints of the guidance server.
#[derive(Debug, Clone)]
pub struct InstructionSource {
    http: reqwest::Client,
    base_url: String,
    instructions_endpoint: String,
    new_instructions_endpoint: String,
    update_instructions_endpoint: String,
}

impl InstructionSource {
    pub fn new(config: &GuideConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.server_url.trim_end_matches('/').to_string(),
            instructions_endpoint: config.instructions_endpoint.clone(),
            new_instructions_endpoint: config.new_instructions_endpoint.clone(),
            update_instructions_endpoint: config.update_instructions_endpoint.clone(),
        }
    }

    /// Fetch an ordered list of instruction display texts.
    pub async fn fetch(&self, kind: FetchKind) -> Result<Vec<String>> {
        let endpoint = match kind {
            FetchKind::Current => &self.instructions_endpoint,
            FetchKind::New => &self.new_instructions_endpoint,
            FetchKind::Updated => &self.update_instructions_endpoint,
        };
        let url = format!("{}/{}", self.base_url, endpoint);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("instruction request to {url} failed"))?
            .error_for_status()
            .context("instruction server answered with an error status")?;

        let texts: Vec<String> = response
            .json()
            .await
            .context("instruction list was not valid JSON")?;

        log_info!("fetched {} instructions ({kind:?})", texts.len());
        Ok(texts)
    }
}
