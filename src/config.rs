use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// What happens when the prescan loop runs out of pictures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ScanEndBehavior {
    /// Emit a done prompt and wait for the explicit finish command.
    PromptDone,
    /// Transition to the user phase immediately.
    AutoFinish,
}

impl Default for ScanEndBehavior {
    fn default() -> Self {
        ScanEndBehavior::PromptDone
    }
}

/// Configuration for the guidance pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuideConfig {
    /// Base URL of the vision server, e.g. "http://192.168.0.12:5000".
    pub server_url: String,
    /// Endpoint that runs object detection on an uploaded image.
    pub detector_endpoint: String,
    /// Endpoint that parses an operator image + instruction with the LLM.
    pub parser_endpoint: String,
    /// Endpoint returning the stored instruction list.
    pub instructions_endpoint: String,
    /// Endpoint returning a freshly generated instruction list.
    pub new_instructions_endpoint: String,
    /// Endpoint returning instructions for an update pass.
    pub update_instructions_endpoint: String,

    /// Directory captured JPEGs are written to.
    pub capture_dir: PathBuf,
    /// Path of the persisted instruction -> image-path manifest.
    pub manifest_path: PathBuf,

    /// End-of-pictures behavior during prescan.
    pub scan_end: ScanEndBehavior,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            detector_endpoint: "upload_image".into(),
            parser_endpoint: "parse_instruction".into(),
            instructions_endpoint: "get_instructions".into(),
            new_instructions_endpoint: "new_instructions".into(),
            update_instructions_endpoint: "update_instructions".into(),
            capture_dir: PathBuf::from("captures"),
            manifest_path: PathBuf::from("instruction_pictures.json"),
            scan_end: ScanEndBehavior::default(),
        }
    }
}

impl GuideConfig {
    /// Load config from a JSON file, falling back to defaults when the file
    /// is absent or unparseable.
    pub fn load(path: &PathBuf) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            Ok(serde_json::from_str(&contents).unwrap_or_default())
        } else {
            Ok(Self::default())
        }
    }

    pub fn store(&self, path: &PathBuf) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
