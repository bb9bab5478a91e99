pub mod manifest;
pub mod source;

pub use manifest::ImageManifest;
pub use source::{FetchKind, InstructionSource};

use std::path::PathBuf;

/// One image captured for an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Position within the instruction, 0-based.
    pub picture_index: usize,
    /// On-device location of the stored JPEG.
    pub file_path: PathBuf,
}

/// One step of the fetched instruction set.
///
/// Instructions are created wholesale when a set is fetched and never
/// deleted within a session; a new fetch replaces the whole list.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub index: usize,
    pub text: String,
    pub images: Vec<CapturedImage>,
    /// True from the start of a capture until its detection round-trip
    /// completes (success or failure). Guards against overlapping captures
    /// of the same instruction.
    pub processing: bool,
}

impl Instruction {
    pub fn new(index: usize, text: String) -> Self {
        Self {
            index,
            text,
            images: Vec::new(),
            processing: false,
        }
    }

    pub fn add_image(&mut self, file_path: PathBuf) -> usize {
        let picture_index = self.images.len();
        self.images.push(CapturedImage {
            picture_index,
            file_path,
        });
        picture_index
    }
}

/// Build the session's instruction list from fetched display texts.
pub fn build_instructions(texts: Vec<String>) -> Vec<Instruction> {
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Instruction::new(index, text))
        .collect()
}
