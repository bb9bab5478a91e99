use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Nested instruction -> image-path manifest, persisted as JSON:
/// `[["path1.jpg", "path2.jpg"], ["path3.jpg"], ...]`.
///
/// Each outer entry corresponds to one instruction. The manifest survives
/// sessions so a user can rescan without the operator re-capturing
/// everything.
#[derive(Debug)]
pub struct ImageManifest {
    storage_path: PathBuf,
    paths: Vec<Vec<PathBuf>>,
}

impl ImageManifest {
    pub fn new(storage_path: PathBuf) -> Self {
        Self {
            storage_path,
            paths: Vec::new(),
        }
    }

    /// Load the stored manifest. An absent or empty file yields an empty
    /// manifest rather than an error.
    pub fn load(&mut self) -> Result<()> {
        if !self.storage_path.exists() {
            self.paths = Vec::new();
            return Ok(());
        }

        let contents = fs::read_to_string(&self.storage_path).with_context(|| {
            format!("Failed to read manifest from {}", self.storage_path.display())
        })?;
        self.paths = if contents.trim().is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(&contents).context("manifest file was not valid JSON")?
        };
        Ok(())
    }

    pub fn store(&self) -> Result<()> {
        let serialized = serde_json::to_string_pretty(&self.paths)?;
        fs::write(&self.storage_path, serialized).with_context(|| {
            format!("Failed to write manifest to {}", self.storage_path.display())
        })
    }

    /// Record a new image for an instruction.
    ///
    /// In update mode, the first new image of an instruction supersedes the
    /// instruction's previous list: the old files are deleted from disk and
    /// the index is recorded in the ordered `updated` set. Other
    /// instructions' lists are never touched.
    pub fn add_path(
        &mut self,
        instruction: usize,
        file_path: PathBuf,
        update_mode: bool,
        updated: &mut Vec<usize>,
    ) {
        if instruction >= self.paths.len() {
            self.paths.resize_with(instruction + 1, Vec::new);
        }

        if update_mode && !updated.contains(&instruction) {
            for old in self.paths[instruction].drain(..) {
                delete_image(&old);
            }
            updated.push(instruction);
        }

        self.paths[instruction].push(file_path);
    }

    /// Forget everything: delete every referenced image file (best effort)
    /// and truncate the stored manifest. Used when a new instruction set
    /// replaces the old one outright.
    pub fn clear(&mut self) -> Result<()> {
        for list in &self.paths {
            for path in list {
                delete_image(path);
            }
        }
        self.paths.clear();

        if self.storage_path.exists() {
            fs::write(&self.storage_path, "").with_context(|| {
                format!("Failed to truncate {}", self.storage_path.display())
            })?;
        }
        log_info!("cleared instruction image manifest");
        Ok(())
    }

    pub fn instruction_count(&self) -> usize {
        self.paths.len()
    }

    /// Number of images stored for an instruction; `None` when the
    /// instruction has no manifest entry at all.
    pub fn picture_count(&self, instruction: usize) -> Option<usize> {
        self.paths.get(instruction).map(Vec::len)
    }

    pub fn image_path(&self, instruction: usize, picture: usize) -> Option<&PathBuf> {
        self.paths.get(instruction)?.get(picture)
    }

    pub fn paths(&self) -> &[Vec<PathBuf>] {
        &self.paths
    }
}

fn delete_image(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        log_warn!("image file could not be deleted ({}): {err}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn touch(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, b"jpeg").unwrap();
        path
    }

    #[test]
    fn store_then_load_round_trips_the_nested_structure() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("instruction_pictures.json");

        let mut manifest = ImageManifest::new(storage.clone());
        let mut updated = Vec::new();
        manifest.add_path(0, PathBuf::from("a.jpg"), false, &mut updated);
        manifest.add_path(0, PathBuf::from("b.jpg"), false, &mut updated);
        manifest.add_path(2, PathBuf::from("c.jpg"), false, &mut updated);
        manifest.store().unwrap();

        let mut loaded = ImageManifest::new(storage);
        loaded.load().unwrap();
        assert_eq!(loaded.paths(), manifest.paths());
        assert_eq!(loaded.picture_count(1), Some(0));
        assert_eq!(loaded.picture_count(2), Some(1));
    }

    #[test]
    fn update_mode_replaces_only_the_updated_instruction() {
        let dir = tempfile::tempdir().unwrap();
        let old_a = touch(&dir, "old_a.jpg");
        let old_b = touch(&dir, "old_b.jpg");
        let keep = touch(&dir, "keep.jpg");

        let mut manifest = ImageManifest::new(dir.path().join("manifest.json"));
        let mut updated = Vec::new();
        manifest.add_path(0, old_a.clone(), false, &mut updated);
        manifest.add_path(0, old_b.clone(), false, &mut updated);
        manifest.add_path(1, keep.clone(), false, &mut updated);

        // First update image clears instruction 0's list and files.
        manifest.add_path(0, PathBuf::from("new_a.jpg"), true, &mut updated);
        manifest.add_path(0, PathBuf::from("new_b.jpg"), true, &mut updated);

        assert_eq!(updated, vec![0]);
        assert_eq!(
            manifest.paths()[0],
            vec![PathBuf::from("new_a.jpg"), PathBuf::from("new_b.jpg")]
        );
        assert_eq!(manifest.paths()[1], vec![keep.clone()]);
        assert!(!old_a.exists());
        assert!(!old_b.exists());
        assert!(keep.exists());
    }

    #[test]
    fn clear_deletes_files_and_truncates_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("manifest.json");
        let img = touch(&dir, "img.jpg");

        let mut manifest = ImageManifest::new(storage.clone());
        let mut updated = Vec::new();
        manifest.add_path(0, img.clone(), false, &mut updated);
        manifest.store().unwrap();

        manifest.clear().unwrap();
        assert_eq!(manifest.instruction_count(), 0);
        assert!(!img.exists());
        assert_eq!(fs::read_to_string(&storage).unwrap(), "");

        // An emptied storage file loads as an empty manifest.
        let mut reloaded = ImageManifest::new(storage);
        reloaded.load().unwrap();
        assert_eq!(reloaded.instruction_count(), 0);
    }

    #[test]
    fn missing_storage_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = ImageManifest::new(dir.path().join("nope.json"));
        manifest.load().unwrap();
        assert_eq!(manifest.instruction_count(), 0);
    }
}
