//! Crash-recovery file for the timer state

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

use super::TimerState;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("timer state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("timer state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("could not replace timer state file: {0}")]
    Replace(#[from] tempfile::PersistError),
}

/// JSON file holding the last committed [`TimerState`]
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved state, `None` if nothing was saved yet
    pub fn load(&self) -> Result<Option<TimerState>, PersistError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Atomically write content using temp file + rename
    pub fn save(&self, state: &TimerState) -> Result<(), PersistError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let content = serde_json::to_vec_pretty(state)?;
        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(&content)?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path)?;

        debug!("Timer state saved to {}", self.path.display());
        Ok(())
    }
}
