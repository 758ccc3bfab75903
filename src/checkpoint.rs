//! Resume checkpoint: the last committed cursor, persisted as JSON.
//!
//! Persistence is the orchestrator's responsibility: the pipeline saves
//! after every committed batch and clears the file once the scan
//! completes. Restarting without a checkpoint is always safe; the target's
//! conflict-skip semantics make re-applied batches a no-op.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sources::Cursor;

/// Serialized checkpoint contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Checkpoint {
    cursor: Cursor,
}

/// Loads the last committed cursor, `None` when no checkpoint exists.
///
/// # Errors
///
/// Returns [`Error::Checkpoint`] when the file exists but cannot be read
/// or parsed; a corrupt checkpoint should stop the run rather than
/// silently rescan.
pub fn load(path: &Path) -> Result<Option<Cursor>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Checkpoint(format!("Cannot read '{}': {e}", path.display())))?;
    let checkpoint: Checkpoint = serde_json::from_str(&content)
        .map_err(|e| Error::Checkpoint(format!("Corrupt checkpoint '{}': {e}", path.display())))?;
    Ok(Some(checkpoint.cursor))
}

/// Saves the cursor, replacing any previous checkpoint atomically.
///
/// # Errors
///
/// Returns [`Error::Checkpoint`] when the file cannot be written.
pub fn save(path: &Path, cursor: &Cursor) -> Result<()> {
    let content = serde_json::to_string_pretty(&Checkpoint {
        cursor: cursor.clone(),
    })?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)
        .and_then(|()| fs::rename(&tmp, path))
        .map_err(|e| Error::Checkpoint(format!("Cannot write '{}': {e}", path.display())))
}

/// Removes the checkpoint after a completed run.
///
/// # Errors
///
/// Returns [`Error::Checkpoint`] when an existing file cannot be removed.
pub fn clear(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Checkpoint(format!(
            "Cannot remove '{}': {e}",
            path.display()
        ))),
    }
}
