//! # Recording store
//!
//! Recordings are stored as JSON arrays of event records:
//!
//! ```json
//! [
//!   { "id": 3, "type": "button", "value": 0.0, "timestamp": 0.1003 },
//!   { "id": 0, "type": "axis", "value": 0.5, "timestamp": 0.1241 }
//! ]
//! ```
//!
//! `load(save(r)) == r` holds for every field of every event; floats are
//! written in shortest round-trip form and parsed back exactly. A document that
//! is not a sequence of well-formed records, or whose timestamps run
//! backwards, is rejected as a whole.

use crate::input::Recording;
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const RECORDING_EXTENSION: &str = "json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on recording {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt recording {path}: {reason}")]
    CorruptRecording { path: PathBuf, reason: String },

    #[error("Failed to serialize recording: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("No recordings found in {0}")]
    NoRecordings(PathBuf),
}

/// Writes `recording` to `path`, creating parent directories as needed
pub fn save(recording: &Recording, path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| StoreError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let content = serde_json::to_string_pretty(recording)?;
    fs::write(path, content).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Saved recording with {} events ({:.3}s) to {}",
        recording.len(),
        recording.duration(),
        path.display()
    );
    Ok(())
}

/// Reads a recording back from `path`
pub fn load(path: &Path) -> Result<Recording, StoreError> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let recording: Recording =
        serde_json::from_str(&content).map_err(|e| StoreError::CorruptRecording {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if let Some(index) = recording.first_out_of_order() {
        return Err(StoreError::CorruptRecording {
            path: path.to_path_buf(),
            reason: format!("event {} is earlier than the event before it", index),
        });
    }

    debug!(
        "Loaded recording with {} events from {}",
        recording.len(),
        path.display()
    );
    Ok(recording)
}

/// Path for a new recording of `device`, named after the current local time
pub fn recording_path(dir: &Path, device: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}_{}.{}", device, stamp, RECORDING_EXTENSION))
}

/// Most recently modified recording in `dir`
pub fn latest_recording(dir: &Path) -> Result<PathBuf, StoreError> {
    let entries = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(RECORDING_EXTENSION) {
            continue;
        }
        let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
            continue;
        };
        if newest.as_ref().map_or(true, |(time, _)| modified > *time) {
            newest = Some((modified, path));
        }
    }

    newest
        .map(|(_, path)| path)
        .ok_or_else(|| StoreError::NoRecordings(dir.to_path_buf()))
}
