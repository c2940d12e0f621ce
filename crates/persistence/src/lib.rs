#![deny(warnings)]

//! Persistence layer: save snapshots and the stores that hold them.
//!
//! A [`Snapshot`] is a plain record keyed by field name, so field order in
//! the file does not matter and missing fields take their defaults. Arrays
//! are matched to the configured collections by index when restored.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Current save format version. Bump when fields are added.
pub const SAVE_VERSION: u32 = 1;

/// Oldest version that still loads. Bump only on breaking changes.
pub const MIN_COMPATIBLE_VERSION: u32 = 1;

/// Returns the default save file used by local sessions.
pub fn default_save_path() -> &'static str {
    "./saves/cookie-idle.json"
}

/// Everything needed to resume a session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub version: u32,
    pub balance: f64,
    pub prestige_level: u32,
    /// Informational; the multiplier is recomputed from the level on load.
    pub prestige_multiplier: f64,
    /// Signed so that corrupt negative entries can be detected and skipped.
    pub upgrade_levels: Vec<i64>,
    pub completed_objectives: Vec<bool>,
    pub completed_timed_objectives: Vec<bool>,
    /// Which completed timed objectives were won rather than expired.
    pub timed_objective_succeeded: Vec<bool>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: SAVE_VERSION,
            balance: 0.0,
            prestige_level: 0,
            prestige_multiplier: 1.0,
            upgrade_levels: Vec::new(),
            completed_objectives: Vec::new(),
            completed_timed_objectives: Vec::new(),
            timed_objective_succeeded: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed save: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version {found} is older than supported version {min}")]
    Incompatible { found: u32, min: u32 },
}

/// Serialize a snapshot as pretty JSON.
pub fn encode(snapshot: &Snapshot) -> Result<String, PersistError> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Parse a snapshot, rejecting incompatible versions.
pub fn decode(text: &str) -> Result<Snapshot, PersistError> {
    let snap: Snapshot = serde_json::from_str(text)?;
    if snap.version < MIN_COMPATIBLE_VERSION {
        return Err(PersistError::Incompatible {
            found: snap.version,
            min: MIN_COMPATIBLE_VERSION,
        });
    }
    if snap.version > SAVE_VERSION {
        warn!(
            found = snap.version,
            current = SAVE_VERSION,
            "save is newer than this build, unknown fields are dropped"
        );
    }
    Ok(snap)
}

/// Somewhere a snapshot can be loaded from and saved to.
pub trait SaveStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<Snapshot>, PersistError>;
    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistError>;
}

/// JSON file on disk.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveStore for JsonFileStore {
    fn load(&self) -> Result<Option<Snapshot>, PersistError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no save file");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        decode(&text).map(Some)
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, encode(snapshot)?)?;
        fs::rename(&tmp, &self.path)?;
        info!(path = %self.path.display(), balance = snapshot.balance, "game saved");
        Ok(())
    }
}

/// In-memory store for tests and embedding.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    slot: Option<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(snapshot: Snapshot) -> Self {
        Self {
            slot: Some(snapshot),
        }
    }
}

impl SaveStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, PersistError> {
        Ok(self.slot.clone())
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistError> {
        self.slot = Some(snapshot.clone());
        Ok(())
    }
}
