use super::types::Snapshot;
use crate::errors::PersistenceError;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes the snapshot file.
///
/// Every call goes to disk; nothing is cached between calls, so a reader
/// always sees the most recent completed write.
pub struct SnapshotStore {
    state_file: PathBuf,
}

impl SnapshotStore {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    pub fn path(&self) -> &Path {
        &self.state_file
    }

    pub fn exists(&self) -> bool {
        self.state_file.exists()
    }

    /// Load the snapshot, or the default one if nothing has been written yet.
    ///
    /// Does not create the file.
    pub fn read(&self) -> Result<Snapshot, PersistenceError> {
        if !self.state_file.exists() {
            debug!(path = %self.state_file.display(), "no snapshot on disk, using default");
            return Ok(Snapshot::default());
        }

        let content =
            fs::read_to_string(&self.state_file).map_err(|source| PersistenceError::Read {
                path: self.state_file.clone(),
                source,
            })?;
        let snapshot: Snapshot =
            serde_json::from_str(&content).map_err(|source| PersistenceError::Parse {
                path: self.state_file.clone(),
                source,
            })?;

        debug!(
            iteration = snapshot.iteration,
            phase = %snapshot.phase,
            history = snapshot.history.len(),
            "snapshot loaded"
        );
        Ok(snapshot)
    }

    /// Persist `snapshot` with a fresh timestamp and return what was written.
    ///
    /// The file is replaced atomically: contents go to a sibling temp file
    /// which is then renamed over the target.
    pub fn write(&self, snapshot: &Snapshot) -> Result<Snapshot, PersistenceError> {
        let mut written = snapshot.clone();
        written.timestamp = Utc::now();

        let mut buf = serde_json::to_string_pretty(&written).map_err(PersistenceError::Serialize)?;
        buf.push('\n');

        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).map_err(|source| PersistenceError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp_path = self.state_file.with_extension("json.tmp");
        fs::write(&tmp_path, &buf).map_err(|source| PersistenceError::Write {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.state_file).map_err(|source| PersistenceError::Write {
            path: self.state_file.clone(),
            source,
        })?;

        debug!(
            path = %self.state_file.display(),
            iteration = written.iteration,
            phase = %written.phase,
            "snapshot written"
        );
        Ok(written)
    }

    /// Overwrite the stored snapshot with the default, discarding all history.
    pub fn reset(&self) -> Result<Snapshot, PersistenceError> {
        self.write(&Snapshot::default())
    }
}
