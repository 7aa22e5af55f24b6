//! Checkpoint persistence for per-file parsing statuses.

use crate::status::ParsingStatus;
use fs2::FileExt;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// On-disk form of one status entry: the status fields under a `_type` tag,
/// so a checkpoint file is self-describing.
#[derive(Serialize, Deserialize)]
#[serde(tag = "_type")]
enum StatusRecord {
    LogParserStatus(ParsingStatus),
}

/// Stores the file-name to [`ParsingStatus`] map for each profile.
///
/// Checkpoints are written atomically (`.tmp` + rename), so a crash
/// mid-save leaves the previous checkpoint intact. The store holds an
/// exclusive advisory lock on its directory for its lifetime; a second
/// extractor process opening the same directory fails with `AlreadyExists`
/// instead of silently interleaving saves.
///
/// The checkpoint file is JSON and can be inspected directly:
///
/// ```text
/// $ cat checkpoints/default.json | jq .
/// {
///   "output_log_2021-05-01.txt": {
///     "_type": "LogParserStatus",
///     "Pos": 5210,
///     "VisitedWorldCount": 2,
///     "AuthUserDisplayName": "Alice",
///     ...
///   }
/// }
/// ```
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    lock: File,
}

impl CheckpointStore {
    /// Open a checkpoint directory, creating it if needed, and take the
    /// lock.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let lock_path = dir.join(".lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        lock.try_lock_exclusive().map_err(|_| {
            io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!(
                    "another process holds the checkpoint lock at {}",
                    lock_path.display()
                ),
            )
        })?;
        Ok(CheckpointStore { dir, lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn profile_path(&self, profile: &str) -> PathBuf {
        self.dir.join(format!("{profile}.json"))
    }

    /// Load the statuses for a profile.
    ///
    /// A missing checkpoint is an empty map. An unreadable one is treated
    /// as missing (with a warning); every file then restarts from offset
    /// zero, which re-validates records but re-emits nothing the caller has
    /// deduplicated.
    pub fn load(&self, profile: &str) -> io::Result<HashMap<String, ParsingStatus>> {
        let path = self.profile_path(profile);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(err) => return Err(err),
        };
        match serde_json::from_str::<HashMap<String, StatusRecord>>(&contents) {
            Ok(records) => Ok(records
                .into_iter()
                .map(|(name, StatusRecord::LogParserStatus(status))| (name, status))
                .collect()),
            Err(err) => {
                warn!(
                    "checkpoint {} is unreadable ({err}), starting fresh",
                    path.display()
                );
                Ok(HashMap::new())
            }
        }
    }

    /// Save the statuses for a profile atomically.
    pub fn save(
        &self,
        profile: &str,
        statuses: &HashMap<String, ParsingStatus>,
    ) -> io::Result<()> {
        let ordered: BTreeMap<&str, StatusRecord> = statuses
            .iter()
            .map(|(name, status)| (name.as_str(), StatusRecord::LogParserStatus(status.clone())))
            .collect();
        let json = serde_json::to_string_pretty(&ordered)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;

        let path = self.profile_path(profile);
        let tmp_path = path.with_extension("json.tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_data()?;
        drop(file);
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

impl Drop for CheckpointStore {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock);
    }
}
