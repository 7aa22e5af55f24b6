use crate::error::LogError;
use crate::event::LogEvent;
use crate::reader::{CursorStep, FileCursor};
use crate::status::ParsingStatus;
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub(crate) fn is_log_file_name(name: &str) -> bool {
    name.starts_with("output_log_") && name.ends_with(".txt")
}

/// Scans a log directory and merges its files into one event sequence.
///
/// Files are processed oldest-first using their current size as the
/// ordering key, and only the single largest file is read to the very end
/// (trailing partial record included) on the assumption that it is the
/// session currently being written. That is a best-effort policy, not a
/// correctness invariant; a finished file's trailing record is simply
/// picked up on a later pass once nothing follows it.
pub struct LogScanner {
    log_dir: PathBuf,
    target_user: String,
}

struct FileTask {
    name: String,
    path: PathBuf,
    size: u64,
    read_to_end: bool,
}

impl LogScanner {
    pub fn new(log_dir: impl Into<PathBuf>, target_user: impl Into<String>) -> Self {
        LogScanner {
            log_dir: log_dir.into(),
            target_user: target_user.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Reconcile `statuses` with the directory: insert a default status for
    /// every session log not yet tracked, drop entries whose file is gone.
    pub fn discover(&self, statuses: &mut HashMap<String, ParsingStatus>) -> io::Result<()> {
        let mut present = HashSet::new();
        for entry in fs::read_dir(&self.log_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !is_log_file_name(name) || !entry.file_type()?.is_file() {
                continue;
            }
            present.insert(name.to_string());
            statuses.entry(name.to_string()).or_default();
        }
        statuses.retain(|name, _| present.contains(name));
        Ok(())
    }

    /// Read every tracked file in size order, lazily.
    ///
    /// Event-by-event, the yielded status snapshots are committed back into
    /// `statuses`, so the map is always safe to persist. Files missing at
    /// stat or open time are skipped with a warning; any other I/O error
    /// ends the scan.
    pub fn scan<'a>(
        &'a self,
        statuses: &'a mut HashMap<String, ParsingStatus>,
    ) -> io::Result<ScanEvents<'a>> {
        let mut tasks = Vec::new();
        for name in statuses.keys() {
            let path = self.log_dir.join(name);
            match fs::metadata(&path) {
                Ok(meta) => tasks.push(FileTask {
                    name: name.clone(),
                    path,
                    size: meta.len(),
                    read_to_end: false,
                }),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    warn!("{} disappeared before reading, skipping", path.display());
                }
                Err(err) => return Err(err),
            }
        }
        tasks.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.name.cmp(&b.name)));
        if let Some(last) = tasks.last_mut() {
            last.read_to_end = true;
        }
        info!(
            "scanning {} session log(s) under {}",
            tasks.len(),
            self.log_dir.display()
        );
        Ok(ScanEvents {
            target_user: &self.target_user,
            statuses,
            tasks: tasks.into_iter(),
            current: None,
            failed: false,
        })
    }
}

/// Lazy merged event sequence over a whole directory.
/// See [`LogScanner::scan`].
pub struct ScanEvents<'a> {
    target_user: &'a str,
    statuses: &'a mut HashMap<String, ParsingStatus>,
    tasks: std::vec::IntoIter<FileTask>,
    current: Option<(String, FileCursor)>,
    failed: bool,
}

impl ScanEvents<'_> {
    /// The committed statuses so far; safe to persist between items.
    pub fn statuses(&self) -> &HashMap<String, ParsingStatus> {
        self.statuses
    }
}

impl crate::sink::EventSource for ScanEvents<'_> {
    fn next_event(&mut self) -> Option<Result<LogEvent, LogError>> {
        self.next()
    }

    fn statuses(&self) -> &HashMap<String, ParsingStatus> {
        self.statuses
    }
}

impl Iterator for ScanEvents<'_> {
    type Item = Result<LogEvent, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some((name, mut cursor)) = self.current.take() {
                match cursor.next_step() {
                    Some(CursorStep::Event(snapshot, event)) => {
                        self.statuses.insert(name.clone(), snapshot);
                        self.current = Some((name, cursor));
                        return Some(Ok(event));
                    }
                    Some(CursorStep::Skip(_)) => {
                        // Diagnostics were logged where the skip originated.
                        self.statuses.insert(name, cursor.status().clone());
                        continue;
                    }
                    Some(CursorStep::Fail(err)) => {
                        self.statuses.insert(name, cursor.status().clone());
                        if let LogError::Io(io_err) = &err {
                            if io_err.kind() == io::ErrorKind::NotFound {
                                warn!(
                                    "{} disappeared before reading, skipping",
                                    cursor.path().display()
                                );
                                continue;
                            }
                        }
                        error!("aborting scan: {err}");
                        self.failed = true;
                        return Some(Err(err));
                    }
                    None => {
                        self.statuses.insert(name, cursor.status().clone());
                        continue;
                    }
                }
            }
            let task = self.tasks.next()?;
            let status = self.statuses.get(&task.name).cloned().unwrap_or_default();
            self.current = Some((
                task.name,
                FileCursor::new(task.path, self.target_user, task.read_to_end, status),
            ));
        }
    }
}
