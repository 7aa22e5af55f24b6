use crate::scan::is_log_file_name;
use crate::status::ParsingStatus;
use notify::{RecursiveMode, Watcher};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::mpsc;
use std::time::{Duration, Instant};

/// Result of waiting for log directory activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    NewData,
    Timeout,
}

/// True when any tracked file has grown past its committed offset, or an
/// untracked session log exists.
pub fn has_new_data(
    log_dir: &Path,
    statuses: &HashMap<String, ParsingStatus>,
) -> io::Result<bool> {
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_log_file_name(name) {
            continue;
        }
        match statuses.get(name) {
            Some(status) => {
                if entry.metadata()?.len() > status.pos {
                    return Ok(true);
                }
            }
            None => return Ok(true),
        }
    }
    Ok(false)
}

/// Block until the log directory has unread data or `timeout` elapses.
///
/// Returns immediately when data is already waiting; otherwise an OS file
/// watcher sleeps the thread until the directory changes, avoiding
/// busy-polling. The scheduling loop around this stays with the caller.
pub fn wait_for_changes(
    log_dir: &Path,
    statuses: &HashMap<String, ParsingStatus>,
    timeout: Duration,
) -> io::Result<WaitResult> {
    if has_new_data(log_dir, statuses)? {
        return Ok(WaitResult::NewData);
    }

    let (tx, rx) = mpsc::channel();
    let mut watcher =
        notify::recommended_watcher(move |event| {
            let _ = tx.send(event);
        })
        .map_err(io::Error::other)?;
    watcher
        .watch(log_dir, RecursiveMode::NonRecursive)
        .map_err(io::Error::other)?;

    // Data may have landed between the first check and the watch starting.
    if has_new_data(log_dir, statuses)? {
        return Ok(WaitResult::NewData);
    }

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(WaitResult::Timeout);
        }
        match rx.recv_timeout(remaining) {
            Ok(Ok(_event)) => {
                if has_new_data(log_dir, statuses)? {
                    return Ok(WaitResult::NewData);
                }
            }
            Ok(Err(err)) => return Err(io::Error::other(err)),
            Err(mpsc::RecvTimeoutError::Timeout) | Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Ok(WaitResult::Timeout);
            }
        }
    }
}
