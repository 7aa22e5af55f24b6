use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced while extracting events from session logs.
///
/// Expected per-file conditions (a log produced under another account, an
/// unidentifiable log) are not errors; readers resolve those internally and
/// report them through [`ReadOutcome`](crate::ReadOutcome).
#[derive(Debug, Error)]
pub enum LogError {
    /// A parsed record contradicts the tracked world/instance context.
    ///
    /// This means the log is corrupt or interleaved in a shape the engine
    /// does not support, and silently skipping it could hide data loss.
    #[error("log record out of order at byte {offset} in {}: {detail}", path.display())]
    InvalidStatus {
        path: PathBuf,
        offset: u64,
        detail: String,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Convenience alias for extraction results.
pub type LogResult<T> = Result<T, LogError>;
