use crate::error::LogError;
use crate::event::LogEvent;
use crate::segment::RecordSegmenter;
use crate::status::{self, ParsingStatus, TransitionError};
use log::{info, warn};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Ceiling on bytes a pass may consume before the owning account of the log
/// has been identified.
pub const LOG_BUFFER_SIZE: u64 = 102_400;

/// Why a file was skipped instead of read to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file was produced under a different account. Expected whenever
    /// several accounts share a log directory.
    IdentityMismatch,
    /// The owning account could not be identified within
    /// [`LOG_BUFFER_SIZE`] bytes of unconfirmed progress.
    BufferOverflow,
}

/// How a single-file pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Completed,
    Skipped(SkipReason),
}

/// A step produced by [`FileCursor::next_step`]. `Skip` and `Fail` are
/// terminal; the cursor yields nothing further after either.
pub(crate) enum CursorStep {
    Event(ParsingStatus, LogEvent),
    Skip(SkipReason),
    Fail(LogError),
}

/// Drives one file through the segment/parse/apply pipeline.
///
/// The cursor owns a private working [`ParsingStatus`]; every emitted event
/// is paired with a value snapshot of the status taken right after the
/// record that produced it, so whoever consumes the cursor can commit
/// exactly as far as it has yielded.
///
/// While the log's owning account is unconfirmed, emitted events are parked
/// in `held` instead of being yielded. Confirmation flushes `held` into
/// `ready` in order; a mismatch or an exhausted byte budget abandons the
/// file instead.
pub(crate) struct FileCursor {
    path: PathBuf,
    target_user: String,
    read_to_end: bool,
    working: ParsingStatus,
    start_pos: u64,
    stream: Option<BufReader<File>>,
    segmenter: RecordSegmenter,
    held: Vec<(ParsingStatus, LogEvent)>,
    ready: VecDeque<(ParsingStatus, LogEvent)>,
    eof: bool,
    done: bool,
}

impl FileCursor {
    pub(crate) fn new(
        path: PathBuf,
        target_user: &str,
        read_to_end: bool,
        status: ParsingStatus,
    ) -> Self {
        let start_pos = status.pos;
        FileCursor {
            path,
            target_user: target_user.to_string(),
            read_to_end,
            working: status,
            start_pos,
            stream: None,
            segmenter: RecordSegmenter::new(),
            held: Vec::new(),
            ready: VecDeque::new(),
            eof: false,
            done: false,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// The working status, reflecting every record consumed so far.
    pub(crate) fn status(&self) -> &ParsingStatus {
        &self.working
    }

    /// Open the file and seek to the resume offset. `Ok(false)` means there
    /// is nothing new to read.
    fn open(&mut self) -> Result<bool, LogError> {
        let file = File::open(&self.path)?;
        let len = file.metadata()?.len();
        if len <= self.working.pos {
            return Ok(false);
        }
        let mut stream = BufReader::new(file);
        stream.seek(SeekFrom::Start(self.working.pos))?;
        info!(
            "reading {} from byte {}",
            self.path.display(),
            self.working.pos
        );
        self.stream = Some(stream);
        Ok(true)
    }

    pub(crate) fn next_step(&mut self) -> Option<CursorStep> {
        if self.done {
            return None;
        }
        loop {
            if let Some((snapshot, event)) = self.ready.pop_front() {
                return Some(CursorStep::Event(snapshot, event));
            }
            if self.eof {
                self.done = true;
                if !self.held.is_empty() {
                    warn!(
                        "could not identify the owning account of {} before end of file, skipping",
                        self.path.display()
                    );
                    return Some(CursorStep::Skip(SkipReason::BufferOverflow));
                }
                return None;
            }
            if self.stream.is_none() {
                match self.open() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.eof = true;
                        continue;
                    }
                    Err(err) => {
                        self.done = true;
                        return Some(CursorStep::Fail(err));
                    }
                }
            }
            let mut chunk = Vec::new();
            let read = match self.stream.as_mut() {
                Some(stream) => stream.read_until(b'\n', &mut chunk),
                None => continue,
            };
            match read {
                Ok(0) => {
                    // Release the handle before resolving the tail.
                    self.stream = None;
                    if self.read_to_end {
                        if let Some(tail) = self.segmenter.take_tail() {
                            if let Some(step) = self.consume(&tail) {
                                self.done = true;
                                return Some(step);
                            }
                        }
                    }
                    self.eof = true;
                }
                Ok(_) => {
                    let text = String::from_utf8_lossy(&chunk);
                    for record in self.segmenter.feed(&text) {
                        if let Some(step) = self.consume(&record) {
                            self.done = true;
                            return Some(step);
                        }
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(CursorStep::Fail(err.into()));
                }
            }
        }
    }

    /// Run one record through the pipeline. `Some` is a terminal step.
    fn consume(&mut self, raw: &str) -> Option<CursorStep> {
        let applied = status::consume_record(raw, &mut self.working, &self.target_user);
        let event = match applied {
            Ok(event) => event,
            Err(TransitionError::IdentityMismatch { found }) => {
                info!(
                    "{} belongs to '{}', not '{}', skipping",
                    self.path.display(),
                    found,
                    self.target_user
                );
                return Some(CursorStep::Skip(SkipReason::IdentityMismatch));
            }
            Err(TransitionError::InvalidStatus(detail)) => {
                return Some(CursorStep::Fail(LogError::InvalidStatus {
                    path: self.path.clone(),
                    offset: self.working.pos,
                    detail,
                }));
            }
        };
        let Some(event) = event else {
            return None;
        };

        if self.working.is_confirmed_for(&self.target_user) {
            if self.held.is_empty() {
                self.ready.push_back((self.working.clone(), event));
            } else {
                // Identity just confirmed; replay everything in order.
                self.held.push((self.working.clone(), event));
                self.ready.extend(self.held.drain(..));
            }
        } else {
            if self.working.pos - self.start_pos >= LOG_BUFFER_SIZE {
                warn!(
                    "could not identify the owning account of {} within {} bytes, skipping",
                    self.path.display(),
                    LOG_BUFFER_SIZE
                );
                return Some(CursorStep::Skip(SkipReason::BufferOverflow));
            }
            self.held.push((self.working.clone(), event));
        }
        None
    }
}

/// Reads one session log incrementally, resuming from the byte offset in a
/// caller-owned [`ParsingStatus`].
///
/// `read_to_end` controls the trailing, not-yet-terminated record: `false`
/// leaves it for a later pass (the next record start will delimit it),
/// `true` flushes it, which is appropriate only for a file that will not
/// grow further in a meaningful way this pass.
pub struct LogFileReader {
    path: PathBuf,
    target_user: String,
    read_to_end: bool,
}

impl LogFileReader {
    pub fn new(
        path: impl Into<PathBuf>,
        target_user: impl Into<String>,
        read_to_end: bool,
    ) -> Self {
        LogFileReader {
            path: path.into(),
            target_user: target_user.into(),
            read_to_end,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Begin or resume a pass. The iterator borrows `status` for its
    /// lifetime and commits progress into it as events are yielded; when the
    /// iterator is exhausted, `status` covers everything consumed, even if
    /// no event was emitted.
    pub fn read<'a>(&self, status: &'a mut ParsingStatus) -> FileEvents<'a> {
        let cursor = FileCursor::new(
            self.path.clone(),
            &self.target_user,
            self.read_to_end,
            status.clone(),
        );
        FileEvents {
            cursor,
            status,
            outcome: ReadOutcome::Completed,
            finished: false,
        }
    }
}

/// Lazy event sequence over a single file. See [`LogFileReader::read`].
pub struct FileEvents<'a> {
    cursor: FileCursor,
    status: &'a mut ParsingStatus,
    outcome: ReadOutcome,
    finished: bool,
}

impl FileEvents<'_> {
    /// How the pass ended. Meaningful once the iterator has returned `None`.
    pub fn outcome(&self) -> ReadOutcome {
        self.outcome
    }
}

impl Iterator for FileEvents<'_> {
    type Item = Result<LogEvent, LogError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.cursor.next_step() {
            Some(CursorStep::Event(snapshot, event)) => {
                *self.status = snapshot;
                Some(Ok(event))
            }
            Some(CursorStep::Skip(reason)) => {
                self.finished = true;
                self.outcome = ReadOutcome::Skipped(reason);
                *self.status = self.cursor.status().clone();
                None
            }
            Some(CursorStep::Fail(err)) => {
                self.finished = true;
                *self.status = self.cursor.status().clone();
                Some(Err(err))
            }
            None => {
                self.finished = true;
                *self.status = self.cursor.status().clone();
                None
            }
        }
    }
}
