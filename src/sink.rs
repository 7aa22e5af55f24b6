use crate::error::{LogError, LogResult};
use crate::event::LogEvent;
use crate::status::ParsingStatus;
use log::warn;
use std::collections::HashMap;
use std::io;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error surface of a downstream event sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink is temporarily over capacity; the write may be retried.
    #[error("sink capacity exceeded")]
    CapacityExceeded,
    /// Any other sink failure. Not retried.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Destination for extracted events.
pub trait EventSink {
    fn record(&mut self, event: &LogEvent) -> Result<(), SinkError>;
}

/// A lazy event sequence whose committed statuses can be observed between
/// items, so they can be persisted while a long pass is still running.
/// Implemented by [`ScanEvents`](crate::ScanEvents).
pub trait EventSource {
    fn next_event(&mut self) -> Option<LogResult<LogEvent>>;
    fn statuses(&self) -> &HashMap<String, ParsingStatus>;
}

#[derive(Debug, Error)]
pub enum DrainError {
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("checkpoint persist failed: {0}")]
    Checkpoint(#[source] io::Error),
}

/// Tuning for [`drain`].
#[derive(Debug, Clone)]
pub struct DrainOptions {
    /// Delay between capacity-exceeded retries.
    pub retry_delay: Duration,
    /// Retries after the first attempt before giving up.
    pub max_retries: u32,
    /// Minimum time between checkpoint callbacks.
    pub checkpoint_interval: Duration,
}

impl Default for DrainOptions {
    fn default() -> Self {
        DrainOptions {
            retry_delay: Duration::from_secs(10),
            max_retries: 2,
            checkpoint_interval: Duration::from_secs(20),
        }
    }
}

/// What a drain accomplished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Events recorded into the sink.
    pub recorded: u64,
    /// Whether a `JoinInstance` or `LeftWorld` was among them; the
    /// consumer's cue that presence changed and derived views need
    /// recomputing.
    pub moved_world: bool,
}

/// Pump an event source into a sink.
///
/// A full pass can take a while and its event volume is unbounded, so
/// `checkpoint` is handed the source's committed statuses whenever
/// `checkpoint_interval` has elapsed since the last call, and once more at
/// the end if anything was recorded.
pub fn drain<Src, S, F>(
    mut events: Src,
    sink: &mut S,
    options: &DrainOptions,
    mut checkpoint: F,
) -> Result<DrainReport, DrainError>
where
    Src: EventSource,
    S: EventSink + ?Sized,
    F: FnMut(&HashMap<String, ParsingStatus>) -> io::Result<()>,
{
    let mut report = DrainReport::default();
    let mut last_checkpoint = Instant::now();
    while let Some(event) = events.next_event() {
        let event = event?;
        record_with_retry(sink, &event, options)?;
        report.recorded += 1;
        report.moved_world |= matches!(
            event,
            LogEvent::JoinInstance { .. } | LogEvent::LeftWorld { .. }
        );
        if last_checkpoint.elapsed() >= options.checkpoint_interval {
            checkpoint(events.statuses()).map_err(DrainError::Checkpoint)?;
            last_checkpoint = Instant::now();
        }
    }
    if report.recorded > 0 {
        checkpoint(events.statuses()).map_err(DrainError::Checkpoint)?;
    }
    Ok(report)
}

fn record_with_retry<S: EventSink + ?Sized>(
    sink: &mut S,
    event: &LogEvent,
    options: &DrainOptions,
) -> Result<(), SinkError> {
    let mut attempts = 0;
    loop {
        match sink.record(event) {
            Ok(()) => return Ok(()),
            Err(SinkError::CapacityExceeded) if attempts < options.max_retries => {
                attempts += 1;
                warn!(
                    "sink over capacity, retrying in {:?} (attempt {attempts})",
                    options.retry_delay
                );
                thread::sleep(options.retry_delay);
            }
            Err(err) => return Err(err),
        }
    }
}
