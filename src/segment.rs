use regex::Regex;
use std::sync::LazyLock;

/// Anchors the start of a record: a `yyyy.MM.dd HH:mm:ss` timestamp, the
/// padded severity column (which never contains a dash), and the dash
/// separator.
static RECORD_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}\.\d{2}\.\d{2} \d{2}:\d{2}:\d{2}[^-]+-").unwrap());

/// Splits an incrementally fed text stream into discrete log records.
///
/// A record runs from one start-pattern match to the next, so multi-line
/// records (stack traces and the like) stay in one piece. Content before the
/// first match is emitted as-is; the parser discards it. The trailing,
/// possibly unterminated record is retained until [`take_tail`] is called.
///
/// [`take_tail`]: RecordSegmenter::take_tail
#[derive(Debug, Default)]
pub(crate) struct RecordSegmenter {
    buffer: String,
}

impl RecordSegmenter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a decoded chunk, returning every record it completed.
    pub(crate) fn feed(&mut self, chunk: &str) -> Vec<String> {
        self.buffer.push_str(chunk);

        let mut records = Vec::new();
        let mut prev = 0;
        for m in RECORD_START.find_iter(&self.buffer) {
            if prev != m.start() {
                records.push(self.buffer[prev..m.start()].to_string());
            }
            prev = m.start();
        }
        if prev > 0 {
            self.buffer.drain(..prev);
        }
        records
    }

    /// Flush the retained tail as a final record, emptying the buffer.
    pub(crate) fn take_tail(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}
