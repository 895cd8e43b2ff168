//! Monotonic fetch cursor for append-only timelines.

use watchpost_api::Timestamped;

/// Tracks where the next incremental fetch should start.
///
/// The server treats `start` as inclusive, so after consuming a batch the
/// cursor moves to the last record's timestamp plus one. Empty batches leave
/// it untouched. Millisecond timestamps are assumed not to tie across a
/// batch boundary; two records sharing the final millisecond of a batch
/// would be re-delivered and duplicated, which matches the upstream
/// contract of strictly advancing sample clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorAccumulator {
    start: u64,
    cursor: u64,
}

impl CursorAccumulator {
    /// Cursor positioned at `start` (epoch milliseconds).
    pub fn new(start: u64) -> Self {
        Self {
            start,
            cursor: start,
        }
    }

    /// Inclusive lower bound for the next fetch.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// The configured start of the window this cursor walks.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Advance past a batch that is about to be appended. No-op for empty
    /// batches.
    pub fn advance<T: Timestamped>(&mut self, batch: &[T]) {
        if let Some(last) = batch.last() {
            self.cursor = last.timestamp_ms() + 1;
        }
    }

    /// Rewind to a new window start. The owning buffer must be cleared by
    /// the caller; the cursor only tracks fetch positions.
    pub fn reset(&mut self, start: u64) {
        self.start = start;
        self.cursor = start;
    }
}
