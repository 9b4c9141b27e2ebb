//! Processing cursor / dedup guard
//!
//! A monotonically increasing timestamp watermark marking the newest
//! message already evaluated. A message is eligible for action only while
//! its timestamp strictly exceeds the watermark.

/// Per-session watermark over message timestamps (milliseconds).
#[derive(Debug, Clone, Default)]
pub struct ProcessingCursor {
    watermark_ms: i64,
}

impl ProcessingCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff the candidate has not been evaluated yet.
    pub fn should_process(&self, candidate_ms: i64) -> bool {
        candidate_ms > self.watermark_ms
    }

    /// Advance the watermark. Non-increasing timestamps are ignored, so the
    /// watermark never goes backwards.
    pub fn mark_processed(&mut self, timestamp_ms: i64) {
        if timestamp_ms > self.watermark_ms {
            self.watermark_ms = timestamp_ms;
        }
    }

    pub fn watermark(&self) -> i64 {
        self.watermark_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_cursor_processes_everything_positive() {
        let cursor = ProcessingCursor::new();
        assert!(cursor.should_process(1));
        assert!(!cursor.should_process(0));
    }

    #[test]
    fn test_strictly_greater_required() {
        let mut cursor = ProcessingCursor::new();
        cursor.mark_processed(1_000);
        assert!(!cursor.should_process(999));
        assert!(!cursor.should_process(1_000));
        assert!(cursor.should_process(1_001));
    }

    #[test]
    fn test_watermark_never_decreases() {
        let mut cursor = ProcessingCursor::new();
        cursor.mark_processed(5_000);
        cursor.mark_processed(3_000);
        cursor.mark_processed(5_000);
        assert_eq!(cursor.watermark(), 5_000);
        assert!(cursor.should_process(5_001));
    }
}
