//! Accumulating matcher for session output.

use super::pattern::{TriggerKind, TriggerSet};

/// Default cap on accumulated output (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Accumulates output and finds the earliest trigger in it.
#[derive(Debug, Clone)]
pub struct Matcher {
    buffer: Vec<u8>,
    max_size: usize,
}

impl Matcher {
    /// Create a matcher keeping at most `max_size` bytes.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_size: max_size.max(1),
        }
    }

    /// Append output. When the cap is exceeded the oldest bytes are dropped.
    pub fn append(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > self.max_size {
            let excess = self.buffer.len() - self.max_size;
            self.buffer.drain(..excess);
        }
    }

    /// The accumulated bytes.
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Find the earliest matching trigger.
    ///
    /// Ties on start offset go to the trigger declared first.
    #[must_use]
    pub fn try_match_any(&self, triggers: &TriggerSet) -> Option<MatchResult> {
        let mut best: Option<MatchResult> = None;

        for (index, trigger) in triggers.iter().enumerate() {
            let Some((start, end)) = trigger.pattern.find(&self.buffer) else {
                continue;
            };
            match &best {
                Some(current) if current.start <= start => {}
                _ => {
                    best = Some(MatchResult {
                        trigger_index: index,
                        kind: trigger.kind,
                        start,
                        end,
                    });
                }
            }
        }

        best
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Position of a trigger match in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchResult {
    /// Index of the trigger in its set.
    pub trigger_index: usize,
    /// Label of the trigger.
    pub kind: TriggerKind,
    /// Start offset in the buffer.
    pub start: usize,
    /// End offset in the buffer.
    pub end: usize,
}
