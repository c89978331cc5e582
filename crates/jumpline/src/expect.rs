//! Trigger matching for the automated login phase.
//!
//! Output from the session is accumulated in a [`Matcher`] and scanned for a
//! fixed, labeled [`TriggerSet`]. The earliest match in the buffer wins; equal
//! offsets fall back to the order the triggers were declared in.
//!
//! Matching runs on raw bytes with no line anchoring and no ANSI stripping,
//! so a `$` in banner text ahead of a rejection message is read as a shell
//! prompt.

mod matcher;
mod pattern;

pub use matcher::{DEFAULT_BUFFER_SIZE, MatchResult, Matcher};
pub use pattern::{Pattern, Trigger, TriggerKind, TriggerOutcome, TriggerSet};
