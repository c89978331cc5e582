//! Trigger patterns and the login trigger table.

use std::fmt;

use regex::bytes::Regex;

/// A pattern searched for in raw session output.
#[derive(Clone)]
pub enum Pattern {
    /// Match an exact byte string.
    Literal(String),
    /// Match a regular expression.
    Regex(Regex),
}

impl Pattern {
    /// Create a literal pattern.
    #[must_use]
    pub fn literal(s: impl Into<String>) -> Self {
        Self::Literal(s.into())
    }

    /// Create a regex pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the regex is invalid.
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(pattern)?))
    }

    /// The pattern text, for display.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(s) => s,
            Self::Regex(r) => r.as_str(),
        }
    }

    /// Byte range of the first match in `haystack`.
    #[must_use]
    pub fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        match self {
            Self::Literal(s) => {
                let needle = s.as_bytes();
                if needle.is_empty() || needle.len() > haystack.len() {
                    return None;
                }
                haystack
                    .windows(needle.len())
                    .position(|w| w == needle)
                    .map(|start| (start, start + needle.len()))
            }
            Self::Regex(r) => r.find(haystack).map(|m| (m.start(), m.end())),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "Literal({s:?})"),
            Self::Regex(r) => write!(f, "Regex({:?})", r.as_str()),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

/// Label of a login trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// OpenSSH asking to accept an unknown host key.
    HostKeyConfirm,
    /// A non-root shell prompt (`$`).
    ShellPromptPrimary,
    /// A root shell prompt (`]#`).
    ShellPromptRoot,
    /// The remote refusing the user and naming another one.
    LoginAsUserHint,
    /// OpenSSH rejecting the key.
    PermissionDenied,
    /// The connection dropped.
    ConnectionClosed,
    /// A password prompt; no password is ever supplied.
    PasswordPrompt,
}

/// What a trigger means for the current candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Answer the host key question and start the candidate again.
    ConfirmHostKey,
    /// A shell is up; hand over to the user.
    Authenticated,
    /// This candidate will not work.
    Rejected,
}

impl TriggerKind {
    /// How the sequencer reacts to this trigger.
    #[must_use]
    pub const fn outcome(self) -> TriggerOutcome {
        match self {
            Self::HostKeyConfirm => TriggerOutcome::ConfirmHostKey,
            Self::ShellPromptPrimary | Self::ShellPromptRoot => TriggerOutcome::Authenticated,
            Self::LoginAsUserHint
            | Self::PermissionDenied
            | Self::ConnectionClosed
            | Self::PasswordPrompt => TriggerOutcome::Rejected,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HostKeyConfirm => "host key confirmation",
            Self::ShellPromptPrimary => "shell prompt",
            Self::ShellPromptRoot => "root shell prompt",
            Self::LoginAsUserHint => "asked to log in as another user",
            Self::PermissionDenied => "permission denied",
            Self::ConnectionClosed => "connection closed",
            Self::PasswordPrompt => "password prompt",
        })
    }
}

/// A labeled pattern.
#[derive(Debug, Clone)]
pub struct Trigger {
    /// What the pattern means.
    pub kind: TriggerKind,
    /// What to look for.
    pub pattern: Pattern,
}

impl Trigger {
    /// Create a trigger.
    pub fn new(kind: TriggerKind, pattern: impl Into<Pattern>) -> Self {
        Self {
            kind,
            pattern: pattern.into(),
        }
    }
}

/// An ordered set of triggers. Order only matters for matches at the same
/// offset.
#[derive(Debug, Clone, Default)]
pub struct TriggerSet {
    triggers: Vec<Trigger>,
}

impl TriggerSet {
    /// An empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            triggers: Vec::new(),
        }
    }

    /// The triggers for logging in through OpenSSH.
    #[must_use]
    pub fn login() -> Self {
        let host_key = Pattern::regex("(?i)are you sure you want to continue connecting")
            .unwrap_or_else(|_| Pattern::literal("Are you sure you want to continue connecting"));

        let mut set = Self::new();
        set.push(Trigger::new(TriggerKind::HostKeyConfirm, host_key))
            .push(Trigger::new(TriggerKind::ShellPromptPrimary, "$"))
            .push(Trigger::new(TriggerKind::ShellPromptRoot, "]#"))
            .push(Trigger::new(TriggerKind::LoginAsUserHint, "Please login as the user"))
            .push(Trigger::new(TriggerKind::PermissionDenied, "Permission denied"))
            .push(Trigger::new(TriggerKind::ConnectionClosed, "Connection closed"))
            .push(Trigger::new(TriggerKind::PasswordPrompt, "password:"));
        set
    }

    /// Append a trigger (lowest tie-break priority).
    pub fn push(&mut self, trigger: Trigger) -> &mut Self {
        self.triggers.push(trigger);
        self
    }

    /// Iterate in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    /// Number of triggers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Trigger at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Trigger> {
        self.triggers.get(index)
    }
}
