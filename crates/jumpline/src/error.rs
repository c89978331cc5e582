//! Error types for jumpline.
//!
//! Each layer has its own error enum: resolving a target
//! ([`ResolveError`]), reading and writing the ordinal cache
//! ([`CacheError`]), loading the inventory ([`InventoryError`]), driving the
//! login ([`LoginError`]) and loading configuration ([`ConfigError`]).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::inventory::Machine;

/// Errors raised while starting an automated session.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// PTY allocation or process start failed.
    #[error(transparent)]
    Pty(#[from] jumpline_pty::PtyError),

    /// A command or argument cannot be passed to a process.
    #[error("invalid {kind} {value:?}: {reason}")]
    InvalidArgument {
        /// Which input was rejected ("program", "argument").
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Why a single login candidate was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A failure trigger appeared in the output.
    Trigger(crate::expect::TriggerKind),
    /// The process ended without printing any trigger.
    Exited,
    /// The host key prompt kept coming back after being answered.
    HostKeyLoop,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trigger(kind) => write!(f, "{kind}"),
            Self::Exited => f.write_str("connection ended without a prompt"),
            Self::HostKeyLoop => f.write_str("host key confirmation did not stick"),
        }
    }
}

/// A candidate that was tried and failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAttempt {
    /// `user@host` of the candidate.
    pub target: String,
    /// What ended the attempt.
    pub reason: Rejection,
}

fn format_failures(failures: &[FailedAttempt]) -> String {
    failures
        .iter()
        .map(|f| format!("\n  {}: {}", f.target, f.reason))
        .collect()
}

/// Errors from the login sequencer.
#[derive(Debug, Error)]
pub enum LoginError {
    /// Every candidate was tried and none reached a shell.
    #[error("all {} login candidates failed:{}", failures.len(), format_failures(failures))]
    AuthExhausted {
        /// One entry per candidate, in trial order.
        failures: Vec<FailedAttempt>,
    },

    /// There was nothing to try.
    #[error("no login candidates to try")]
    NoCandidates,

    /// The automated session could not be created.
    #[error("failed to start session: {0}")]
    Spawn(#[from] SpawnError),

    /// An I/O error while talking to the session.
    #[error("{context}: {source}")]
    Io {
        /// What was being done.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl LoginError {
    pub(crate) const fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    /// Whether every candidate was rejected.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::AuthExhausted { .. })
    }
}

impl From<jumpline_pty::PtyError> for LoginError {
    fn from(err: jumpline_pty::PtyError) -> Self {
        Self::Spawn(SpawnError::Pty(err))
    }
}

/// Errors from the ordinal result cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No cached list exists.
    #[error("no cached result list at {}", path.display())]
    Missing {
        /// Where the cache was expected.
        path: PathBuf,
    },

    /// The ordinal does not name a cached entry.
    #[error("no entry {ordinal} in the result list ({cached} entries)")]
    OutOfRange {
        /// The requested 1-based ordinal.
        ordinal: usize,
        /// Entries in the cache.
        cached: usize,
    },

    /// The cache file could not be read or written.
    #[error("result cache {}: {source}", path.display())]
    Io {
        /// The cache path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The cache file is not a valid result list.
    #[error("result cache is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from the inventory collaborator.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// No snapshot is cached and no command is configured to fetch one.
    #[error("no inventory snapshot at {} (set inventory_command to fetch one)", path.display())]
    Missing {
        /// Where the snapshot was expected.
        path: PathBuf,
    },

    /// The snapshot file could not be read or written.
    #[error("inventory snapshot {}: {source}", path.display())]
    Io {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot is not valid JSON of the expected shape.
    #[error("inventory snapshot is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// The fetch command failed.
    #[error("inventory command `{command}` failed ({status}): {stderr}")]
    Command {
        /// The command line.
        command: String,
        /// Its exit status.
        status: String,
        /// Captured stderr.
        stderr: String,
    },
}

/// Errors from target resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The query matched nothing.
    #[error("no machine matches '{query}'")]
    NotFound {
        /// The query.
        query: String,
    },

    /// An ordinal was given but the cached list is missing or too short.
    #[error(
        "ordinal {ordinal} is not in the last result list ({cached} entries); run `jumpline find` again"
    )]
    StaleOrMissingCache {
        /// The requested 1-based ordinal.
        ordinal: usize,
        /// Entries in the cache (0 if missing).
        cached: usize,
    },

    /// Free text matched several machines and none exactly.
    #[error("'{query}' matches {} machines; pick one by number", matches.len())]
    Ambiguous {
        /// The query.
        query: String,
        /// The matches, in the order they were cached.
        matches: Vec<Machine>,
    },

    /// The machine lacks a field needed to log in.
    #[error("machine {id} has no {field}")]
    IncompleteRecord {
        /// Machine identifier.
        id: String,
        /// The missing field.
        field: &'static str,
    },

    /// The inventory could not be loaded.
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// The result cache could not be used.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        /// The config path.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this tool.
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        /// The config path.
        path: PathBuf,
        /// The parse error.
        #[source]
        source: toml::de::Error,
    },

    /// An extra prompt pattern is not a valid regex.
    #[error("invalid prompt pattern '{pattern}': {source}")]
    InvalidPrompt {
        /// The pattern text.
        pattern: String,
        /// The regex error.
        #[source]
        source: regex::Error,
    },

    /// Logging in needs a bastion host.
    #[error("no jump host configured (set jump_host, JUMPLINE_JUMP_HOST or --jump)")]
    MissingJumpHost,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::TriggerKind;

    #[test]
    fn exhausted_lists_every_failure() {
        let err = LoginError::AuthExhausted {
            failures: vec![
                FailedAttempt {
                    target: "ec2-user@10.0.0.5".into(),
                    reason: Rejection::Trigger(TriggerKind::PermissionDenied),
                },
                FailedAttempt {
                    target: "root@10.0.0.5".into(),
                    reason: Rejection::Exited,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("all 2 login candidates failed"));
        assert!(text.contains("ec2-user@10.0.0.5: permission denied"));
        assert!(text.contains("root@10.0.0.5: connection ended without a prompt"));
        assert!(err.is_exhausted());
    }

    #[test]
    fn stale_cache_message_names_ordinal() {
        let err = ResolveError::StaleOrMissingCache {
            ordinal: 4,
            cached: 3,
        };
        assert!(err.to_string().contains("ordinal 4"));
        assert!(err.to_string().contains("3 entries"));
    }
}
