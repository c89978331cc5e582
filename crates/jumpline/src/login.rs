//! The login sequencer.
//!
//! Candidates are tried strictly in order, one live session at a time. For
//! each one the session output is scanned for login triggers:
//!
//! - a host key question is answered with `yes` and the same candidate is
//!   started again, at most [`LoginOptions::max_host_key_confirmations`]
//!   times;
//! - a shell prompt hands the session to the user;
//! - a rejection, or the session closing without any trigger, disconnects
//!   and moves on to the next candidate.
//!
//! The control flow is a [`LoginState`] plus the pure [`advance`] function,
//! driven by a loop in [`LoginSequencer::run`].

use std::time::Duration;

use jumpline_pty::ExitStatus;

use crate::error::{FailedAttempt, LoginError, Rejection};
use crate::expect::{DEFAULT_BUFFER_SIZE, Matcher, TriggerOutcome, TriggerSet};
use crate::resolve::Candidate;
use crate::session::{LoginSession, SessionSpawner};

/// Where the sequencer is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    /// Trying the candidate at this index.
    Trying(usize),
    /// A candidate reached a shell; the user has the terminal.
    Interactive,
    /// Every candidate failed.
    Exhausted,
}

/// How one run of a candidate's session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The host key question was answered; the candidate must start over.
    HostKeyConfirmed,
    /// A shell prompt appeared.
    Authenticated,
    /// The candidate failed.
    Rejected(Rejection),
}

/// Next state after `outcome` for a list of `candidates` entries.
///
/// Terminal states never change.
#[must_use]
pub const fn advance(state: LoginState, outcome: AttemptOutcome, candidates: usize) -> LoginState {
    match state {
        LoginState::Trying(i) => match outcome {
            AttemptOutcome::HostKeyConfirmed => LoginState::Trying(i),
            AttemptOutcome::Authenticated => LoginState::Interactive,
            AttemptOutcome::Rejected(_) => {
                if i + 1 >= candidates {
                    LoginState::Exhausted
                } else {
                    LoginState::Trying(i + 1)
                }
            }
        },
        terminal => terminal,
    }
}

/// Tunables for [`LoginSequencer`].
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// Written to a session before it is abandoned (OpenSSH escape).
    pub disconnect_sequence: Vec<u8>,
    /// How long a retired session may take to exit before it is killed.
    pub retire_grace: Duration,
    /// Host key answers allowed per candidate before the prompt counts as a
    /// failure.
    pub max_host_key_confirmations: u32,
    /// Cap on output kept for matching.
    pub buffer_size: usize,
    /// The triggers to scan for.
    pub triggers: TriggerSet,
}

impl Default for LoginOptions {
    fn default() -> Self {
        Self {
            disconnect_sequence: b"~.".to_vec(),
            retire_grace: Duration::from_millis(1000),
            max_host_key_confirmations: 3,
            buffer_size: DEFAULT_BUFFER_SIZE,
            triggers: TriggerSet::login(),
        }
    }
}

/// Result of a login that reached a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReport {
    /// The candidate that worked.
    pub candidate: Candidate,
    /// Its position in the list.
    pub index: usize,
    /// How the interactive session ended.
    pub status: ExitStatus,
}

/// Tries candidates in order until one reaches a shell.
#[derive(Debug)]
pub struct LoginSequencer<S> {
    spawner: S,
    candidates: Vec<Candidate>,
    options: LoginOptions,
}

/// What the scan of a single session produced.
enum Scan<T> {
    Confirm(T),
    Shell(T, Vec<u8>),
    Reject(T, Rejection),
    Closed(T),
}

impl<S: SessionSpawner> LoginSequencer<S> {
    /// Create a sequencer.
    pub const fn new(spawner: S, candidates: Vec<Candidate>, options: LoginOptions) -> Self {
        Self {
            spawner,
            candidates,
            options,
        }
    }

    /// Run the sequence to completion.
    ///
    /// Returns once the interactive session has ended.
    ///
    /// # Errors
    ///
    /// - [`LoginError::NoCandidates`] for an empty list.
    /// - [`LoginError::AuthExhausted`] when every candidate failed.
    /// - [`LoginError::Spawn`] or [`LoginError::Io`] when a session cannot
    ///   be started or driven; these stop the sequence at once.
    pub async fn run(mut self) -> Result<LoginReport, LoginError> {
        if self.candidates.is_empty() {
            return Err(LoginError::NoCandidates);
        }

        let total = self.candidates.len();
        let mut state = LoginState::Trying(0);
        let mut confirmations = 0u32;
        let mut failures = Vec::new();

        while let LoginState::Trying(index) = state {
            let candidate = &self.candidates[index];
            tracing::info!(
                candidate = index + 1,
                of = total,
                login = %candidate.target(),
                "trying login"
            );

            let session = self.spawner.spawn(candidate).await?;
            let outcome = match self.scan(session).await? {
                Scan::Confirm(mut session) => {
                    if confirmations < self.options.max_host_key_confirmations {
                        confirmations += 1;
                        tracing::warn!(login = %candidate.target(), "accepting host key, reconnecting");
                        let answered = session.send(b"yes\n").await;
                        session.retire(self.options.retire_grace).await?;
                        match answered {
                            Ok(()) => AttemptOutcome::HostKeyConfirmed,
                            Err(err) => {
                                tracing::debug!(error = %err, "host key answer not delivered");
                                AttemptOutcome::Rejected(Rejection::Exited)
                            }
                        }
                    } else {
                        self.abandon(session).await?;
                        AttemptOutcome::Rejected(Rejection::HostKeyLoop)
                    }
                }
                Scan::Reject(session, reason) => {
                    self.abandon(session).await?;
                    AttemptOutcome::Rejected(reason)
                }
                Scan::Closed(session) => {
                    session.retire(self.options.retire_grace).await?;
                    AttemptOutcome::Rejected(Rejection::Exited)
                }
                Scan::Shell(session, replay) => {
                    tracing::info!(login = %candidate.target(), "logged in");
                    let status = session.interact(replay).await?;
                    return Ok(LoginReport {
                        candidate: candidate.clone(),
                        index,
                        status,
                    });
                }
            };

            if let AttemptOutcome::Rejected(reason) = outcome {
                tracing::warn!(login = %candidate.target(), %reason, "login candidate failed");
                failures.push(FailedAttempt {
                    target: candidate.target(),
                    reason,
                });
                confirmations = 0;
            }
            state = advance(state, outcome, total);
        }

        Err(LoginError::AuthExhausted { failures })
    }

    /// Read from `session` until a trigger appears or output ends.
    async fn scan(&self, mut session: S::Session) -> Result<Scan<S::Session>, LoginError> {
        let mut matcher = Matcher::new(self.options.buffer_size);
        let mut transcript = Vec::new();

        loop {
            let Some(chunk) = session.next_chunk().await? else {
                tracing::debug!("session closed without a trigger");
                return Ok(Scan::Closed(session));
            };
            transcript.extend_from_slice(&chunk);
            matcher.append(&chunk);

            let Some(found) = matcher.try_match_any(&self.options.triggers) else {
                continue;
            };
            tracing::debug!(
                kind = ?found.kind,
                pattern = self
                    .options
                    .triggers
                    .get(found.trigger_index)
                    .map_or("", |t| t.pattern.as_str()),
                start = found.start,
                end = found.end,
                "trigger matched"
            );

            return Ok(match found.kind.outcome() {
                TriggerOutcome::ConfirmHostKey => Scan::Confirm(session),
                TriggerOutcome::Authenticated => Scan::Shell(session, transcript),
                TriggerOutcome::Rejected => Scan::Reject(session, Rejection::Trigger(found.kind)),
            });
        }
    }

    /// Disconnect and retire a session that will not be used.
    async fn abandon(&self, mut session: S::Session) -> Result<(), LoginError> {
        // A rejected client often exits on its own right after printing the
        // reason; the write then fails and retiring is all that is left.
        if !self.options.disconnect_sequence.is_empty()
            && let Err(err) = session.send(&self.options.disconnect_sequence).await
        {
            tracing::debug!(error = %err, "disconnect sequence not delivered");
        }
        session.retire(self.options.retire_grace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expect::TriggerKind;

    const DENIED: AttemptOutcome =
        AttemptOutcome::Rejected(Rejection::Trigger(TriggerKind::PermissionDenied));

    #[test]
    fn rejection_moves_to_next_candidate() {
        assert_eq!(advance(LoginState::Trying(0), DENIED, 3), LoginState::Trying(1));
        assert_eq!(advance(LoginState::Trying(1), DENIED, 3), LoginState::Trying(2));
    }

    #[test]
    fn rejection_of_last_candidate_exhausts() {
        assert_eq!(advance(LoginState::Trying(2), DENIED, 3), LoginState::Exhausted);
    }

    #[test]
    fn host_key_keeps_index() {
        assert_eq!(
            advance(LoginState::Trying(1), AttemptOutcome::HostKeyConfirmed, 3),
            LoginState::Trying(1)
        );
    }

    #[test]
    fn prompt_goes_interactive() {
        assert_eq!(
            advance(LoginState::Trying(2), AttemptOutcome::Authenticated, 3),
            LoginState::Interactive
        );
    }

    #[test]
    fn terminal_states_are_final() {
        for outcome in [DENIED, AttemptOutcome::Authenticated, AttemptOutcome::HostKeyConfirmed] {
            assert_eq!(advance(LoginState::Interactive, outcome, 3), LoginState::Interactive);
            assert_eq!(advance(LoginState::Exhausted, outcome, 3), LoginState::Exhausted);
        }
    }
}
