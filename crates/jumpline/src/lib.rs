//! jumpline: log in to cloud machines through a bastion host.
//!
//! Given a bastion and an ordered list of login candidates (key, user,
//! host) for one machine, jumpline runs `ssh` through the bastion in a
//! pseudo-terminal, answers host key questions, abandons candidates that are
//! refused, and hands the first session that reaches a shell prompt to the
//! user.
//!
//! Targets are resolved from an inventory snapshot by free-text search or by
//! the number a previous listing printed; listings are cached on disk so
//! that the numbers stay valid across invocations.
//!
//! # Example
//!
//! ```ignore
//! use jumpline::{CandidatePolicy, LoginOptions, LoginSequencer, ResultCache, TargetResolver};
//! use jumpline::inventory::FileInventory;
//! use jumpline::session::{BastionCommand, PtySpawner};
//!
//! let mut resolver = TargetResolver::new(
//!     FileInventory::new("/tmp/ss.awsData.json"),
//!     ResultCache::new("/tmp/ss.instances.json"),
//!     CandidatePolicy::default(),
//! );
//! let candidates = resolver.resolve("web-1")?;
//! let spawner = PtySpawner::new(BastionCommand::new("ssh", "bastion.example.com"));
//! let report = LoginSequencer::new(spawner, candidates, LoginOptions::default())
//!     .run()
//!     .await?;
//! ```

#![cfg(unix)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod expect;
pub mod interact;
pub mod inventory;
pub mod listing;
pub mod logging;
pub mod login;
pub mod mock;
pub mod resolve;
pub mod session;

pub use cache::ResultCache;
pub use config::Config;
pub use error::{
    CacheError, ConfigError, FailedAttempt, InventoryError, LoginError, Rejection, ResolveError,
    SpawnError,
};
pub use expect::{Matcher, Pattern, Trigger, TriggerKind, TriggerSet};
pub use inventory::{InventorySnapshot, InventorySource, Machine};
pub use login::{LoginOptions, LoginReport, LoginSequencer, LoginState};
pub use resolve::{Candidate, CandidatePolicy, TargetResolver};
pub use session::{LoginSession, SessionSpawner};
