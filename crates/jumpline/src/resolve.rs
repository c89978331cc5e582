//! Target resolution.
//!
//! A query is either a short ordinal into the last displayed result list or
//! free text searched across the inventory. Every search that is shown to
//! the user (or used to pick a login target) replaces the cached result list
//! so that the numbers printed now are the numbers accepted later.

use std::fmt;
use std::path::PathBuf;

use crate::cache::ResultCache;
use crate::error::{CacheError, ResolveError};
use crate::inventory::{InventorySnapshot, InventorySource, Machine};

/// Crate-level result for resolution.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// One way to log in to a machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    key: String,
    user: String,
    host: String,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(key: impl Into<String>, user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            user: user.into(),
            host: host.into(),
        }
    }

    /// Private key file, as passed to `ssh -i` on the bastion.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Remote user.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Remote host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// `user@host`.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// The command the bastion runs to reach the target.
    #[must_use]
    pub fn remote_command(&self) -> String {
        format!("ssh -i \"{}\" {}@{}", self.key, self.user, self.host)
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} (key {})", self.user, self.host, self.key)
    }
}

/// How candidates are derived from a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePolicy {
    /// Users to try, in order.
    pub usernames: Vec<String>,
    /// Appended to the key pair name to form the key file name.
    pub key_suffix: String,
    /// Directory holding key files on the bastion.
    pub key_dir: Option<PathBuf>,
}

impl Default for CandidatePolicy {
    fn default() -> Self {
        Self {
            usernames: vec!["ec2-user".into(), "ubuntu".into(), "root".into()],
            key_suffix: ".pem".into(),
            key_dir: None,
        }
    }
}

impl CandidatePolicy {
    /// Key file for key pair `key_name`.
    #[must_use]
    pub fn key_path(&self, key_name: &str) -> String {
        let file = format!("{key_name}{}", self.key_suffix);
        match &self.key_dir {
            Some(dir) => dir.join(file).display().to_string(),
            None => file,
        }
    }

    /// One candidate per configured user, all with the machine's address
    /// and key.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::IncompleteRecord`] if the machine has no
    /// address or key pair.
    pub fn candidates_for(&self, machine: &Machine) -> Result<Vec<Candidate>> {
        let host = machine
            .address()
            .ok_or_else(|| ResolveError::IncompleteRecord {
                id: machine.instance_id.clone(),
                field: "PrivateIpAddress",
            })?;
        let key_name = machine
            .key_name
            .as_deref()
            .ok_or_else(|| ResolveError::IncompleteRecord {
                id: machine.instance_id.clone(),
                field: "KeyName",
            })?;

        let key = self.key_path(key_name);
        Ok(self
            .usernames
            .iter()
            .map(|user| Candidate::new(key.clone(), user.clone(), host))
            .collect())
    }
}

/// A parsed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// A 1-based position in the cached result list.
    Ordinal(usize),
    /// Text to search for.
    Text(String),
}

impl Query {
    /// One or two ASCII digits are an ordinal; anything else is text.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        if (1..=2).contains(&input.len())
            && input.bytes().all(|b| b.is_ascii_digit())
            && let Ok(n) = input.parse()
        {
            return Self::Ordinal(n);
        }
        Self::Text(input.to_string())
    }
}

/// Machines whose address, identifier or any tag value contains `query`,
/// ignoring case. Each machine appears once, in inventory order.
#[must_use]
pub fn search_machines(snapshot: &InventorySnapshot, query: &str) -> Vec<Machine> {
    let needle = query.to_lowercase();
    let contains = |field: &str| field.to_lowercase().contains(&needle);

    snapshot
        .machines()
        .filter(|m| {
            m.address().is_some_and(contains)
                || contains(m.instance_id.as_str())
                || m.tags.iter().any(|t| contains(t.value.as_str()))
        })
        .cloned()
        .collect()
}

/// A scaling group and its member machines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMatch {
    /// Group name.
    pub name: String,
    /// Members found in the inventory, in group order.
    pub members: Vec<Machine>,
}

/// Scaling groups whose name or `Name` tag contains `query` (case
/// sensitive), expanded to their members. Members missing from the
/// inventory are skipped.
#[must_use]
pub fn search_groups(snapshot: &InventorySnapshot, query: &str) -> Vec<GroupMatch> {
    snapshot
        .groups()
        .iter()
        .filter(|g| g.name().contains(query) || g.name_tag().is_some_and(|t| t.contains(query)))
        .map(|g| GroupMatch {
            name: g.name().to_string(),
            members: g
                .instances
                .iter()
                .filter_map(|member| snapshot.machine(&member.instance_id).cloned())
                .collect(),
        })
        .collect()
}

/// Resolves queries against an inventory and the result cache.
#[derive(Debug)]
pub struct TargetResolver<I> {
    inventory: I,
    cache: ResultCache,
    policy: CandidatePolicy,
}

impl<I: InventorySource> TargetResolver<I> {
    /// Create a resolver.
    pub const fn new(inventory: I, cache: ResultCache, policy: CandidatePolicy) -> Self {
        Self {
            inventory,
            cache,
            policy,
        }
    }

    /// The result cache.
    #[must_use]
    pub const fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// The candidate policy.
    #[must_use]
    pub const fn policy(&self) -> &CandidatePolicy {
        &self.policy
    }

    /// Drop the cached inventory and the result list.
    ///
    /// # Errors
    ///
    /// Returns an error if either cannot be cleared.
    pub fn refresh(&mut self) -> Result<()> {
        self.cache.invalidate()?;
        self.inventory.refresh()?;
        Ok(())
    }

    /// Drop the cached inventory only. Ordinals from the last listing stay
    /// valid.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be cleared or refetched.
    pub fn refresh_inventory(&mut self) -> Result<()> {
        self.inventory.refresh()?;
        Ok(())
    }

    /// Search machines and cache the results for ordinal lookups.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be loaded or the cache
    /// cannot be written.
    pub fn find(&mut self, query: &str) -> Result<Vec<Machine>> {
        let found = self.search(query)?;
        self.cache.save(&found)?;
        Ok(found)
    }

    /// Search scaling groups and cache their members, flattened in display
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory cannot be loaded or the cache
    /// cannot be written.
    pub fn find_groups(&mut self, query: &str) -> Result<Vec<GroupMatch>> {
        let snapshot = self.inventory.snapshot()?;
        let groups = search_groups(&snapshot, query);
        let flat: Vec<Machine> = groups.iter().flat_map(|g| g.members.iter().cloned()).collect();
        self.cache.save(&flat)?;
        Ok(groups)
    }

    /// The single machine `query` refers to.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::StaleOrMissingCache`] for an ordinal with no cached
    ///   entry.
    /// - [`ResolveError::NotFound`] when text matches nothing; the cached
    ///   list is left as it was.
    /// - [`ResolveError::Ambiguous`] when text matches several machines and
    ///   none exactly; the matches have been cached.
    pub fn select(&mut self, query: &str) -> Result<Machine> {
        match Query::parse(query) {
            Query::Ordinal(ordinal) => self.select_ordinal(ordinal),
            Query::Text(text) => self.select_text(&text),
        }
    }

    /// Login candidates for the machine `query` refers to.
    ///
    /// # Errors
    ///
    /// As [`select`](Self::select), plus
    /// [`ResolveError::IncompleteRecord`] if the machine lacks an address or
    /// key pair.
    pub fn resolve(&mut self, query: &str) -> Result<Vec<Candidate>> {
        let machine = self.select(query)?;
        tracing::info!(
            id = %machine.instance_id,
            name = machine.name().unwrap_or("-"),
            "resolved target"
        );
        self.policy.candidates_for(&machine)
    }

    fn select_ordinal(&self, ordinal: usize) -> Result<Machine> {
        self.cache.get(ordinal).map_err(|err| match err {
            CacheError::Missing { .. } => ResolveError::StaleOrMissingCache { ordinal, cached: 0 },
            CacheError::OutOfRange { ordinal, cached } => {
                ResolveError::StaleOrMissingCache { ordinal, cached }
            }
            other => other.into(),
        })
    }

    fn search(&mut self, query: &str) -> Result<Vec<Machine>> {
        let snapshot = self.inventory.snapshot()?;
        Ok(search_machines(&snapshot, query))
    }

    fn select_text(&mut self, text: &str) -> Result<Machine> {
        let mut found = self.search(text)?;
        if found.is_empty() {
            // The previous listing stays valid for ordinals.
            return Err(ResolveError::NotFound {
                query: text.to_string(),
            });
        }
        self.cache.save(&found)?;

        if let Some(pos) = found
            .iter()
            .position(|m| m.instance_id == text || m.address() == Some(text))
        {
            return Ok(found.swap_remove(pos));
        }

        if found.len() == 1 {
            return Ok(found.remove(0));
        }
        Err(ResolveError::Ambiguous {
            query: text.to_string(),
            matches: found,
        })
    }
}
