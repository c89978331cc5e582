//! Environment-based configuration.

use std::collections::HashMap;

/// Environment configuration prefix.
pub const DEFAULT_PREFIX: &str = "JUMPLINE";

/// Variable names, without the prefix.
pub mod vars {
    /// Path of the config file.
    pub const CONFIG: &str = "CONFIG";
    /// Bastion host.
    pub const JUMP_HOST: &str = "JUMP_HOST";
    /// Local ssh program.
    pub const SSH_PROGRAM: &str = "SSH_PROGRAM";
    /// Result cache file.
    pub const RESULTS_CACHE: &str = "RESULTS_CACHE";
    /// Inventory snapshot file.
    pub const INVENTORY_CACHE: &str = "INVENTORY_CACHE";
    /// Command that prints an inventory snapshot.
    pub const INVENTORY_COMMAND: &str = "INVENTORY_COMMAND";
    /// Directory of key files on the bastion.
    pub const KEY_DIR: &str = "KEY_DIR";
    /// Grace period for retiring a session, in milliseconds.
    pub const RETIRE_GRACE_MS: &str = "RETIRE_GRACE_MS";
}

#[derive(Debug, Clone)]
enum Source {
    Process,
    Fixed(HashMap<String, String>),
}

/// Reads prefixed environment variables.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    source: Source,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl EnvConfig {
    /// Read the process environment with `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            source: Source::Process,
        }
    }

    /// Read from a fixed set of variables instead of the process
    /// environment. Keys are full variable names.
    #[must_use]
    pub fn from_vars<I, K, V>(prefix: impl Into<String>, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            prefix: prefix.into(),
            source: Source::Fixed(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Build the full environment variable name.
    fn var_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_uppercase()
        } else {
            format!("{}_{}", self.prefix, name.to_uppercase())
        }
    }

    /// Get a string value. Empty values count as unset.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<String> {
        let var_name = self.var_name(name);
        let value = match &self.source {
            Source::Process => std::env::var(&var_name).ok(),
            Source::Fixed(vars) => vars.get(&var_name).cloned(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Get a parsed value.
    #[must_use]
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.get(name)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(var = %self.var_name(name), value = %raw, "ignoring unparsable value");
                None
            }
        }
    }
}
