//! Configuration.
//!
//! Settings come from a TOML file, then `JUMPLINE_*` environment variables,
//! then command line flags ([`Config::apply_cli`]), each layer overriding the
//! one before. The file
//! is `--config`, else `$JUMPLINE_CONFIG`, else
//! `<config dir>/jumpline/config.toml`; only the last may be absent.
//!
//! ```toml
//! jump_host = "bastion.example.com"
//! key_dir = "/home/ops/keys"
//! usernames = ["ec2-user", "ubuntu", "root"]
//! inventory_command = "aws-inventory --json"
//! extra_prompts = ['\w+@\w+:~> ']
//! ```

pub mod env;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{self, ResultCache};
use crate::cli::Cli;
use crate::error::ConfigError;
use crate::expect::{Pattern, Trigger, TriggerKind, TriggerSet};
use crate::inventory::{CommandInventory, FileInventory, InventorySource};
use crate::login::LoginOptions;
use crate::resolve::CandidatePolicy;
use crate::session::BastionCommand;

use self::env::vars;

pub use env::EnvConfig;

/// File name of the inventory snapshot in the temporary directory.
pub const INVENTORY_FILE_NAME: &str = "ss.awsData.json";

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bastion host; required to log in.
    pub jump_host: Option<String>,
    /// Local program that connects to the bastion.
    pub ssh_program: String,
    /// Users to try, in order.
    pub usernames: Vec<String>,
    /// Appended to the key pair name to form the key file name.
    pub key_suffix: String,
    /// Directory of key files on the bastion.
    pub key_dir: Option<PathBuf>,
    /// Ordinal result cache.
    pub results_cache: PathBuf,
    /// Inventory snapshot file.
    pub inventory_cache: PathBuf,
    /// Shell command printing a fresh inventory snapshot.
    pub inventory_command: Option<String>,
    /// Written to abandon a session.
    pub disconnect_sequence: String,
    /// Milliseconds a retired session may take to exit.
    pub retire_grace_ms: u64,
    /// Host key answers allowed per candidate.
    pub max_host_key_confirmations: u32,
    /// Extra shell prompt regexes.
    pub extra_prompts: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        let policy = CandidatePolicy::default();
        let login = LoginOptions::default();
        Self {
            jump_host: None,
            ssh_program: "ssh".into(),
            usernames: policy.usernames,
            key_suffix: policy.key_suffix,
            key_dir: policy.key_dir,
            results_cache: tmp.join(cache::DEFAULT_FILE_NAME),
            inventory_cache: tmp.join(INVENTORY_FILE_NAME),
            inventory_command: None,
            disconnect_sequence: String::from_utf8_lossy(&login.disconnect_sequence).into_owned(),
            retire_grace_ms: u64::try_from(login.retire_grace.as_millis()).unwrap_or(u64::MAX),
            max_host_key_confirmations: login.max_host_key_confirmations,
            extra_prompts: Vec::new(),
        }
    }
}

impl Config {
    /// The default config file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jumpline").join("config.toml"))
    }

    /// Parse TOML read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML or unknown keys.
    pub fn from_toml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file layer and apply the environment layer.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read, or any
    /// file cannot be parsed.
    pub fn load(explicit: Option<&Path>, env: &EnvConfig) -> Result<Self, ConfigError> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| env.get(vars::CONFIG).map(PathBuf::from));

        let mut config = match named {
            Some(path) => Self::read(&path)?,
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(env);
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Self::from_toml(&text, path)
    }

    /// Override fields from `JUMPLINE_*` variables.
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(host) = env.get(vars::JUMP_HOST) {
            self.jump_host = Some(host);
        }
        if let Some(program) = env.get(vars::SSH_PROGRAM) {
            self.ssh_program = program;
        }
        if let Some(path) = env.get(vars::RESULTS_CACHE) {
            self.results_cache = path.into();
        }
        if let Some(path) = env.get(vars::INVENTORY_CACHE) {
            self.inventory_cache = path.into();
        }
        if let Some(command) = env.get(vars::INVENTORY_COMMAND) {
            self.inventory_command = Some(command);
        }
        if let Some(dir) = env.get(vars::KEY_DIR) {
            self.key_dir = Some(dir.into());
        }
        if let Some(ms) = env.parse(vars::RETIRE_GRACE_MS) {
            self.retire_grace_ms = ms;
        }
    }

    /// Override fields from command line flags.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(jump) = &cli.jump {
            self.jump_host = Some(jump.clone());
        }
    }

    /// The bastion command.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingJumpHost`] if no bastion is set.
    pub fn bastion_command(&self) -> Result<BastionCommand, ConfigError> {
        match self.jump_host.as_deref() {
            Some(host) if !host.trim().is_empty() => {
                Ok(BastionCommand::new(self.ssh_program.clone(), host.trim()))
            }
            _ => Err(ConfigError::MissingJumpHost),
        }
    }

    /// Sequencer options, with extra prompts appended to the login
    /// triggers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPrompt`] for a bad prompt regex.
    pub fn login_options(&self) -> Result<LoginOptions, ConfigError> {
        let mut triggers = TriggerSet::login();
        for prompt in &self.extra_prompts {
            let pattern = Pattern::regex(prompt).map_err(|source| ConfigError::InvalidPrompt {
                pattern: prompt.clone(),
                source,
            })?;
            triggers.push(Trigger::new(TriggerKind::ShellPromptPrimary, pattern));
        }

        Ok(LoginOptions {
            disconnect_sequence: self.disconnect_sequence.clone().into_bytes(),
            retire_grace: Duration::from_millis(self.retire_grace_ms),
            max_host_key_confirmations: self.max_host_key_confirmations,
            triggers,
            ..LoginOptions::default()
        })
    }

    /// How candidates are derived.
    #[must_use]
    pub fn candidate_policy(&self) -> CandidatePolicy {
        CandidatePolicy {
            usernames: self.usernames.clone(),
            key_suffix: self.key_suffix.clone(),
            key_dir: self.key_dir.clone(),
        }
    }

    /// The ordinal result cache.
    #[must_use]
    pub fn result_cache(&self) -> ResultCache {
        ResultCache::new(&self.results_cache)
    }

    /// The inventory source: fetched by command when one is configured,
    /// otherwise read from the snapshot file.
    #[must_use]
    pub fn inventory_source(&self) -> Box<dyn InventorySource> {
        match &self.inventory_command {
            Some(command) => Box::new(CommandInventory::new(&self.inventory_cache, command)),
            None => Box::new(FileInventory::new(&self.inventory_cache)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn defaults_match_the_classic_layout() {
        let config = Config::default();
        assert_eq!(config.ssh_program, "ssh");
        assert_eq!(config.usernames, vec!["ec2-user", "ubuntu", "root"]);
        assert_eq!(config.key_suffix, ".pem");
        assert!(config.results_cache.ends_with("ss.instances.json"));
        assert!(config.inventory_cache.ends_with("ss.awsData.json"));
        assert_eq!(config.disconnect_sequence, "~.");
        assert_eq!(config.max_host_key_confirmations, 3);
        assert!(matches!(config.bastion_command(), Err(ConfigError::MissingJumpHost)));
    }

    #[test]
    fn file_values_override_defaults() {
        let config = Config::from_toml(
            r#"
            jump_host = "bastion.example.com"
            usernames = ["admin"]
            key_dir = "/keys"
            "#,
            Path::new("test.toml"),
        )
        .unwrap();
        assert_eq!(config.jump_host.as_deref(), Some("bastion.example.com"));
        assert_eq!(config.usernames, vec!["admin"]);
        assert_eq!(config.ssh_program, "ssh");
        assert_eq!(config.candidate_policy().key_path("prod"), "/keys/prod.pem");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml("jumphost = \"x\"", Path::new("test.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jump_host = \"from-file\"\nssh_program = \"/usr/bin/ssh\"\n").unwrap();

        let env = EnvConfig::from_vars(
            env::DEFAULT_PREFIX,
            [
                ("JUMPLINE_JUMP_HOST", "from-env"),
                ("JUMPLINE_RESULTS_CACHE", "/tmp/other.json"),
            ],
        );
        let config = Config::load(Some(&path), &env).unwrap();
        assert_eq!(config.jump_host.as_deref(), Some("from-env"));
        assert_eq!(config.ssh_program, "/usr/bin/ssh");
        assert_eq!(config.results_cache, PathBuf::from("/tmp/other.json"));
    }

    #[test]
    fn flags_override_environment_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "jump_host = \"from-file\"\nkey_dir = \"/file/keys\"\n").unwrap();
        let env = EnvConfig::from_vars(
            env::DEFAULT_PREFIX,
            [
                ("JUMPLINE_JUMP_HOST", "from-env"),
                ("JUMPLINE_SSH_PROGRAM", "/env/ssh"),
            ],
        );

        let cli = Cli::try_parse_from(["jumpline", "--jump", "from-flag", "web"]).unwrap();
        let mut config = Config::load(Some(&path), &env).unwrap();
        config.apply_cli(&cli);
        assert_eq!(config.jump_host.as_deref(), Some("from-flag"));
        assert_eq!(config.ssh_program, "/env/ssh");
        assert_eq!(config.key_dir, Some(PathBuf::from("/file/keys")));

        let cli = Cli::try_parse_from(["jumpline", "web"]).unwrap();
        let mut config = Config::load(Some(&path), &env).unwrap();
        config.apply_cli(&cli);
        assert_eq!(config.jump_host.as_deref(), Some("from-env"));
    }

    #[test]
    fn config_path_from_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alt.toml");
        fs::write(&path, "jump_host = \"alt\"\n").unwrap();

        let env = EnvConfig::from_vars(
            env::DEFAULT_PREFIX,
            [("JUMPLINE_CONFIG", path.display().to_string())],
        );
        let config = Config::load(None, &env).unwrap();
        assert_eq!(config.jump_host.as_deref(), Some("alt"));
    }

    #[test]
    fn named_file_must_exist() {
        let env = EnvConfig::from_vars(env::DEFAULT_PREFIX, Vec::<(String, String)>::new());
        let err = Config::load(Some(Path::new("/nonexistent/jumpline.toml")), &env).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn extra_prompts_become_triggers() {
        let config = Config {
            extra_prompts: vec![r"\w+:~> ".into()],
            ..Config::default()
        };
        let options = config.login_options().unwrap();
        assert_eq!(options.triggers.len(), TriggerSet::login().len() + 1);

        let bad = Config {
            extra_prompts: vec!["(".into()],
            ..Config::default()
        };
        assert!(matches!(bad.login_options(), Err(ConfigError::InvalidPrompt { .. })));
    }
}
