//! Machine inventory snapshots and where they come from.
//!
//! The snapshot is the JSON produced by the cloud CLI, reduced to what
//! target resolution reads: reservations of machines and autoscaling
//! groups. Unknown fields on machines are carried along so cached records
//! keep everything they were listed with.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::cache::write_atomic;
use crate::error::InventoryError;

/// Tag key holding a machine's display name.
pub const NAME_TAG: &str = "Name";
/// Tag key naming the autoscaling group a machine belongs to.
pub const SCALING_GROUP_TAG: &str = "aws:autoscaling:groupName";

/// A key/value tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One virtual machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Machine {
    /// Unique identifier.
    pub instance_id: String,
    /// Private address used to reach it from the bastion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    /// Name of its key pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Fields not interpreted here.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Machine {
    /// Create a machine with an address and key pair.
    pub fn new(
        instance_id: impl Into<String>,
        address: impl Into<String>,
        key_name: impl Into<String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            private_ip_address: Some(address.into()),
            key_name: Some(key_name.into()),
            ..Self::default()
        }
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push(Tag::new(key, value));
        self
    }

    /// Value of the tag `key`. The last one wins if it repeats.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|t| t.key == key)
            .map(|t| t.value.as_str())
    }

    /// The `Name` tag.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.tag(NAME_TAG)
    }

    /// The autoscaling group from its tags.
    #[must_use]
    pub fn scaling_group(&self) -> Option<&str> {
        self.tag(SCALING_GROUP_TAG)
    }

    /// The private address.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.private_ip_address.as_deref()
    }
}

/// A reservation: a batch of machines launched together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reservation {
    /// The machines.
    #[serde(default)]
    pub instances: Vec<Machine>,
}

/// A member reference inside a scaling group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupMember {
    /// Identifier of the member machine.
    pub instance_id: String,
}

/// An autoscaling group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ScalingGroup {
    /// Group name.
    pub auto_scaling_group_name: String,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Members, in group order.
    #[serde(default)]
    pub instances: Vec<GroupMember>,
}

impl ScalingGroup {
    /// The group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.auto_scaling_group_name
    }

    /// The `Name` tag.
    #[must_use]
    pub fn name_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|t| t.key == NAME_TAG)
            .map(|t| t.value.as_str())
    }
}

/// Everything known about the account's machines at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    /// Reservations, in listing order.
    #[serde(default)]
    pub reservations: Vec<Reservation>,
    /// Autoscaling groups.
    #[serde(default)]
    pub auto_scaling_groups: Vec<ScalingGroup>,
}

impl InventorySnapshot {
    /// Parse a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`InventoryError::Json`] if the data is not a snapshot.
    pub fn from_json(data: &[u8]) -> Result<Self, InventoryError> {
        Ok(serde_json::from_slice(data)?)
    }

    /// Every machine, reservation by reservation.
    pub fn machines(&self) -> impl Iterator<Item = &Machine> {
        self.reservations.iter().flat_map(|r| r.instances.iter())
    }

    /// The machine with identifier `id`.
    #[must_use]
    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines().find(|m| m.instance_id == id)
    }

    /// The autoscaling groups.
    #[must_use]
    pub fn groups(&self) -> &[ScalingGroup] {
        &self.auto_scaling_groups
    }
}

/// Somewhere an inventory snapshot can be obtained.
pub trait InventorySource {
    /// The current snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if no snapshot can be produced.
    fn snapshot(&mut self) -> Result<InventorySnapshot, InventoryError>;

    /// Drop any cached snapshot so the next call sees fresh data.
    ///
    /// # Errors
    ///
    /// Returns an error if the cached copy cannot be removed or refetched.
    fn refresh(&mut self) -> Result<(), InventoryError>;
}

impl<T: InventorySource + ?Sized> InventorySource for Box<T> {
    fn snapshot(&mut self) -> Result<InventorySnapshot, InventoryError> {
        (**self).snapshot()
    }

    fn refresh(&mut self) -> Result<(), InventoryError> {
        (**self).refresh()
    }
}

impl InventorySource for InventorySnapshot {
    fn snapshot(&mut self) -> Result<InventorySnapshot, InventoryError> {
        Ok(self.clone())
    }

    fn refresh(&mut self) -> Result<(), InventoryError> {
        Ok(())
    }
}

/// A snapshot kept in a JSON file.
#[derive(Debug, Clone)]
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    /// Read snapshots from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn store(&self, snapshot: &InventorySnapshot) -> Result<(), InventoryError> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        write_atomic(&self.path, &data).map_err(|source| InventoryError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl InventorySource for FileInventory {
    fn snapshot(&mut self) -> Result<InventorySnapshot, InventoryError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(InventoryError::Missing {
                    path: self.path.clone(),
                });
            }
            Err(source) => {
                return Err(InventoryError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        InventorySnapshot::from_json(&data)
    }

    fn refresh(&mut self) -> Result<(), InventoryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "removed inventory snapshot");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(InventoryError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// A file snapshot that is fetched with a shell command when missing.
#[derive(Debug, Clone)]
pub struct CommandInventory {
    file: FileInventory,
    command: String,
}

impl CommandInventory {
    /// Cache snapshots at `path`, fetching them with `command` (run by
    /// `sh -c`).
    pub fn new(path: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            file: FileInventory::new(path),
            command: command.into(),
        }
    }

    /// Run the command and cache what it prints.
    fn fetch(&self) -> Result<InventorySnapshot, InventoryError> {
        eprintln!("*** Refreshing inventory ***");
        tracing::info!(command = %self.command, "fetching inventory");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .output()
            .map_err(|source| InventoryError::Io {
                path: PathBuf::from("sh"),
                source,
            })?;

        if !output.status.success() {
            return Err(InventoryError::Command {
                command: self.command.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let snapshot = InventorySnapshot::from_json(&output.stdout)?;
        self.file.store(&snapshot)?;
        Ok(snapshot)
    }
}

impl InventorySource for CommandInventory {
    fn snapshot(&mut self) -> Result<InventorySnapshot, InventoryError> {
        if self.file.exists() {
            return self.file.snapshot();
        }
        self.fetch()
    }

    fn refresh(&mut self) -> Result<(), InventoryError> {
        self.file.refresh()?;
        self.fetch().map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"{
        "reservations": [
            { "Instances": [
                { "InstanceId": "i-0abc", "PrivateIpAddress": "10.0.0.5",
                  "KeyName": "prod", "State": {"Name": "running"},
                  "Tags": [{"Key": "Name", "Value": "web-1"},
                           {"Key": "aws:autoscaling:groupName", "Value": "web-asg"}] }
            ] },
            { "Instances": [ { "InstanceId": "i-0def" } ] }
        ],
        "autoScalingGroups": [
            { "AutoScalingGroupName": "web-asg",
              "Tags": [{"Key": "Name", "Value": "web"}],
              "Instances": [{"InstanceId": "i-0abc"}] }
        ]
    }"#;

    #[test]
    fn parses_snapshot_shape() {
        let snapshot = InventorySnapshot::from_json(SNAPSHOT.as_bytes()).unwrap();
        assert_eq!(snapshot.machines().count(), 2);

        let web = snapshot.machine("i-0abc").unwrap();
        assert_eq!(web.name(), Some("web-1"));
        assert_eq!(web.scaling_group(), Some("web-asg"));
        assert_eq!(web.address(), Some("10.0.0.5"));
        assert!(web.extra.contains_key("State"));

        let bare = snapshot.machine("i-0def").unwrap();
        assert!(bare.tags.is_empty());
        assert_eq!(bare.key_name, None);

        assert_eq!(snapshot.groups()[0].name_tag(), Some("web"));
    }

    #[test]
    fn missing_arrays_default_to_empty() {
        let snapshot = InventorySnapshot::from_json(b"{}").unwrap();
        assert!(snapshot.reservations.is_empty());
        assert!(snapshot.groups().is_empty());
    }

    #[test]
    fn file_inventory_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FileInventory::new(dir.path().join("none.json"));
        assert!(matches!(source.snapshot(), Err(InventoryError::Missing { .. })));
        source.refresh().unwrap();
    }

    #[test]
    fn command_inventory_fetches_once_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        let counter = dir.path().join("runs");
        let command = format!(
            "echo run >> '{}'; printf '%s' '{}'",
            counter.display(),
            r#"{"reservations":[{"Instances":[{"InstanceId":"i-1"}]}]}"#
        );

        let mut source = CommandInventory::new(&path, command);
        assert_eq!(source.snapshot().unwrap().machines().count(), 1);
        assert!(path.is_file());
        assert_eq!(source.snapshot().unwrap().machines().count(), 1);
        assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 1);

        source.refresh().unwrap();
        assert_eq!(fs::read_to_string(&counter).unwrap().lines().count(), 2);
    }

    #[test]
    fn failing_command_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = CommandInventory::new(dir.path().join("i.json"), "echo nope >&2; exit 3");
        match source.snapshot() {
            Err(InventoryError::Command { stderr, .. }) => assert_eq!(stderr, "nope"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
