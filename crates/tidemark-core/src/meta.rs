//! Directory-backed metadata resolution.
//!
//! The data directory is the source of truth for the measurement hierarchy:
//!
//! ```text
//! <data_dir>/info.yaml                      root document (tags)
//! <data_dir>/<group>/info.yaml              group document
//! <data_dir>/<group>/<device>/info.yaml     device document (channels)
//! ```
//!
//! Documents are re-read on every call — the tree may be edited out-of-band
//! between requests (a new device dropped in, a label fixed) and lookups must
//! always reflect the current on-disk state. Documents are small, so
//! correctness wins over request latency here.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Name of the metadata document at every level of the tree.
pub const INFO_FILENAME: &str = "info.yaml";

/// One declared channel of a device.
///
/// `slug` is the channel's URL-safe identifier; everything else in the
/// document (units, label, ...) is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// URL-safe identifier, unique within the device.
    pub slug: String,
    /// Arbitrary descriptive fields from the document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parsed device metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Declared channels. Declaration order fixes the positional layout of
    /// the device's value vectors.
    pub channels: Vec<ChannelConfig>,
    /// Arbitrary descriptive fields from the document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DeviceConfig {
    /// Index of the first declared channel whose slug matches.
    pub fn channel_index(&self, slug: &str) -> Option<usize> {
        self.channels.iter().position(|channel| channel.slug == slug)
    }
}

/// Parsed group metadata document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    /// URL-safe identifier for the group.
    pub slug: String,
    /// Arbitrary descriptive fields from the document.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Root metadata document. Only the tags section is consumed.
#[derive(Debug, Deserialize)]
struct RootConfig {
    tags: Value,
}

/// Metadata resolver rooted at an explicit data directory.
///
/// Holds no cache and no open handles; every method walks the tree afresh.
#[derive(Debug, Clone)]
pub struct MetaStore {
    root: PathBuf,
}

impl MetaStore {
    /// Create a resolver over the given data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The data directory this resolver reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Tags section of the root metadata document.
    ///
    /// An absent or unreadable root document is reported as
    /// [`Error::MetadataNotFound`] — the root document's whole contract is
    /// "supply the tags", so a document that cannot do that counts as missing.
    pub fn tags(&self) -> Result<Value> {
        let path = self.root.join(INFO_FILENAME);
        if !path.is_file() {
            return Err(Error::MetadataNotFound("root metadata document".to_string()));
        }

        match read_document::<RootConfig>(&path) {
            Ok(root) => Ok(root.tags),
            Err(_) => Err(Error::MetadataNotFound("root metadata document".to_string())),
        }
    }

    /// Names of all group directories under the data root, sorted.
    ///
    /// Non-directory entries are ignored.
    pub fn groups(&self) -> Result<Vec<String>> {
        list_directories(&self.root)
    }

    /// Parsed metadata document for one group.
    pub fn group_config(&self, group: &str) -> Result<GroupConfig> {
        let group_dir = self.group_dir(group)?;

        let path = group_dir.join(INFO_FILENAME);
        if !path.is_file() {
            return Err(Error::GroupNotFound {
                group: group.to_string(),
            });
        }

        read_document(&path)
    }

    /// Names of all device directories within a group, sorted.
    pub fn devices(&self, group: &str) -> Result<Vec<String>> {
        list_directories(&self.group_dir(group)?)
    }

    /// Parsed metadata document for one device.
    pub fn device_config(&self, group: &str, device: &str) -> Result<DeviceConfig> {
        let device_dir = self.device_dir(group, device)?;

        let path = device_dir.join(INFO_FILENAME);
        if !path.is_file() {
            return Err(Error::DeviceNotFound {
                group: group.to_string(),
                device: device.to_string(),
            });
        }

        read_document(&path)
    }

    /// Positional index of a channel slug within a device's declared
    /// channels: first match in declaration order.
    pub fn channel_index(&self, group: &str, device: &str, channel: &str) -> Result<usize> {
        let config = self.device_config(group, device)?;

        config
            .channel_index(channel)
            .ok_or_else(|| Error::ChannelNotFound {
                group: group.to_string(),
                device: device.to_string(),
                channel: channel.to_string(),
            })
    }

    /// Directory holding one device's samples, for handing to the storage
    /// engine capabilities.
    pub fn device_dir(&self, group: &str, device: &str) -> Result<PathBuf> {
        let not_found = || Error::DeviceNotFound {
            group: group.to_string(),
            device: device.to_string(),
        };

        if !is_plain_component(group) || !is_plain_component(device) {
            return Err(not_found());
        }

        let dir = self.root.join(group).join(device);
        if !dir.is_dir() {
            return Err(not_found());
        }

        Ok(dir)
    }

    fn group_dir(&self, group: &str) -> Result<PathBuf> {
        let not_found = || Error::GroupNotFound {
            group: group.to_string(),
        };

        if !is_plain_component(group) {
            return Err(not_found());
        }

        let dir = self.root.join(group);
        if !dir.is_dir() {
            return Err(not_found());
        }

        Ok(dir)
    }
}

/// Whether a client-supplied name is a single plain path component.
///
/// Anything that could escape its directory (separators, `..`, empty names)
/// is treated as a name that simply does not exist.
fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
}

fn list_directories(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for entry in dir.read_dir()? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }

    names.sort();
    Ok(names)
}

fn read_document<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    serde_yaml::from_reader(file).map_err(|source| Error::MetadataParse {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Build a data directory with one group (`hut`) holding one device
    /// (`th1`) with two channels.
    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();

        fs::write(
            dir.path().join(INFO_FILENAME),
            "tags:\n  outdoor:\n    label: Outdoor sensors\n",
        )
        .unwrap();

        fs::create_dir_all(dir.path().join("hut/th1")).unwrap();
        fs::write(
            dir.path().join("hut").join(INFO_FILENAME),
            "slug: hut\nlabel: The hut\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("hut/th1").join(INFO_FILENAME),
            concat!(
                "name: Temperature and humidity\n",
                "channels:\n",
                "  - slug: temperature\n",
                "    units: \"°C\"\n",
                "  - slug: humidity\n",
                "    units: \"%\"\n",
            ),
        )
        .unwrap();

        dir
    }

    #[test]
    fn tags_from_root_document() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());

        let tags = store.tags().unwrap();
        assert_eq!(tags["outdoor"]["label"], "Outdoor sensors");
    }

    #[test]
    fn tags_missing_root_document() {
        let dir = TempDir::new().unwrap();
        let store = MetaStore::new(dir.path());

        let err = store.tags().unwrap_err();
        assert!(matches!(err, Error::MetadataNotFound(_)));
    }

    #[test]
    fn tags_malformed_root_document_counts_as_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(INFO_FILENAME), ": not yaml: [").unwrap();
        let store = MetaStore::new(dir.path());

        let err = store.tags().unwrap_err();
        assert!(matches!(err, Error::MetadataNotFound(_)));
    }

    #[test]
    fn groups_lists_directories_only() {
        let dir = fixture();
        fs::write(dir.path().join("stray.txt"), "not a group").unwrap();
        let store = MetaStore::new(dir.path());

        assert_eq!(store.groups().unwrap(), vec!["hut".to_string()]);
    }

    #[test]
    fn group_config_carries_extra_fields() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());

        let config = store.group_config("hut").unwrap();
        assert_eq!(config.slug, "hut");
        assert_eq!(config.extra["label"], "The hut");
    }

    #[test]
    fn group_config_unknown_group() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());

        let err = store.group_config("nowhere").unwrap_err();
        assert!(matches!(err, Error::GroupNotFound { .. }));
    }

    #[test]
    fn group_config_missing_document() {
        let dir = fixture();
        fs::create_dir(dir.path().join("bare")).unwrap();
        let store = MetaStore::new(dir.path());

        let err = store.group_config("bare").unwrap_err();
        assert!(matches!(err, Error::GroupNotFound { .. }));
    }

    #[test]
    fn devices_lists_device_directories() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());

        assert_eq!(store.devices("hut").unwrap(), vec!["th1".to_string()]);
        assert!(matches!(
            store.devices("nowhere").unwrap_err(),
            Error::GroupNotFound { .. }
        ));
    }

    #[test]
    fn device_config_channels_in_declaration_order() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());

        let config = store.device_config("hut", "th1").unwrap();
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].slug, "temperature");
        assert_eq!(config.channels[1].slug, "humidity");
        assert_eq!(config.extra["name"], "Temperature and humidity");
    }

    #[test]
    fn channel_index_first_positional_match() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());

        assert_eq!(store.channel_index("hut", "th1", "humidity").unwrap(), 1);
        assert!(matches!(
            store.channel_index("hut", "th1", "pressure").unwrap_err(),
            Error::ChannelNotFound { .. }
        ));
    }

    #[test]
    fn device_dir_rejects_traversal() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());

        assert!(store.device_dir("hut", "th1").is_ok());
        assert!(matches!(
            store.device_dir("..", "th1").unwrap_err(),
            Error::DeviceNotFound { .. }
        ));
        assert!(matches!(
            store.device_dir("hut", "../hut").unwrap_err(),
            Error::DeviceNotFound { .. }
        ));
    }

    #[test]
    fn metadata_is_reread_per_call() {
        let dir = fixture();
        let store = MetaStore::new(dir.path());
        assert_eq!(store.groups().unwrap().len(), 1);

        fs::create_dir_all(dir.path().join("shed")).unwrap();
        fs::write(
            dir.path().join("shed").join(INFO_FILENAME),
            "slug: shed\n",
        )
        .unwrap();

        // No cache: the new group is visible on the very next call.
        assert_eq!(store.groups().unwrap().len(), 2);
        assert_eq!(store.group_config("shed").unwrap().slug, "shed");
    }
}
