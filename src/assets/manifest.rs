// ABOUTME: Asset manifest: entries keyed by content hash, each with a source and a destination.
// ABOUTME: Every manifest gets its own identity; the persisted form is versioned JSON.

use crate::types::ManifestId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: &str = "36.0.0";

/// Destination key used for every entry; the publisher resolves it against its environment.
const CURRENT_DESTINATION: &str = "current_account-current_region";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilePackaging {
    File,
    #[serde(rename = "zip")]
    ZipDirectory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSource {
    pub path: String,
    pub packaging: FilePackaging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDestination {
    pub bucket_name: String,
    pub object_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSource {
    pub directory: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub docker_build_args: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_build_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDestination {
    pub repository_name: String,
    pub image_tag: String,
}

/// One asset to build and publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    File {
        id: String,
        source: FileSource,
        destination: FileDestination,
    },
    Image {
        id: String,
        source: ImageSource,
        destination: ImageDestination,
    },
}

impl ManifestEntry {
    pub fn id(&self) -> &str {
        match self {
            ManifestEntry::File { id, .. } | ManifestEntry::Image { id, .. } => id,
        }
    }

    /// Human readable name used in progress and error messages.
    pub fn display_name(&self) -> String {
        match self {
            ManifestEntry::File { id, source, .. } => format!("{} ({})", source.path, id),
            ManifestEntry::Image { id, source, .. } => format!("{} ({})", source.directory, id),
        }
    }
}

/// A set of assets with a unique identity.
///
/// Not `Clone`: a copy would share the identity and with it the cached publisher.
#[derive(Debug)]
pub struct AssetManifest {
    id: ManifestId,
    directory: PathBuf,
    entries: BTreeMap<String, ManifestEntry>,
}

impl AssetManifest {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            id: ManifestId::generate(),
            directory: directory.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &ManifestId {
        &self.id
    }

    /// Directory asset paths are relative to.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add an entry; a second entry with the same id replaces the first.
    pub(crate) fn insert(&mut self, entry: ManifestEntry) {
        self.entries.insert(entry.id().to_string(), entry);
    }

    /// The persisted JSON form.
    pub fn to_json(&self) -> serde_json::Value {
        let mut files = serde_json::Map::new();
        let mut images = serde_json::Map::new();
        for entry in self.entries.values() {
            match entry {
                ManifestEntry::File {
                    id,
                    source,
                    destination,
                } => {
                    files.insert(
                        id.clone(),
                        serde_json::json!({
                            "source": source,
                            "destinations": { CURRENT_DESTINATION: destination },
                        }),
                    );
                }
                ManifestEntry::Image {
                    id,
                    source,
                    destination,
                } => {
                    images.insert(
                        id.clone(),
                        serde_json::json!({
                            "source": source,
                            "destinations": { CURRENT_DESTINATION: destination },
                        }),
                    );
                }
            }
        }
        serde_json::json!({
            "version": MANIFEST_VERSION,
            "files": files,
            "dockerImages": images,
        })
    }

    /// Write the manifest to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(&self.to_json()).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
