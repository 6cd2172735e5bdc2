//! Wire types for the version catalog, version descriptors and asset
//! indexes.

use crate::game::rules::Rule;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Remote catalog document: version id -> descriptor URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCatalogFile {
    pub versions: HashMap<String, String>,
}

/// A version descriptor as stored under `versions/<id>/<id>.json`.
///
/// Descriptors form a tree via `inheritsFrom`; the resolver walks to the
/// root and deep-merges attribute by attribute. Most fields are optional
/// because a child descriptor only carries what it overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub release_type: Option<ReleaseType>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersionInfo>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<Downloads>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexRef>,

    /// Assets id (matches `asset_index.id` on modern descriptors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    #[serde(default)]
    pub libraries: Vec<LibraryEntry>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<ArgumentLists>,
}

impl VersionDescriptor {
    /// Assets id used for the on-disk index filename.
    pub fn assets_id(&self) -> Option<&str> {
        self.assets
            .as_deref()
            .or_else(|| self.asset_index.as_ref().map(|a| a.id.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseType {
    Release,
    Snapshot,
    #[serde(other)]
    Other,
}

impl ReleaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseType::Release => "release",
            ReleaseType::Snapshot => "snapshot",
            ReleaseType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub major_version: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Downloads {
    pub client: DownloadInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadInfo {
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

/// Asset index reference inside a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexRef {
    pub id: String,
    pub sha1: String,
    pub size: u64,
    #[serde(default)]
    pub total_size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Maven coordinates, `group:artifact:version`.
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,

    /// Platform name -> classifier key, e.g. `"linux": "natives-linux"`.
    /// Values may contain `${arch}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extract: Option<ExtractRules>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, ArtifactRef>>,
}

/// A downloadable artifact with its store-relative path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub path: String,
    pub url: String,
    pub sha1: String,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRules {
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Ordered argument template lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgumentLists {
    #[serde(default)]
    pub game: Vec<Argument>,

    #[serde(default)]
    pub jvm: Vec<Argument>,
}

/// A template element: either a literal token or a conditional entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Argument {
    Literal(String),
    Conditional {
        rules: Vec<Rule>,
        value: ArgumentValue,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Single(String),
    Many(Vec<String>),
}

/// Asset index document: logical path -> content-addressed object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetIndexFile {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_literal_and_conditional_arguments() {
        let json = r#"{
            "game": [
                "--username",
                "${auth_player_name}",
                {
                    "rules": [{"action": "allow", "features": {"has_custom_resolution": true}}],
                    "value": ["--width", "${resolution_width}"]
                }
            ],
            "jvm": ["-Xmx2G"]
        }"#;

        let args: ArgumentLists = serde_json::from_str(json).unwrap();
        assert_eq!(args.game.len(), 3);
        assert_eq!(args.jvm.len(), 1);
        match &args.game[2] {
            Argument::Conditional { rules, value } => {
                assert_eq!(rules.len(), 1);
                match value {
                    ArgumentValue::Many(v) => assert_eq!(v.len(), 2),
                    _ => panic!("expected multi-value argument"),
                }
            }
            _ => panic!("expected conditional argument"),
        }
    }

    #[test]
    fn descriptor_tolerates_missing_optional_blocks() {
        let json = r#"{"id": "1.20-common", "libraries": []}"#;
        let desc: VersionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.id, "1.20-common");
        assert!(desc.downloads.is_none());
        assert!(desc.assets_id().is_none());
    }

    #[test]
    fn unknown_release_type_maps_to_other() {
        let json = r#"{"id": "b1.7.3", "type": "old_beta"}"#;
        let desc: VersionDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.release_type, Some(ReleaseType::Other));
    }
}
