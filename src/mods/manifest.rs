//! Mod manifests and config resolution.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::assets::structured;
use crate::error::{ForgeError, Result};

/// One declared config field: id plus the default used when the persisted
/// config does not provide a value.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigField {
    pub id: String,
    #[serde(rename = "default")]
    pub default_value: Value,
    #[serde(default)]
    pub description: Option<String>,
}

/// A mod's manifest: display metadata plus the ordered config-field list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub config: Vec<ConfigField>,
}

impl ModManifest {
    /// Load a manifest, tolerating the same relaxed syntax as any other
    /// structured asset.
    pub fn load(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|e| ForgeError::io(label.clone(), e))?;
        let value = structured::parse(&label, &text)?;
        serde_json::from_value(value).map_err(|e| ForgeError::Parse {
            path: label,
            detail: e.to_string(),
        })
    }
}

/// A fully loaded mod, ready to execute.
#[derive(Debug)]
pub struct ModDescriptor {
    pub name: String,
    pub dir: PathBuf,
    pub manifest: ModManifest,
    pub config: Map<String, Value>,
    pub script: String,
}

/// Fill config fields absent from the persisted config with the manifest
/// default, preserving declared field order. Persisted keys the manifest no
/// longer declares are kept after the declared ones. Returns the effective
/// config and whether it differs from the persisted one.
pub fn resolve_config(
    manifest: &ModManifest,
    persisted: &Map<String, Value>,
) -> (Map<String, Value>, bool) {
    let mut resolved = Map::new();
    for field in &manifest.config {
        let value = persisted
            .get(&field.id)
            .cloned()
            .unwrap_or_else(|| field.default_value.clone());
        resolved.insert(field.id.clone(), value);
    }
    for (key, value) in persisted {
        if !resolved.contains_key(key) {
            resolved.insert(key.clone(), value.clone());
        }
    }
    let changed = &resolved != persisted;
    (resolved, changed)
}
