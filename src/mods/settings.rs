//! Host settings: which mods run, and in what order.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::assets::structured;
use crate::error::{ForgeError, Result};

/// The host application's persisted mod settings.
///
/// Resolution precedence: the enable map decides which ordered entries run,
/// then include overrides force additional mods in, then exclude overrides
/// remove mods regardless of the earlier steps.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostSettings {
    #[serde(default)]
    pub enabled: HashMap<String, bool>,
    #[serde(default)]
    pub order: Vec<String>,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl HostSettings {
    /// Load settings from a structured file (relaxed syntax tolerated).
    pub fn load(path: &Path) -> Result<Self> {
        let label = path.display().to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ForgeError::Settings(format!("{label}: {e}")))?;
        let value = structured::parse(&label, &text)?;
        serde_json::from_value(value).map_err(|e| ForgeError::Settings(format!("{label}: {e}")))
    }

    /// Resolve the ordered list of mods to run.
    ///
    /// Mods absent from the enable map are disabled; duplicates keep their
    /// first position.
    pub fn resolve_mods(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        for name in &self.order {
            if self.enabled.get(name).copied().unwrap_or(false) && !names.contains(name) {
                names.push(name.clone());
            }
        }
        for name in &self.include {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names.retain(|name| !self.exclude.contains(name));
        names
    }
}
