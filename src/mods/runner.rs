//! Task orchestrator: drives the resolver, preprocessor and engine across
//! the enabled mod list, then flushes the overlay exactly once.

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::assets::structured::{self, WriteStyle};
use crate::config::Config;
use crate::error::{ForgeError, Result};
use crate::mods::manifest::{self, ModDescriptor, ModManifest};
use crate::mods::settings::HostSettings;
use crate::script::{ForgeApi, ScriptEngine};
use crate::vfs::OverlayResolver;

/// Aggregate counts for one run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunReport {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

impl RunReport {
    /// A run fails when any mod neither succeeded nor was skipped.
    pub fn failed(&self) -> bool {
        self.succeeded + self.skipped < self.total
    }
}

/// Orchestrates one full mod pass.
pub struct ModRunner {
    config: Config,
    dry_run: bool,
}

impl ModRunner {
    /// Create a runner for the given configuration.
    pub fn new(config: Config, dry_run: bool) -> Self {
        Self { config, dry_run }
    }

    /// Execute every enabled mod in order, flush the overlay once, and
    /// report counts. The first script or directive failure aborts the whole
    /// run; nothing is flushed in that case.
    pub fn run(&self) -> Result<RunReport> {
        let settings = HostSettings::load(&self.config.paths.settings)?;
        let names = settings.resolve_mods();

        let resolver = Rc::new(RefCell::new(OverlayResolver::new(
            self.config.paths.input_roots.clone(),
            self.config.paths.output_root.clone(),
            self.config.paths.id_ledger.clone(),
            self.config.execution.id_seed,
        )));
        resolver.borrow_mut().set_dry_run(self.dry_run);

        let mut engine = ScriptEngine::new(
            &self.config.paths.libraries,
            self.config.execution.wrap_top_level_return,
        )?;

        let mut report = RunReport {
            total: names.len(),
            ..RunReport::default()
        };

        for name in &names {
            let Some(descriptor) = self.load_descriptor(name)? else {
                report.skipped += 1;
                continue;
            };

            info!("running mod '{name}'");
            let api = ForgeApi::new(Rc::clone(&resolver), descriptor.dir.clone(), name.clone());
            let facade = api
                .register(engine.lua())
                .map_err(|e| ForgeError::Engine(e.to_string()))?;
            engine.bind_mod(facade, &descriptor.config)?;
            engine.run_mod(name, &descriptor.script)?;
            report.succeeded += 1;
        }

        resolver.borrow_mut().flush_id()?;
        let flushed = resolver.borrow_mut().flush_all()?;

        info!(
            "mod pass complete: {}/{} succeeded, {} skipped, {} files flushed",
            report.succeeded, report.total, report.skipped, flushed
        );
        Ok(report)
    }

    /// Load one mod, or `None` when it must be skipped (missing manifest or
    /// script). Unreadable or malformed files are errors, not skips.
    fn load_descriptor(&self, name: &str) -> Result<Option<ModDescriptor>> {
        let dir = self.config.paths.mods.join(name);
        let manifest_path = dir.join("manifest.json");
        let script_path = dir.join("mod.lua");

        if !manifest_path.is_file() {
            warn!("skipping mod '{name}': no manifest.json");
            return Ok(None);
        }
        if !script_path.is_file() {
            warn!("skipping mod '{name}': no mod.lua");
            return Ok(None);
        }

        let manifest = ModManifest::load(&manifest_path)?;
        let script = fs::read_to_string(&script_path)
            .map_err(|e| ForgeError::io(script_path.display().to_string(), e))?;

        let persisted = self.load_persisted_config(&dir)?;
        let (config, changed) = manifest::resolve_config(&manifest, &persisted);
        if changed && self.config.execution.persist_config && !self.dry_run {
            self.persist_config(&dir, &config)?;
        }

        Ok(Some(ModDescriptor {
            name: name.to_string(),
            dir,
            manifest,
            config,
            script,
        }))
    }

    fn load_persisted_config(&self, dir: &std::path::Path) -> Result<Map<String, Value>> {
        let path = dir.join("config.json");
        if !path.is_file() {
            return Ok(Map::new());
        }
        let label = path.display().to_string();
        let text = fs::read_to_string(&path).map_err(|e| ForgeError::io(label.clone(), e))?;
        match structured::parse(&label, &text)? {
            Value::Object(map) => Ok(map),
            _ => Err(ForgeError::Parse {
                path: label,
                detail: "config must be an object".to_string(),
            }),
        }
    }

    fn persist_config(&self, dir: &std::path::Path, config: &Map<String, Value>) -> Result<()> {
        let path = dir.join("config.json");
        let label = path.display().to_string();
        let style = WriteStyle::width(2);
        let mut text = structured::to_text(&label, &Value::Object(config.clone()), &style)?;
        text.push('\n');
        fs::write(&path, text).map_err(|e| ForgeError::io(label, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn base_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.paths.input_roots = vec![dir.join("base")];
        config.paths.output_root = dir.join("out");
        config.paths.mods = dir.join("mods");
        config.paths.libraries = dir.join("libraries");
        config.paths.settings = dir.join("settings.json");
        config
    }

    fn add_mod(dir: &Path, name: &str, script: &str) {
        write_file(&dir.join("mods").join(name).join("manifest.json"), "{}");
        write_file(&dir.join("mods").join(name).join("mod.lua"), script);
    }

    #[test]
    fn test_missing_manifest_skips() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join("settings.json"), r#"{"include": ["ghost"]}"#);
        fs::create_dir_all(dir.path().join("mods/ghost")).unwrap();

        let report = ModRunner::new(base_config(dir.path()), false).run().unwrap();
        assert_eq!(report.total, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.succeeded, 0);
        assert!(!report.failed());
    }

    #[test]
    fn test_missing_script_skips() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join("settings.json"), r#"{"include": ["half"]}"#);
        write_file(&dir.path().join("mods/half/manifest.json"), "{}");

        let report = ModRunner::new(base_config(dir.path()), false).run().unwrap();
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_single_mod_writes_and_flushes() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join("settings.json"), r#"{"include": ["alpha"]}"#);
        add_mod(dir.path(), "alpha", "forge.write_text('data/a.txt', 'made')");

        let report = ModRunner::new(base_config(dir.path()), false).run().unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("out/data/a.txt")).unwrap(),
            "made"
        );
    }

    #[test]
    fn test_script_failure_aborts_run_without_flush() {
        let dir = tempdir().unwrap();
        write_file(
            &dir.path().join("settings.json"),
            r#"{"include": ["boom", "after"]}"#,
        );
        add_mod(
            dir.path(),
            "boom",
            "forge.write_text('data/a.txt', 'x')\nerror('kaput')",
        );
        add_mod(dir.path(), "after", "forge.write_text('data/b.txt', 'y')");

        let err = ModRunner::new(base_config(dir.path()), false).run().unwrap_err();
        assert!(matches!(err, ForgeError::Script { .. }));
        assert!(!dir.path().join("out").join("data").exists());
    }

    #[test]
    fn test_config_persisted_with_defaults() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join("settings.json"), r#"{"include": ["cfg"]}"#);
        write_file(
            &dir.path().join("mods/cfg/manifest.json"),
            r#"{"config": [{"id": "x", "default": 5}]}"#,
        );
        write_file(&dir.path().join("mods/cfg/mod.lua"), "-- nothing");

        ModRunner::new(base_config(dir.path()), false).run().unwrap();
        let written = fs::read_to_string(dir.path().join("mods/cfg/config.json")).unwrap();
        assert_eq!(written, "{\n  \"x\": 5\n}\n");
    }

    #[test]
    fn test_dry_run_skips_config_persistence() {
        let dir = tempdir().unwrap();
        write_file(&dir.path().join("settings.json"), r#"{"include": ["cfg"]}"#);
        write_file(
            &dir.path().join("mods/cfg/manifest.json"),
            r#"{"config": [{"id": "x", "default": 5}]}"#,
        );
        write_file(&dir.path().join("mods/cfg/mod.lua"), "-- nothing");

        ModRunner::new(base_config(dir.path()), true).run().unwrap();
        assert!(!dir.path().join("mods/cfg/config.json").exists());
    }
}
