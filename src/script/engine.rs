//! Sandboxed Lua execution engine.
//!
//! One engine serves an entire run. It holds a single shared capability
//! scope — ambient runtime bindings plus the `forge` and `config` slots
//! rebound before each mod — and gives every mod a throwaway local scope
//! whose unresolved lookups delegate to the shared one, so a mod's own
//! top-level declarations never leak into the next mod.

use mlua::{Lua, Table, Value};

use crate::error::{ForgeError, Result};
use crate::script::library::LibraryCache;
use crate::script::preprocess::{self, Segment};

/// Lua script execution engine.
pub struct ScriptEngine {
    lua: Lua,
    shared: Table,
    libraries: LibraryCache,
    wrap_top_level_return: bool,
}

impl ScriptEngine {
    /// Create an engine with its shared capability scope.
    pub fn new(libraries_dir: impl Into<std::path::PathBuf>, wrap_top_level_return: bool) -> Result<Self> {
        let lua = Lua::new();
        Self::apply_sandbox(&lua)?;

        // The shared scope reads through to the sandboxed globals for the
        // ambient runtime (string, table, math, ...).
        let shared = lua.create_table().map_err(engine_err)?;
        let mt = lua.create_table().map_err(engine_err)?;
        mt.set("__index", lua.globals()).map_err(engine_err)?;
        shared.set_metatable(Some(mt));

        Ok(Self {
            lua,
            shared,
            libraries: LibraryCache::new(libraries_dir),
            wrap_top_level_return,
        })
    }

    /// Remove host-reaching stdlib entry points. The isolation is
    /// deliberately weak; it keeps honest scripts honest.
    fn apply_sandbox(lua: &Lua) -> Result<()> {
        let globals = lua.globals();
        for name in [
            "os",
            "io",
            "loadfile",
            "dofile",
            "load",
            "require",
            "package",
            "debug",
            "collectgarbage",
        ] {
            globals.set(name, Value::Nil).map_err(engine_err)?;
        }
        Ok(())
    }

    /// Access the underlying Lua state, e.g. to build a facade table.
    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Rebind the shared scope's two mutable slots for the next mod.
    pub fn bind_mod(
        &self,
        facade: Table,
        config: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        use mlua::LuaSerdeExt;
        let config_value = self.lua.to_value(config).map_err(engine_err)?;
        self.shared.set("forge", facade).map_err(engine_err)?;
        self.shared.set("config", config_value).map_err(engine_err)?;
        Ok(())
    }

    /// Preprocess and execute one mod's script.
    ///
    /// Segments run in order against a fresh local scope. The first uncaught
    /// error aborts the mod without running further segments.
    pub fn run_mod(&mut self, mod_name: &str, source: &str) -> Result<()> {
        let segments = preprocess::split_segments(mod_name, source)?;

        let env = self.lua.create_table().map_err(engine_err)?;
        let mt = self.lua.create_table().map_err(engine_err)?;
        mt.set("__index", self.shared.clone()).map_err(engine_err)?;
        env.set_metatable(Some(mt));

        // Legacy single-segment scripts may expect the facade as the chunk
        // argument and use a bare top-level return.
        let wrap = self.wrap_top_level_return
            && segments.len() == 1
            && matches!(segments[0], Segment::Inline { .. });

        for segment in segments {
            match segment {
                Segment::Inline { text, line } => {
                    self.run_inline(mod_name, &env, &text, line, wrap)?;
                }
                Segment::Library { name } => {
                    let function = self.libraries.resolve(&self.lua, &name)?;
                    function.call::<()>(env.clone()).map_err(|e| ForgeError::Script {
                        name: mod_name.to_string(),
                        detail: format!("in library '{name}': {e}"),
                    })?;
                }
            }
        }
        Ok(())
    }

    fn run_inline(
        &self,
        mod_name: &str,
        env: &Table,
        text: &str,
        line: usize,
        wrap: bool,
    ) -> Result<()> {
        // Newline padding makes Lua report the original file's line numbers.
        // The compatibility wrap prepends one line, shifting the segment's
        // offset by one.
        let padding = "\n".repeat(line.saturating_sub(1));
        let source = if wrap {
            format!("{padding}local forge = ...\n{text}")
        } else {
            format!("{padding}{text}")
        };

        let chunk = self
            .lua
            .load(source)
            .set_name(mod_name.to_string())
            .set_environment(env.clone());

        let executed = if wrap {
            let facade = self
                .shared
                .get::<Value>("forge")
                .map_err(engine_err)?;
            chunk.call::<()>(facade)
        } else {
            chunk.exec()
        };

        executed.map_err(|e| ForgeError::Script {
            name: mod_name.to_string(),
            detail: e.to_string(),
        })
    }
}

fn engine_err(e: mlua::Error) -> ForgeError {
    ForgeError::Engine(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::tempdir;

    /// Engine plus a facade whose `note` function records what scripts send.
    fn engine_with_probe(
        libraries: &std::path::Path,
        wrap: bool,
    ) -> (ScriptEngine, Rc<RefCell<Vec<String>>>) {
        let engine = ScriptEngine::new(libraries, wrap).unwrap();
        let notes = Rc::new(RefCell::new(Vec::new()));

        let facade = engine.lua().create_table().unwrap();
        let sink = Rc::clone(&notes);
        let note = engine
            .lua()
            .create_function(move |_, text: String| {
                sink.borrow_mut().push(text);
                Ok(())
            })
            .unwrap();
        facade.set("note", note).unwrap();

        let config = serde_json::Map::new();
        engine.bind_mod(facade, &config).unwrap();
        (engine, notes)
    }

    #[test]
    fn test_inline_execution_reaches_facade() {
        let dir = tempdir().unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), false);

        engine.run_mod("alpha", "forge.note('hello')").unwrap();
        assert_eq!(notes.borrow().as_slice(), ["hello"]);
    }

    #[test]
    fn test_config_slot_visible() {
        let dir = tempdir().unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), false);

        let facade = engine.lua().create_table().unwrap();
        let sink = Rc::clone(&notes);
        let note = engine
            .lua()
            .create_function(move |_, text: String| {
                sink.borrow_mut().push(text);
                Ok(())
            })
            .unwrap();
        facade.set("note", note).unwrap();

        let mut config = serde_json::Map::new();
        config.insert("x".to_string(), serde_json::json!(5));
        engine.bind_mod(facade, &config).unwrap();

        engine
            .run_mod("alpha", "forge.note(tostring(config.x))")
            .unwrap();
        assert_eq!(notes.borrow().as_slice(), ["5"]);
    }

    #[test]
    fn test_mod_globals_do_not_leak() {
        let dir = tempdir().unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), false);

        engine.run_mod("alpha", "leak = 'secret'").unwrap();
        engine
            .run_mod("beta", "forge.note(tostring(leak))")
            .unwrap();
        assert_eq!(notes.borrow().as_slice(), ["nil"]);
    }

    #[test]
    fn test_ambient_runtime_available() {
        let dir = tempdir().unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), false);

        engine
            .run_mod("alpha", "forge.note(string.upper('abc'))")
            .unwrap();
        assert_eq!(notes.borrow().as_slice(), ["ABC"]);
    }

    #[test]
    fn test_sandbox_blocks_os_and_io() {
        let dir = tempdir().unwrap();
        let (mut engine, _) = engine_with_probe(dir.path(), false);

        assert!(engine.run_mod("alpha", "os.execute('true')").is_err());
        assert!(engine.run_mod("alpha", "io.open('/etc/passwd')").is_err());
    }

    #[test]
    fn test_error_reports_original_line() {
        let dir = tempdir().unwrap();
        let (mut engine, _) = engine_with_probe(dir.path(), false);

        let err = engine
            .run_mod("alpha", "x = 1\ny = 2\nerror('boom')")
            .unwrap_err();
        match err {
            ForgeError::Script { name, detail } => {
                assert_eq!(name, "alpha");
                assert!(detail.contains(":3"), "detail: {detail}");
                assert!(detail.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_segment_line_offset_preserved_after_block() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("noop.lua"), "-- nothing").unwrap();
        let (mut engine, _) = engine_with_probe(dir.path(), false);

        let source = "-- #pragma lib-begin noop\n-- #pragma lib-end\nerror('late')";
        let err = engine.run_mod("alpha", source).unwrap_err();
        match err {
            ForgeError::Script { detail, .. } => {
                assert!(detail.contains(":3"), "detail: {detail}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_wrap_passes_facade_as_chunk_argument() {
        let dir = tempdir().unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), true);

        // A legacy script receiving the facade as its argument and returning
        // from the top level.
        let source = "local api = ...\napi.note('legacy')\nreturn";
        engine.run_mod("alpha", source).unwrap();
        assert_eq!(notes.borrow().as_slice(), ["legacy"]);
    }

    #[test]
    fn test_wrap_skipped_when_library_segment_present() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("noop.lua"), "-- nothing").unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), true);

        let source =
            "-- #pragma lib-begin noop\n-- #pragma lib-end\nforge.note(tostring(select('#', ...)))";
        engine.run_mod("alpha", source).unwrap();
        assert_eq!(notes.borrow().as_slice(), ["0"]);
    }

    #[test]
    fn test_library_runs_in_mod_scope() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("greeter.lua"),
            "function greet(who) return 'hi ' .. who end",
        )
        .unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), false);

        let source = "-- #pragma lib-begin greeter\n-- #pragma lib-end\nforge.note(greet('mod'))";
        engine.run_mod("alpha", source).unwrap();
        assert_eq!(notes.borrow().as_slice(), ["hi mod"]);

        // The library's definitions died with the mod's scope.
        engine
            .run_mod("beta", "forge.note(tostring(greet))")
            .unwrap();
        assert_eq!(notes.borrow().as_slice(), ["hi mod", "nil"]);
    }

    #[test]
    fn test_error_stops_remaining_segments() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("noop.lua"), "-- nothing").unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), false);

        let source = "error('first')\n-- #pragma lib-begin noop\n-- #pragma lib-end\nforge.note('unreached')";
        assert!(engine.run_mod("alpha", source).is_err());
        assert!(notes.borrow().is_empty());
    }

    #[test]
    fn test_directive_failure_aborts_before_execution() {
        let dir = tempdir().unwrap();
        let (mut engine, notes) = engine_with_probe(dir.path(), false);

        let source = "forge.note('ran')\n-- #pragma lib-begin dangling";
        let err = engine.run_mod("alpha", source).unwrap_err();
        assert!(matches!(err, ForgeError::Directive { line: 2, .. }));
        assert!(notes.borrow().is_empty());
    }
}
