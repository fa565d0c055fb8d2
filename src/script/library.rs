//! Shared library scripts, compiled once per run and cached by name.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use mlua::{Function, Lua};

use crate::error::{ForgeError, Result};

/// Per-run cache of compiled library scripts.
///
/// A library named `L` lives at `<dir>/L.lua`. Its source is compiled into a
/// function taking the caller's environment table, so one compilation serves
/// every mod while each call still runs in that mod's local scope.
pub struct LibraryCache {
    dir: PathBuf,
    compiled: HashMap<String, Function>,
}

impl LibraryCache {
    /// Create a cache over the given libraries directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            compiled: HashMap::new(),
        }
    }

    /// Resolve `name`, loading and compiling it on first use.
    ///
    /// A missing file is fatal and names the library; other read failures
    /// propagate as I/O errors.
    pub fn resolve(&mut self, lua: &Lua, name: &str) -> Result<Function> {
        if let Some(function) = self.compiled.get(name) {
            return Ok(function.clone());
        }

        let path = self.dir.join(format!("{name}.lua"));
        let source = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ForgeError::Library {
                    name: name.to_string(),
                    detail: format!("not found at {}", path.display()),
                }
            } else {
                ForgeError::io(path.display().to_string(), e)
            }
        })?;

        // The single-line prefix keeps the source's own line numbers intact
        // in diagnostics.
        let wrapped = format!("return function(_ENV) {source}\nend");
        let function: Function = lua
            .load(wrapped)
            .set_name(format!("{name}.lua"))
            .eval()
            .map_err(|e| ForgeError::Library {
                name: name.to_string(),
                detail: e.to_string(),
            })?;

        self.compiled.insert(name.to_string(), function.clone());
        Ok(function)
    }

    /// Number of libraries compiled so far.
    pub fn len(&self) -> usize {
        self.compiled.len()
    }

    /// True when no library has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.compiled.is_empty()
    }
}
