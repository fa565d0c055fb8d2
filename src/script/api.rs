//! Host-capability facade for mod scripts.
//!
//! Provides the `forge` table. Every file operation routes through the
//! overlay resolver, so mods read each other's unflushed writes; absence is
//! `nil`, an I/O failure is raised.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use mlua::{Lua, LuaSerdeExt, Result as LuaResult, Table, Value};
use tracing::info;

use crate::assets::{structured, tabular, WriteStyle};
use crate::error::ForgeError;
use crate::vfs::OverlayResolver;

/// Builder for one mod's `forge` table.
pub struct ForgeApi {
    resolver: Rc<RefCell<OverlayResolver>>,
    mod_dir: PathBuf,
    mod_name: String,
}

impl ForgeApi {
    /// Create a facade bound to the resolver and one mod.
    pub fn new(
        resolver: Rc<RefCell<OverlayResolver>>,
        mod_dir: impl Into<PathBuf>,
        mod_name: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            mod_dir: mod_dir.into(),
            mod_name: mod_name.into(),
        }
    }

    /// Build the facade table in the given Lua state.
    pub fn register(self, lua: &Lua) -> LuaResult<Table> {
        let forge = lua.create_table()?;

        self.register_text_functions(lua, &forge)?;
        self.register_structured_functions(lua, &forge)?;
        self.register_tabular_functions(lua, &forge)?;
        self.register_id_function(lua, &forge)?;
        self.register_copy_function(lua, &forge)?;
        self.register_log_function(lua, &forge)?;

        Ok(forge)
    }

    fn register_text_functions(&self, lua: &Lua, forge: &Table) -> LuaResult<()> {
        let resolver = Rc::clone(&self.resolver);
        let read_text = lua.create_function(move |_, path: String| {
            resolver.borrow_mut().read_auto(&path).map_err(external)
        })?;
        forge.set("read_text", read_text)?;

        let resolver = Rc::clone(&self.resolver);
        let write_text = lua.create_function(move |_, (path, content): (String, String)| {
            resolver.borrow_mut().write(&path, &content).map_err(external)
        })?;
        forge.set("write_text", write_text)?;

        Ok(())
    }

    fn register_structured_functions(&self, lua: &Lua, forge: &Table) -> LuaResult<()> {
        let resolver = Rc::clone(&self.resolver);
        let read_structured = lua.create_function(move |lua, path: String| {
            let Some(text) = resolver.borrow_mut().read_auto(&path).map_err(external)? else {
                return Ok(Value::Nil);
            };
            let value = structured::parse(&path, &text).map_err(external)?;
            lua.to_value(&value)
        })?;
        forge.set("read_structured", read_structured)?;

        let resolver = Rc::clone(&self.resolver);
        let write_structured = lua.create_function(
            move |lua, (path, data, opts): (String, Value, Option<Table>)| {
                let value: serde_json::Value = lua.from_value(data)?;
                let style = write_style(opts)?;
                let text = structured::to_text(&path, &value, &style).map_err(external)?;
                resolver.borrow_mut().write(&path, &text).map_err(external)
            },
        )?;
        forge.set("write_structured", write_structured)?;

        Ok(())
    }

    fn register_tabular_functions(&self, lua: &Lua, forge: &Table) -> LuaResult<()> {
        let resolver = Rc::clone(&self.resolver);
        let read_tabular = lua.create_function(move |lua, path: String| {
            let Some(text) = resolver.borrow_mut().read_auto(&path).map_err(external)? else {
                return Ok(Value::Nil);
            };
            let table = tabular::parse(&path, &text).map_err(external)?;
            let result = lua.create_table()?;
            result.set("headers", table.headers)?;
            result.set("rows", table.rows)?;
            Ok(Value::Table(result))
        })?;
        forge.set("read_tabular", read_tabular)?;

        let resolver = Rc::clone(&self.resolver);
        let write_tabular = lua.create_function(move |_, (path, data): (String, Table)| {
            let table = tabular::Table {
                headers: data.get("headers")?,
                rows: data.get("rows")?,
            };
            let text = tabular::to_text(&table);
            resolver.borrow_mut().write(&path, &text).map_err(external)
        })?;
        forge.set("write_tabular", write_tabular)?;

        Ok(())
    }

    fn register_id_function(&self, lua: &Lua, forge: &Table) -> LuaResult<()> {
        let resolver = Rc::clone(&self.resolver);
        let allocate_id = lua.create_function(move |_, ()| {
            let id = resolver.borrow_mut().allocate_id().map_err(external)?;
            Ok(id as i64)
        })?;
        forge.set("allocate_id", allocate_id)?;
        Ok(())
    }

    fn register_copy_function(&self, lua: &Lua, forge: &Table) -> LuaResult<()> {
        let resolver = Rc::clone(&self.resolver);
        let mod_dir = self.mod_dir.clone();
        let copy_file =
            lua.create_function(move |_, (src, dst, overwrite): (String, String, bool)| {
                if !overwrite && resolver.borrow_mut().has_output_content(&dst).map_err(external)? {
                    return Ok(false);
                }
                let source_path = mod_dir.join(&src);
                let content = fs::read_to_string(&source_path).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        mlua::Error::RuntimeError(format!("copy_file: '{src}' not found in mod directory"))
                    } else {
                        external(ForgeError::io(source_path.display().to_string(), e))
                    }
                })?;
                resolver.borrow_mut().write(&dst, &content).map_err(external)?;
                Ok(true)
            })?;
        forge.set("copy_file", copy_file)?;
        Ok(())
    }

    fn register_log_function(&self, lua: &Lua, forge: &Table) -> LuaResult<()> {
        let name = self.mod_name.clone();
        let log = lua.create_function(move |_, message: String| {
            info!("mod {name}: {message}");
            Ok(())
        })?;
        forge.set("log", log)?;
        Ok(())
    }
}

/// Translate write options: an explicit `indent` string wins over a `width`
/// space count; neither means compact output.
fn write_style(opts: Option<Table>) -> LuaResult<WriteStyle> {
    let Some(opts) = opts else {
        return Ok(WriteStyle::Compact);
    };
    if let Some(indent) = opts.get::<Option<String>>("indent")? {
        return Ok(WriteStyle::Pretty { indent });
    }
    if let Some(width) = opts.get::<Option<usize>>("width")? {
        return Ok(WriteStyle::width(width));
    }
    Ok(WriteStyle::Compact)
}

fn external(e: ForgeError) -> mlua::Error {
    mlua::Error::external(e)
}
