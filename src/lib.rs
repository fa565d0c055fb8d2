//! modforge - layered mod application for game-asset trees.
//!
//! Applies an ordered set of third-party Lua data-transformation scripts
//! ("mods") to a layered collection of game-asset files, producing a merged
//! output tree while avoiding redundant writes and keeping failures
//! debuggable.

pub mod assets;
pub mod config;
pub mod error;
pub mod logging;
pub mod mods;
pub mod script;
pub mod vfs;

pub use assets::{Table, WriteStyle};
pub use config::Config;
pub use error::{ForgeError, Result};
pub use mods::{HostSettings, ModManifest, ModRunner, RunReport};
pub use script::{ForgeApi, ScriptEngine, Segment};
pub use vfs::OverlayResolver;
