//! Script preprocessing and sandboxed execution.
//!
//! A mod's script is split into ordered inline/library segments, then run in
//! an isolated-but-chained Lua scope exposing the `forge` capability surface.

pub mod api;
pub mod engine;
pub mod library;
pub mod preprocess;

pub use api::ForgeApi;
pub use engine::ScriptEngine;
pub use library::LibraryCache;
pub use preprocess::{split_segments, Segment};
