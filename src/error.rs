//! Error types for modforge.

use thiserror::Error;

/// Common error type for modforge.
///
/// Absence of a file from every root is not an error: the resolver signals
/// it as `None` and the Lua facade as `nil`. Everything below aborts the run.
#[derive(Error, Debug)]
pub enum ForgeError {
    /// I/O failure for a reason other than absence. Carries the overlay path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Structured data unparsable by both the strict and relaxed modes,
    /// or unserializable on write.
    #[error("parse error in '{path}': {detail}")]
    Parse { path: String, detail: String },

    /// Preprocessor directive stack underflow/overflow/unterminated block.
    #[error("directive error in '{script}' at line {line}: {detail}")]
    Directive {
        script: String,
        line: usize,
        detail: String,
    },

    /// Uncaught error during script execution. Aborts the current mod and,
    /// through the orchestrator, the entire run.
    #[error("script error in mod '{name}': {detail}")]
    Script { name: String, detail: String },

    /// A flush or resolve target escaped the output root.
    #[error("path '{path}' escapes the output root")]
    PathEscape { path: String },

    /// Named library script missing or uncompilable.
    #[error("library '{name}': {detail}")]
    Library { name: String, detail: String },

    /// Failure setting up the script runtime itself, outside any mod.
    #[error("script engine error: {0}")]
    Engine(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Host settings error.
    #[error("settings error: {0}")]
    Settings(String),
}

impl ForgeError {
    /// Wrap an I/O error with the overlay path it concerns.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        ForgeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for modforge operations.
pub type Result<T> = std::result::Result<T, ForgeError>;
