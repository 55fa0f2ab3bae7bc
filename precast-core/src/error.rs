//! Error types for the fallible entry points of the engine.
//!
//! Everything that happens *inside* a packet callback is modeled as data
//! (denial codes, `TransitionDescriptor::Refused`) rather than `Result`:
//! the core never throws across a packet callback. `PrecastError` only
//! covers the handful of genuine IO/parse boundaries - catalog loading,
//! config loading/saving, and command parsing.

use thiserror::Error;

/// Errors surfaced at the engine's fallible entry points.
#[derive(Debug, Error)]
pub enum PrecastError {
    /// Reading a catalog, support-override, or config file from disk failed.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A catalog/config/support file was not valid JSON for its expected shape.
    #[error("failed to parse {path} as JSON: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A text command did not match the fixed command grammar.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// A numeric command argument was not a valid non-negative integer.
    #[error("invalid argument for `{command}`: {argument}")]
    InvalidArgument { command: String, argument: String },
}
