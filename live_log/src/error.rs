//! Error types for the live log subsystem

use crate::graph::EntryKey;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the log graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("no entry with key {0} exists in the graph")]
    UnknownEntry(EntryKey),
}

/// Errors raised while turning an entry into text.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("entry {key} could not be rendered: {reason}")]
    Format { key: EntryKey, reason: String },
}

/// Errors raised by a canvas while painting.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised by an outbound sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to write batch: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sink receiver disconnected")]
    Disconnected,
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Errors raised while starting the live writer.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn writer thread: {0}")]
    Spawn(#[source] io::Error),
}
