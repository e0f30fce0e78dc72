//! Error types for the cartridge sync agent.
//!
//! Each concern carries its own error enum (`ConfigError`, `WatcherError`,
//! `TransportError`); this module composes them into the crate-level
//! [`AgentError`] and provides the [`Result`] alias used throughout.

use thiserror::Error;

use crate::config::ConfigError;
use crate::watcher::WatcherError;
use crate::webdav::TransportError;

/// Errors that can occur during agent operations.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Configuration-related error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// File watching error.
    #[error("file watch error: {0}")]
    Watch(#[from] WatcherError),

    /// WebDAV transport error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized `Result` type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
