//! cartsync - continuous cartridge synchronization agent.
//!
//! Watches a local cartridge tree for changes and pushes each changed file
//! to a Commerce Cloud style instance over WebDAV, routing configured path
//! patterns through a local build command instead of a direct upload.
//!
//! # Overview
//!
//! The pipeline, from filesystem to remote:
//!
//! 1. [`watcher`] owns the notify session over the cartridges root, applies
//!    the permanent and configured ignore rules, and debounces rapid write
//!    sequences into single change events.
//! 2. [`router`] checks each changed file against the configured build
//!    exceptions; a match fires the build command as a detached process,
//!    otherwise the path goes to upload.
//! 3. [`uploader`] guarantees at most one concurrent upload per path,
//!    translates the local path to its `/Cartridges/<version>/...`
//!    destination, and sequences the WebDAV calls in [`webdav`].
//!
//! [`config`] normalizes the watch configuration before any of this starts,
//! and [`observer`] is the seam that keeps notification and status side
//! effects out of the coordinator's control flow.

pub mod config;
pub mod error;
pub mod observer;
pub mod router;
pub mod uploader;
pub mod utils;
pub mod watcher;
pub mod webdav;

pub use config::{BuildExceptionRule, ConfigError, WatchConfig};
pub use error::{AgentError, Result};
pub use observer::{LogObserver, NullObserver, UploadObserver};
pub use router::ExceptionRouter;
pub use uploader::UploadCoordinator;
pub use utils::{Debouncer, DebouncerError, DEFAULT_DEBOUNCE_MS};
pub use watcher::{IgnoreRules, WatchSession, WatcherError};
pub use webdav::{Transport, TransportError, WebDavClient};
