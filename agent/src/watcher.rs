//! Filesystem watch session over the cartridge tree.
//!
//! The session wraps a [`notify`] recursive watch rooted at the configured
//! cartridges path. The notify callback is kept lightweight: it filters
//! event kinds and ignore rules, then forwards absolute paths into a
//! per-path debouncer so that editor save sequences (write temp file, then
//! rename over the original) collapse into one logical change event. A
//! relay task converts surviving paths to working-directory-relative
//! strings and hands them to the dispatch loop.
//!
//! Pre-existing files produce no synthetic events: notify only reports
//! changes that happen after the watch starts.
//!
//! Permanent ignore rules, applied on top of the configured ignored
//! directories:
//! - any path component beginning with `.`,
//! - anything under a `node_modules` directory at any depth.

use std::path::{Path, PathBuf};

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::config::WatchConfig;
use crate::utils::Debouncer;

/// Capacity of the watch-event channels.
const CHANNEL_CAPACITY: usize = 1000;

/// Errors that can occur during file watching operations.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to initialize the file system watcher.
    #[error("failed to create watcher: {0}")]
    WatcherInit(#[from] notify::Error),

    /// The watch directory does not exist or is inaccessible.
    #[error("watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),
}

/// Exclusion rules applied to every raw filesystem event.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    working_dir: PathBuf,
    absolute_ignores: Vec<PathBuf>,
}

impl IgnoreRules {
    /// Builds the rules for a working directory and the configured ignored
    /// directories (joined onto the working directory, as configured paths
    /// are relative).
    #[must_use]
    pub fn new(working_dir: &Path, ignored_dirs: &[PathBuf]) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            absolute_ignores: ignored_dirs
                .iter()
                .map(|dir| working_dir.join(dir))
                .collect(),
        }
    }

    /// Returns whether an absolute event path must be excluded.
    ///
    /// Hidden components and `node_modules` are only checked below the
    /// working directory, so a dotted component in the working directory's
    /// own path (e.g. a home directory) does not exclude everything.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self
            .absolute_ignores
            .iter()
            .any(|ignored| path.starts_with(ignored))
        {
            return true;
        }

        let relative = path.strip_prefix(&self.working_dir).unwrap_or(path);
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            name.starts_with('.') || name == "node_modules"
        })
    }
}

/// A running filesystem watch session.
///
/// Dropping the session stops the watch.
pub struct WatchSession {
    /// Kept alive to maintain the watch subscription.
    #[allow(dead_code)]
    watcher: RecommendedWatcher,

    /// The root directory being watched.
    watch_root: PathBuf,
}

impl WatchSession {
    /// Starts watching the configured cartridges path under `working_dir`.
    ///
    /// Returns the session and a receiver of debounced, relative paths for
    /// changed or added files.
    ///
    /// # Errors
    ///
    /// Returns an error if the cartridges path does not exist or the
    /// watcher cannot be initialized.
    pub fn start(
        working_dir: &Path,
        config: &WatchConfig,
    ) -> Result<(Self, mpsc::Receiver<String>), WatcherError> {
        let watch_root = working_dir.join(&config.cartridges_path);
        if config.cartridges_path.as_os_str().is_empty() || !watch_root.exists() {
            return Err(WatcherError::DirectoryNotFound(watch_root));
        }

        let rules = IgnoreRules::new(working_dir, &config.ignored_dirs);

        let (debounced_tx, debounced_rx) = mpsc::channel::<PathBuf>(CHANNEL_CAPACITY);
        let debouncer = Debouncer::with_default_interval(debounced_tx);

        let (event_tx, event_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

        // Lightweight callback: filter and forward, no I/O on the notify
        // thread.
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                handle_notify_event(res, &rules, &debouncer);
            },
            Config::default(),
        )?;
        watcher.watch(&watch_root, RecursiveMode::Recursive)?;

        tokio::spawn(relay_debounced_events(
            debounced_rx,
            event_tx,
            working_dir.to_path_buf(),
        ));

        info!(
            watch_root = %watch_root.display(),
            "watch session started"
        );

        Ok((
            Self {
                watcher,
                watch_root,
            },
            event_rx,
        ))
    }

    /// Returns the directory being watched.
    #[must_use]
    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }
}

/// Filters raw notify events and feeds surviving paths to the debouncer.
fn handle_notify_event(
    res: Result<Event, notify::Error>,
    rules: &IgnoreRules,
    debouncer: &Debouncer<PathBuf>,
) {
    let event = match res {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "file watcher error");
            return;
        }
    };

    // Only creations and modifications become upload candidates.
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        trace!(kind = ?event.kind, "ignoring event kind");
        return;
    }

    for path in &event.paths {
        if rules.is_ignored(path) {
            trace!(path = %path.display(), "path excluded by ignore rules");
            continue;
        }

        if let Err(e) = debouncer.try_send(path.clone()) {
            warn!(path = %path.display(), error = %e, "failed to queue watch event");
        }
    }
}

/// Converts debounced absolute paths to relative strings and forwards them.
///
/// Paths that no longer point at a regular file are dropped here; that
/// covers editor temp files that were renamed away during the debounce
/// window.
async fn relay_debounced_events(
    mut debounced_rx: mpsc::Receiver<PathBuf>,
    event_tx: mpsc::Sender<String>,
    working_dir: PathBuf,
) {
    while let Some(path) = debounced_rx.recv().await {
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            _ => {
                trace!(path = %path.display(), "skipping non-file path");
                continue;
            }
        }

        let relative = path
            .strip_prefix(&working_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");

        debug!(path = %relative, "change event");
        if event_tx.send(relative).await.is_err() {
            debug!("event receiver dropped, stopping relay");
            return;
        }
    }
}
