//! Upload coordination: one upload per path at a time.
//!
//! The coordinator owns the in-flight membership set, the only shared
//! mutable state in the agent. A relative path is a member for the entire
//! duration of one upload attempt; a change event arriving for a path that
//! is already in flight is dropped, not queued. That dropped change is lost
//! unless another event arrives after the in-flight upload completes —
//! inherited behavior, kept deliberately.
//!
//! Each accepted upload sequences the transport calls: ensure the remote
//! directory exists, then transfer the file. Failures are terminal for that
//! one attempt only; the path is always released from the set afterwards so
//! a later change can trigger a fresh attempt.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::observer::UploadObserver;
use crate::webdav::{Transport, TransportError};

/// Remote root all destinations live under.
const REMOTE_ROOT: &str = "/Cartridges";

/// Coordinates uploads of changed files to the remote instance.
pub struct UploadCoordinator<T: Transport> {
    transport: Arc<T>,
    observer: Arc<dyn UploadObserver>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    cartridges_path: String,
    code_version: String,
    /// Status line text restored after each upload attempt.
    watching_status: String,
}

impl<T: Transport> UploadCoordinator<T> {
    #[must_use]
    pub fn new(
        transport: Arc<T>,
        observer: Arc<dyn UploadObserver>,
        cartridges_path: &Path,
        code_version: &str,
        watching_status: String,
    ) -> Self {
        Self {
            transport,
            observer,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            cartridges_path: cartridges_path
                .to_string_lossy()
                .replace('\\', "/")
                .trim_end_matches('/')
                .to_string(),
            code_version: code_version.to_string(),
            watching_status,
        }
    }

    /// Computes the remote destination directory for a changed file.
    ///
    /// Takes the directory portion of the relative path, strips the
    /// cartridges prefix, and joins the remainder under
    /// `/Cartridges/<code_version>`.
    #[must_use]
    pub fn remote_destination(&self, relative_path: &str) -> String {
        let dir = Path::new(relative_path)
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();

        let remainder = dir
            .strip_prefix(&self.cartridges_path)
            .unwrap_or(&dir)
            .trim_start_matches('/');

        if remainder.is_empty() {
            format!("{REMOTE_ROOT}/{}", self.code_version)
        } else {
            format!("{REMOTE_ROOT}/{}/{remainder}", self.code_version)
        }
    }

    /// Returns whether an upload for the path is currently in flight.
    pub async fn is_in_flight(&self, relative_path: &str) -> bool {
        self.in_flight.lock().await.contains(relative_path)
    }

    /// Uploads a changed file, idempotent-by-skip.
    ///
    /// If an upload for the same path is already in flight the call is a
    /// no-op. Otherwise the path is marked in flight, the remote directory
    /// is ensured, the file is transferred, and the path is released again
    /// regardless of outcome. Errors are reported through the observer and
    /// never propagate; the watch session continues.
    pub async fn upload(&self, relative_path: &str) {
        {
            let mut in_flight = self.in_flight.lock().await;
            if !in_flight.insert(relative_path.to_string()) {
                debug!(path = %relative_path, "upload already in flight, dropping event");
                return;
            }
        }

        self.observer.file_changed(relative_path);
        self.observer.set_status(&format!("{relative_path} changed"));

        let dest = self.remote_destination(relative_path);

        match self.transfer(relative_path, &dest).await {
            Ok(()) => {
                self.observer.file_uploaded(&dest);
                self.observer
                    .set_status(&format!("{relative_path} pushed to {dest}"));
            }
            Err(e) => {
                warn!(path = %relative_path, error = %e, "upload failed");
                self.observer.upload_failed(&e.to_string());
            }
        }

        self.observer.set_status(&self.watching_status);
        self.in_flight.lock().await.remove(relative_path);
    }

    /// Directory must exist before the file transfer begins.
    async fn transfer(&self, relative_path: &str, dest: &str) -> Result<(), TransportError> {
        self.transport.ensure_remote_dir(dest).await?;
        self.transport.transfer_file(relative_path, dest).await
    }
}
