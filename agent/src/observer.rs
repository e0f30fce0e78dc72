//! Observation seam for upload side effects.
//!
//! The coordinator reports progress through the [`UploadObserver`] trait
//! rather than writing to the terminal or the OS notification service
//! directly, so its control flow stays testable. All methods are infallible
//! and fire-and-forget: an observer must never fail or block the caller.

use tracing::{error, info};

/// Receives notifications and status-line updates around each upload.
pub trait UploadObserver: Send + Sync {
    /// A watched file changed and an upload attempt is starting.
    fn file_changed(&self, path: &str);

    /// A file was uploaded to the given remote destination.
    fn file_uploaded(&self, dest: &str);

    /// An upload attempt failed with the given message.
    fn upload_failed(&self, message: &str);

    /// Replaces the persistent status line text.
    fn set_status(&self, text: &str);
}

/// Observer that routes notifications and status text through `tracing`.
///
/// `silent` suppresses the file-changed / file-uploaded notifications;
/// `progress` gates the status line. Failure indicators are always shown.
#[derive(Debug, Clone)]
pub struct LogObserver {
    silent: bool,
    progress: bool,
}

impl LogObserver {
    #[must_use]
    pub fn new(silent: bool, progress: bool) -> Self {
        Self { silent, progress }
    }
}

impl UploadObserver for LogObserver {
    fn file_changed(&self, path: &str) {
        if !self.silent {
            info!(path = %path, "file changed");
        }
    }

    fn file_uploaded(&self, dest: &str) {
        if !self.silent {
            info!(dest = %dest, "file uploaded");
        }
    }

    fn upload_failed(&self, message: &str) {
        error!(message = %message, "upload failed");
    }

    fn set_status(&self, text: &str) {
        if self.progress {
            info!(status = %text, "status");
        }
    }
}

/// Observer that drops everything.
#[derive(Debug, Clone, Default)]
pub struct NullObserver;

impl UploadObserver for NullObserver {
    fn file_changed(&self, _path: &str) {}
    fn file_uploaded(&self, _dest: &str) {}
    fn upload_failed(&self, _message: &str) {}
    fn set_status(&self, _text: &str) {}
}
