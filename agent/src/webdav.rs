//! WebDAV transport for pushing files to the remote instance.
//!
//! The agent talks to the Commerce Cloud WebDAV interface with two verbs:
//! `MKCOL` to ensure a remote collection exists and `PUT` to upload a file
//! body. [`WebDavClient`] implements the [`Transport`] seam the upload
//! coordinator is generic over; tests substitute stub transports.
//!
//! No retry happens at this layer. A failed request surfaces as a single
//! [`TransportError`] and the caller decides what to do (the coordinator
//! reports it and moves on).

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use thiserror::Error;
use tracing::debug;

/// HTTP request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// WebDAV root on a Commerce Cloud instance; remote destinations
/// (`/Cartridges/<version>/...`) are appended to this.
const WEBDAV_ROOT: &str = "/on/demandware.servlet/webdav/Sites";

/// Errors that can occur during WebDAV operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed (connection, timeout, invalid URL).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The remote answered with a status the operation cannot treat as
    /// success.
    #[error("remote returned status {status} for {path}")]
    UnexpectedStatus { status: u16, path: String },

    /// The local path has no file name component.
    #[error("invalid local path: {0}")]
    InvalidPath(String),
}

/// Remote directory and file operations the coordinator sequences.
#[allow(async_fn_in_trait)]
pub trait Transport: Send + Sync {
    /// Ensures the remote directory exists, creating missing segments.
    async fn ensure_remote_dir(&self, remote_dir: &str) -> Result<(), TransportError>;

    /// Uploads the local file into the remote directory.
    async fn transfer_file(
        &self,
        local_relative: &str,
        remote_dir: &str,
    ) -> Result<(), TransportError>;
}

/// WebDAV client over reqwest with HTTP Basic credentials.
#[derive(Debug, Clone)]
pub struct WebDavClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    /// Local root that relative paths resolve against.
    local_root: PathBuf,
}

impl WebDavClient {
    /// Creates a client for a Commerce Cloud instance hostname.
    #[must_use]
    pub fn new(hostname: &str, username: &str, password: &str, local_root: PathBuf) -> Self {
        Self::with_base_url(
            format!("https://{hostname}{WEBDAV_ROOT}"),
            username,
            password,
            local_root,
        )
    }

    /// Creates a client against an explicit base URL. Used by tests to
    /// point at a local mock server.
    #[must_use]
    pub fn with_base_url(
        base_url: String,
        username: &str,
        password: &str,
        local_root: PathBuf,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            local_root,
        }
    }

    fn url_for(&self, remote_path: &str) -> String {
        format!("{}/{}", self.base_url, remote_path.trim_start_matches('/'))
    }

    /// Issues a single MKCOL. 201 means created; 405 means the collection
    /// already exists, which is equally fine.
    async fn mkcol(&self, remote_path: &str) -> Result<(), TransportError> {
        let url = self.url_for(remote_path);
        debug!(url = %url, "MKCOL");

        let response = self
            .client
            .request(
                Method::from_bytes(b"MKCOL").expect("valid method token"),
                &url,
            )
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        match response.status() {
            StatusCode::CREATED | StatusCode::METHOD_NOT_ALLOWED => Ok(()),
            status if status.is_success() => Ok(()),
            status => Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                path: remote_path.to_string(),
            }),
        }
    }
}

impl Transport for WebDavClient {
    /// Creates each missing segment of `remote_dir` from the root down, so
    /// the deepest collection exists before any file transfer starts.
    async fn ensure_remote_dir(&self, remote_dir: &str) -> Result<(), TransportError> {
        let mut prefix = String::new();
        for segment in remote_dir.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            self.mkcol(&prefix).await?;
        }
        Ok(())
    }

    async fn transfer_file(
        &self,
        local_relative: &str,
        remote_dir: &str,
    ) -> Result<(), TransportError> {
        let local_path = self.local_root.join(local_relative);
        let file_name = Path::new(local_relative)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TransportError::InvalidPath(local_relative.to_string()))?;

        let body = tokio::fs::read(&local_path)
            .await
            .map_err(|source| TransportError::Io {
                path: local_path.display().to_string(),
                source,
            })?;

        let url = format!(
            "{}/{}",
            self.url_for(remote_dir).trim_end_matches('/'),
            file_name
        );
        debug!(url = %url, bytes = body.len(), "PUT");

        let response = self
            .client
            .put(&url)
            .basic_auth(&self.username, Some(&self.password))
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                path: format!("{remote_dir}/{file_name}"),
            })
        }
    }
}
