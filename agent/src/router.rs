//! Routing of changed files to build commands or upload.
//!
//! Certain paths (historically compiled assets like SCSS) must not be
//! uploaded directly; instead a local build command regenerates them. The
//! router checks each changed file against the configured
//! [`BuildExceptionRule`]s and either fires the matching rule's command or
//! hands the path to the upload callback.
//!
//! Matching is substring containment of the rule's pattern within the
//! relative path, checked in configured order, first match wins. This is
//! deliberately naive — a short pattern will match many unrelated paths —
//! and is preserved for compatibility with existing configurations.
//!
//! Build commands run as detached background processes: no handle is
//! retained, completion is not awaited, and the exit status is never
//! inspected. A spawn failure is logged at debug level only.

use std::future::Future;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::BuildExceptionRule;

/// Directory the build commands run in, relative to the working directory.
pub const BUILDER_DIR: &str = "gulp_builder";

/// Decides whether a changed file goes to a build command or to upload.
#[derive(Debug, Clone)]
pub struct ExceptionRouter {
    rules: Vec<BuildExceptionRule>,
}

impl ExceptionRouter {
    #[must_use]
    pub fn new(rules: Vec<BuildExceptionRule>) -> Self {
        Self { rules }
    }

    /// Returns the first rule whose pattern is a substring of
    /// `relative_path`, if any. Later matching rules are ignored.
    #[must_use]
    pub fn find_match(&self, relative_path: &str) -> Option<&BuildExceptionRule> {
        self.rules
            .iter()
            .find(|rule| relative_path.contains(&rule.pattern))
    }

    /// Routes a changed file.
    ///
    /// If a rule matches, its command is fired as a detached background
    /// process and the file is NOT forwarded. Otherwise `on_no_match` is
    /// invoked with the relative path.
    pub async fn route<F, Fut>(&self, relative_path: &str, on_no_match: F)
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = ()>,
    {
        match self.find_match(relative_path) {
            Some(rule) => {
                info!(
                    path = %relative_path,
                    pattern = %rule.pattern,
                    command = %rule.command,
                    "build exception matched"
                );
                spawn_build_command(&rule.command);
            }
            None => on_no_match(relative_path.to_string()).await,
        }
    }
}

/// Spawns a build command in the builder directory, fire-and-forget.
fn spawn_build_command(command: &str) {
    let shell_command = format!("cd {BUILDER_DIR} && {command}");

    match Command::new("sh")
        .arg("-c")
        .arg(&shell_command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => {
            debug!(command = %shell_command, pid = child.id(), "build command spawned");
            drop(child);
        }
        Err(e) => {
            debug!(command = %shell_command, error = %e, "failed to spawn build command");
        }
    }
}
