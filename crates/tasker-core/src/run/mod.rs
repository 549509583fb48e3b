//! Execution facade: the public `run_task` entry point.
//!
//! Validates the request, rewrites the task identity, drives the primer,
//! then runs the correlation engine and returns its settlement unchanged.

use std::sync::Arc;
use std::time::Duration;

use crate::config::TaskerConfig;
use crate::error::RunError;
use crate::host::TaskHost;
use crate::runner::{RunnerOptions, TaskRunner};
use crate::{identity, primer};

/// One logical request to run a named task.
///
/// `None` fields fall back to the resolved [`TaskerConfig`].
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub name: String,
    pub trim_output: Option<bool>,
    /// Milliseconds; 0 disables the output timeout.
    pub output_timeout_ms: Option<u64>,
    /// Empty string disables priming.
    pub primer_command: Option<String>,
}

impl RunRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            trim_output: None,
            output_timeout_ms: None,
            primer_command: None,
        }
    }
}

/// Run the named task and capture its terminal output.
///
/// Fails fast with [`RunError::MissingTaskName`] on an empty name -- the
/// only synchronous pre-check, before any subscription or launch. Every
/// other failure surfaces from the primer or the runner unchanged.
pub async fn run_task(
    host: Arc<dyn TaskHost>,
    request: &RunRequest,
    config: &TaskerConfig,
) -> Result<String, RunError> {
    if request.name.is_empty() {
        return Err(RunError::MissingTaskName);
    }

    let (identity, definition) = identity::rewrite_task(host.as_ref(), &request.name).await?;

    let primer_command = request
        .primer_command
        .clone()
        .unwrap_or_else(|| config.primer_command.clone());
    primer::run_primer(host.as_ref(), &identity, &primer_command).await?;

    let timeout_ms = request.output_timeout_ms.unwrap_or(config.output_timeout_ms);
    let options = RunnerOptions {
        trim_output: request.trim_output.unwrap_or(config.trim_output),
        output_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
    };

    let runner = TaskRunner::new(host, request.name.clone(), identity, definition, options);
    runner.execute().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_defaults_leave_config_in_charge() {
        let request = RunRequest::new("build");
        assert_eq!(request.name, "build");
        assert!(request.trim_output.is_none());
        assert!(request.output_timeout_ms.is_none());
        assert!(request.primer_command.is_none());
    }
}
