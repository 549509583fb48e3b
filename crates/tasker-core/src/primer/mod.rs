//! Pseudo-task primer.
//!
//! The host reuses shared-panel terminals: when the real task lands in an
//! already-open terminal, no terminal-opened event fires and correlation by
//! terminal name would never attach. Running a trivial no-op task under the
//! same identity and panel first makes the host settle its panel reuse, so
//! the real launch produces observable terminal identity either via the
//! open-terminal snapshot or a fresh opened event.

use tokio::sync::broadcast::error::RecvError;

use crate::error::RunError;
use crate::host::{
    PanelKind, PresentationOptions, RevealKind, TaskDefinition, TaskHost, TaskScope,
};
use crate::identity::RunIdentity;

/// The pseudo task: same identity and shared panel as the real task, with
/// every visible side effect suppressed.
fn pseudo_task(identity: &RunIdentity, command: &str) -> TaskDefinition {
    TaskDefinition {
        name: identity.as_str().to_string(),
        kind: "shell".to_string(),
        source: "tasker".to_string(),
        scope: TaskScope::Workspace,
        command: command.to_string(),
        problem_matchers: Vec::new(),
        presentation: PresentationOptions {
            reveal: RevealKind::Never,
            panel: PanelKind::Shared,
            echo: false,
            show_reuse_message: false,
        },
    }
}

/// Run the primer command and wait for its end event.
///
/// An empty command disables priming. A launch rejection aborts the whole
/// run with [`RunError::PrimerFailed`] before the real task is attempted.
pub async fn run_primer(
    host: &dyn TaskHost,
    identity: &RunIdentity,
    command: &str,
) -> Result<(), RunError> {
    if command.is_empty() {
        tracing::debug!(identity = %identity, "priming disabled");
        return Ok(());
    }

    // Subscribe before launching so the end event cannot be missed.
    let mut ended = host.subscribe_task_ended();

    let definition = pseudo_task(identity, command);
    host.execute_task(&definition)
        .await
        .map_err(|e| RunError::PrimerFailed(format!("{e:#}")))?;

    tracing::debug!(identity = %identity, command, "primer launched");

    loop {
        match ended.recv().await {
            Ok(event) if identity.matches_task(&event.task_name) => break,
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(identity = %identity, skipped, "task-ended stream lagged during priming");
            }
            Err(RecvError::Closed) => {
                tracing::warn!(identity = %identity, "task-ended stream closed during priming");
                break;
            }
        }
    }

    tracing::debug!(identity = %identity, "primer completed");
    Ok(())
}
