//! Run identities and the task identity rewriter.
//!
//! A run identity is the correlation key for one execution: a relabeled
//! clone of the task definition is launched under it, and every task or
//! terminal event is matched against it. Identities embed a monotonic
//! nanosecond stamp behind an uncommon prefix, so concurrent runs of the
//! same task (and leftover terminals from earlier runs) never collide.
//! Format: `tasker@<stamp>: <original name>`.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::RunError;
use crate::host::{PanelKind, TaskDefinition, TaskHost};

/// Prefix chosen to be unlikely to appear in an unrelated terminal name.
const IDENTITY_PREFIX: &str = "tasker@";

/// Last stamp handed out; bumped past the clock when the clock is coarse so
/// two mints in the same instant still differ.
static LAST_STAMP: AtomicU64 = AtomicU64::new(0);

fn next_stamp() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let mut stamp = now;
    let _ = LAST_STAMP.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        stamp = now.max(last + 1);
        Some(stamp)
    });
    stamp
}

/// Unique label for one task execution.
///
/// The sole correlation key between task-lifecycle events (matched by
/// equality) and terminal events (matched by substring containment, because
/// the host decorates terminal display names with extra text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity(String);

impl RunIdentity {
    /// Mint a fresh identity for a run of the named task.
    pub fn mint(task_name: &str) -> Self {
        Self(format!("{IDENTITY_PREFIX}{}: {task_name}", next_stamp()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Task-lifecycle events carry the launched name verbatim.
    pub fn matches_task(&self, task_name: &str) -> bool {
        task_name == self.0
    }

    /// Terminal display names contain the launched name somewhere inside
    /// host decoration, e.g. `"Task - tasker@169...: build"`.
    pub fn matches_terminal(&self, terminal_name: &str) -> bool {
        terminal_name.contains(&self.0)
    }
}

impl fmt::Display for RunIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Look up a task by exact name and produce the relabeled clone to launch.
///
/// The clone keeps the execution command, kind, source, scope, and problem
/// matchers of the registry entry, but carries a fresh [`RunIdentity`] as
/// its name and is forced onto the shared panel (some presentation settings
/// would otherwise suppress the terminal whose name we need to observe).
/// The registry entry itself is never mutated.
///
/// Fails with [`RunError::TaskNotFound`] before any subscription or launch
/// if no registered task has the requested name.
pub async fn rewrite_task(
    host: &dyn TaskHost,
    name: &str,
) -> Result<(RunIdentity, TaskDefinition), RunError> {
    let tasks = host
        .fetch_tasks()
        .await
        .map_err(|e| RunError::HostFailure(format!("task enumeration failed: {e:#}")))?;

    let Some(task) = tasks.iter().find(|t| t.name == name) else {
        return Err(RunError::TaskNotFound(name.to_string()));
    };

    let identity = RunIdentity::mint(name);
    let mut rewritten = task.clone();
    rewritten.name = identity.as_str().to_string();
    rewritten.presentation.panel = PanelKind::Shared;

    tracing::debug!(task_name = name, identity = %identity, "rewrote task identity");
    Ok((identity, rewritten))
}
