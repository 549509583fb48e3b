//! The `TaskHost` trait -- the adapter interface for the host's task
//! execution facility and terminal event system.
//!
//! The trait is intentionally object-safe so the engine can hold it as
//! `Arc<dyn TaskHost>` and tests can substitute an in-memory simulator.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

use super::types::{ExecutionHandle, TaskDefinition, TaskEvent, TerminalData, TerminalRef};

/// Adapter interface for a task-executing host.
///
/// The event subscriptions are broadcast receivers over the host's global
/// streams: every subscriber sees every event, for every task and terminal.
/// Filtering by run identity is the caller's job.
///
/// # Object Safety
///
/// Every method returns a concrete type, so the trait can be used as
/// `Arc<dyn TaskHost>`.
#[async_trait]
pub trait TaskHost: Send + Sync {
    /// Enumerate all task definitions the host currently knows.
    async fn fetch_tasks(&self) -> Result<Vec<TaskDefinition>>;

    /// Launch a task definition.
    ///
    /// Resolves with an [`ExecutionHandle`] once the host accepts the
    /// launch, or rejects if the launch itself fails (before any start
    /// event is emitted).
    async fn execute_task(&self, definition: &TaskDefinition) -> Result<ExecutionHandle>;

    /// Request termination of a running execution.
    ///
    /// Advisory: the host may or may not emit a subsequent end event.
    async fn terminate(&self, handle: &ExecutionHandle) -> Result<()>;

    /// Subscribe to task-started events.
    fn subscribe_task_started(&self) -> broadcast::Receiver<TaskEvent>;

    /// Subscribe to task-ended events.
    fn subscribe_task_ended(&self) -> broadcast::Receiver<TaskEvent>;

    /// Subscribe to terminal-opened events.
    fn subscribe_terminal_opened(&self) -> broadcast::Receiver<TerminalRef>;

    /// Subscribe to terminal-data events (all terminals, interleaved).
    fn subscribe_terminal_data(&self) -> broadcast::Receiver<TerminalData>;

    /// Snapshot of the currently open terminals.
    fn open_terminals(&self) -> Vec<TerminalRef>;
}

// Compile-time assertion: TaskHost must be object-safe.
const _: () = {
    fn _assert_object_safe(_: &dyn TaskHost) {}
};
