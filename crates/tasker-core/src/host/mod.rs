//! Host boundary for task execution and terminal observation.
//!
//! This module defines the [`TaskHost`] trait that adapters for a concrete
//! host implement, plus the value types that cross the boundary
//! ([`TaskDefinition`], [`ExecutionHandle`], [`TerminalRef`], ...).
//!
//! # Architecture
//!
//! ```text
//! run_task
//!     |
//!     v
//! TaskRunner --fetch_tasks()----------> Vec<TaskDefinition>
//!     |       execute_task(def) ------> ExecutionHandle
//!     |       terminate(handle)
//!     |
//!     |       subscribe_task_started() ---> Receiver<TaskEvent>
//!     |       subscribe_task_ended() -----> Receiver<TaskEvent>
//!     |       subscribe_terminal_opened() > Receiver<TerminalRef>
//!     |       subscribe_terminal_data() --> Receiver<TerminalData>
//!     |       open_terminals() ----------> Vec<TerminalRef>
//! ```
//!
//! The streams are global: the host fans every task and terminal event out
//! to every subscriber. Correlation by run identity happens on our side.

pub mod trait_def;
pub mod types;

// Re-export the primary public API at the module level.
pub use trait_def::TaskHost;
pub use types::{
    ExecutionHandle, PanelKind, PresentationOptions, RevealKind, TaskDefinition, TaskEvent,
    TaskScope, TerminalData, TerminalRef,
};
