//! Run a named host task and capture the terminal output that belongs to it.
//!
//! The host executes tasks through a coarse, event-based facility: it tells
//! us that *some* task started or ended, and separately that *some* terminal
//! opened or wrote data. Nothing hands us "the output of task X". This crate
//! closes that gap:
//!
//! 1. [`identity`] looks the task up by name and relabels a clone of its
//!    definition with a unique run identity, so this execution's events can
//!    be told apart from every other one.
//! 2. [`primer`] optionally runs a throwaway no-op task first, forcing the
//!    host to settle its shared output panel so terminal events for the real
//!    task are observable.
//! 3. [`runner`] launches the relabeled task and correlates the four host
//!    event streams to find, follow, and accumulate the one output channel
//!    that belongs to this run.
//! 4. [`run`] is the public entry point tying the pieces together.
//!
//! The host itself stays behind the [`host::TaskHost`] trait; tests drive
//! the engine against an in-memory simulator.

pub mod config;
pub mod error;
pub mod host;
pub mod identity;
pub mod primer;
pub mod run;
pub mod runner;

pub use config::TaskerConfig;
pub use error::RunError;
pub use host::{
    ExecutionHandle, PanelKind, PresentationOptions, RevealKind, TaskDefinition, TaskEvent,
    TaskHost, TaskScope, TerminalData, TerminalRef,
};
pub use identity::RunIdentity;
pub use run::{RunRequest, run_task};
pub use runner::{RunnerOptions, TaskRunner};
