//! Value types crossing the host boundary.

use uuid::Uuid;

/// Where a task's output panel lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    /// Output lands in the panel shared between tasks. The engine forces
    /// this on every definition it launches so output is always observable
    /// in a named terminal.
    Shared,
    /// A panel dedicated to this task, reused across its runs.
    Dedicated,
    /// A fresh panel for every run.
    New,
}

/// Whether the host brings the output panel into view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealKind {
    Always,
    Silent,
    Never,
}

/// Presentation settings on a task definition.
///
/// The engine only ever writes `panel` (forced to [`PanelKind::Shared`]) and
/// the suppression flags on its own pseudo tasks; everything else passes
/// through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationOptions {
    pub reveal: RevealKind,
    pub panel: PanelKind,
    /// Whether the executed command line is echoed into the terminal.
    pub echo: bool,
    /// Whether the host prints its "terminal will be reused" banner.
    pub show_reuse_message: bool,
}

impl Default for PresentationOptions {
    fn default() -> Self {
        Self {
            reveal: RevealKind::Always,
            panel: PanelKind::Shared,
            echo: true,
            show_reuse_message: true,
        }
    }
}

/// Scope a task definition is registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskScope {
    Global,
    Workspace,
    Folder(String),
}

/// A host-registered unit of work.
///
/// The engine treats this as an opaque value it may clone and relabel; the
/// execution command is never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    /// Display name. Replaced with a run identity on the launched clone.
    pub name: String,
    /// Task kind, e.g. `"shell"` or `"process"`.
    pub kind: String,
    /// Where the definition came from (workspace file, an extension, ...).
    pub source: String,
    pub scope: TaskScope,
    /// The command the host executes.
    pub command: String,
    pub problem_matchers: Vec<String>,
    pub presentation: PresentationOptions,
}

impl TaskDefinition {
    /// A workspace-scoped shell task with default presentation.
    pub fn shell(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "shell".to_string(),
            source: "workspace".to_string(),
            scope: TaskScope::Workspace,
            command: command.into(),
            problem_matchers: Vec::new(),
            presentation: PresentationOptions::default(),
        }
    }
}

/// Handle the host returns once it accepts a launch.
///
/// Owned by the runner for the duration of one run and used only to request
/// early termination. Not a source of output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionHandle {
    pub id: Uuid,
    /// The (relabeled) name the task was launched under.
    pub task_name: String,
}

/// Lifecycle signal for a task execution (started or ended).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub task_name: String,
}

/// A host-managed output channel.
///
/// The display name is decorated by the host (e.g. `"Task - <name>"`), which
/// is why correlation tests for substring containment rather than equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalRef {
    pub id: Uuid,
    pub name: String,
}

/// A chunk of text some terminal wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalData {
    pub terminal: Uuid,
    pub data: String,
}
