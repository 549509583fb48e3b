//! Output correlation engine: runs one relabeled task and captures the
//! output of the one terminal that belongs to it.
//!
//! The runner subscribes to the host's global task and terminal streams,
//! launches the task, and then walks a small state machine driven by a
//! single `select!` loop:
//!
//! ```text
//! idle
//!   -> awaiting-start            execute(): subscribe, then launch
//!   -> awaiting-output-or-end    start event matching the run identity;
//!                                attach to the matching terminal now
//!                                (reused) or on a later opened event (fresh)
//!   -> settled                   end event for the identity, or the output
//!                                timeout once a terminal is attached
//! ```
//!
//! Exactly one path leads out of the loop, and the subscription set (all
//! receivers plus the timer) is dropped there, so teardown is idempotent by
//! construction. A runner is single-use: the settlement is memoized and
//! repeated `execute()` calls join or reuse it instead of launching again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, OnceCell, broadcast};
use tokio::time::Instant;

use crate::error::RunError;
use crate::host::{ExecutionHandle, TaskDefinition, TaskEvent, TaskHost, TerminalData, TerminalRef};
use crate::identity::RunIdentity;

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Strip leading/trailing whitespace from the captured output.
    pub trim_output: bool,
    /// Settle with whatever has accumulated once this much time passes
    /// after the terminal is attached. `None` disables the timer; runs of
    /// task kinds that never emit an end event then rely on it entirely.
    pub output_timeout: Option<Duration>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            trim_output: true,
            output_timeout: None,
        }
    }
}

/// Correlation phase of a live run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Launched; waiting for the start event carrying our identity.
    AwaitingStart,
    /// Start seen; collecting data until the end event or the timeout.
    AwaitingOutputOrEnd,
}

/// The lifecycle subscriptions owned by one run.
///
/// Created before the launch request and dropped on the single path out of
/// the event loop, success or failure, so no listener outlives settlement.
struct Subscriptions {
    started: broadcast::Receiver<TaskEvent>,
    ended: broadcast::Receiver<TaskEvent>,
    opened: broadcast::Receiver<TerminalRef>,
}

impl Subscriptions {
    fn attach(host: &dyn TaskHost) -> Self {
        Self {
            started: host.subscribe_task_started(),
            ended: host.subscribe_task_ended(),
            opened: host.subscribe_terminal_opened(),
        }
    }
}

/// Data listener on the matched terminal.
///
/// Subscribed only once the terminal is identified, so chunks delivered
/// before the match are never captured.
struct DataTap {
    terminal: uuid::Uuid,
    rx: broadcast::Receiver<TerminalData>,
}

async fn tap_recv(tap: &mut Option<DataTap>) -> Result<TerminalData, RecvError> {
    match tap {
        Some(tap) => tap.rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Runs one task execution and captures its output.
///
/// One instance corresponds to one logical run. [`TaskRunner::execute`] is
/// idempotent: the first call drives the run, later calls return the same
/// settlement (the host launch entry point is invoked at most once).
pub struct TaskRunner {
    host: Arc<dyn TaskHost>,
    /// Original task name, for error messages and logs.
    task_name: String,
    identity: RunIdentity,
    definition: TaskDefinition,
    options: RunnerOptions,
    handle: Mutex<Option<ExecutionHandle>>,
    settlement: OnceCell<Result<String, RunError>>,
}

impl TaskRunner {
    /// Build a runner for an already-rewritten definition.
    pub fn new(
        host: Arc<dyn TaskHost>,
        task_name: impl Into<String>,
        identity: RunIdentity,
        definition: TaskDefinition,
        options: RunnerOptions,
    ) -> Self {
        Self {
            host,
            task_name: task_name.into(),
            identity,
            definition,
            options,
            handle: Mutex::new(None),
            settlement: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Execute the task and settle with its captured output.
    ///
    /// Memoized: concurrent or repeated calls share one underlying run and
    /// observe the identical outcome.
    pub async fn execute(&self) -> Result<String, RunError> {
        self.settlement.get_or_init(|| self.drive()).await.clone()
    }

    /// Request early termination of the underlying execution, if any.
    ///
    /// Advisory only: the handle is cleared, but settlement still arrives
    /// through the event loop (via the end event the cancellation triggers,
    /// or never, if the host gives no signal).
    pub async fn terminate(&self) {
        if let Some(handle) = self.handle.lock().await.take() {
            tracing::info!(identity = %self.identity, execution = %handle.id, "requesting termination");
            if let Err(e) = self.host.terminate(&handle).await {
                tracing::warn!(identity = %self.identity, error = %e, "termination request failed");
            }
        }
    }

    fn arm_deadline(&self) -> Option<Instant> {
        self.options.output_timeout.map(|t| Instant::now() + t)
    }

    /// Attach a data listener if the terminal's name carries our identity.
    fn try_attach(&self, terminal: &TerminalRef) -> Option<DataTap> {
        if !self.identity.matches_terminal(&terminal.name) {
            return None;
        }
        tracing::debug!(
            identity = %self.identity,
            terminal = %terminal.name,
            "attached to terminal"
        );
        Some(DataTap {
            terminal: terminal.id,
            rx: self.host.subscribe_terminal_data(),
        })
    }

    fn freeze(&self, output: String) -> String {
        if self.options.trim_output {
            output.trim().to_string()
        } else {
            output
        }
    }

    /// The single run: subscribe, launch, correlate, settle.
    async fn drive(&self) -> Result<String, RunError> {
        let mut subs = Subscriptions::attach(self.host.as_ref());
        tracing::debug!(identity = %self.identity, "subscribed to host event streams");

        let handle = match self.host.execute_task(&self.definition).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(task_name = %self.task_name, error = %e, "host rejected launch");
                // `subs` drops on this return path: nothing is left listening.
                return Err(RunError::LaunchFailed {
                    name: self.task_name.clone(),
                    reason: format!("{e:#}"),
                });
            }
        };
        tracing::info!(
            task_name = %self.task_name,
            identity = %self.identity,
            execution = %handle.id,
            "task launched"
        );
        *self.handle.lock().await = Some(handle);

        let mut phase = Phase::AwaitingStart;
        let mut tap: Option<DataTap> = None;
        let mut attached = false;
        let mut deadline: Option<Instant> = None;
        let mut output = String::new();

        // Closed streams disable their branch; a run the host never signals
        // may never settle, by contract.
        let mut started_open = true;
        let mut ended_open = true;
        let mut opened_open = true;

        loop {
            let timer_deadline = deadline;
            tokio::select! {
                event = subs.started.recv(), if started_open && phase == Phase::AwaitingStart => {
                    match event {
                        Ok(event) if self.identity.matches_task(&event.task_name) => {
                            phase = Phase::AwaitingOutputOrEnd;
                            // Reused-terminal race: the terminal may predate
                            // the start event. Scan what is already open
                            // before falling back to opened events.
                            for terminal in self.host.open_terminals() {
                                if let Some(t) = self.try_attach(&terminal) {
                                    tap = Some(t);
                                    attached = true;
                                    deadline = self.arm_deadline();
                                    break;
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(identity = %self.identity, skipped, "task-started stream lagged");
                        }
                        Err(RecvError::Closed) => started_open = false,
                    }
                }
                event = subs.opened.recv(), if opened_open && phase == Phase::AwaitingOutputOrEnd && !attached => {
                    match event {
                        Ok(terminal) => {
                            if let Some(t) = self.try_attach(&terminal) {
                                tap = Some(t);
                                attached = true;
                                deadline = self.arm_deadline();
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(identity = %self.identity, skipped, "terminal-opened stream lagged");
                        }
                        Err(RecvError::Closed) => opened_open = false,
                    }
                }
                event = tap_recv(&mut tap) => {
                    match event {
                        Ok(chunk) => {
                            if tap.as_ref().is_some_and(|t| t.terminal == chunk.terminal) {
                                output.push_str(&chunk.data);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(identity = %self.identity, skipped, "terminal-data stream lagged");
                        }
                        Err(RecvError::Closed) => tap = None,
                    }
                }
                event = subs.ended.recv(), if ended_open => {
                    match event {
                        Ok(event) if self.identity.matches_task(&event.task_name) => {
                            tracing::info!(
                                identity = %self.identity,
                                captured = output.len(),
                                "task ended"
                            );
                            break;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(identity = %self.identity, skipped, "task-ended stream lagged");
                        }
                        Err(RecvError::Closed) => ended_open = false,
                    }
                }
                _ = async move {
                    match timer_deadline {
                        Some(at) => tokio::time::sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => {
                    tracing::info!(
                        identity = %self.identity,
                        captured = output.len(),
                        "output timeout elapsed, settling with captured output"
                    );
                    break;
                }
            }
        }

        // The one settlement path: every subscription and the timer die
        // here, and the handle is cleared so a late terminate() cannot ask
        // the host to cancel a finished execution.
        *self.handle.lock().await = None;
        drop(subs);
        drop(tap);
        Ok(self.freeze(output))
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("task_name", &self.task_name)
            .field("identity", &self.identity)
            .field("settled", &self.settlement.initialized())
            .finish()
    }
}
