//! Shared test utilities for tasker integration tests.
//!
//! The centerpiece is [`SimHost`]: an in-memory [`TaskHost`] whose task
//! registry, terminals, and event streams are scripted by the test. Tests
//! drive event sequences by hand (start, open, write, end) and the host
//! records launches, terminations, and live subscriber counts so the
//! no-side-effect and disposal properties can be asserted directly.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use tasker_core::host::{
    ExecutionHandle, TaskDefinition, TaskEvent, TaskHost, TerminalData, TerminalRef,
};

/// Capacity of each simulated broadcast stream. Large enough that no
/// scripted test can lag a receiver.
const CHANNEL_CAPACITY: usize = 256;

/// Install a test tracing subscriber honoring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Scripted in-memory task host.
pub struct SimHost {
    registry: Mutex<Vec<TaskDefinition>>,
    terminals: Mutex<Vec<TerminalRef>>,

    started_tx: broadcast::Sender<TaskEvent>,
    ended_tx: broadcast::Sender<TaskEvent>,
    opened_tx: broadcast::Sender<TerminalRef>,
    data_tx: broadcast::Sender<TerminalData>,

    /// Every accepted launch, in order.
    launches: Mutex<Vec<TaskDefinition>>,
    launch_count: watch::Sender<usize>,
    /// Reject the next `execute_task` call (consumed once).
    fail_next_launch: AtomicBool,
    /// Reject the next `fetch_tasks` call (consumed once).
    fail_next_fetch: AtomicBool,
    /// Commands that complete instantly: their launch emits started + ended
    /// synchronously, the way a no-op primer behaves.
    instant_commands: Mutex<HashSet<String>>,
    /// Execution ids termination was requested for.
    terminations: Mutex<Vec<Uuid>>,
}

impl SimHost {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Vec::new()),
            terminals: Mutex::new(Vec::new()),
            started_tx: broadcast::channel(CHANNEL_CAPACITY).0,
            ended_tx: broadcast::channel(CHANNEL_CAPACITY).0,
            opened_tx: broadcast::channel(CHANNEL_CAPACITY).0,
            data_tx: broadcast::channel(CHANNEL_CAPACITY).0,
            launches: Mutex::new(Vec::new()),
            launch_count: watch::channel(0).0,
            fail_next_launch: AtomicBool::new(false),
            fail_next_fetch: AtomicBool::new(false),
            instant_commands: Mutex::new(HashSet::new()),
            terminations: Mutex::new(Vec::new()),
        }
    }

    // -------------------------------------------------------------------
    // Scripting
    // -------------------------------------------------------------------

    /// Add a task definition to the registry.
    pub fn register(&self, definition: TaskDefinition) {
        self.registry.lock().unwrap().push(definition);
    }

    /// Snapshot of the registry, for immutability assertions.
    pub fn registered_tasks(&self) -> Vec<TaskDefinition> {
        self.registry.lock().unwrap().clone()
    }

    /// Make the next `execute_task` call fail.
    pub fn fail_next_launch(&self) {
        self.fail_next_launch.store(true, Ordering::SeqCst);
    }

    /// Make the next `fetch_tasks` call fail.
    pub fn fail_next_fetch(&self) {
        self.fail_next_fetch.store(true, Ordering::SeqCst);
    }

    /// Mark a command as completing instantly on launch.
    pub fn complete_instantly(&self, command: &str) {
        self.instant_commands
            .lock()
            .unwrap()
            .insert(command.to_string());
    }

    /// Open a terminal with the given display name and announce it.
    pub fn open_terminal(&self, name: &str) -> TerminalRef {
        let terminal = TerminalRef {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.terminals.lock().unwrap().push(terminal.clone());
        let _ = self.opened_tx.send(terminal.clone());
        terminal
    }

    /// Open a terminal without announcing it (for reused-terminal races
    /// where the terminal predates the run).
    pub fn open_terminal_silently(&self, name: &str) -> TerminalRef {
        let terminal = TerminalRef {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.terminals.lock().unwrap().push(terminal.clone());
        terminal
    }

    /// Emit a data chunk for a terminal.
    pub fn write_data(&self, terminal: &TerminalRef, data: &str) {
        let _ = self.data_tx.send(TerminalData {
            terminal: terminal.id,
            data: data.to_string(),
        });
    }

    pub fn emit_started(&self, task_name: &str) {
        let _ = self.started_tx.send(TaskEvent {
            task_name: task_name.to_string(),
        });
    }

    pub fn emit_ended(&self, task_name: &str) {
        let _ = self.ended_tx.send(TaskEvent {
            task_name: task_name.to_string(),
        });
    }

    // -------------------------------------------------------------------
    // Observations
    // -------------------------------------------------------------------

    /// Launches accepted so far, in order.
    pub fn launches(&self) -> Vec<TaskDefinition> {
        self.launches.lock().unwrap().clone()
    }

    pub fn launch_count(&self) -> usize {
        *self.launch_count.borrow()
    }

    /// Wait until at least `n` launches were accepted.
    pub async fn wait_for_launches(&self, n: usize) {
        let mut rx = self.launch_count.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }

    /// Name the most recent launch ran under (the run identity).
    pub fn last_launched_name(&self) -> String {
        self.launches
            .lock()
            .unwrap()
            .last()
            .expect("no task was launched")
            .name
            .clone()
    }

    pub fn terminations(&self) -> Vec<Uuid> {
        self.terminations.lock().unwrap().clone()
    }

    /// Live subscriber counts per stream: (started, ended, opened, data).
    pub fn subscriber_counts(&self) -> (usize, usize, usize, usize) {
        (
            self.started_tx.receiver_count(),
            self.ended_tx.receiver_count(),
            self.opened_tx.receiver_count(),
            self.data_tx.receiver_count(),
        )
    }
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskHost for SimHost {
    async fn fetch_tasks(&self) -> Result<Vec<TaskDefinition>> {
        if self.fail_next_fetch.swap(false, Ordering::SeqCst) {
            anyhow::bail!("task registry unavailable");
        }
        Ok(self.registry.lock().unwrap().clone())
    }

    async fn execute_task(&self, definition: &TaskDefinition) -> Result<ExecutionHandle> {
        if self.fail_next_launch.swap(false, Ordering::SeqCst) {
            anyhow::bail!("launch rejected by host");
        }

        let instant = self
            .instant_commands
            .lock()
            .unwrap()
            .contains(&definition.command);

        self.launches.lock().unwrap().push(definition.clone());
        self.launch_count.send_modify(|count| *count += 1);

        if instant {
            self.emit_started(&definition.name);
            self.emit_ended(&definition.name);
        }

        Ok(ExecutionHandle {
            id: Uuid::new_v4(),
            task_name: definition.name.clone(),
        })
    }

    async fn terminate(&self, handle: &ExecutionHandle) -> Result<()> {
        self.terminations.lock().unwrap().push(handle.id);
        Ok(())
    }

    fn subscribe_task_started(&self) -> broadcast::Receiver<TaskEvent> {
        self.started_tx.subscribe()
    }

    fn subscribe_task_ended(&self) -> broadcast::Receiver<TaskEvent> {
        self.ended_tx.subscribe()
    }

    fn subscribe_terminal_opened(&self) -> broadcast::Receiver<TerminalRef> {
        self.opened_tx.subscribe()
    }

    fn subscribe_terminal_data(&self) -> broadcast::Receiver<TerminalData> {
        self.data_tx.subscribe()
    }

    fn open_terminals(&self) -> Vec<TerminalRef> {
        self.terminals.lock().unwrap().clone()
    }
}
