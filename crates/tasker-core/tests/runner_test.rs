//! Tests for the output correlation engine.
//!
//! Every test scripts a SimHost by hand: the driver task plays the host's
//! event sequence while the runner under test correlates and captures. The
//! tokio clock is paused so sleeps order the script deterministically.

use std::sync::Arc;
use std::time::Duration;

use tasker_core::RunError;
use tasker_core::host::{TaskDefinition, TaskHost};
use tasker_core::identity::RunIdentity;
use tasker_core::runner::{RunnerOptions, TaskRunner};
use tasker_test_utils::SimHost;

// ===========================================================================
// Helpers
// ===========================================================================

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Build a runner the way the facade would: definition relabeled with a
/// fresh identity, default shared panel.
fn new_runner(
    host: &Arc<SimHost>,
    task_name: &str,
    command: &str,
    options: RunnerOptions,
) -> TaskRunner {
    let identity = RunIdentity::mint(task_name);
    let definition = TaskDefinition::shell(identity.as_str(), command);
    let host_dyn: Arc<dyn TaskHost> = Arc::clone(host) as Arc<dyn TaskHost>;
    TaskRunner::new(host_dyn, task_name, identity, definition, options)
}

// ===========================================================================
// Correlation and capture
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn build_scenario_fresh_terminal() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "compiling\n");
            host.write_data(&terminal, "done\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    let output = runner.execute().await.expect("run should settle");
    assert_eq!(output, "compiling\ndone");
    driver.await.unwrap();

    // The subscription set died with settlement.
    assert_eq!(host.subscriber_counts(), (0, 0, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn build_scenario_reused_terminal() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            // The terminal exists before the start event and its opened
            // event was missed; only the start-time scan can find it.
            let terminal = host.open_terminal_silently(&format!("Task - {identity}"));
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "compiling\n");
            host.write_data(&terminal, "done\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    // Both terminal races converge on the same captured output.
    let output = runner.execute().await.expect("run should settle");
    assert_eq!(output, "compiling\ndone");
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn data_before_the_match_is_never_captured() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            let terminal = host.open_terminal_silently(&format!("Task - {identity}"));
            // Written before the start event, so before any match exists.
            host.write_data(&terminal, "stale banner\n");
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "fresh\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    let output = runner.execute().await.expect("run should settle");
    assert_eq!(output, "fresh");
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn events_for_other_runs_are_ignored() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            // A concurrent, unrelated run chatters on the same streams.
            host.emit_started("tasker@1: lint");
            host.emit_ended("tasker@1: lint");
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "ours\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    // The foreign end event must not settle this run early.
    let output = runner.execute().await.expect("run should settle");
    assert_eq!(output, "ours");
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn data_from_unrelated_terminals_is_filtered() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let ours = host.open_terminal(&format!("Task - {identity}"));
            let other = host.open_terminal("Task - tasker@1: lint");
            tokio::time::sleep(ms(10)).await;
            host.write_data(&other, "noise\n");
            host.write_data(&ours, "signal\n");
            host.write_data(&other, "more noise\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    let output = runner.execute().await.expect("run should settle");
    assert_eq!(output, "signal");
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn trim_disabled_returns_raw_accumulation() {
    let host = Arc::new(SimHost::new());
    let options = RunnerOptions {
        trim_output: false,
        output_timeout: None,
    };
    let runner = new_runner(&host, "build", "npm run build", options);

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "\n  compiling\n");
            host.write_data(&terminal, "done  \n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    let output = runner.execute().await.expect("run should settle");
    assert_eq!(output, "\n  compiling\ndone  \n");
    driver.await.unwrap();
}

// ===========================================================================
// Memoization
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn repeated_execute_returns_the_memoized_settlement() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "once\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    let first = runner.execute().await.expect("run should settle");
    let second = runner.execute().await.expect("memoized settlement");
    assert_eq!(first, "once");
    assert_eq!(first, second);
    // The host's launch entry point ran exactly once.
    assert_eq!(host.launch_count(), 1);
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn concurrent_execute_calls_share_one_run() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "shared\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    let (first, second) = tokio::join!(runner.execute(), runner.execute());
    assert_eq!(first.expect("run should settle"), "shared");
    assert_eq!(second.expect("run should settle"), "shared");
    assert_eq!(host.launch_count(), 1);
    driver.await.unwrap();
}

// ===========================================================================
// Failure paths
// ===========================================================================

#[tokio::test]
async fn rejected_launch_settles_failure_and_disposes_subscriptions() {
    let host = Arc::new(SimHost::new());
    host.fail_next_launch();
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let err = runner.execute().await.expect_err("launch was rejected");
    assert!(matches!(err, RunError::LaunchFailed { ref name, .. } if name == "build"));
    assert_eq!(host.subscriber_counts(), (0, 0, 0, 0));

    // The failure is memoized: no second launch attempt is made even
    // though the host would now accept one.
    let again = runner.execute().await.expect_err("memoized failure");
    assert_eq!(err, again);
    assert_eq!(host.launch_count(), 0);
}

// ===========================================================================
// Output timeout
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn watch_scenario_times_out_with_partial_output() {
    let host = Arc::new(SimHost::new());
    let options = RunnerOptions {
        trim_output: true,
        output_timeout: Some(ms(50)),
    };
    let runner = new_runner(&host, "watch", "npm run watch", options);

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "watching...\n");
            // No end event, ever.
        }
    });

    let output = runner.execute().await.expect("timeout settles the run");
    assert_eq!(output, "watching...");
    driver.await.unwrap();
    assert_eq!(host.subscriber_counts(), (0, 0, 0, 0));
}

#[tokio::test(start_paused = true)]
async fn end_event_beats_the_timeout() {
    let host = Arc::new(SimHost::new());
    let options = RunnerOptions {
        trim_output: true,
        output_timeout: Some(Duration::from_secs(60)),
    };
    let runner = new_runner(&host, "build", "npm run build", options);

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "quick\n");
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    let before = tokio::time::Instant::now();
    let output = runner.execute().await.expect("run should settle");
    assert_eq!(output, "quick");
    // The end event settled the run; the one-minute timer never fired.
    assert!(before.elapsed() < Duration::from_secs(60));
    driver.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timeout_is_armed_at_attach_not_at_task_start() {
    let host = Arc::new(SimHost::new());
    let options = RunnerOptions {
        trim_output: true,
        output_timeout: Some(ms(50)),
    };
    let runner = new_runner(&host, "watch", "npm run watch", options);

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            // Well past the timeout: if the timer had started at the
            // start event it would already have fired with no output.
            tokio::time::sleep(ms(200)).await;
            let terminal = host.open_terminal(&format!("Task - {identity}"));
            tokio::time::sleep(ms(10)).await;
            host.write_data(&terminal, "tick\n");
        }
    });

    let output = runner.execute().await.expect("timeout settles the run");
    assert_eq!(output, "tick");
    driver.await.unwrap();
}

// ===========================================================================
// Termination
// ===========================================================================

#[tokio::test(start_paused = true)]
async fn terminate_is_advisory_and_clears_the_handle() {
    let host = Arc::new(SimHost::new());
    let runner = Arc::new(new_runner(
        &host,
        "serve",
        "npm run serve",
        RunnerOptions::default(),
    ));

    let exec = tokio::spawn({
        let runner = Arc::clone(&runner);
        async move { runner.execute().await }
    });

    host.wait_for_launches(1).await;
    let identity = host.last_launched_name();
    host.emit_started(&identity);
    tokio::time::sleep(ms(10)).await;

    runner.terminate().await;
    assert_eq!(host.terminations().len(), 1);

    // Termination alone does not settle; the host's end event does.
    host.emit_ended(&identity);
    let output = exec.await.unwrap().expect("run should settle");
    assert_eq!(output, "");

    // The handle was cleared: a second terminate asks the host nothing.
    runner.terminate().await;
    assert_eq!(host.terminations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn terminate_after_settlement_asks_the_host_nothing() {
    let host = Arc::new(SimHost::new());
    let runner = new_runner(&host, "build", "npm run build", RunnerOptions::default());

    let driver = tokio::spawn({
        let host = Arc::clone(&host);
        async move {
            host.wait_for_launches(1).await;
            let identity = host.last_launched_name();
            host.emit_started(&identity);
            tokio::time::sleep(ms(10)).await;
            host.emit_ended(&identity);
        }
    });

    runner.execute().await.expect("run should settle");
    driver.await.unwrap();

    // The execution already finished; there is nothing left to cancel.
    runner.terminate().await;
    assert!(host.terminations().is_empty());
}
