//! End-to-end engine scenarios over scripted ports.

use std::path::{Path, PathBuf};

use serde_json::json;
use uuid::Uuid;

use forge::cancel::CancelFlag;
use forge::checkpoint::CheckpointStore;
use forge::context::test_support::{
    FixedClock, MemFs, ProcessScript, ScriptedOperator, ScriptedOracle,
};
use forge::context::ServiceContext;
use forge::engine::{Engine, RunOutcome};
use forge::fault::EngineFault;
use forge::ports::{OperatorSignal, OracleKind, ProcessOutput};
use forge::state::ProjectState;

const STATE_DIR: &str = "/state";

fn scripted(
    oracle: ScriptedOracle,
    operator: ScriptedOperator,
    process: ProcessScript,
) -> ServiceContext {
    ServiceContext {
        clock: Box::new(FixedClock::default()),
        fs: Box::new(MemFs::default()),
        process: Box::new(process),
        oracle: Box::new(oracle),
        operator: Box::new(operator),
    }
}

fn fresh_state() -> ProjectState {
    ProjectState::new(OracleKind::Grok, Uuid::new_v4())
}

fn ok_output() -> ProcessOutput {
    ProcessOutput { exit_code: 0, stdout: String::new(), stderr: String::new() }
}

fn fail_output(stderr: &str) -> ProcessOutput {
    ProcessOutput { exit_code: 1, stdout: String::new(), stderr: stderr.into() }
}

#[tokio::test]
async fn failed_task_triggers_a_recovery_request() {
    let mut oracle = ScriptedOracle::default();
    oracle.push_tasks(vec![
        json!({"action": "create_directory", "path": "my_app"}),
        json!({"action": "run_test", "path": "my_app/test_app.py", "depends_on": [0]}),
    ]);
    // Recovery query gets nothing back; the engine moves on.
    oracle.push_tasks(vec![]);
    let requests = oracle.requests();

    let mut operator = ScriptedOperator::default();
    operator.push(OperatorSignal::Stop);

    let mut process = ProcessScript::default();
    process.push(ok_output()); // git probe
    process.push(ok_output()); // python3 probe
    process.push(fail_output("assertion error")); // the test run

    let ctx = scripted(oracle, operator, process);
    let store = CheckpointStore::new(Path::new(STATE_DIR));
    let mut engine = Engine::new(&ctx, store, CancelFlag::new(), fresh_state());
    let outcome = engine.run("build a web app".into()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Finalized);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(!requests[0].retry);
    assert!(requests[0].failed_task.is_none());
    assert!(requests[1].command.starts_with("Recover from failed task"));
    assert!(requests[1].failed_task.as_deref().unwrap().contains("run_test"));

    let state = engine.into_state();
    assert_eq!(state.project_root, Some(PathBuf::from("my_app")));
    let history: Vec<bool> = state.task_history.iter().map(|e| e.success).collect();
    assert_eq!(history, vec![true, false]);
    assert!(state.test_results[0].contains("Failed"));
}

#[tokio::test]
async fn escaping_path_invalidates_the_batch_and_requests_a_retry() {
    let mut oracle = ScriptedOracle::default();
    oracle.push_tasks(vec![
        json!({"action": "create_directory", "path": "my_app"}),
        json!({"action": "create_file", "path": "../../etc/passwd", "content": "x"}),
    ]);
    // The corrective batch is empty, so the iteration is abandoned.
    oracle.push_tasks(vec![]);
    let requests = oracle.requests();

    let mut operator = ScriptedOperator::default();
    operator.push(OperatorSignal::Stop);
    let reviews = operator.reviews();

    let ctx = scripted(oracle, operator, ProcessScript::default());
    let store = CheckpointStore::new(Path::new(STATE_DIR));
    let mut engine = Engine::new(&ctx, store, CancelFlag::new(), fresh_state());
    let outcome = engine.run("build a web app".into()).await.unwrap();

    // Nothing executed, so no project root was ever established.
    assert_eq!(outcome, RunOutcome::Abandoned);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].retry, "second request must be a corrective retry");

    let state = engine.into_state();
    assert!(state.task_history.is_empty(), "no task from a rejected batch may run");
    assert_eq!(reviews.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_plan_surfaces_outstanding_issues_to_the_operator() {
    // Unscripted oracle: every plan comes back empty.
    let oracle = ScriptedOracle::default();
    let mut operator = ScriptedOperator::default();
    operator.push(OperatorSignal::Stop);
    let reviews = operator.reviews();

    let ctx = scripted(oracle, operator, ProcessScript::default());
    let store = CheckpointStore::new(Path::new(STATE_DIR));
    let mut engine = Engine::new(&ctx, store, CancelFlag::new(), fresh_state());
    let outcome = engine.run("build a web app".into()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Abandoned);

    let reviews = reviews.lock().unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].iteration, 1);
    assert!(
        !reviews[0].report.issues.is_empty(),
        "an empty project must not look complete to the operator"
    );
    assert!(!reviews[0].report.is_complete);
}

#[tokio::test]
async fn pause_checkpoints_for_a_later_resume() {
    let mut oracle = ScriptedOracle::default();
    oracle.push_tasks(vec![json!({"action": "create_directory", "path": "my_app"})]);

    let mut operator = ScriptedOperator::default();
    operator.push(OperatorSignal::Pause);

    let ctx = scripted(oracle, operator, ProcessScript::default());
    let store = CheckpointStore::new(Path::new(STATE_DIR));
    let mut engine = Engine::new(&ctx, store, CancelFlag::new(), fresh_state());
    let outcome = engine.run("build a web app".into()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Paused);

    let store = CheckpointStore::new(Path::new(STATE_DIR));
    let loaded = store.load(&*ctx.fs).unwrap().expect("checkpoint must exist");
    assert_eq!(loaded.command.as_deref(), Some("build a web app"));
    assert_eq!(loaded.iteration, 1);
    assert_eq!(loaded.project_root, Some(PathBuf::from("my_app")));
}

#[tokio::test]
async fn cancellation_before_work_pauses_immediately() {
    let ctx = scripted(
        ScriptedOracle::default(),
        ScriptedOperator::default(),
        ProcessScript::default(),
    );
    let store = CheckpointStore::new(Path::new(STATE_DIR));
    let cancel = CancelFlag::new();
    cancel.trigger();

    let mut engine = Engine::new(&ctx, store, cancel, fresh_state());
    let outcome = engine.run("build a web app".into()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Paused);
    assert!(CheckpointStore::new(Path::new(STATE_DIR)).has_checkpoint(&*ctx.fs));
}

#[tokio::test]
async fn missing_required_tool_fails_fast() {
    let mut process = ProcessScript::default();
    process.push(fail_output("git: command not found")); // git probe

    let ctx = scripted(ScriptedOracle::default(), ScriptedOperator::default(), process);
    let store = CheckpointStore::new(Path::new(STATE_DIR));
    let mut engine = Engine::new(&ctx, store, CancelFlag::new(), fresh_state());
    let result = engine.run("build a web app".into()).await;

    match result {
        Err(EngineFault::Environment(missing)) => assert!(missing.contains("git")),
        other => panic!("expected an environment fault, got {other:?}"),
    }
}
