// tests/shell_executor.rs
#![cfg(unix)]

use hostdag::dag::{TaskGraph, TaskSpec};
use hostdag::exec::{DryRunExecutor, ExecOutcome, Executor, Job, ShellExecutor};
use hostdag::types::TaskArgs;

fn run(executor: &dyn Executor, spec: TaskSpec, args: &TaskArgs) -> ExecOutcome {
    let name = spec.name.clone();
    let graph = TaskGraph::new([spec]);
    let node = graph.node(&name).unwrap();
    let host = "h1".to_string();
    executor
        .execute(&Job {
            node: node.as_ref(),
            args,
            host: &host,
            worker: 7,
        })
        .unwrap()
}

#[test]
fn exit_status_maps_to_outcome() {
    let args = TaskArgs::new();
    assert_eq!(run(&ShellExecutor::new(), TaskSpec::new("ok").cmd("true"), &args), ExecOutcome::Success);
    assert_eq!(
        run(&ShellExecutor::new(), TaskSpec::new("bad").cmd("exit 3"), &args),
        ExecOutcome::Failed(3)
    );
}

#[test]
fn command_sees_task_environment() {
    let args = TaskArgs::new().with("mode", "fast");
    let cmd = r#"test "$HOSTDAG_TASK" = envcheck && test "$HOSTDAG_HOST" = h1 && test "$HOSTDAG_WORKER" = 7 && test "$HOSTDAG_ARG_MODE" = fast"#;
    assert_eq!(
        run(&ShellExecutor::new(), TaskSpec::new("envcheck").cmd(cmd), &args),
        ExecOutcome::Success
    );
}

#[test]
fn stderr_output_does_not_block() {
    let cmd = "i=0; while [ $i -lt 2000 ]; do echo line $i >&2; i=$((i+1)); done";
    assert_eq!(
        run(&ShellExecutor::new(), TaskSpec::new("noisy").cmd(cmd), &TaskArgs::new()),
        ExecOutcome::Success
    );
}

#[test]
fn task_without_command_succeeds() {
    assert_eq!(
        run(&ShellExecutor::new(), TaskSpec::new("input.c"), &TaskArgs::new()),
        ExecOutcome::Success
    );
}

#[test]
fn dry_run_never_fails() {
    assert_eq!(
        run(&DryRunExecutor, TaskSpec::new("bad").cmd("exit 1"), &TaskArgs::new()),
        ExecOutcome::Success
    );
}
