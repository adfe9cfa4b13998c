// tests/failure_and_halt.rs

use std::time::Duration;

use reactor::dag::{RootPolicy, TaskSegment};
use reactor::engine::{ConcurrentScheduler, FailureBehaviour, RunFailure};
use reactor::errors::BuildError;
use reactor_test_utils::actions::RecordingAction;
use reactor_test_utils::builders::{diamond, graph, units};
use reactor_test_utils::{init_tracing, quiet_options, with_timeout};

#[tokio::test]
async fn fail_fast_stops_submitting_and_drains_in_flight_units() {
    init_tracing();

    // B fails while A (slow) is still running. A drains, nothing else starts.
    let graph = graph(&["A", "B", "C"], &[("A", "C")]);
    let segments = vec![TaskSegment::new("build", ["A", "B", "C"])];
    let action = RecordingAction::new()
        .delay("A", Duration::from_millis(30))
        .fail("B");

    let options = quiet_options(2).with_failure_behaviour(FailureBehaviour::FailFast);
    let result =
        with_timeout(ConcurrentScheduler::new(action.clone(), options).run(&segments, &graph))
            .await;

    assert_eq!(result.completed, units(&["A"]));
    assert_eq!(result.failed_units(), units(&["B"]));
    assert_eq!(result.never_attempted, units(&["C"]));
    assert!(result.halted_early);
    assert_eq!(action.start_count("C"), 0);
}

#[tokio::test]
async fn fail_fast_skips_units_still_waiting_for_a_worker() {
    init_tracing();

    let graph = graph(&["bad", "queued"], &[]);
    let segments = vec![TaskSegment::new("build", ["bad", "queued"])];
    // `bad` halts the run before returning its failure, so `queued` finds
    // the run halted as soon as it gets the only worker.
    let action = RecordingAction::new().fail("bad").halt_on("bad");

    // One worker: `queued` is submitted but waits for `bad` to release it.
    let options = quiet_options(1).with_failure_behaviour(FailureBehaviour::FailFast);
    let result =
        with_timeout(ConcurrentScheduler::new(action.clone(), options).run(&segments, &graph))
            .await;

    assert_eq!(result.failed_units(), units(&["bad"]));
    assert_eq!(result.never_attempted, units(&["queued"]));
    assert_eq!(action.start_count("queued"), 0);
    assert!(result.render_summary().contains("SKIPPED"));
}

#[tokio::test]
async fn failure_blocks_dependents_in_later_segments() {
    init_tracing();

    let graph = graph(
        &["core", "util", "app", "tool"],
        &[("core", "app"), ("util", "tool")],
    );
    let segments = vec![
        TaskSegment::new("libs", ["core", "util"]),
        TaskSegment::new("bins", ["app", "tool"]),
    ];
    let action = RecordingAction::new().fail("core");

    let options = quiet_options(2).with_failure_behaviour(FailureBehaviour::FailAtEnd);
    let result =
        with_timeout(ConcurrentScheduler::new(action.clone(), options).run(&segments, &graph))
            .await;

    let mut completed = result.completed.clone();
    completed.sort();
    assert_eq!(completed, units(&["tool", "util"]));
    assert_eq!(result.never_attempted, units(&["app"]));
    assert_eq!(action.start_count("app"), 0);
    assert!(!result.halted_early);
}

#[tokio::test]
async fn fail_never_reports_success_despite_failures() {
    let graph = diamond();
    let segments = vec![TaskSegment::new("build", ["A", "B", "C", "D"])];
    let action = RecordingAction::new().fail("C");

    let options = quiet_options(2).with_failure_behaviour(FailureBehaviour::FailNever);
    let result =
        with_timeout(ConcurrentScheduler::new(action.clone(), options).run(&segments, &graph))
            .await;

    assert_eq!(result.failed_units(), units(&["C"]));
    assert_eq!(result.never_attempted, units(&["D"]));
    assert!(result.is_success_for(FailureBehaviour::FailNever));
    assert!(!result.is_success());
}

#[tokio::test]
async fn panicking_action_is_isolated() {
    init_tracing();

    let graph = graph(&["ok", "boom", "after"], &[("boom", "after")]);
    let segments = vec![TaskSegment::new("build", ["ok", "boom", "after"])];
    let action = RecordingAction::new().panic("boom");

    let result = with_timeout(
        ConcurrentScheduler::new(action.clone(), quiet_options(2)).run(&segments, &graph),
    )
    .await;

    assert_eq!(result.completed, units(&["ok"]));
    assert_eq!(result.never_attempted, units(&["after"]));
    match result.failures.as_slice() {
        [RunFailure::BuildAction {
            unit,
            error: BuildError::Panicked(msg),
        }] => {
            assert_eq!(unit.name(), "boom");
            assert!(msg.contains("scripted panic"));
        }
        other => panic!("expected a single panic failure, got {other:?}"),
    }
}

#[tokio::test]
async fn external_halt_drains_running_units_and_builds_nothing_new() {
    init_tracing();

    let graph = graph(&["slow", "next", "later"], &[("slow", "next")]);
    let segments = vec![
        TaskSegment::new("first", ["slow", "next"]),
        TaskSegment::new("second", ["later"]),
    ];
    let action = RecordingAction::new().gate("slow");

    let scheduler = ConcurrentScheduler::new(action.clone(), quiet_options(2));
    let handle = scheduler.halt_handle();

    let halter = tokio::spawn({
        let action = action.clone();
        async move {
            action.wait_started("slow").await;
            handle.halt();
            action.release("slow");
        }
    });

    let result = with_timeout(scheduler.run(&segments, &graph)).await;
    halter.await.expect("halting task");

    assert_eq!(result.completed, units(&["slow"]));
    assert_eq!(result.never_attempted, units(&["next", "later"]));
    assert!(result.halted_early);
    assert!(result.failures.is_empty());
    assert!(!result.is_success());
}

#[tokio::test]
async fn action_can_halt_the_run_itself() {
    let graph = graph(&["stopper", "next"], &[("stopper", "next")]);
    let segments = vec![TaskSegment::new("build", ["stopper", "next"])];
    let action = RecordingAction::new().halt_on("stopper");

    let result = with_timeout(
        ConcurrentScheduler::new(action.clone(), quiet_options(1)).run(&segments, &graph),
    )
    .await;

    assert_eq!(result.completed, units(&["stopper"]));
    assert_eq!(result.never_attempted, units(&["next"]));
    assert!(result.halted_early);
}

#[tokio::test]
async fn interrupt_is_reported_once_and_in_flight_work_finishes() {
    init_tracing();

    let graph = graph(&["long", "dependent"], &[("long", "dependent")]);
    let segments = vec![TaskSegment::new("build", ["long", "dependent"])];
    let action = RecordingAction::new().gate("long");

    let scheduler = ConcurrentScheduler::new(action.clone(), quiet_options(2));
    let handle = scheduler.halt_handle();

    let interrupter = tokio::spawn({
        let action = action.clone();
        async move {
            action.wait_started("long").await;
            handle.interrupt();
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.interrupt();
            action.release("long");
        }
    });

    let result = with_timeout(scheduler.run(&segments, &graph)).await;
    interrupter.await.expect("interrupting task");

    assert!(result.was_interrupted());
    assert_eq!(
        result
            .failures
            .iter()
            .filter(|f| matches!(f, RunFailure::Interrupted))
            .count(),
        1
    );
    assert_eq!(result.completed, units(&["long"]));
    assert_eq!(result.never_attempted, units(&["dependent"]));
}

#[tokio::test]
async fn strict_root_policy_reports_cyclic_segment() {
    let graph = graph(&["x", "y"], &[("x", "y"), ("y", "x")]);
    let segments = vec![TaskSegment::new("loop", ["x", "y"])];
    let action = RecordingAction::new();

    let options = quiet_options(2).with_root_policy(RootPolicy::Strict);
    let result =
        with_timeout(ConcurrentScheduler::new(action.clone(), options).run(&segments, &graph))
            .await;

    assert!(action.events().is_empty());
    assert!(matches!(
        result.failures.as_slice(),
        [RunFailure::GraphInconsistency { .. }]
    ));
    assert_eq!(result.never_attempted, units(&["x", "y"]));
}

#[tokio::test]
async fn default_root_policy_makes_progress_on_cyclic_segment() {
    let graph = graph(&["x", "y"], &[("x", "y"), ("y", "x")]);
    let segments = vec![TaskSegment::new("loop", ["x", "y"])];
    let action = RecordingAction::new();

    let result = with_timeout(
        ConcurrentScheduler::new(action.clone(), quiet_options(2)).run(&segments, &graph),
    )
    .await;

    // x is forced as root; finishing it releases y.
    assert_eq!(result.completed, units(&["x", "y"]));
    assert!(result.is_success());
}

#[tokio::test]
async fn interrupt_during_first_segment_keeps_later_segments_from_starting() {
    init_tracing();

    let graph = graph(&["long", "later"], &[]);
    let segments = vec![
        TaskSegment::new("first", ["long"]),
        TaskSegment::new("second", ["later"]),
    ];
    let action = RecordingAction::new().gate("long");

    let scheduler = ConcurrentScheduler::new(action.clone(), quiet_options(2));
    let handle = scheduler.halt_handle();

    let interrupter = tokio::spawn({
        let action = action.clone();
        async move {
            action.wait_started("long").await;
            handle.interrupt();
            action.release("long");
        }
    });

    let result = with_timeout(scheduler.run(&segments, &graph)).await;
    interrupter.await.expect("interrupting task");

    assert_eq!(action.start_count("later"), 0);
    assert_eq!(result.completed, units(&["long"]));
    assert_eq!(result.never_attempted, units(&["later"]));
    assert_eq!(
        result
            .failures
            .iter()
            .filter(|f| matches!(f, RunFailure::Interrupted))
            .count(),
        1
    );
    assert!(result.halted_early);
}

#[tokio::test]
async fn unit_repeated_in_a_later_segment_is_built_once() {
    init_tracing();

    let graph = graph(&["X", "Y"], &[]);
    let segments = vec![
        TaskSegment::new("one", ["X"]),
        TaskSegment::new("two", ["X", "Y"]),
    ];
    let action = RecordingAction::new();

    let result = with_timeout(
        ConcurrentScheduler::new(action.clone(), quiet_options(2)).run(&segments, &graph),
    )
    .await;

    assert_eq!(action.start_count("X"), 1);
    assert_eq!(result.completed, units(&["X", "Y"]));
    assert!(result.never_attempted.is_empty());
    match result.failures.as_slice() {
        [RunFailure::GraphInconsistency { unit: Some(unit), message }] => {
            assert_eq!(unit.name(), "X");
            assert!(message.contains("two"));
        }
        other => panic!("expected a single inconsistency for X, got {other:?}"),
    }
    assert!(!result.is_success());
}

#[tokio::test]
async fn halt_from_the_last_unit_still_marks_the_run_halted() {
    let graph = graph(&["first", "last"], &[("first", "last")]);
    let segments = vec![TaskSegment::new("build", ["first", "last"])];
    let action = RecordingAction::new().halt_on("last");

    let result = with_timeout(
        ConcurrentScheduler::new(action.clone(), quiet_options(1)).run(&segments, &graph),
    )
    .await;

    assert_eq!(result.completed, units(&["first", "last"]));
    assert!(result.never_attempted.is_empty());
    assert!(result.halted_early);
    assert!(!result.is_success());
}
