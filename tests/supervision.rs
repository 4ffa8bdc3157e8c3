//! End-to-end supervision tests against the scripted engine.
//!
//! The tokio clock is paused, so polling sleeps and workload runtimes advance
//! instantly while keeping their relative order.

mod common;

use common::{Behavior, FakeEngine, STOPPED_EXIT_CODE, Submissions, launch_config, supervisor_config};
use labbox::engine::EngineError;
use labbox::sandbox::{ExitReason, Launcher, SandboxError, Supervisor};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use test_tag::tag;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_natural_exit_reports_code_and_exact_log() {
    let files = Submissions::new();
    let path = files.file("fast.zip");
    let log = b"compiling...\n\x1b[31mFAIL\x1b[0m test_sum\nstderr line\n";
    let engine = Arc::new(
        FakeEngine::new().script("fast.zip", Behavior::exits(7, Duration::ZERO).with_log(log)),
    );

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let results = supervisor.run(&[path.clone()]).await.unwrap();

    assert_eq!(results.len(), 1);
    let finished = &results[0];
    assert_eq!(finished.exit_reason, ExitReason::Exited);
    assert_eq!(finished.return_code, 7);
    assert_eq!(finished.log, log.to_vec());
    assert_eq!(finished.instance.source_path(), path.as_path());

    let id = finished.instance.container_id().as_str();
    assert_eq!(
        engine.ops_for(id),
        vec!["copy_in", "start", "inspect", "wait", "logs"]
    );
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_overrunning_workload_is_stopped_before_collection() {
    let files = Submissions::new();
    let path = files.file("slow.zip");
    let engine = Arc::new(
        FakeEngine::new().script("slow.zip", Behavior::exits(0, secs(60)).with_log(b"partial")),
    );

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(5)).unwrap();
    let results = supervisor.run(&[path]).await.unwrap();

    assert_eq!(results.len(), 1);
    let finished = &results[0];
    assert_eq!(finished.exit_reason, ExitReason::TimedOut);
    assert_eq!(finished.return_code, STOPPED_EXIT_CODE);
    assert_eq!(finished.log, b"partial".to_vec());

    let id = finished.instance.container_id().as_str();
    let ops = engine.ops_for(id);
    let stop = ops.iter().position(|op| *op == "stop").unwrap();
    let wait = ops.iter().position(|op| *op == "wait").unwrap();
    let logs = ops.iter().position(|op| *op == "logs").unwrap();
    assert!(stop < wait && wait < logs, "unexpected order: {:?}", ops);
    assert_eq!(engine.count("stop"), 1);

    // Stopped by the first pass at or after the timeout, long before the workload ends
    let ran_for = engine.with_container(id, |c| c.stopped.unwrap() - c.started.unwrap());
    assert!(ran_for >= secs(5));
    assert!(ran_for <= secs(5) + supervisor.config().poll_interval);
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_every_instance_finishes_exactly_once() {
    let files = Submissions::new();
    let paths = vec![
        files.file("a.zip"),
        files.file("b.zip"),
        files.file("c.zip"),
        files.file("d.zip"),
    ];
    let engine = Arc::new(
        FakeEngine::new()
            .script("a.zip", Behavior::exits(0, Duration::ZERO))
            .script("b.zip", Behavior::exits(1, secs(4)))
            .script("c.zip", Behavior::exits(0, secs(120)))
            .script("d.zip", Behavior::exits(2, secs(9))),
    );

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(10)).unwrap();
    let results = supervisor.run(&paths).await.unwrap();

    assert_eq!(results.len(), paths.len());
    let ids: HashSet<_> = results
        .iter()
        .map(|r| r.instance.container_id().clone())
        .collect();
    assert_eq!(ids.len(), paths.len());
    let sources: HashSet<_> = results
        .iter()
        .map(|r| r.instance.source_path().to_path_buf())
        .collect();
    assert_eq!(sources, paths.iter().cloned().collect::<HashSet<_>>());

    assert_eq!(engine.count("wait"), paths.len());
    assert_eq!(engine.count("logs"), paths.len());

    // Timed-out records come first, then natural exits
    assert_eq!(results[0].exit_reason, ExitReason::TimedOut);
    assert!(results[0].instance.source_path().ends_with("c.zip"));
    assert!(results[1..].iter().all(|r| r.exit_reason == ExitReason::Exited));

    let codes: Vec<_> = results[1..].iter().map(|r| r.return_code).collect();
    assert!(codes.contains(&0) && codes.contains(&1) && codes.contains(&2));
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_naturally_exited_instances_are_never_stopped() {
    let files = Submissions::new();
    let paths = vec![files.file("quick.zip"), files.file("medium.zip")];
    let engine = Arc::new(
        FakeEngine::new()
            .script("quick.zip", Behavior::exits(0, secs(1)))
            .script("medium.zip", Behavior::exits(3, secs(4))),
    );

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let results = supervisor.run(&paths).await.unwrap();

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.exit_reason == ExitReason::Exited));
    assert_eq!(engine.count("stop"), 0);

    // Passes at 0s, 3s and 6s
    let medium = results
        .iter()
        .find(|r| r.instance.source_path().ends_with("medium.zip"))
        .unwrap();
    let inspections = engine
        .ops_for(medium.instance.container_id().as_str())
        .iter()
        .filter(|op| **op == "inspect")
        .count();
    assert_eq!(inspections, 3);
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_rejected_artifacts_are_skipped() {
    let files = Submissions::new();
    let good = files.file("good.zip");
    let paths = vec![
        files.file("notes.txt"),
        files.folder("folder.zip"),
        files.dir.path().join("missing.zip"),
        good.clone(),
    ];
    let engine = Arc::new(FakeEngine::new());

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let results = supervisor.run(&paths).await.unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].instance.source_path(), good.as_path());
    assert_eq!(engine.count("create"), 1);
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_no_valid_artifacts_touches_nothing() {
    let files = Submissions::new();
    let engine = Arc::new(FakeEngine::new());

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let results = supervisor.run(&[files.file("readme.md")]).await.unwrap();

    assert!(results.is_empty());
    assert!(engine.calls().is_empty());
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_isolation_network_is_ensured_before_create() {
    let files = Submissions::new();
    let path = files.file("a.zip");
    let engine = Arc::new(FakeEngine::new());

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let results = supervisor.run(&[path]).await.unwrap();

    let calls = engine.calls();
    assert_eq!(calls[0].op, "ensure_network");
    assert_eq!(calls[1].op, "create");
    assert_eq!(engine.networks().len(), 1);
    assert!(engine.networks()[0].internal);

    let id = results[0].instance.container_id().as_str();
    engine.with_container(id, |c| {
        assert!(c.request.is_isolated());
        assert_eq!(
            c.request.cmd,
            vec![
                "labwork-runner",
                "http://grader.test:8000/",
                "client-1",
                "lab-1"
            ]
        );
        assert_eq!(c.request.labels.get("labbox.source").map(String::as_str), Some("a.zip"));
    });
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_isolation_opt_out() {
    let files = Submissions::new();
    let path = files.file("a.zip");
    let engine = Arc::new(FakeEngine::new());

    let launch = launch_config().without_isolation();
    let supervisor = Supervisor::new(engine.clone(), launch, supervisor_config(60)).unwrap();
    let results = supervisor.run(&[path]).await.unwrap();

    assert_eq!(engine.count("ensure_network"), 0);
    let id = results[0].instance.container_id().as_str();
    engine.with_container(id, |c| assert!(!c.request.is_isolated()));
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_unknown_status_aborts_the_run() {
    let files = Submissions::new();
    let path = files.file("odd.zip");
    let engine = Arc::new(
        FakeEngine::new().script("odd.zip", Behavior::exits(0, secs(1)).reporting("hibernating")),
    );

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let err = supervisor.run(&[path]).await.unwrap_err();

    match err {
        SandboxError::Engine(EngineError::UnknownStatus { status, .. }) => {
            assert_eq!(status, "hibernating");
        }
        other => panic!("Expected UnknownStatus, got {:?}", other),
    }
    assert_eq!(engine.count("wait"), 0);
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_launch_failure_is_fatal() {
    let files = Submissions::new();
    let paths = vec![files.file("a.zip"), files.file("b.zip")];
    let engine = Arc::new(FakeEngine::new().failing_on("copy_in"));

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let err = supervisor.run(&paths).await.unwrap_err();

    match err {
        SandboxError::Launch { path, source } => {
            assert!(path.ends_with("a.zip"));
            assert!(matches!(source, EngineError::CommandFailed { .. }));
        }
        other => panic!("Expected Launch error, got {:?}", other),
    }
    assert_eq!(engine.count("create"), 1);
    assert_eq!(engine.count("start"), 0);
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_collection_failure_is_fatal() {
    let files = Submissions::new();
    let engine = Arc::new(FakeEngine::new().failing_on("logs"));

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(60)).unwrap();
    let err = supervisor.run(&[files.file("a.zip")]).await.unwrap_err();

    assert!(matches!(err, SandboxError::Engine(EngineError::CommandFailed { .. })));
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_launcher_yields_zero_or_one_instance() {
    let files = Submissions::new();
    let engine = FakeEngine::new();
    let config = launch_config();
    let launcher = Launcher::new(&engine, &config);

    let rejected = launcher.launch(&files.file("report.pdf")).await.unwrap();
    assert!(rejected.is_none());
    assert!(engine.calls().is_empty());

    let instance = launcher
        .launch(&files.file("lab.zip"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        engine.ops_for(instance.container_id().as_str()),
        vec!["copy_in", "start"]
    );
    assert!(instance.source_path().ends_with("lab.zip"));
}

#[test]
#[tag(unit)]
fn test_zero_timing_is_rejected() {
    let engine = Arc::new(FakeEngine::new());
    assert!(matches!(
        Supervisor::new(engine.clone(), launch_config(), supervisor_config(0)),
        Err(SandboxError::Config(_))
    ));
    assert!(matches!(
        Supervisor::new(
            engine,
            launch_config(),
            supervisor_config(5).with_poll_interval(Duration::ZERO)
        ),
        Err(SandboxError::Config(_))
    ));
}

#[tokio::test(start_paused = true)]
#[tag(integration)]
async fn test_timed_out_instance_leaves_the_running_set() {
    let files = Submissions::new();
    let paths = vec![files.file("endless.zip"), files.file("steady.zip")];
    let engine = Arc::new(
        FakeEngine::new()
            .script("endless.zip", Behavior::exits(0, secs(60)))
            .script("steady.zip", Behavior::exits(0, secs(20))),
    );

    let supervisor = Supervisor::new(engine.clone(), launch_config(), supervisor_config(5)).unwrap();
    let results = supervisor.run(&paths).await.unwrap();

    let timed_out: Vec<_> = results
        .iter()
        .filter(|r| r.exit_reason == ExitReason::TimedOut)
        .collect();
    assert_eq!(timed_out.len(), 1);
    assert!(timed_out[0].instance.source_path().ends_with("endless.zip"));
    assert_eq!(engine.count("stop"), 1);

    // Passes at 0s and 3s see it running, 6s crosses the timeout
    let endless = engine.ops_for(timed_out[0].instance.container_id().as_str());
    let inspections = endless.iter().filter(|op| **op == "inspect").count();
    assert_eq!(inspections, 3);
    let last_inspect = endless.iter().rposition(|op| *op == "inspect").unwrap();
    let stop = endless.iter().position(|op| *op == "stop").unwrap();
    assert!(last_inspect < stop, "inspected after stop: {:?}", endless);

    // The other workload keeps being polled until it exits at 20s (passes 0s..21s)
    let steady = results
        .iter()
        .find(|r| r.instance.source_path().ends_with("steady.zip"))
        .unwrap();
    assert_eq!(steady.exit_reason, ExitReason::Exited);
    let steady_inspections = engine
        .ops_for(steady.instance.container_id().as_str())
        .iter()
        .filter(|op| **op == "inspect")
        .count();
    assert_eq!(steady_inspections, 8);
    assert_eq!(engine.count("inspect"), inspections + steady_inspections);
}
