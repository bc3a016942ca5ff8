//! Event monitor behaviour over scripted event streams

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use stackforge_deploy::{
    DeployError, EventMonitor, InMemoryOrchestrator, MonitorConfig, MonitorOutcome,
    RecordingSink, ServiceError,
};
use stackforge_types::{resource_types, StackEvent, StackSummary};

const ROOT: &str = "arn:aws:cloudformation:us-east-1:000000000000:stack/web/1";
const NESTED: &str = "arn:aws:cloudformation:us-east-1:000000000000:stack/web-Network-1A2B/2";

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

fn event(
    id: &str,
    stack_id: &str,
    logical: &str,
    kind: &str,
    physical: Option<&str>,
    status: &str,
    secs: i64,
) -> StackEvent {
    StackEvent {
        event_id: id.into(),
        stack_id: stack_id.into(),
        stack_name: "web".into(),
        timestamp: at(secs),
        resource_type: kind.into(),
        logical_id: logical.into(),
        physical_id: physical.map(String::from),
        status: status.into(),
        status_reason: None,
    }
}

fn root(id: &str, status: &str, secs: i64) -> StackEvent {
    event(id, ROOT, "web", resource_types::STACK, Some(ROOT), status, secs)
}

fn network(id: &str, status: &str, secs: i64) -> StackEvent {
    event(id, ROOT, "Network", resource_types::STACK, Some(NESTED), status, secs)
}

fn subnet(id: &str, stack_id: &str, status: &str, secs: i64) -> StackEvent {
    event(id, stack_id, "Subnet", "AWS::EC2::Subnet", Some("subnet-1"), status, secs)
}

fn fast() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(1),
        pace_interval: Duration::ZERO,
        throttle_delay: Duration::from_millis(1),
        max_timeouts: 2,
    }
}

fn setup() -> Arc<InMemoryOrchestrator> {
    let orchestrator = Arc::new(InMemoryOrchestrator::new());
    orchestrator.add_stack(StackSummary {
        name: "web".into(),
        id: Some(ROOT.into()),
        status: "CREATE_IN_PROGRESS".into(),
        status_reason: None,
    });
    orchestrator
}

#[tokio::test]
async fn test_repeated_event_emitted_once() {
    let orchestrator = setup();
    let first = subnet("e1", ROOT, "CREATE_IN_PROGRESS", 1);
    orchestrator.script_events(
        "web",
        vec![
            vec![first.clone()],
            vec![first, subnet("e2", ROOT, "CREATE_COMPLETE", 2)],
            vec![root("e3", "CREATE_COMPLETE", 3)],
        ],
    );

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let mut sink = RecordingSink::default();
    let outcome = monitor.run(None, &mut sink).await.unwrap();

    assert_eq!(
        outcome,
        MonitorOutcome::Completed {
            status: "CREATE_COMPLETE".into()
        }
    );
    assert_eq!(sink.lines.len(), 3);
    let in_progress = sink
        .lines
        .iter()
        .filter(|l| l.contains("Subnet") && l.ends_with("CREATE_IN_PROGRESS"))
        .count();
    assert_eq!(in_progress, 1);
}

#[tokio::test]
async fn test_nested_completion_does_not_end_monitoring() {
    let orchestrator = setup();
    orchestrator.script_events(
        "web",
        vec![vec![
            root("r1", "CREATE_IN_PROGRESS", 1),
            network("r2", "CREATE_IN_PROGRESS", 2),
        ]],
    );
    orchestrator.script_events(
        NESTED,
        vec![vec![
            event("n1", NESTED, "web-Network-1A2B", resource_types::STACK, Some(NESTED), "CREATE_IN_PROGRESS", 3),
            subnet("n2", NESTED, "CREATE_COMPLETE", 4),
            event("n3", NESTED, "web-Network-1A2B", resource_types::STACK, Some(NESTED), "CREATE_COMPLETE", 5),
        ]],
    );

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let mut sink = RecordingSink::default();
    let outcome = monitor
        .run_until(None, &mut sink, tokio::time::sleep(Duration::from_millis(100)))
        .await
        .unwrap();

    assert_eq!(outcome, MonitorOutcome::Interrupted);
    assert!(sink.lines.iter().any(|l| l.contains("Network/Subnet")));
    assert_eq!(
        monitor.nested_stacks().collect::<Vec<_>>(),
        vec![(NESTED, "Network")]
    );
}

#[tokio::test]
async fn test_root_completion_ends_monitoring() {
    let orchestrator = setup();
    orchestrator.script_events(
        "web",
        vec![
            vec![
                root("r1", "CREATE_IN_PROGRESS", 1),
                network("r2", "CREATE_IN_PROGRESS", 2),
            ],
            vec![],
            vec![
                network("r3", "CREATE_COMPLETE", 6),
                root("r4", "CREATE_COMPLETE", 7),
            ],
        ],
    );
    orchestrator.script_events(
        NESTED,
        vec![vec![subnet("n1", NESTED, "CREATE_COMPLETE", 4)]],
    );

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let mut sink = RecordingSink::default();
    let outcome = monitor.run(None, &mut sink).await.unwrap();

    assert!(outcome.is_success());
    let nested_line = sink
        .lines
        .iter()
        .position(|l| l.contains("Network/Subnet"))
        .unwrap();
    assert_eq!(nested_line, 2);
    assert!(sink.lines.last().unwrap().ends_with("CREATE_COMPLETE"));
}

#[tokio::test]
async fn test_rollback_is_failure() {
    let orchestrator = setup();
    let mut failed = subnet("e1", ROOT, "CREATE_FAILED", 1);
    failed.status_reason = Some("Subnet CIDR overlaps".into());
    orchestrator.script_events(
        "web",
        vec![vec![failed, root("e2", "ROLLBACK_COMPLETE", 2)]],
    );

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let mut sink = RecordingSink::default();
    let outcome = monitor.run(None, &mut sink).await.unwrap();

    assert!(!outcome.is_success());
    assert!(sink.lines[0].ends_with("CREATE_FAILED Subnet CIDR overlaps"));
}

#[tokio::test]
async fn test_events_before_cutoff_are_hidden() {
    let orchestrator = setup();
    orchestrator.push_events(
        "web",
        vec![
            root("old1", "UPDATE_IN_PROGRESS", -3600),
            root("old2", "UPDATE_COMPLETE", -3500),
        ],
    );
    orchestrator.script_events(
        "web",
        vec![
            vec![root("new1", "UPDATE_IN_PROGRESS", 1)],
            vec![root("new2", "UPDATE_COMPLETE", 2)],
        ],
    );

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let mut sink = RecordingSink::default();
    let outcome = monitor.run(Some(at(0)), &mut sink).await.unwrap();

    assert_eq!(
        outcome,
        MonitorOutcome::Completed {
            status: "UPDATE_COMPLETE".into()
        }
    );
    assert_eq!(sink.lines.len(), 2);
}

#[tokio::test]
async fn test_prime_skips_history_and_finds_nested_stacks() {
    let orchestrator = setup();
    orchestrator.push_events(
        "web",
        vec![
            root("h1", "CREATE_IN_PROGRESS", 1),
            network("h2", "CREATE_COMPLETE", 2),
            root("h3", "CREATE_COMPLETE", 3),
        ],
    );
    orchestrator.push_events(NESTED, vec![subnet("h4", NESTED, "CREATE_COMPLETE", 2)]);

    let mut monitor = EventMonitor::with_config(orchestrator.clone(), "web", fast());
    monitor.prime().await.unwrap();
    assert_eq!(monitor.nested_stacks().count(), 1);

    orchestrator.script_events(
        "web",
        vec![vec![
            root("u1", "UPDATE_IN_PROGRESS", 10),
            root("u2", "UPDATE_COMPLETE", 11),
        ]],
    );
    let mut sink = RecordingSink::default();
    monitor.run(None, &mut sink).await.unwrap();
    assert_eq!(sink.lines.len(), 2);
}

#[tokio::test]
async fn test_missing_root_stack_is_not_found() {
    let orchestrator = Arc::new(InMemoryOrchestrator::new());
    let mut monitor = EventMonitor::with_config(orchestrator, "ghost", fast());
    let err = monitor
        .run(None, &mut RecordingSink::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::NotFound { stack } if stack == "ghost"));
}

#[tokio::test]
async fn test_missing_nested_stack_is_tolerated() {
    let orchestrator = setup();
    orchestrator.script_events(
        "web",
        vec![
            vec![network("r1", "CREATE_IN_PROGRESS", 1)],
            vec![root("r2", "CREATE_COMPLETE", 2)],
        ],
    );

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let outcome = monitor
        .run(None, &mut RecordingSink::default())
        .await
        .unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_throttling_is_retried() {
    let orchestrator = setup();
    for _ in 0..3 {
        orchestrator.fail_next("web", ServiceError::Throttled("Rate exceeded".into()));
    }
    orchestrator.script_events("web", vec![vec![root("e1", "CREATE_COMPLETE", 1)]]);

    let mut monitor = EventMonitor::with_config(orchestrator.clone(), "web", fast());
    let outcome = monitor
        .run(None, &mut RecordingSink::default())
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(orchestrator.event_calls(), 4);
}

#[tokio::test]
async fn test_persistent_network_errors_escalate() {
    let orchestrator = setup();
    for _ in 0..3 {
        orchestrator.fail_next("web", ServiceError::Network("connection reset".into()));
    }
    orchestrator.script_events("web", vec![vec![root("e1", "CREATE_COMPLETE", 1)]]);

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let err = monitor
        .run(None, &mut RecordingSink::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DeployError::Transient(_)));
}

#[tokio::test]
async fn test_pages_are_followed_to_the_seen_boundary() {
    let orchestrator = Arc::new(InMemoryOrchestrator::new().with_page_size(2));
    orchestrator.add_stack(StackSummary {
        name: "web".into(),
        id: Some(ROOT.into()),
        status: "CREATE_IN_PROGRESS".into(),
        status_reason: None,
    });
    orchestrator.script_events(
        "web",
        vec![vec![
            root("e1", "CREATE_IN_PROGRESS", 1),
            subnet("e2", ROOT, "CREATE_IN_PROGRESS", 2),
            subnet("e3", ROOT, "CREATE_COMPLETE", 3),
            subnet("e4", ROOT, "UPDATE_COMPLETE", 4),
            root("e5", "CREATE_COMPLETE", 5),
        ]],
    );

    let mut monitor = EventMonitor::with_config(orchestrator, "web", fast());
    let mut sink = RecordingSink::default();
    monitor.run(None, &mut sink).await.unwrap();

    assert_eq!(sink.lines.len(), 5);
    assert!(sink.lines[0].ends_with("CREATE_IN_PROGRESS"));
    assert!(sink.lines[4].ends_with("CREATE_COMPLETE"));
}

#[tokio::test]
async fn test_follow_up_pages_are_paced() {
    let orchestrator = Arc::new(InMemoryOrchestrator::new().with_page_size(2));
    orchestrator.add_stack(StackSummary {
        name: "web".into(),
        id: Some(ROOT.into()),
        status: "CREATE_IN_PROGRESS".into(),
        status_reason: None,
    });
    orchestrator.script_events(
        "web",
        vec![vec![
            root("e1", "CREATE_IN_PROGRESS", 1),
            subnet("e2", ROOT, "CREATE_IN_PROGRESS", 2),
            subnet("e3", ROOT, "CREATE_COMPLETE", 3),
            subnet("e4", ROOT, "UPDATE_COMPLETE", 4),
            root("e5", "CREATE_COMPLETE", 5),
        ]],
    );

    let pace = Duration::from_millis(40);
    let config = MonitorConfig {
        pace_interval: pace,
        ..fast()
    };
    let mut monitor = EventMonitor::with_config(orchestrator.clone(), "web", config);
    let mut sink = RecordingSink::default();
    let started = std::time::Instant::now();
    monitor.run(None, &mut sink).await.unwrap();

    assert_eq!(orchestrator.event_calls(), 3);
    assert!(started.elapsed() >= pace * 2);
    assert_eq!(sink.lines.len(), 5);
}
