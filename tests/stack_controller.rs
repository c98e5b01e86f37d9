// ABOUTME: Tests for tearing down and starting a stack's containers.
// ABOUTME: Teardown must be idempotent; start must be ordered and clean up what failed.

mod support;

use berth::deploy::{StackController, StartupError, TeardownError};
use std::time::Duration;
use support::fake_runtime::{Call, FakeRuntime};

fn controller() -> StackController {
    StackController::new(Duration::from_secs(10))
}

#[tokio::test]
async fn teardown_removes_every_container_of_the_stack() {
    let runtime = FakeRuntime::new()
        .with_container("shop-web", "shop", "service", true)
        .with_container("shop-worker", "shop", "service", false)
        .with_container("shop-migrate-20240101000000", "shop", "migration", false)
        .with_container("blog-web", "blog", "service", true);
    let stack = support::stack(1, false);

    let summary = controller().teardown(&runtime, &stack).await.unwrap();

    assert_eq!(
        summary.removed,
        vec!["shop-migrate-20240101000000", "shop-web", "shop-worker"]
    );
    assert_eq!(runtime.container_names(), vec!["blog-web"]);
    // Only the running container is stopped
    assert_eq!(runtime.count(|c| matches!(c, Call::Stop(_))), 1);
}

#[tokio::test]
async fn teardown_twice_ends_in_the_same_state() {
    let runtime = FakeRuntime::new().with_container("shop-web", "shop", "service", true);
    let stack = support::stack(1, false);

    controller().teardown(&runtime, &stack).await.unwrap();
    let after_first = runtime.container_names();
    let second = controller().teardown(&runtime, &stack).await.unwrap();

    assert!(second.removed.is_empty());
    assert_eq!(runtime.container_names(), after_first);
    assert!(after_first.is_empty());
}

#[tokio::test]
async fn teardown_attempts_every_container_before_failing() {
    let runtime = FakeRuntime::new()
        .with_container("shop-api", "shop", "service", true)
        .with_container("shop-web", "shop", "service", true)
        .with_container("shop-worker", "shop", "service", true)
        .fail_remove("shop-w");
    let stack = support::stack(1, false);

    let err = controller().teardown(&runtime, &stack).await.unwrap_err();

    match &err {
        TeardownError::Incomplete(failures) => {
            let names: Vec<_> = failures.iter().map(|f| f.container.as_str()).collect();
            assert_eq!(names, vec!["shop-web", "shop-worker"]);
        }
        other => panic!("expected Incomplete, got {other:?}"),
    }
    assert_eq!(runtime.container_names(), vec!["shop-web", "shop-worker"]);
    assert_eq!(runtime.count(|c| matches!(c, Call::Remove(_))), 3);
}

#[tokio::test]
async fn start_creates_services_in_name_order_on_the_stack_network() {
    let runtime = FakeRuntime::new();
    let stack = support::stack(3, false);

    let summary = controller().start(&runtime, &stack).await.unwrap();

    let services: Vec<_> = summary.started.iter().map(|(s, _)| s.to_string()).collect();
    assert_eq!(services, vec!["svc-0", "svc-1", "svc-2"]);

    let creates: Vec<_> = runtime
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Create(name) => Some(name),
            _ => None,
        })
        .collect();
    assert_eq!(creates, vec!["shop-svc-0", "shop-svc-1", "shop-svc-2"]);

    let network = runtime
        .position(|c| matches!(c, Call::CreateNetwork(n) | Call::NetworkExists(n) if n == "shop"))
        .unwrap();
    let first_create = runtime.position(|c| matches!(c, Call::Create(_))).unwrap();
    assert!(network < first_create);
    assert!(runtime.containers().iter().all(|c| c.running));
}

#[tokio::test]
async fn start_failure_removes_only_the_failed_container() {
    let runtime = FakeRuntime::new().fail_start("shop-svc-1");
    let stack = support::stack(3, false);

    let err = controller().start(&runtime, &stack).await.unwrap_err();

    assert!(matches!(&err, StartupError::Start { service, .. } if service == "svc-1"));
    assert_eq!(runtime.container_names(), vec!["shop-svc-0"]);
    assert_eq!(
        runtime.count(|c| *c == Call::Create("shop-svc-2".into())),
        0
    );
}

#[tokio::test]
async fn inventory_lists_stack_containers_sorted() {
    let runtime = FakeRuntime::new()
        .with_container("shop-worker", "shop", "service", false)
        .with_container("shop-api", "shop", "service", true)
        .with_container("blog-web", "blog", "service", true);
    let stack = support::stack(1, false);

    let containers = controller().inventory(&runtime, &stack).await.unwrap();

    let names: Vec<_> = containers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["shop-api", "shop-worker"]);
}
