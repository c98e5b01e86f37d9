// ABOUTME: Tests for the Deployment typestate transitions.
// ABOUTME: Walks the chain step by step against the fake runtime.

mod support;

use berth::credentials::CredentialError;
use berth::deploy::{Deployment, MigrationSummary, PullError};
use support::fake_runtime::{Call, FakeRuntime};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn full_chain_reaches_completed() {
    let runtime = FakeRuntime::new().with_container("shop-svc-0", "shop", "service", true);
    let config = support::config();
    let stack = support::stack(2, true);
    let provider = support::provider(Some("t0ken"));

    let deployment = Deployment::new(&config, &stack);
    assert_eq!(deployment.stack_name().as_str(), "shop");

    let deployment = deployment
        .authenticate(&provider, &runtime)
        .await
        .unwrap();
    let deployment = deployment.pull(&runtime).await.unwrap();
    let deployment = deployment.teardown(&runtime).await.unwrap();
    let (deployment, summary) = deployment
        .migrate(&runtime, None, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(summary, MigrationSummary::Applied { .. }));

    let deployment = deployment.start(&runtime).await.unwrap();
    assert_eq!(deployment.containers().len(), 2);

    let reclaimed = deployment.reclaim(&runtime).await.unwrap();
    let completed = deployment.complete();

    assert_eq!(reclaimed.images_deleted, 1);
    let services: Vec<_> = completed
        .containers()
        .iter()
        .map(|(service, _)| service.to_string())
        .collect();
    assert_eq!(services, vec!["svc-0", "svc-1"]);
    assert_eq!(runtime.container_names(), vec!["shop-svc-0", "shop-svc-1"]);
}

#[tokio::test]
async fn missing_credentials_never_reach_the_runtime() {
    let runtime = FakeRuntime::new();
    let config = support::config();
    let stack = support::stack(1, false);
    let provider = support::provider(None);

    let err = Deployment::new(&config, &stack)
        .authenticate(&provider, &runtime)
        .await
        .unwrap_err();

    assert!(matches!(err, CredentialError::Missing { field: "token", .. }));
    assert!(runtime.calls().is_empty());
}

#[tokio::test]
async fn pull_failure_names_the_image() {
    let runtime = FakeRuntime::new().fail_pull("manifest unknown");
    let config = support::config();
    let stack = support::stack(1, false);
    let provider = support::provider(Some("t0ken"));

    let deployment = Deployment::new(&config, &stack)
        .authenticate(&provider, &runtime)
        .await
        .unwrap();
    let err = deployment.pull(&runtime).await.unwrap_err();

    assert!(matches!(&err, PullError::Pull { image, .. } if image == "ghcr.io/acme/svc-0:1.0.0"));
    assert_eq!(runtime.count(|c| matches!(c, Call::List)), 0);
}

#[tokio::test]
async fn stack_without_migration_skips_it() {
    let runtime = FakeRuntime::new();
    let config = support::config();
    let stack = support::stack(1, false);
    let provider = support::provider(Some("t0ken"));

    let deployment = Deployment::new(&config, &stack)
        .authenticate(&provider, &runtime)
        .await
        .unwrap()
        .pull(&runtime)
        .await
        .unwrap()
        .teardown(&runtime)
        .await
        .unwrap();
    let (_, summary) = deployment
        .migrate(&runtime, None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary, MigrationSummary::Skipped);
    assert!(runtime.migration_containers().is_empty());
}
