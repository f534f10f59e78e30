// ABOUTME: Shared helpers for integration tests.
// ABOUTME: Tracing setup plus in-memory providers, hosts and publishers.

#![allow(dead_code)]

pub mod fake_io;
pub mod fake_provider;
pub mod fake_publisher;
pub mod fake_sdk;

use serde_json::{Value, json};
use stackpilot::config::Settings;
use stackpilot::coordinator::DeploymentCoordinator;
use stackpilot::poll::Polling;
use stackpilot::stack::{Environment, StackArtifact};
use stackpilot::types::StackName;
use std::path::Path;
use std::sync::{Arc, Once};

pub use fake_io::RecordingIo;
pub use fake_provider::FakeProvider;
pub use fake_publisher::{FakePublisher, FakePublisherFactory};
pub use fake_sdk::FakeSdk;

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "eu-west-1";

static TRACING_INIT: Once = Once::new();

/// Route library logs to the test writer. Safe to call from every test.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stackpilot=debug"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

pub type TestCoordinator = DeploymentCoordinator<FakeProvider, FakePublisherFactory>;

/// A coordinator over `sdk` that never waits between polls.
///
/// The account cache lives in `cache_dir` so tests never touch `$HOME`.
pub fn coordinator(
    sdk: FakeSdk,
    io: Arc<RecordingIo>,
    cache_dir: &Path,
) -> (TestCoordinator, Arc<FakeSdk>, FakePublisherFactory) {
    init_tracing();
    let sdk = Arc::new(sdk);
    let factory = FakePublisherFactory::default();
    let coordinator = DeploymentCoordinator::new(
        Arc::new(FakeProvider::new(Arc::clone(&sdk))),
        factory.clone(),
        io,
        &settings(cache_dir),
    )
    .with_polling(Polling::immediate());
    (coordinator, sdk, factory)
}

pub fn settings(cache_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.account_cache.path = Some(cache_dir.join("accounts_partitions.json"));
    settings
}

/// An artifact named `name` targeting the test environment.
pub fn artifact(name: &str, template: Value) -> StackArtifact {
    StackArtifact::new(
        StackName::new(name).expect("valid stack name"),
        template,
        Environment::new(ACCOUNT, REGION),
    )
}

/// A template with one queue per logical id.
pub fn queue_template(logical_ids: &[&str]) -> Value {
    let resources: serde_json::Map<String, Value> = logical_ids
        .iter()
        .map(|id| {
            (
                id.to_string(),
                json!({"Type": "AWS::SQS::Queue", "Properties": {"QueueName": id.to_lowercase()}}),
            )
        })
        .collect();
    json!({ "Resources": resources })
}
