use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

#[test]
fn cli_without_subcommand_prints_usage() {
    let mut cmd = Command::cargo_bin("asset-export").expect("Binary exists");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn consume_with_missing_config_file_fails() {
    let mut cmd = Command::cargo_bin("asset-export").expect("Binary exists");
    cmd.arg("consume")
        .arg("--config")
        .arg("definitely-not-here.yaml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn export_requires_an_asset_path() {
    let mut cmd = Command::cargo_bin("asset-export").expect("Binary exists");
    cmd.arg("export").arg("--config").arg("whatever.yaml");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("asset-path"));
}

#[tokio::test]
async fn run_fails_cleanly_on_missing_config() {
    use asset_export::cli::{run, Cli, Commands};

    let cli = Cli {
        command: Commands::Consume {
            config: PathBuf::from("does-not-exist.yaml"),
        },
    };
    let err = run(cli).await.expect_err("missing config must error");
    assert!(
        err.to_string().contains("Failed to read config file"),
        "got: {err}"
    );
}

use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        use std::fmt::Write as FmtWrite;
        let mut msg = String::new();
        let _ = write!(&mut msg, "{:?}", event);
        self.events.lock().unwrap().push(msg);
    }
}

#[tokio::test]
async fn emits_trace_initialised_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    use asset_export::cli::{run, Cli, Commands};

    // A dummy path is enough: the trace event fires before config loading.
    let cli = Cli {
        command: Commands::Consume {
            config: PathBuf::from("dummy.yaml"),
        },
    };

    let _ = run(cli).await;

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("trace_initialised")),
        "Expected a 'trace_initialised' trace event, got: {:?}",
        event_msgs
    );
}
