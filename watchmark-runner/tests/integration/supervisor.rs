// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracking a file with a real watch process.

use crate::fixtures::*;
use camino::Utf8PathBuf;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, bail};
use indoc::indoc;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use watchmark_runner::{
    config::WatchConfig,
    identifier::Status,
    render::RecordingRenderer,
    session::{HandledEvent, SessionEvent, SessionRegistry, TrackOutcome},
};

const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

// Prints a report split over two lines between progress output, waits for a
// re-run request, prints a failing report and exits.
const FAKE_WATCHER: &str = indoc! {r#"
    echo "Determining test suites to run..."
    printf '%s\n' '{"numFailedTests":0,"numTotalTests":1,' '"testResults":[{"message":"","assertionResults":[{"status":"passed","location":{"line":2,"column":3},"failureMessages":[]}]}]}'
    echo "Watch Usage: Press a to run all tests." >&2
    read input
    printf '%s\n' '{"numFailedTests":1,"numTotalTests":1,"testResults":[{"message":"","assertionResults":[{"status":"failed","location":{"line":2,"column":3},"failureMessages":["Error: boom"]}]}]}'
    exit 3
"#};

fn project() -> Result<(Utf8TempDir, Utf8PathBuf)> {
    let dir = camino_tempfile::tempdir()?;
    std::fs::write(dir.path().join("package.json"), "{}")?;
    std::fs::create_dir_all(dir.path().join("src"))?;
    let file = dir.path().join("src/sum.test.js");
    Ok((dir, file))
}

fn shell_config(script: &str) -> WatchConfig {
    WatchConfig {
        command: vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()],
        rerun_input: Some("a\n".to_owned()),
        ..WatchConfig::default()
    }
}

/// Feeds events to the registry until one is handled as something other than
/// plain output.
async fn next_handled(
    registry: &mut SessionRegistry,
    events: &mut UnboundedReceiver<SessionEvent>,
    renderer: &mut RecordingRenderer,
) -> Result<HandledEvent> {
    loop {
        let event = match tokio::time::timeout(EVENT_TIMEOUT, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => bail!("event channel closed"),
            Err(_) => bail!("timed out waiting for a watch process event"),
        };
        match registry.handle_event(event, renderer) {
            HandledEvent::Output => {}
            other => return Ok(other),
        }
    }
}

#[tokio::test]
async fn reports_rerun_and_exit() -> Result<()> {
    test_init();

    let (_dir, file) = project()?;
    let (mut registry, mut events) = SessionRegistry::new();
    let mut renderer = RecordingRenderer::new();

    let outcome = registry.start_tracking(
        &file,
        "describe('A')",
        two_tests(),
        &shell_config(FAKE_WATCHER),
        &mut renderer,
    )?;
    assert_eq!(outcome, TrackOutcome::Started);
    assert!(registry.get(&file).is_some_and(|session| session.is_running()));
    assert_eq!(renderer.mark_count(), 3);

    let handled = next_handled(&mut registry, &mut events, &mut renderer).await?;
    assert!(matches!(handled, HandledEvent::Report(summary) if summary.matched == 1), "{handled:?}");
    let session = registry.get(&file).expect("still tracking");
    assert_eq!(
        statuses(session.identifiers()),
        two_tests_statuses(Status::Passed, Status::Pending, Status::Pending)
    );

    assert!(registry.on_save(&file, "describe('A')", two_tests(), &mut renderer)?);
    let session = registry.get(&file).expect("still tracking");
    assert_eq!(statuses(session.identifiers()), all_loading(&[0, 1, 4]));

    let handled = next_handled(&mut registry, &mut events, &mut renderer).await?;
    assert!(matches!(handled, HandledEvent::Report(_)), "{handled:?}");
    let session = registry.get(&file).expect("still tracking");
    assert_eq!(
        statuses(session.identifiers()),
        two_tests_statuses(Status::Failed, Status::Pending, Status::Failed)
    );
    assert_eq!(renderer.diagnostics(&file).len(), 1);

    let handled = next_handled(&mut registry, &mut events, &mut renderer).await?;
    assert_eq!(handled, HandledEvent::Exited(Some(3)));
    assert!(registry.is_empty());
    assert_eq!(renderer.mark_count(), 0);
    assert!(renderer.diagnostics(&file).is_empty());

    Ok(())
}

#[tokio::test]
async fn stop_kills_process() -> Result<()> {
    test_init();

    let (_dir, file) = project()?;
    let (mut registry, mut events) = SessionRegistry::new();
    let mut renderer = RecordingRenderer::new();

    let config = shell_config("sleep 60");
    let outcome = registry.start_tracking(&file, "", two_tests(), &config, &mut renderer)?;
    assert_eq!(outcome, TrackOutcome::Started);
    assert_eq!(
        registry.start_tracking(&file, "", two_tests(), &config, &mut renderer)?,
        TrackOutcome::AlreadyTracking
    );

    assert!(registry.stop_tracking(&file, &mut renderer));
    assert!(!registry.stop_tracking(&file, &mut renderer));
    assert_eq!(renderer.mark_count(), 0);

    // The exit still arrives, but belongs to a session that is gone.
    let handled = next_handled(&mut registry, &mut events, &mut renderer).await?;
    assert_eq!(handled, HandledEvent::Stale);
    Ok(())
}
