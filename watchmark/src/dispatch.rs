// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::Result,
    output::{OutputContext, OutputOpts},
    render::{RenderStyles, TerminalRenderer},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{
    Args, Parser, Subcommand,
    builder::{
        Styles,
        styling::{AnsiColor, Effects},
    },
};
use std::{
    io::{Read, Write},
    time::{Duration, SystemTime},
};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use watchmark_metadata::{CaptureSet, WatchmarkExitCode};
use watchmark_runner::{
    config::{ConfigLocation, WatchmarkConfig},
    errors::{CaptureSetError, DisplayErrorChain},
    render::{RecordingRenderer, Renderer},
    session::{HandledEvent, RunSession, SessionRegistry, TrackOutcome},
    signal::ShutdownSignals,
};

/// How often the tracked file is checked for saves.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Live test statuses for JavaScript test files.
///
/// watchmark runs a watch-mode test runner for one test file and maps every
/// result it reports back onto the tests and suites declared in that file.
#[derive(Debug, Parser)]
#[command(version, styles = HELP_STYLES)]
pub struct App {
    /// Config file [default: .config/watchmark.toml in the closest ancestor directory]
    #[arg(long, global = true, value_name = "PATH", env = "WATCHMARK_CONFIG_FILE")]
    config_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl App {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, printing statuses to `stdout` and returning the process
    /// exit code.
    pub fn exec(self, output: OutputContext, stdout: &mut dyn Write) -> Result<i32> {
        let location = match &self.config_file {
            Some(path) => ConfigLocation::Explicit(path),
            None => ConfigLocation::Discover,
        };

        match self.command {
            Command::Watch { input } => {
                let file = input.file.canonicalize_utf8().map_err(|err| {
                    ExpectedError::source_read_error(input.file.clone(), err)
                })?;
                let input = InputOpts {
                    file,
                    captures: input.captures,
                };
                let config = WatchmarkConfig::load(&input.file, location)?;
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map_err(|err| ExpectedError::RuntimeCreateError { err })?;
                let mut renderer = TerminalRenderer::new(
                    &mut *stdout,
                    render_styles(output),
                    output.verbose,
                );
                runtime.block_on(watch(&input, &config, &mut renderer))
            }
            Command::Reconcile {
                input,
                output: log_path,
            } => {
                let config = WatchmarkConfig::load(&input.file, location)?;
                let mut renderer = TerminalRenderer::new(
                    &mut *stdout,
                    render_styles(output),
                    true,
                );
                reconcile(&input, log_path.as_deref(), &config, &mut renderer)
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Track a test file and print statuses as the watch process reports them
    ///
    /// The configured watch command is started in the file's project root with
    /// the file appended to it. Saving the file (or rewriting its captures)
    /// re-extracts its tests and asks the watch process for another run.
    Watch {
        #[clap(flatten)]
        input: InputOpts,
    },

    /// Reconcile recorded watch process output and print the final statuses
    ///
    /// Exits with a non-zero status if any test failed.
    Reconcile {
        #[clap(flatten)]
        input: InputOpts,

        /// Recorded watch process stdout [default: read from standard input]
        #[arg(long, value_name = "PATH")]
        output: Option<Utf8PathBuf>,
    },
}

#[derive(Debug, Args)]
struct InputOpts {
    /// The test file to track
    #[arg(value_name = "FILE")]
    file: Utf8PathBuf,

    /// Syntax-query captures for FILE, as JSON
    #[arg(long, value_name = "PATH")]
    captures: Utf8PathBuf,
}

impl InputOpts {
    fn read_source(&self) -> Result<String> {
        std::fs::read_to_string(&self.file)
            .map_err(|err| ExpectedError::source_read_error(self.file.clone(), err))
    }

    fn read_captures(&self) -> Result<CaptureSet, CaptureSetError> {
        let json =
            std::fs::read_to_string(&self.captures).map_err(|error| CaptureSetError::Read {
                path: self.captures.clone(),
                error,
            })?;
        CaptureSet::parse(&json).map_err(|error| CaptureSetError::Parse {
            path: self.captures.clone(),
            error,
        })
    }

    fn read_all(&self) -> Result<(String, CaptureSet)> {
        Ok((self.read_source()?, self.read_captures()?))
    }

    /// Modification times of the file and its captures, used to detect saves.
    fn stamp(&self) -> (Option<SystemTime>, Option<SystemTime>) {
        (modified(&self.file), modified(&self.captures))
    }
}

fn modified(path: &Utf8Path) -> Option<SystemTime> {
    path.metadata().and_then(|metadata| metadata.modified()).ok()
}

fn render_styles(output: OutputContext) -> RenderStyles {
    let mut styles = RenderStyles::default();
    if output.color.should_colorize(supports_color::Stream::Stdout) {
        styles.colorize();
    }
    styles
}

async fn watch<W: Write>(
    input: &InputOpts,
    config: &WatchmarkConfig,
    renderer: &mut TerminalRenderer<W>,
) -> Result<i32> {
    let file = input.file.as_path();
    let mut signals = ShutdownSignals::listen()?;
    let (mut registry, mut events) = SessionRegistry::new();

    let (source, captures) = input.read_all()?;
    match registry.start_tracking(file, &source, captures, &config.watch, renderer)? {
        TrackOutcome::Started | TrackOutcome::AlreadyTracking => {}
        TrackOutcome::NotStarted(reason) => {
            return Err(ExpectedError::NotStarted {
                file: file.to_owned(),
                reason,
            });
        }
    }

    let mut stamp = input.stamp();
    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            Some(event) = events.recv() => {
                match registry.handle_event(event, renderer) {
                    HandledEvent::Report(summary) => {
                        debug!(
                            "report for {file}: {} matched, {} unmatched, {} for other files",
                            summary.matched, summary.unmatched, summary.other_files,
                        );
                    }
                    HandledEvent::Exited(code) => {
                        check_renderer(renderer)?;
                        return match code {
                            Some(0) => Ok(WatchmarkExitCode::OK),
                            code => Err(ExpectedError::WatchProcessFailed {
                                file: file.to_owned(),
                                code,
                            }),
                        };
                    }
                    HandledEvent::Output | HandledEvent::Stale => {}
                }
            }
            Some(event) = signals.recv() => {
                info!("received {event}, stopping");
                registry.stop_tracking(file, renderer);
                check_renderer(renderer)?;
                return Ok(WatchmarkExitCode::OK);
            }
            _ = poll.tick() => {
                let current = input.stamp();
                if current != stamp {
                    stamp = current;
                    on_save(input, &mut registry, renderer)?;
                }
            }
        }

        check_renderer(renderer)?;
    }
}

fn on_save(
    input: &InputOpts,
    registry: &mut SessionRegistry,
    renderer: &mut dyn Renderer,
) -> Result<()> {
    // Editors may replace the file in several steps, so unreadable input is
    // skipped until the next change.
    let (source, captures) = match input.read_all() {
        Ok(inputs) => inputs,
        Err(error) => {
            warn!(
                "skipping change to {}: {}",
                input.file,
                DisplayErrorChain::new(error)
            );
            return Ok(());
        }
    };

    if registry.on_save(&input.file, &source, captures, renderer)? {
        debug!("{} saved, re-running", input.file);
    }
    Ok(())
}

fn reconcile<W: Write>(
    input: &InputOpts,
    log_path: Option<&Utf8Path>,
    config: &WatchmarkConfig,
    renderer: &mut TerminalRenderer<W>,
) -> Result<i32> {
    let (source, captures) = input.read_all()?;
    let log = read_log(log_path)?;

    let mut session = RunSession::new(
        input.file.clone(),
        &source,
        captures,
        &config.watch.report_marker,
    );
    let mut recorder = RecordingRenderer::new();
    let mut reports = 0;
    for line in log.lines() {
        if let Some(summary) = session.on_stdout_line(line, &mut recorder) {
            reports += 1;
            debug!(
                "report {reports}: {} matched, {} unmatched, {} for other files",
                summary.matched, summary.unmatched, summary.other_files,
            );
        }
    }
    if reports == 0 {
        warn!("no run report found in watch process output");
        session.extract(&mut recorder);
    }

    renderer.write_state(&input.file, session.state());
    check_renderer(renderer)?;

    if session.state().has_failures() {
        Err(ExpectedError::TestRunFailed)
    } else {
        Ok(WatchmarkExitCode::OK)
    }
}

fn read_log(path: Option<&Utf8Path>) -> Result<String> {
    let bytes = match path {
        Some(path) => std::fs::read(path)
            .map_err(|err| ExpectedError::output_read_error(Some(path.to_owned()), err))?,
        None => {
            let mut bytes = Vec::new();
            std::io::stdin()
                .lock()
                .read_to_end(&mut bytes)
                .map_err(|err| ExpectedError::output_read_error(None, err))?;
            bytes
        }
    };
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn check_renderer<W: Write>(renderer: &mut TerminalRenderer<W>) -> Result<()> {
    match renderer.take_error() {
        Some(err) => Err(ExpectedError::write_error(err)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Color;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    // describe("sum", () => {     // 0
    //   test("adds", () => {      // 1
    //     expect(sum(1, 2)).toBe(4);
    //   });                       // 3
    //   test("zero", () => {      // 4
    //     expect(sum(0, 0)).toBe(0);
    //   });                       // 6
    // });                         // 7
    const CAPTURES: &str = indoc! {r#"
        {
          "capture-names": ["root_suite", "test"],
          "matches": [
            {"captures": [
              {"index": 0, "range": {"start": {"row": 0, "column": 0}, "end": {"row": 7, "column": 2}}},
              {"index": 1, "range": {"start": {"row": 1, "column": 2}, "end": {"row": 3, "column": 4}}}
            ]},
            {"captures": [
              {"index": 0, "range": {"start": {"row": 0, "column": 0}, "end": {"row": 7, "column": 2}}},
              {"index": 1, "range": {"start": {"row": 4, "column": 2}, "end": {"row": 6, "column": 4}}}
            ]}
          ]
        }
    "#};

    const PASSING_LOG: &str = indoc! {r#"
        Determining test suites to run...
        {"numFailedTests":0,"numTotalTests":2,"testResults":[{"message":"","assertionResults":[{"status":"passed","location":{"line":2,"column":3},"failureMessages":[]},{"status":"passed","location":{"line":5,"column":3},"failureMessages":[]}]}]}
    "#};

    const FAILING_LOG: &str = indoc! {r#"
        {"numFailedTests":1,"numTotalTests":2,
        "testResults":[{"message":"","assertionResults":[{"status":"failed","location":{"line":2,"column":3},"failureMessages":["Error: expected 4, got 3"]},{"status":"passed","location":{"line":5,"column":3},"failureMessages":[]}]}]}
    "#};

    struct Project {
        dir: Utf8TempDir,
    }

    impl Project {
        fn new(log: &str) -> Self {
            let dir = camino_tempfile::tempdir().expect("temp dir created");
            std::fs::write(dir.path().join("sum.test.js"), "describe('sum', ...)")
                .expect("wrote source");
            std::fs::write(dir.path().join("captures.json"), CAPTURES).expect("wrote captures");
            std::fs::write(dir.path().join("output.log"), log).expect("wrote log");
            Self { dir }
        }

        fn path(&self, name: &str) -> String {
            self.dir.path().join(name).into_string()
        }

        fn reconcile(&self) -> (Result<i32>, String) {
            let app = App::try_parse_from([
                "watchmark".to_owned(),
                "reconcile".to_owned(),
                self.path("sum.test.js"),
                "--captures".to_owned(),
                self.path("captures.json"),
                "--output".to_owned(),
                self.path("output.log"),
            ])
            .expect("arguments parse");
            let output = OutputContext {
                verbose: false,
                color: Color::Never,
            };
            let mut stdout = Vec::new();
            let result = app.exec(output, &mut stdout);
            let stdout = String::from_utf8(stdout).expect("stdout is UTF-8");
            (result, stdout.replace(self.dir.path().as_str(), "<dir>"))
        }
    }

    #[test]
    fn reconcile_passing_log() {
        let project = Project::new(PASSING_LOG);
        let (result, stdout) = project.reconcile();

        assert_eq!(result.expect("reconcile succeeds"), WatchmarkExitCode::OK);
        assert_eq!(
            stdout,
            indoc! {"
                PASS <dir>/sum.test.js:1 root suite
                PASS   <dir>/sum.test.js:2 test
                PASS   <dir>/sum.test.js:5 test
            "}
        );
    }

    #[test]
    fn reconcile_failing_log() {
        let project = Project::new(FAILING_LOG);
        let (result, stdout) = project.reconcile();

        let error = result.expect_err("a test failed");
        assert_eq!(error.process_exit_code(), WatchmarkExitCode::TEST_RUN_FAILED);
        assert_eq!(
            stdout,
            indoc! {"
                FAIL <dir>/sum.test.js:1 root suite
                FAIL   <dir>/sum.test.js:2 test
                PASS   <dir>/sum.test.js:5 test
                error <dir>/sum.test.js:2:3
                    Error: expected 4, got 3
            "}
        );
    }

    #[test]
    fn reconcile_without_report() {
        let project = Project::new("Determining test suites to run...\n");
        let (result, stdout) = project.reconcile();

        assert_eq!(result.expect("reconcile succeeds"), WatchmarkExitCode::OK);
        assert_eq!(
            stdout,
            concat!(
                " RUN <dir>/sum.test.js:1 root suite\n",
                " RUN   <dir>/sum.test.js:2 test\n",
                " RUN   <dir>/sum.test.js:5 test\n",
            )
        );
    }

    #[test]
    fn missing_captures() {
        let project = Project::new(PASSING_LOG);
        std::fs::remove_file(project.path("captures.json")).expect("removed captures");
        let (result, stdout) = project.reconcile();

        let error = result.expect_err("captures are missing");
        assert_eq!(error.process_exit_code(), WatchmarkExitCode::INPUT_READ_FAILED);
        assert_eq!(stdout, "");
    }
}
