// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running the watch process for a tracked file.
//!
//! A [`WatchProcess`] owns one child process. Its output is read on background
//! tasks and forwarded line by line, together with its exit, into a channel.
//! The owner of the channel is the only consumer, so events for one file are
//! always handled one at a time.

use crate::{
    config::WatchConfig,
    errors::{WatchIoError, WatchSpawnError},
    helpers::decode_line,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fmt, process::Stdio, time::Duration};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::ChildStdin,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::debug;

/// How long to keep reading output after the process exits on its own.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Something that happened to a watch process.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WatchEvent {
    /// A line of standard output, without its terminator.
    Stdout(String),
    /// A line of standard error, without its terminator.
    Stderr(String),
    /// The process exited, with its exit code if it has one.
    Exited(Option<i32>),
}

/// Why tracking did not start for a file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotStartedReason {
    /// No directory above the file contains a root marker.
    NoProjectRoot,
    /// The configured command is empty.
    EmptyCommand,
}

impl fmt::Display for NotStartedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProjectRoot => write!(f, "no project root found"),
            Self::EmptyCommand => write!(f, "watch command is empty"),
        }
    }
}

/// A fully resolved watch command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WatchCommand {
    program: String,
    args: Vec<String>,
    cwd: Utf8PathBuf,
    rerun_input: Option<String>,
}

impl WatchCommand {
    /// Creates a command that runs `program` with `args` in `cwd`.
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
        cwd: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: cwd.into(),
            rerun_input: None,
        }
    }

    /// Sets the input written to the process to request a re-run.
    pub fn with_rerun_input(mut self, rerun_input: Option<String>) -> Self {
        self.rerun_input = rerun_input;
        self
    }

    /// Resolves the command that watches `file`.
    ///
    /// The process runs in the file's project root with the file's path appended
    /// to the configured command.
    pub fn resolve(file: &Utf8Path, config: &WatchConfig) -> Result<Self, NotStartedReason> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or(NotStartedReason::EmptyCommand)?;
        let root = config
            .find_project_root(file)
            .ok_or(NotStartedReason::NoProjectRoot)?;

        let args = args.iter().map(String::as_str).chain([file.as_str()]);
        Ok(Self::new(program.as_str(), args, root).with_rerun_input(config.rerun_input.clone()))
    }

    /// The program to run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// The arguments passed to the program.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The working directory.
    pub fn cwd(&self) -> &Utf8Path {
        &self.cwd
    }
}

/// A running watch process.
///
/// Dropping this kills the process.
#[derive(Debug)]
pub struct WatchProcess {
    pid: Option<u32>,
    stdin: mpsc::UnboundedSender<Vec<u8>>,
    kill: Option<oneshot::Sender<()>>,
    rerun_input: Option<String>,
}

impl WatchProcess {
    /// Spawns `command`, forwarding its events through `events`.
    ///
    /// `wrap` turns each event into the channel's item type, so that callers can
    /// tag events with where they came from. Must be called within a tokio
    /// runtime.
    pub fn spawn<T, F>(
        command: &WatchCommand,
        events: mpsc::UnboundedSender<T>,
        wrap: F,
    ) -> Result<Self, WatchSpawnError>
    where
        T: Send + 'static,
        F: Fn(WatchEvent) -> T + Clone + Send + 'static,
    {
        let mut cmd = tokio::process::Command::new(&command.program);
        cmd.args(&command.args)
            .current_dir(&command.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|error| WatchSpawnError::new(&command.program, &command.cwd, error))?;
        let pid = child.id();
        debug!(
            "spawned watch process {} (pid {pid:?}) in {}",
            command.program, command.cwd
        );

        let stdout = child.stdout.take().expect("stdout was set");
        let stderr = child.stderr.take().expect("stderr was set");
        let stdin = child.stdin.take().expect("stdin was set");

        let stdout_task = tokio::spawn(forward_lines(
            stdout,
            events.clone(),
            wrap.clone(),
            WatchEvent::Stdout,
        ));
        let stderr_task = tokio::spawn(forward_lines(
            stderr,
            events.clone(),
            wrap.clone(),
            WatchEvent::Stderr,
        ));

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_stdin(stdin, stdin_rx));

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => {
                    // Let the readers forward whatever the process printed last.
                    let drain = async {
                        _ = stdout_task.await;
                        _ = stderr_task.await;
                    };
                    if tokio::time::timeout(DRAIN_TIMEOUT, drain).await.is_err() {
                        debug!("timed out reading output of exited watch process");
                    }
                    status
                }
                // A dropped sender also means kill.
                _ = kill_rx => {
                    _ = child.start_kill();
                    child.wait().await
                }
            };

            let code = match status {
                Ok(status) => status.code(),
                Err(error) => {
                    debug!("error waiting for watch process: {error}");
                    None
                }
            };
            _ = events.send(wrap(WatchEvent::Exited(code)));
        });

        Ok(Self {
            pid,
            stdin: stdin_tx,
            kill: Some(kill_tx),
            rerun_input: command.rerun_input.clone(),
        })
    }

    /// The OS process id, if the process was still running when spawned.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Returns true once [`Self::stop`] has been called.
    pub fn is_stopped(&self) -> bool {
        self.kill.is_none()
    }

    /// Asks the process to run the tests again, by writing the configured
    /// re-run input to it. Does nothing if no re-run input is configured.
    pub fn trigger_rerun(&self) -> Result<(), WatchIoError> {
        match &self.rerun_input {
            Some(input) => self.send_input(input.as_bytes()),
            None => Ok(()),
        }
    }

    /// Writes `input` to the process' stdin.
    pub fn send_input(&self, input: &[u8]) -> Result<(), WatchIoError> {
        self.stdin
            .send(input.to_vec())
            .map_err(|_| WatchIoError::StdinClosed)
    }

    /// Kills the process. Calling this more than once does nothing.
    ///
    /// The process' [`WatchEvent::Exited`] event is still sent.
    pub fn stop(&mut self) {
        if let Some(kill) = self.kill.take() {
            debug!("stopping watch process (pid {:?})", self.pid);
            _ = kill.send(());
        }
    }
}

impl Drop for WatchProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn forward_lines<R, T, F>(
    reader: R,
    events: mpsc::UnboundedSender<T>,
    wrap: F,
    make_event: fn(String) -> WatchEvent,
) where
    R: AsyncRead + Unpin,
    F: Fn(WatchEvent) -> T,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if events.send(wrap(make_event(decode_line(&buf)))).is_err() {
                    // Nobody is listening anymore.
                    break;
                }
            }
            Err(error) => {
                debug!("error reading watch process output: {error}");
                break;
            }
        }
    }
}

async fn write_stdin(mut stdin: ChildStdin, mut input: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(bytes) = input.recv().await {
        let res = async {
            stdin.write_all(&bytes).await?;
            stdin.flush().await
        }
        .await;
        if let Err(error) = res {
            debug!("error writing to watch process stdin: {error}");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;

    fn project() -> Utf8TempDir {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        dir
    }

    #[test]
    fn resolve_appends_file() {
        let dir = project();
        let file = dir.path().join("src/sum.test.js");
        let config = WatchConfig {
            rerun_input: Some("a".to_owned()),
            ..WatchConfig::default()
        };

        let command = WatchCommand::resolve(&file, &config).expect("command resolves");
        assert_eq!(command.program(), "npx");
        assert_eq!(
            command.args(),
            ["jest", "--watch", "--json", "--testLocationInResults", file.as_str()]
        );
        assert_eq!(command.cwd(), dir.path());
        assert_eq!(command.rerun_input.as_deref(), Some("a"));
    }

    #[test]
    fn resolve_not_started() {
        let dir = project();
        let file = dir.path().join("src/sum.test.js");

        let config = WatchConfig {
            command: Vec::new(),
            ..WatchConfig::default()
        };
        assert_eq!(
            WatchCommand::resolve(&file, &config),
            Err(NotStartedReason::EmptyCommand)
        );

        let config = WatchConfig {
            root_markers: vec!["watchmark-no-such-marker".to_owned()],
            ..WatchConfig::default()
        };
        assert_eq!(
            WatchCommand::resolve(&file, &config),
            Err(NotStartedReason::NoProjectRoot)
        );
    }

    #[tokio::test]
    async fn spawn_failure() {
        let dir = project();
        let command = WatchCommand::new(
            "watchmark-this-program-does-not-exist",
            Vec::<String>::new(),
            dir.path(),
        );
        let (tx, _rx) = mpsc::unbounded_channel();
        let error = WatchProcess::spawn(&command, tx, |event| event)
            .expect_err("missing program fails to spawn");
        assert!(
            error.to_string().contains("watchmark-this-program-does-not-exist"),
            "{error}"
        );
    }
}
