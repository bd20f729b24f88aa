// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::StderrStyles;
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use swrite::{SWrite, swrite};
use thiserror::Error;
use tracing::error;
use watchmark_metadata::WatchmarkExitCode;
use watchmark_runner::{errors::*, supervisor::NotStartedReason};

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that watchmark expects and knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config error")]
    ConfigError {
        #[from]
        err: ConfigError,
    },
    #[error("failed to read source file")]
    SourceReadError {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to read captures")]
    CaptureSetError {
        #[from]
        err: CaptureSetError,
    },
    #[error("failed to read watch process output")]
    OutputReadError {
        path: Option<Utf8PathBuf>,
        #[source]
        err: std::io::Error,
    },
    #[error("watch process not started")]
    NotStarted {
        file: Utf8PathBuf,
        reason: NotStartedReason,
    },
    #[error("failed to spawn watch process")]
    WatchSpawnError {
        #[from]
        err: WatchSpawnError,
    },
    #[error("failed to communicate with watch process")]
    WatchIoError {
        #[from]
        err: WatchIoError,
    },
    #[error("watch process exited")]
    WatchProcessFailed {
        file: Utf8PathBuf,
        code: Option<i32>,
    },
    #[error("error setting up signal handler")]
    SignalHandlerSetupError {
        #[from]
        err: SignalHandlerSetupError,
    },
    #[error("error creating async runtime")]
    RuntimeCreateError {
        #[source]
        err: std::io::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
    #[error("error writing output")]
    WriteError {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn source_read_error(path: impl Into<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::SourceReadError {
            path: path.into(),
            err,
        }
    }

    pub(crate) fn output_read_error(path: Option<Utf8PathBuf>, err: std::io::Error) -> Self {
        Self::OutputReadError { path, err }
    }

    pub(crate) fn write_error(err: std::io::Error) -> Self {
        Self::WriteError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigError { .. }
            | Self::NotStarted { .. }
            | Self::SignalHandlerSetupError { .. }
            | Self::RuntimeCreateError { .. } => WatchmarkExitCode::SETUP_ERROR,
            Self::SourceReadError { .. }
            | Self::CaptureSetError { .. }
            | Self::OutputReadError { .. } => WatchmarkExitCode::INPUT_READ_FAILED,
            Self::WatchSpawnError { .. }
            | Self::WatchIoError { .. }
            | Self::WatchProcessFailed { .. } => WatchmarkExitCode::WATCH_PROCESS_FAILED,
            Self::TestRunFailed => WatchmarkExitCode::TEST_RUN_FAILED,
            Self::WriteError { .. } => WatchmarkExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        error!("{}", self.display_message(styles));
    }

    /// The message logged by [`display_to_stderr`](Self::display_to_stderr),
    /// followed by the chain of causes.
    fn display_message(&self, styles: &StderrStyles) -> String {
        let (mut message, mut next_error) = match self {
            Self::ConfigError { err } => {
                let path = match err {
                    ConfigError::Read(err) => err.path(),
                    ConfigError::Parse(err) => err.path(),
                };
                (
                    format!("failed to load watchmark config from `{}`", path.style(styles.bold)),
                    err.source(),
                )
            }
            Self::SourceReadError { path, err } => (
                format!("failed to read source file `{}`", path.style(styles.bold)),
                Some(err as &dyn Error),
            ),
            Self::CaptureSetError { err } => (err.to_string(), err.source()),
            Self::OutputReadError { path, err } => {
                let message = match path {
                    Some(path) => format!(
                        "failed to read watch process output from `{}`",
                        path.style(styles.bold)
                    ),
                    None => "failed to read watch process output from standard input".to_owned(),
                };
                (message, Some(err as &dyn Error))
            }
            Self::NotStarted { file, reason } => (
                format!(
                    "not watching `{}`: {}",
                    file.style(styles.bold),
                    reason.style(styles.warning_text)
                ),
                None,
            ),
            Self::WatchSpawnError { err } => (err.to_string(), err.source()),
            Self::WatchIoError { err } => (err.to_string(), err.source()),
            Self::WatchProcessFailed { file, code } => {
                let message = match code {
                    Some(code) => format!(
                        "watch process for `{}` exited with code {}",
                        file.style(styles.bold),
                        code.style(styles.bold)
                    ),
                    None => format!(
                        "watch process for `{}` was terminated by a signal",
                        file.style(styles.bold)
                    ),
                };
                (message, None)
            }
            Self::SignalHandlerSetupError { err } => {
                ("error setting up signal handler".to_owned(), err.source())
            }
            Self::RuntimeCreateError { err } => (
                "error creating async runtime".to_owned(),
                Some(err as &dyn Error),
            ),
            Self::TestRunFailed => ("test run failed".to_owned(), None),
            Self::WriteError { err } => {
                ("failed to write output".to_owned(), Some(err as &dyn Error))
            }
        };

        while let Some(err) = next_error {
            swrite!(message, "\n\nCaused by:\n  {err}");
            next_error = err.source();
        }
        message
    }
}
