// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by watchmark.

use camino::Utf8PathBuf;
use std::{error::Error as StdError, fmt, io};
use thiserror::Error;

/// Displays an error along with every error in its source chain.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: StdError> DisplayErrorChain<E> {
    /// Wraps `error`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: StdError> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        if source.is_some() {
            write!(f, "\n  caused by:")?;
        }
        while let Some(error) = source {
            write!(f, "\n  - {error}")?;
            source = error.source();
        }
        Ok(())
    }
}

/// An error that occurred while reading a config file.
#[derive(Debug, Error)]
#[error("failed to read watchmark config at `{path}`")]
#[non_exhaustive]
pub struct ConfigReadError {
    path: Utf8PathBuf,
    #[source]
    error: io::Error,
}

impl ConfigReadError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: io::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// Returns the path of the config file.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// An error that occurred while parsing a config file.
#[derive(Debug, Error)]
#[error("failed to parse watchmark config at `{path}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    path: Utf8PathBuf,
    #[source]
    error: toml::de::Error,
}

impl ConfigParseError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: toml::de::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// Returns the path of the config file.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// An error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error(transparent)]
    Read(#[from] ConfigReadError),

    /// The config file could not be parsed.
    #[error(transparent)]
    Parse(#[from] ConfigParseError),
}

/// An error that occurred while spawning the watch process.
#[derive(Debug, Error)]
#[error("failed to spawn watch process `{program}` in `{cwd}`")]
pub struct WatchSpawnError {
    program: String,
    cwd: Utf8PathBuf,
    #[source]
    error: io::Error,
}

impl WatchSpawnError {
    pub(crate) fn new(program: impl Into<String>, cwd: impl Into<Utf8PathBuf>, error: io::Error) -> Self {
        Self {
            program: program.into(),
            cwd: cwd.into(),
            error,
        }
    }
}

/// An error communicating with a running watch process.
#[derive(Debug, Error)]
pub enum WatchIoError {
    /// The process' stdin was closed, usually because it exited.
    #[error("watch process stdin is closed")]
    StdinClosed,
}

/// An error reading a serialized capture set.
#[derive(Debug, Error)]
pub enum CaptureSetError {
    /// The capture file could not be read.
    #[error("failed to read captures from `{path}`")]
    Read {
        /// The path that was read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The capture file was not valid.
    #[error("failed to parse captures from `{path}`")]
    Parse {
        /// The path that was read.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error occurred while setting up the signal handler.
#[derive(Debug, Error)]
#[error("error setting up signal handler")]
pub struct SignalHandlerSetupError(#[from] io::Error);
