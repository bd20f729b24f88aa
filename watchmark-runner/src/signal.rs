// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shutdown requests for the watch loop.

use crate::errors::SignalHandlerSetupError;
use std::fmt;

/// A request to stop watching.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ShutdownEvent {
    /// SIGINT, or Ctrl-C on Windows.
    Interrupt,

    /// SIGTERM.
    #[cfg(unix)]
    Terminate,

    /// SIGHUP.
    #[cfg(unix)]
    Hangup,
}

impl fmt::Display for ShutdownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "interrupt"),
            #[cfg(unix)]
            Self::Terminate => write!(f, "termination request"),
            #[cfg(unix)]
            Self::Hangup => write!(f, "hangup"),
        }
    }
}

/// Yields the shutdown requests sent to this process.
#[derive(Debug)]
pub struct ShutdownSignals {
    listeners: Option<Listeners>,
}

impl ShutdownSignals {
    /// Starts listening. Must be called within a tokio runtime.
    pub fn listen() -> Result<Self, SignalHandlerSetupError> {
        Ok(Self {
            listeners: Some(Listeners::new()?),
        })
    }

    /// Returns a source that never yields a request.
    pub fn never() -> Self {
        Self { listeners: None }
    }

    /// Waits for the next shutdown request.
    ///
    /// Returns `None` once no more requests can arrive.
    pub async fn recv(&mut self) -> Option<ShutdownEvent> {
        self.listeners.as_mut()?.recv().await
    }
}

#[cfg(unix)]
#[derive(Debug)]
struct Listeners {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Listeners {
    fn new() -> std::io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn recv(&mut self) -> Option<ShutdownEvent> {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Some(ShutdownEvent::Interrupt),
            Some(()) = self.terminate.recv() => Some(ShutdownEvent::Terminate),
            Some(()) = self.hangup.recv() => Some(ShutdownEvent::Hangup),
            else => None,
        }
    }
}

#[cfg(windows)]
#[derive(Debug)]
struct Listeners {
    ctrl_c: tokio::signal::windows::CtrlC,
}

#[cfg(windows)]
impl Listeners {
    fn new() -> std::io::Result<Self> {
        Ok(Self {
            ctrl_c: tokio::signal::windows::ctrl_c()?,
        })
    }

    async fn recv(&mut self) -> Option<ShutdownEvent> {
        self.ctrl_c.recv().await.map(|()| ShutdownEvent::Interrupt)
    }
}
