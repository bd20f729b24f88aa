// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracking sessions, one per file.
//!
//! A [`RunSession`] ties together everything known about one tracked file: its
//! identifiers, the diagnostics of the current run cycle, the watch process and
//! the partially received report. A [`SessionRegistry`] owns all sessions and
//! routes watch process events to them.
//!
//! All methods take the [`Renderer`] to report changes to, and are expected to be
//! called from a single event loop.

use crate::{
    config::WatchConfig,
    errors::{WatchIoError, WatchSpawnError},
    extract::extract,
    frame::FrameAssembler,
    identifier::IdentifierMap,
    reconcile::{ReconcileSummary, Reconciler, RunState},
    render::{Renderer, render_identifier},
    supervisor::{NotStartedReason, WatchCommand, WatchEvent, WatchProcess},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use tokio::sync::mpsc;
use tracing::{debug, info};
use watchmark_metadata::{CaptureSet, RunReport};
use xxhash_rust::xxh3::xxh3_64;

/// The state of one tracked file.
#[derive(Debug)]
pub struct RunSession {
    file: Utf8PathBuf,
    captures: CaptureSet,
    source_hash: u64,
    // The last extraction, before any results were applied to it.
    pristine: Option<(u64, IdentifierMap)>,
    state: RunState,
    reconciler: Reconciler,
    assembler: FrameAssembler,
    process: Option<WatchProcess>,
    initialized: bool,
    generation: u64,
}

impl RunSession {
    /// Creates a session for `file`, whose current text is `source` and whose
    /// syntax query produced `captures`.
    pub fn new(
        file: impl Into<Utf8PathBuf>,
        source: &str,
        captures: CaptureSet,
        report_marker: &str,
    ) -> Self {
        let file = file.into();
        Self {
            reconciler: Reconciler::new(file.clone()),
            file,
            captures,
            source_hash: xxh3_64(source.as_bytes()),
            pristine: None,
            state: RunState::default(),
            assembler: FrameAssembler::with_marker(report_marker),
            process: None,
            initialized: false,
            generation: 0,
        }
    }

    /// The tracked file.
    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    /// The current identifiers and diagnostics.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// The current identifiers.
    pub fn identifiers(&self) -> &IdentifierMap {
        &self.state.identifiers
    }

    /// Returns true if the static extraction has run for the current cycle.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Identifies the watch process this session expects events from.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns true if a watch process is attached and not stopped.
    pub fn is_running(&self) -> bool {
        self.process.as_ref().is_some_and(|process| !process.is_stopped())
    }

    /// Replaces the file's text and captures.
    pub fn update_source(&mut self, source: &str, captures: CaptureSet) {
        self.source_hash = xxh3_64(source.as_bytes());
        self.captures = captures;
    }

    /// Runs the static extraction and shows every identifier as loading or
    /// pending.
    ///
    /// The extraction is only recomputed if the text changed since the last one.
    pub fn extract(&mut self, renderer: &mut dyn Renderer) {
        let mut identifiers = match &self.pristine {
            Some((hash, identifiers)) if *hash == self.source_hash => identifiers.clone(),
            _ => {
                let identifiers = extract(&self.captures);
                debug!(
                    "extracted {} identifiers from {}",
                    identifiers.len(),
                    self.file
                );
                self.pristine = Some((self.source_hash, identifiers.clone()));
                identifiers
            }
        };

        let previous = &self.state.identifiers;
        if previous.lines().all(|line| identifiers.contains(line)) {
            identifiers.carry_render_handles(previous);
        } else {
            // Marks for identifiers that went away would linger otherwise.
            renderer.clear(&self.file);
        }

        self.state = RunState::new(identifiers);
        for identifier in self.state.identifiers.iter_mut() {
            render_identifier(renderer, &self.file, identifier);
        }
        renderer.set_diagnostics(&self.file, &[]);
        self.initialized = true;
    }

    /// Handles a save of the tracked file: re-extracts, then asks the watch
    /// process to run again.
    pub fn on_save(
        &mut self,
        source: &str,
        captures: CaptureSet,
        renderer: &mut dyn Renderer,
    ) -> Result<(), WatchIoError> {
        self.update_source(source, captures);
        self.extract(renderer);
        match &self.process {
            Some(process) => process.trigger_rerun(),
            None => Ok(()),
        }
    }

    /// Handles one line of the watch process' standard output. Returns a summary
    /// if the line completed a report.
    pub fn on_stdout_line(
        &mut self,
        line: &str,
        renderer: &mut dyn Renderer,
    ) -> Option<ReconcileSummary> {
        let report = self.assembler.push(line)?;
        Some(self.apply_report(&report, renderer))
    }

    /// Applies a complete report and finishes the run cycle.
    pub fn apply_report(&mut self, report: &RunReport, renderer: &mut dyn Renderer) -> ReconcileSummary {
        if !self.initialized {
            self.extract(renderer);
        }
        let summary = self.reconciler.apply_report(&mut self.state, report, renderer);
        self.reconciler.finish_cycle(&mut self.state, renderer);
        self.initialized = false;
        summary
    }

    /// Stops the watch process and removes everything shown for the file.
    pub fn teardown(&mut self, renderer: &mut dyn Renderer) {
        if let Some(mut process) = self.process.take() {
            process.stop();
        }
        self.assembler.reset();
        renderer.clear(&self.file);
    }

    fn attach(&mut self, process: WatchProcess, generation: u64) {
        self.process = Some(process);
        self.generation = generation;
    }
}

/// An event from the watch process of a tracked file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionEvent {
    /// The tracked file.
    pub file: Utf8PathBuf,
    /// The generation of the session the process was started for.
    pub generation: u64,
    /// What happened.
    pub event: WatchEvent,
}

/// The result of [`SessionRegistry::start_tracking`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TrackOutcome {
    /// A watch process was started.
    Started,
    /// The file was already tracked. Nothing was done.
    AlreadyTracking,
    /// Tracking could not start for the file.
    NotStarted(NotStartedReason),
}

/// What [`SessionRegistry::handle_event`] did with an event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HandledEvent {
    /// The event was for a session that no longer exists.
    Stale,
    /// Output that did not complete a report.
    Output,
    /// A report was applied.
    Report(ReconcileSummary),
    /// The process exited and the session was torn down.
    Exited(Option<i32>),
}

/// All tracked files.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: BTreeMap<Utf8PathBuf, RunSession>,
    events: mpsc::UnboundedSender<SessionEvent>,
    next_generation: u64,
}

impl SessionRegistry {
    /// Creates an empty registry, along with the receiver for its watch process
    /// events. The receiver's events go to [`Self::handle_event`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let registry = Self {
            sessions: BTreeMap::new(),
            events,
            next_generation: 1,
        };
        (registry, receiver)
    }

    /// Starts tracking `file`, spawning its watch process.
    ///
    /// Must be called within a tokio runtime.
    pub fn start_tracking(
        &mut self,
        file: &Utf8Path,
        source: &str,
        captures: CaptureSet,
        config: &WatchConfig,
        renderer: &mut dyn Renderer,
    ) -> Result<TrackOutcome, WatchSpawnError> {
        if self.sessions.contains_key(file) {
            return Ok(TrackOutcome::AlreadyTracking);
        }

        let command = match WatchCommand::resolve(file, config) {
            Ok(command) => command,
            Err(reason) => {
                debug!("not tracking {file}: {reason}");
                return Ok(TrackOutcome::NotStarted(reason));
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;
        let tag = file.to_owned();
        let process = WatchProcess::spawn(&command, self.events.clone(), move |event| SessionEvent {
            file: tag.clone(),
            generation,
            event,
        })?;

        let mut session = RunSession::new(file, source, captures, &config.report_marker);
        session.attach(process, generation);
        session.extract(renderer);
        info!("started tracking {file} (running {} in {})", command.program(), command.cwd());
        self.sessions.insert(file.to_owned(), session);
        Ok(TrackOutcome::Started)
    }

    /// Stops tracking `file`. Returns false if it wasn't tracked.
    pub fn stop_tracking(&mut self, file: &Utf8Path, renderer: &mut dyn Renderer) -> bool {
        match self.sessions.remove(file) {
            Some(mut session) => {
                session.teardown(renderer);
                info!("stopped tracking {file}");
                true
            }
            None => false,
        }
    }

    /// Handles a save of `file`. Returns false if it isn't tracked.
    pub fn on_save(
        &mut self,
        file: &Utf8Path,
        source: &str,
        captures: CaptureSet,
        renderer: &mut dyn Renderer,
    ) -> Result<bool, WatchIoError> {
        match self.sessions.get_mut(file) {
            Some(session) => {
                session.on_save(source, captures, renderer)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Handles `file` being closed.
    pub fn on_close(&mut self, file: &Utf8Path, renderer: &mut dyn Renderer) -> bool {
        self.stop_tracking(file, renderer)
    }

    /// Routes an event to its session.
    ///
    /// Events from a process that belonged to an earlier session for the same
    /// file are ignored.
    pub fn handle_event(&mut self, event: SessionEvent, renderer: &mut dyn Renderer) -> HandledEvent {
        let Some(session) = self
            .sessions
            .get_mut(&event.file)
            .filter(|session| session.generation == event.generation)
        else {
            debug!(
                "ignoring event for {} (generation {})",
                event.file, event.generation
            );
            return HandledEvent::Stale;
        };

        match event.event {
            WatchEvent::Stdout(line) => match session.on_stdout_line(&line, renderer) {
                Some(summary) => HandledEvent::Report(summary),
                None => HandledEvent::Output,
            },
            WatchEvent::Stderr(line) => {
                debug!(target: "watchmark_runner::watch_stderr", "{}: {line}", event.file);
                HandledEvent::Output
            }
            WatchEvent::Exited(code) => {
                info!("watch process for {} exited with code {code:?}", event.file);
                self.stop_tracking(&event.file, renderer);
                HandledEvent::Exited(code)
            }
        }
    }

    /// Returns the session for `file`.
    pub fn get(&self, file: &Utf8Path) -> Option<&RunSession> {
        self.sessions.get(file)
    }

    /// Returns the session for `file` mutably.
    pub fn get_mut(&mut self, file: &Utf8Path) -> Option<&mut RunSession> {
        self.sessions.get_mut(file)
    }

    /// Adds a session, replacing any session for the same file.
    pub fn insert(&mut self, session: RunSession) -> Option<RunSession> {
        self.sessions.insert(session.file.clone(), session)
    }

    /// Removes the session for `file` without tearing it down.
    pub fn remove(&mut self, file: &Utf8Path) -> Option<RunSession> {
        self.sessions.remove(file)
    }

    /// Returns true if `file` is tracked.
    pub fn contains(&self, file: &Utf8Path) -> bool {
        self.sessions.contains_key(file)
    }

    /// Returns the number of tracked files.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if no files are tracked.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
