// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Applying run reports to the identifiers of a tracked file.
//!
//! Each assertion in a report is matched to an identifier, first by its reported
//! line and then by the first stack frame in its failure message that points into
//! the file. A matched identifier takes the assertion's status, and terminal
//! statuses cascade up to its ancestors:
//!
//! * A failure marks every ancestor failed, up to the first one that already is.
//! * A pass marks ancestors passed, but stops at the first ancestor that already
//!   has a terminal status or that is still waiting on another child.
//!
//! Once a report has been applied, [`Reconciler::finish_cycle`] marks whatever is
//! still loading as pending and publishes diagnostics.

use crate::{
    helpers::{plural, strip_ansi},
    identifier::{IdentifierMap, Status},
    locate::{Diagnostic, DiagnosticLocator, OwnerSpan},
    render::{Renderer, render_identifier},
};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;
use watchmark_metadata::{AssertionResult, FileResult, RunReport};

/// The state of one run cycle for a tracked file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunState {
    /// The file's identifiers with their current statuses.
    pub identifiers: IdentifierMap,
    /// Diagnostics collected during the current cycle.
    pub diagnostics: Vec<Diagnostic>,
}

impl RunState {
    /// Creates a state for freshly extracted identifiers.
    pub fn new(identifiers: IdentifierMap) -> Self {
        Self {
            identifiers,
            diagnostics: Vec::new(),
        }
    }

    /// Returns true if any identifier failed.
    pub fn has_failures(&self) -> bool {
        self.identifiers
            .iter()
            .any(|identifier| identifier.status == Status::Failed)
    }
}

/// Counts describing what applying a report did.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ReconcileSummary {
    /// Assertions that were matched to an identifier.
    pub matched: usize,
    /// Assertions that could not be matched and were dropped.
    pub unmatched: usize,
    /// File results that were about other files.
    pub other_files: usize,
    /// Diagnostics attached to the start of the file.
    pub file_diagnostics: usize,
}

/// Applies run reports to one tracked file.
#[derive(Clone, Debug)]
pub struct Reconciler {
    file: Utf8PathBuf,
    locator: DiagnosticLocator,
}

impl Reconciler {
    /// Creates a reconciler for `file`.
    pub fn new(file: impl Into<Utf8PathBuf>) -> Self {
        let file = file.into();
        let locator = DiagnosticLocator::new(&file);
        Self { file, locator }
    }

    /// The tracked file.
    pub fn file(&self) -> &Utf8Path {
        &self.file
    }

    /// Applies every file result in `report` that belongs to the tracked file.
    pub fn apply_report(
        &self,
        state: &mut RunState,
        report: &RunReport,
        renderer: &mut dyn Renderer,
    ) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for result in &report.test_results {
            if !self.tracks(result.name.as_deref()) {
                summary.other_files += 1;
                continue;
            }
            self.apply_file_result(state, result, renderer, &mut summary);
        }
        debug!(
            "applied report to {}: {} matched, {} unmatched, {} results for other files",
            self.file, summary.matched, summary.unmatched, summary.other_files,
        );
        summary
    }

    /// Applies one file result.
    ///
    /// A non-empty file-level message becomes a diagnostic at the start of the
    /// file, unless some assertion in the result was matched.
    pub fn apply_file_result(
        &self,
        state: &mut RunState,
        result: &FileResult,
        renderer: &mut dyn Renderer,
        summary: &mut ReconcileSummary,
    ) {
        let mut any_matched = false;
        for assertion in &result.assertion_results {
            if self.apply_assertion(state, assertion, renderer).is_some() {
                summary.matched += 1;
                any_matched = true;
            } else {
                summary.unmatched += 1;
            }
        }

        let message = strip_ansi(result.message.trim());
        if !any_matched && !message.is_empty() {
            let diagnostic = self.locator.locate(&message, OwnerSpan::file_start());
            state.diagnostics.push(diagnostic);
            summary.file_diagnostics += 1;
        }
    }

    /// Applies one assertion. Returns the line of the identifier it matched, or
    /// `None` if it was dropped.
    pub fn apply_assertion(
        &self,
        state: &mut RunState,
        assertion: &AssertionResult,
        renderer: &mut dyn Renderer,
    ) -> Option<usize> {
        let message = assertion.first_failure_message().map(strip_ansi);
        let Some(line) = self.match_assertion(&state.identifiers, assertion, message.as_deref())
        else {
            debug!(
                "dropping result for {:?}: no identifier at its location",
                assertion.full_name.as_deref().unwrap_or("<unnamed>"),
            );
            return None;
        };

        let status = Status::from(assertion.status);
        let identifier = state.identifiers.get_mut(line)?;
        identifier.status = status;
        render_identifier(renderer, &self.file, identifier);

        match status {
            Status::Failed => {
                let diagnostic = self
                    .locator
                    .locate(message.as_deref().unwrap_or("test failed"), OwnerSpan::of(identifier));
                state.diagnostics.push(diagnostic);
                self.cascade_failed(&mut state.identifiers, line, renderer);
            }
            Status::Passed => self.cascade_passed(&mut state.identifiers, line, renderer),
            Status::Pending | Status::Loading => {}
        }

        Some(line)
    }

    /// Settles the cycle: every identifier the report left loading becomes
    /// pending, and the cycle's diagnostics are published.
    ///
    /// A suite whose children only partly ran stays pending too; cascading from
    /// the children already decided anything the report supports.
    pub fn finish_cycle(&self, state: &mut RunState, renderer: &mut dyn Renderer) {
        let mut settled = 0;
        for identifier in state.identifiers.iter_mut() {
            if identifier.status == Status::Loading {
                identifier.status = Status::Pending;
                render_identifier(renderer, &self.file, identifier);
                settled += 1;
            }
        }
        if settled > 0 {
            debug!(
                "settled {settled} loading {} in {} as pending",
                plural::identifiers_str(settled),
                self.file,
            );
        }

        renderer.set_diagnostics(&self.file, &state.diagnostics);
    }

    fn tracks(&self, name: Option<&str>) -> bool {
        match name {
            // Reports may carry absolute paths while the file was opened through
            // a relative one, or the other way around.
            Some(name) => {
                let name = Utf8Path::new(name);
                name == self.file.as_path() || name.ends_with(&self.file) || self.file.ends_with(name)
            }
            None => true,
        }
    }

    fn match_assertion(
        &self,
        identifiers: &IdentifierMap,
        assertion: &AssertionResult,
        message: Option<&str>,
    ) -> Option<usize> {
        if let Some(line) = assertion.declared_line().and_then(|line| line.checked_sub(1))
            && identifiers.contains(line)
        {
            return Some(line);
        }

        // The frame may point anywhere inside a test's body.
        let frame = self.locator.first_frame(message?)?;
        identifiers.innermost_containing(frame.line)
    }

    fn cascade_failed(&self, identifiers: &mut IdentifierMap, line: usize, renderer: &mut dyn Renderer) {
        let ancestors: Vec<usize> = identifiers.ancestors(line).collect();
        for ancestor in ancestors {
            let Some(identifier) = identifiers.get_mut(ancestor) else {
                break;
            };
            if identifier.status == Status::Failed {
                break;
            }
            identifier.status = Status::Failed;
            render_identifier(renderer, &self.file, identifier);
        }
    }

    fn cascade_passed(&self, identifiers: &mut IdentifierMap, line: usize, renderer: &mut dyn Renderer) {
        let ancestors: Vec<usize> = identifiers.ancestors(line).collect();
        for ancestor in ancestors {
            if identifiers.has_loading_child(ancestor) {
                break;
            }
            let Some(identifier) = identifiers.get_mut(ancestor) else {
                break;
            };
            if identifier.status.is_terminal() {
                break;
            }
            identifier.status = Status::Passed;
            render_identifier(renderer, &self.file, identifier);
        }
    }
}
