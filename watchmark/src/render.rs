// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Status lines on a terminal.

use camino::{Utf8Path, Utf8PathBuf};
use owo_colors::{OwoColorize, Style, style};
use std::{
    collections::BTreeMap,
    io::{self, Write},
};
use swrite::{SWrite, swrite};
use watchmark_runner::{
    identifier::Status,
    locate::Diagnostic,
    reconcile::RunState,
    render::{MarkHandle, MarkRequest, Renderer},
};

#[derive(Debug, Default)]
pub(crate) struct RenderStyles {
    passed: Style,
    failed: Style,
    pending: Style,
    loading: Style,
    location: Style,
}

impl RenderStyles {
    pub(crate) fn colorize(&mut self) {
        self.passed = style().green().bold();
        self.failed = style().red().bold();
        self.pending = style().yellow();
        self.loading = style().dimmed();
        self.location = style().bold();
    }

    fn status(&self, status: Status) -> Style {
        match status {
            Status::Passed => self.passed,
            Status::Failed => self.failed,
            Status::Pending => self.pending,
            Status::Loading => self.loading,
        }
    }
}

fn status_label(status: Status) -> &'static str {
    match status {
        Status::Passed => "PASS",
        Status::Failed => "FAIL",
        Status::Pending => "SKIP",
        Status::Loading => "RUN",
    }
}

/// A [`Renderer`] that prints a line whenever a mark changes status.
///
/// Marks are identified by the handles this renderer hands out, so a status
/// that is reported again unchanged is not printed twice. Write errors are kept
/// and surfaced through [`take_error`](Self::take_error), since the renderer
/// interface cannot fail.
pub(crate) struct TerminalRenderer<W> {
    writer: W,
    styles: RenderStyles,
    show_loading: bool,
    next_id: u64,
    shown: BTreeMap<(Utf8PathBuf, MarkHandle), Status>,
    error: Option<io::Error>,
}

impl<W: Write> TerminalRenderer<W> {
    pub(crate) fn new(writer: W, styles: RenderStyles, show_loading: bool) -> Self {
        Self {
            writer,
            styles,
            show_loading,
            next_id: 0,
            shown: BTreeMap::new(),
            error: None,
        }
    }

    /// Returns the first write error since the last call, if any.
    pub(crate) fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Prints every identifier and diagnostic in `state`.
    pub(crate) fn write_state(&mut self, file: &Utf8Path, state: &RunState) {
        for identifier in state.identifiers.iter() {
            self.write_mark(file, &MarkRequest::for_identifier(identifier));
        }
        self.set_diagnostics(file, &state.diagnostics);
    }

    fn write_mark(&mut self, file: &Utf8Path, request: &MarkRequest) {
        let indent = if request.kind.is_suite() { "" } else { "  " };
        let label = format!("{:>4}", status_label(request.status));
        let mut line = String::new();
        swrite!(
            line,
            "{} {indent}{}:{} {}",
            label.style(self.styles.status(request.status)),
            file.style(self.styles.location),
            request.identifier_line + 1,
            request.kind.as_str(),
        );
        self.emit(&line);
    }

    fn emit(&mut self, line: &str) {
        let result = writeln!(self.writer, "{line}").and_then(|()| self.writer.flush());
        if let Err(error) = result
            && self.error.is_none()
        {
            self.error = Some(error);
        }
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn update_mark(&mut self, file: &Utf8Path, request: &MarkRequest) -> MarkHandle {
        let handle = request.handle.unwrap_or_else(|| {
            self.next_id += 1;
            MarkHandle::new(self.next_id)
        });

        let previous = self.shown.insert((file.to_owned(), handle), request.status);
        let visible = self.show_loading || request.status != Status::Loading;
        if previous != Some(request.status) && visible {
            self.write_mark(file, request);
        }
        handle
    }

    fn set_diagnostics(&mut self, file: &Utf8Path, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            let mut text = String::new();
            swrite!(
                text,
                "{} {}:{}:{}",
                "error".style(self.styles.failed),
                file.style(self.styles.location),
                diagnostic.position.line + 1,
                diagnostic.position.col + 1,
            );
            for line in diagnostic.message.lines() {
                if line.is_empty() {
                    text.push('\n');
                } else {
                    swrite!(text, "\n    {line}");
                }
            }
            self.emit(&text);
        }
    }

    fn clear(&mut self, file: &Utf8Path) {
        self.shown.retain(|(shown_file, _), _| shown_file != file);
    }
}
