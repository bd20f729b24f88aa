// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The interface to whatever displays statuses and diagnostics.
//!
//! watchmark does not draw anything itself. A host implements [`Renderer`] to put
//! status marks next to tests and to show diagnostics; [`RecordingRenderer`]
//! keeps everything in memory instead.

use crate::{
    identifier::{Identifier, IdentifierKind, Position, Status},
    locate::Diagnostic,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;

/// An opaque handle to a visual mark created by a [`Renderer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MarkHandle(u64);

impl MarkHandle {
    /// Creates a handle from a renderer-specific id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the renderer-specific id.
    pub const fn id(self) -> u64 {
        self.0
    }
}

/// A request to create or update the mark for one identifier.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MarkRequest {
    /// Where to draw the mark.
    pub position: Position,
    /// The declaration line of the identifier the mark belongs to.
    pub identifier_line: usize,
    /// The identifier's kind.
    pub kind: IdentifierKind,
    /// The status to show.
    pub status: Status,
    /// The handle of the existing mark, if one was created before.
    pub handle: Option<MarkHandle>,
}

impl MarkRequest {
    /// Builds a request reflecting the current state of `identifier`.
    pub fn for_identifier(identifier: &Identifier) -> Self {
        Self {
            position: identifier.render_position(),
            identifier_line: identifier.line(),
            kind: identifier.kind,
            status: identifier.status,
            handle: identifier.render_handle,
        }
    }
}

/// Displays statuses and diagnostics for tracked files.
pub trait Renderer {
    /// Creates or updates a status mark. If `request.handle` is set, the existing
    /// mark should be updated in place and the same handle returned.
    fn update_mark(&mut self, file: &Utf8Path, request: &MarkRequest) -> MarkHandle;

    /// Replaces the diagnostics shown for `file`.
    fn set_diagnostics(&mut self, file: &Utf8Path, diagnostics: &[Diagnostic]);

    /// Removes all marks and diagnostics for `file`.
    fn clear(&mut self, file: &Utf8Path);
}

/// Creates or updates the mark for `identifier` and stores the returned handle.
pub fn render_identifier(renderer: &mut dyn Renderer, file: &Utf8Path, identifier: &mut Identifier) {
    let handle = renderer.update_mark(file, &MarkRequest::for_identifier(identifier));
    identifier.render_handle = Some(handle);
}

/// A [`Renderer`] that records everything in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    next_id: u64,
    marks: BTreeMap<MarkHandle, (Utf8PathBuf, MarkRequest)>,
    diagnostics: BTreeMap<Utf8PathBuf, Vec<Diagnostic>>,
    update_count: usize,
}

impl RecordingRenderer {
    /// Creates an empty renderer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest request recorded for the identifier declared at `line`.
    pub fn mark_for_line(&self, file: &Utf8Path, line: usize) -> Option<&MarkRequest> {
        self.marks
            .values()
            .find(|(mark_file, request)| mark_file == file && request.identifier_line == line)
            .map(|(_, request)| request)
    }

    /// Iterates over all live marks for `file`.
    pub fn marks<'a>(&'a self, file: &'a Utf8Path) -> impl Iterator<Item = &'a MarkRequest> + 'a {
        self.marks
            .values()
            .filter(move |(mark_file, _)| mark_file == file)
            .map(|(_, request)| request)
    }

    /// Returns the number of live marks across all files.
    pub fn mark_count(&self) -> usize {
        self.marks.len()
    }

    /// Returns the diagnostics last set for `file`.
    pub fn diagnostics(&self, file: &Utf8Path) -> &[Diagnostic] {
        self.diagnostics.get(file).map_or(&[], Vec::as_slice)
    }

    /// Returns the number of times [`Renderer::update_mark`] was called.
    pub fn update_count(&self) -> usize {
        self.update_count
    }
}

impl Renderer for RecordingRenderer {
    fn update_mark(&mut self, file: &Utf8Path, request: &MarkRequest) -> MarkHandle {
        self.update_count += 1;
        let handle = match request.handle {
            Some(handle) if self.marks.contains_key(&handle) => handle,
            _ => {
                self.next_id += 1;
                MarkHandle::new(self.next_id)
            }
        };
        let mut request = request.clone();
        request.handle = Some(handle);
        self.marks.insert(handle, (file.to_owned(), request));
        handle
    }

    fn set_diagnostics(&mut self, file: &Utf8Path, diagnostics: &[Diagnostic]) {
        self.diagnostics.insert(file.to_owned(), diagnostics.to_vec());
    }

    fn clear(&mut self, file: &Utf8Path) {
        self.marks
            .retain(|_, (mark_file, _)| mark_file.as_path() != file);
        self.diagnostics.remove(file);
    }
}
