// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests and suites found in a source file, and their live status.

use crate::render::MarkHandle;
use std::{collections::BTreeMap, fmt};
use watchmark_metadata::{AssertionStatus, Point};

/// A 0-based line and column.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Position {
    /// The 0-based line.
    pub line: usize,
    /// The 0-based column.
    pub col: usize,
}

impl Position {
    /// Creates a new position.
    pub const fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

impl From<Point> for Position {
    fn from(point: Point) -> Self {
        Self::new(point.row, point.column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Displayed 1-based, the way editors and stack traces show positions.
        write!(f, "{}:{}", self.line + 1, self.col + 1)
    }
}

/// The kind of an [`Identifier`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum IdentifierKind {
    /// A single test case.
    Test,
    /// A suite nested inside another suite.
    Suite,
    /// A file-level suite.
    RootSuite,
}

impl IdentifierKind {
    /// Returns true for [`Self::Suite`] and [`Self::RootSuite`].
    pub fn is_suite(self) -> bool {
        matches!(self, Self::Suite | Self::RootSuite)
    }

    /// Returns a short name for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Suite => "suite",
            Self::RootSuite => "root suite",
        }
    }
}

/// The status of an [`Identifier`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Status {
    /// Statically known to be skipped, or excluded by an `only` elsewhere.
    Pending,
    /// Waiting for a run result.
    Loading,
    /// The test, or every test that ran in the suite, passed.
    Passed,
    /// The test, or some test in the suite, failed.
    Failed,
}

impl Status {
    /// Returns true for [`Self::Passed`] and [`Self::Failed`].
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed)
    }

    /// Returns a short name for this status.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Passed => "passed",
            Self::Failed => "failed",
        }
    }
}

impl From<AssertionStatus> for Status {
    fn from(status: AssertionStatus) -> Self {
        match status {
            AssertionStatus::Passed => Self::Passed,
            AssertionStatus::Failed => Self::Failed,
            AssertionStatus::Pending
            | AssertionStatus::Skipped
            | AssertionStatus::Todo
            | AssertionStatus::Disabled
            | AssertionStatus::Unknown => Self::Pending,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A test or suite declared in a source file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Identifier {
    /// The declaration position. `position.line` is unique within a file.
    pub position: Position,
    /// The last line of the body, if known.
    pub end_line: Option<usize>,
    /// What kind of node this is.
    pub kind: IdentifierKind,
    /// True if this node was explicitly marked `only`.
    pub only: bool,
    /// True if this node or one of its descendants is marked `only`.
    pub has_only: bool,
    /// True if this node or its parent was explicitly marked `skip`.
    pub skipped: bool,
    /// The current status.
    pub status: Status,
    /// The declaration line of the owning suite.
    pub parent: Option<usize>,
    /// For a parameterized-table variant, the position of the table declaration.
    /// Status is rendered there rather than at the table entry.
    pub above: Option<Position>,
    /// The visual mark created for this node, reused across updates.
    pub render_handle: Option<MarkHandle>,
}

impl Identifier {
    /// Creates a new identifier with no parent and no `only` markers.
    pub fn new(kind: IdentifierKind, position: Position, end_line: Option<usize>) -> Self {
        Self {
            position,
            end_line,
            kind,
            only: false,
            has_only: false,
            skipped: false,
            status: Status::Loading,
            parent: None,
            above: None,
            render_handle: None,
        }
    }

    /// The declaration line.
    #[inline]
    pub fn line(&self) -> usize {
        self.position.line
    }

    /// The position status should be rendered at.
    pub fn render_position(&self) -> Position {
        self.above.unwrap_or(self.position)
    }

    /// Returns true if `line` lies within this node's body.
    pub fn contains_line(&self, line: usize) -> bool {
        let end_line = self.end_line.unwrap_or(self.position.line);
        (self.position.line..=end_line).contains(&line)
    }

    /// Creates a variant of this parameterized declaration for the table entry at
    /// `entry`.
    ///
    /// The variant takes its position from the entry and everything else from the
    /// declaration, and renders at the declaration.
    pub fn table_variant(&self, entry: Position) -> Self {
        Self {
            position: entry,
            end_line: self.end_line.map(|end_line| end_line.max(entry.line)),
            parent: None,
            above: Some(self.position),
            render_handle: None,
            ..self.clone()
        }
    }
}

/// All identifiers in a file, keyed by declaration line.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IdentifierMap {
    map: BTreeMap<usize, Identifier>,
}

impl IdentifierMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of identifiers.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if there are no identifiers.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns true if an identifier is declared at `line`.
    pub fn contains(&self, line: usize) -> bool {
        self.map.contains_key(&line)
    }

    /// Returns the identifier declared at `line`.
    pub fn get(&self, line: usize) -> Option<&Identifier> {
        self.map.get(&line)
    }

    /// Returns the identifier declared at `line` mutably.
    pub fn get_mut(&mut self, line: usize) -> Option<&mut Identifier> {
        self.map.get_mut(&line)
    }

    /// Inserts an identifier, replacing any identifier on the same line.
    pub fn insert(&mut self, identifier: Identifier) -> Option<Identifier> {
        self.map.insert(identifier.line(), identifier)
    }

    /// Iterates over identifiers in line order.
    pub fn iter(&self) -> impl Iterator<Item = &Identifier> + '_ {
        self.map.values()
    }

    /// Iterates mutably over identifiers in line order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Identifier> + '_ {
        self.map.values_mut()
    }

    /// Iterates over declaration lines in order.
    pub fn lines(&self) -> impl Iterator<Item = usize> + '_ {
        self.map.keys().copied()
    }

    /// Iterates over the lines of the ancestors of the identifier at `line`,
    /// nearest first.
    ///
    /// The walk is bounded by the number of identifiers, so a malformed parent
    /// cycle cannot loop forever.
    pub fn ancestors(&self, line: usize) -> Ancestors<'_> {
        Ancestors {
            map: self,
            next: self.get(line).and_then(|identifier| identifier.parent),
            remaining: self.len(),
        }
    }

    /// Iterates over the direct children of the identifier at `line`.
    pub fn children(&self, line: usize) -> impl Iterator<Item = &Identifier> + '_ {
        self.map
            .values()
            .filter(move |identifier| identifier.parent == Some(line))
    }

    /// Returns true if any direct child of the identifier at `line` is still loading.
    pub fn has_loading_child(&self, line: usize) -> bool {
        self.children(line)
            .any(|child| child.status == Status::Loading)
    }

    /// Returns the line of the innermost identifier whose body contains `line`.
    ///
    /// Bodies nest, so the innermost one is the one declared last.
    pub fn innermost_containing(&self, line: usize) -> Option<usize> {
        self.map
            .range(..=line)
            .rev()
            .find(|(_, identifier)| identifier.contains_line(line))
            .map(|(&line, _)| line)
    }

    /// Copies render handles over from `previous` for identifiers declared on the
    /// same line, so existing marks get reused.
    pub fn carry_render_handles(&mut self, previous: &IdentifierMap) {
        for (line, identifier) in &mut self.map {
            if let Some(old) = previous.get(*line) {
                identifier.render_handle = old.render_handle;
            }
        }
    }
}

impl FromIterator<Identifier> for IdentifierMap {
    fn from_iter<T: IntoIterator<Item = Identifier>>(iter: T) -> Self {
        let mut map = Self::new();
        for identifier in iter {
            map.insert(identifier);
        }
        map
    }
}

/// Iterator over ancestor lines, returned by [`IdentifierMap::ancestors`].
#[derive(Debug)]
pub struct Ancestors<'a> {
    map: &'a IdentifierMap,
    next: Option<usize>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let line = self.next.take()?;
        self.next = self.map.get(line).and_then(|identifier| identifier.parent);
        Some(line)
    }
}
