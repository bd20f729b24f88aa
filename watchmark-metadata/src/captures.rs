// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

/// The result of evaluating a syntax query against one source file.
///
/// Mirrors the shape of a compiled tree query: capture names are listed once,
/// and each match refers to them by index.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct CaptureSet {
    /// The capture names declared by the query, indexed by [`Capture::index`].
    pub capture_names: Vec<String>,

    /// Matches in the order the query engine produced them.
    #[serde(default)]
    pub matches: Vec<QueryMatch>,
}

impl CaptureSet {
    /// Parses a capture set from a JSON string.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A single query match: a group of captures that matched one pattern.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct QueryMatch {
    /// The pattern within the query that matched.
    #[serde(default)]
    pub pattern_index: usize,

    /// The captured nodes, in document order.
    pub captures: Vec<Capture>,
}

/// A captured syntax node.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Capture {
    /// Index into [`CaptureSet::capture_names`].
    pub index: u32,

    /// The range the node spans.
    pub range: SourceRange,
}

/// A range of source text, as 0-based rows and columns.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct SourceRange {
    /// The first position of the node.
    pub start: Point,

    /// The position just past the node.
    pub end: Point,
}

/// A 0-based row and column.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq, Ord, PartialOrd)]
pub struct Point {
    /// The 0-based row.
    pub row: usize,

    /// The 0-based column.
    pub column: usize,
}

impl Point {
    /// Creates a new point.
    pub const fn new(row: usize, column: usize) -> Self {
        Self { row, column }
    }
}
