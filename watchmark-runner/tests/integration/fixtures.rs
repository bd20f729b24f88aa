// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use maplit::btreemap;
use std::{collections::BTreeMap, sync::Once};
use watchmark_metadata::{Capture, CaptureSet, Point, QueryMatch, SourceRange};
use watchmark_runner::identifier::{IdentifierMap, Status};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        // Installing twice fails, which only happens if another test already did.
        _ = color_eyre::install();
        _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// A captured node: its capture name, declaration row and column, and last row.
pub(crate) type Node = (&'static str, usize, usize, usize);

/// Builds a capture set the way a syntax query over the fixture would report it.
#[derive(Default)]
pub(crate) struct CaptureSetBuilder {
    names: Vec<&'static str>,
    matches: Vec<QueryMatch>,
}

impl CaptureSetBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_match(mut self, nodes: &[Node]) -> Self {
        let captures = nodes
            .iter()
            .map(|&(name, row, column, end_row)| Capture {
                index: self.index(name),
                range: SourceRange {
                    start: Point::new(row, column),
                    end: Point::new(end_row, column + 2),
                },
            })
            .collect();
        self.matches.push(QueryMatch {
            pattern_index: 0,
            captures,
        });
        self
    }

    pub(crate) fn build(self) -> CaptureSet {
        CaptureSet {
            capture_names: self.names.into_iter().map(str::to_owned).collect(),
            matches: self.matches,
        }
    }

    fn index(&mut self, name: &'static str) -> u32 {
        let index = match self.names.iter().position(|&known| known == name) {
            Some(index) => index,
            None => {
                self.names.push(name);
                self.names.len() - 1
            }
        };
        index as u32
    }
}

/// ```js
/// describe("A", () => {     // 0
///   test("a", () => {       // 1
///     expect(1).toBe(1);
///   });                     // 3
///   test("b", () => {       // 4
///     expect(2).toBe(2);
///   });                     // 6
/// });                       // 7
/// ```
pub(crate) fn two_tests() -> CaptureSet {
    CaptureSetBuilder::new()
        .add_match(&[("root_suite", 0, 0, 7), ("name", 0, 9, 0), ("test", 1, 2, 3)])
        .add_match(&[("root_suite", 0, 0, 7), ("name", 0, 9, 0), ("test", 4, 2, 6)])
        .build()
}

pub(crate) fn statuses(identifiers: &IdentifierMap) -> BTreeMap<usize, Status> {
    identifiers
        .iter()
        .map(|identifier| (identifier.line(), identifier.status))
        .collect()
}

pub(crate) fn all_loading(lines: &[usize]) -> BTreeMap<usize, Status> {
    lines.iter().map(|&line| (line, Status::Loading)).collect()
}

pub(crate) fn two_tests_statuses(a: Status, b: Status, suite: Status) -> BTreeMap<usize, Status> {
    btreemap! {
        0 => suite,
        1 => a,
        4 => b,
    }
}
