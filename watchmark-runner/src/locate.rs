// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding the failure point of a test inside its stack trace.

use crate::identifier::{Identifier, Position};
use camino::Utf8Path;
use regex::Regex;

/// A diagnostic attached to a position in the tracked file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    /// Where the diagnostic points.
    pub position: Position,
    /// The message to show.
    pub message: String,
}

impl Diagnostic {
    /// Creates a new diagnostic.
    pub fn new(position: Position, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// The lines a failure can be attributed to: an identifier's declaration line
/// through the end of its body.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct OwnerSpan {
    /// Where the diagnostic goes if no frame falls within the span.
    pub position: Position,
    /// The last line of the span.
    pub end_line: usize,
}

impl OwnerSpan {
    /// The span of `identifier`'s body.
    pub fn of(identifier: &Identifier) -> Self {
        Self {
            position: identifier.position,
            end_line: identifier.end_line.unwrap_or(identifier.position.line),
        }
    }

    /// The first line of the file, used for file-level failures.
    pub fn file_start() -> Self {
        Self {
            position: Position::new(0, 0),
            end_line: 0,
        }
    }

    fn contains(&self, line: usize) -> bool {
        (self.position.line..=self.end_line).contains(&line)
    }
}

/// Extracts stack-trace frames that point into one file.
#[derive(Clone, Debug)]
pub struct DiagnosticLocator {
    frame: Regex,
}

impl DiagnosticLocator {
    /// Creates a locator for frames referencing `file`'s basename.
    pub fn new(file: &Utf8Path) -> Self {
        let basename = file.file_name().unwrap_or(file.as_str());
        // The basename must start a path component: `(sum.test.js:1:2)`,
        // `/abs/sum.test.js:1:2` and `at sum.test.js:1:2` all match, but
        // `mysum.test.js:1:2` does not.
        let pattern = format!(
            r"(?:^|[\s(/\\]){}:(\d+):(\d+)",
            regex::escape(basename)
        );
        let frame = Regex::new(&pattern).expect("escaped basename always forms a valid regex");
        Self { frame }
    }

    /// Returns the 0-based position of the frame on `line`, if `line` is a frame
    /// in the tracked file.
    pub fn frame_position(&self, line: &str) -> Option<Position> {
        let captures = self.frame.captures(line)?;
        let frame_line: usize = captures[1].parse().ok()?;
        let frame_col: usize = captures[2].parse().ok()?;
        Some(Position::new(
            frame_line.saturating_sub(1),
            frame_col.saturating_sub(1),
        ))
    }

    /// Returns the first frame in `message` that points into the tracked file.
    pub fn first_frame(&self, message: &str) -> Option<Position> {
        message.lines().find_map(|line| self.frame_position(line))
    }

    /// Builds a diagnostic for a failure attributed to `owner`.
    ///
    /// The last frame within the owner's span decides the position. The message
    /// keeps the lines before the first such frame, minus trailing blank lines;
    /// everything from there on is stack trace. If no frame falls within the
    /// span, the diagnostic goes at the owner's declaration with the full message.
    pub fn locate(&self, message: &str, owner: OwnerSpan) -> Diagnostic {
        let mut kept: Vec<&str> = Vec::new();
        let mut best: Option<Position> = None;
        let mut accumulating = true;

        for line in message.lines() {
            let frame = self.frame_position(line);
            if best.is_some() && frame != best {
                accumulating = false;
            }
            if let Some(position) = frame.filter(|position| owner.contains(position.line)) {
                best = Some(position);
                continue;
            }
            if accumulating {
                kept.push(line);
            }
        }

        match best {
            Some(position) => {
                while kept.last().is_some_and(|line| line.trim().is_empty()) {
                    kept.pop();
                }
                Diagnostic::new(position, kept.join("\n"))
            }
            None => Diagnostic::new(owner.position, message),
        }
    }
}
