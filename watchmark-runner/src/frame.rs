// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reassembling run reports from the watch process' stdout.
//!
//! The watch process prints one JSON report per run, mixed in with progress
//! and log output, and the report may arrive split across several chunks.

use serde_json::error::Category;
use tracing::{debug, warn};
use watchmark_metadata::{REPORT_MARKER, RunReport};

/// Accumulates stdout chunks until they form a complete [`RunReport`].
#[derive(Clone, Debug)]
pub struct FrameAssembler {
    marker: String,
    buf: String,
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAssembler {
    /// Creates an assembler that recognizes reports by [`REPORT_MARKER`].
    pub fn new() -> Self {
        Self::with_marker(REPORT_MARKER)
    }

    /// Creates an assembler that recognizes the start of a report as a chunk
    /// beginning with `{` and containing `marker`.
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            buf: String::new(),
        }
    }

    /// Returns true if a report has started but is not complete yet.
    pub fn is_accumulating(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Discards any partially accumulated report.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Feeds one chunk of output.
    ///
    /// Returns a report once the accumulated chunks parse. Chunks are joined
    /// as-is, so a report split at arbitrary byte boundaries is reassembled
    /// exactly. Chunks seen while no report is in progress and that don't start
    /// one are discarded. A chunk that starts a report replaces whatever was
    /// accumulated before it.
    pub fn push(&mut self, chunk: &str) -> Option<RunReport> {
        if self.starts_report(chunk) {
            if self.is_accumulating() {
                warn!(
                    "discarding incomplete run report ({} bytes): a new report started",
                    self.buf.len()
                );
                self.buf.clear();
            }
        } else if !self.is_accumulating() {
            return None;
        }

        self.buf.push_str(chunk);
        match serde_json::from_str::<RunReport>(&self.buf) {
            Ok(report) => {
                debug!(
                    "assembled run report ({} bytes, {} total tests)",
                    self.buf.len(),
                    report.num_total_tests
                );
                self.buf.clear();
                Some(report)
            }
            // A complete object of the wrong shape can't be fixed by more input.
            Err(error) if error.classify() == Category::Data => {
                warn!(
                    "discarding malformed run report ({} bytes): {error}",
                    self.buf.len()
                );
                self.buf.clear();
                None
            }
            // Not complete yet. A prefix cut inside a number (`-`, `1.`, `1e`) is
            // a syntax error rather than an EOF error, so both keep accumulating
            // until the report completes or a new one starts.
            Err(_) => None,
        }
    }

    fn starts_report(&self, chunk: &str) -> bool {
        chunk.trim_start().starts_with('{') && chunk.contains(&self.marker)
    }
}
