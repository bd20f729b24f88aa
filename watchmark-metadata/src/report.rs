// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use serde::{Deserialize, Serialize};

/// The field whose presence marks the start of a [`RunReport`] among other
/// output on the watch process' stdout.
pub const REPORT_MARKER: &str = "numTotalTests";

/// A complete run report, printed once per run cycle by the watch process.
///
/// Only the fields watchmark reads are modeled; anything else in the payload is
/// ignored.
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// The total number of tests known to the run.
    #[serde(default)]
    pub num_total_tests: u64,

    /// The number of tests that failed.
    #[serde(default)]
    pub num_failed_tests: u64,

    /// Per-file results.
    #[serde(default)]
    pub test_results: Vec<FileResult>,
}

impl RunReport {
    /// Parses a report from a JSON string.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Results for a single test file within a [`RunReport`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    /// The path of the test file, if reported.
    #[serde(default)]
    pub name: Option<String>,

    /// A file-level message. Non-empty when the file failed to run at all, or
    /// when it contains failures (in which case it summarizes them).
    #[serde(default)]
    pub message: String,

    /// Results for each assertion (test case) in the file.
    #[serde(default)]
    pub assertion_results: Vec<AssertionResult>,
}

/// The outcome of a single test case.
#[derive(Clone, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    /// The reported status.
    pub status: AssertionStatus,

    /// The declaration position of the test, when location reporting is enabled.
    #[serde(default)]
    pub location: Option<Location>,

    /// Raw failure messages, including stack traces. Usually empty unless the
    /// test failed.
    #[serde(default)]
    pub failure_messages: Vec<String>,

    /// The full name of the test (suite titles followed by the test title).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl AssertionResult {
    /// Returns the 1-based declared line, if a location was reported.
    pub fn declared_line(&self) -> Option<usize> {
        self.location.map(|location| location.line)
    }

    /// Returns the first failure message, if any.
    pub fn first_failure_message(&self) -> Option<&str> {
        self.failure_messages.first().map(String::as_str)
    }
}

/// A 1-based line and column.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
pub struct Location {
    /// The 1-based line.
    pub line: usize,

    /// The column. Not used for matching.
    #[serde(default)]
    pub column: usize,
}

/// The status reported for an [`AssertionResult`].
#[derive(Clone, Copy, Debug, Deserialize, Serialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AssertionStatus {
    /// The test passed.
    Passed,

    /// The test failed.
    Failed,

    /// The test was not run.
    Pending,

    /// The test was skipped.
    Skipped,

    /// The test is a placeholder.
    Todo,

    /// The test was disabled.
    Disabled,

    /// A status watchmark does not know about.
    #[serde(other)]
    Unknown,
}
