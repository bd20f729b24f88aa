// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `watchmark` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum WatchmarkExitCode {}

impl WatchmarkExitCode {
    /// No errors occurred and watchmark exited normally.
    pub const OK: i32 = 0;

    /// One or more tests failed in the reconciled results.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The watch process could not be spawned or its output could not be read.
    pub const WATCH_PROCESS_FAILED: i32 = 101;

    /// An input file (source, captures or output log) could not be read or parsed.
    pub const INPUT_READ_FAILED: i32 = 104;

    /// A user issue happened while setting up a watchmark invocation.
    pub const SETUP_ERROR: i32 = 96;

    /// Writing data to stdout or stderr produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
