// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live test statuses for JavaScript test files.
//!
//! `watchmark watch` keeps a watch-mode test runner going for one test file and
//! prints a status line whenever a test or suite changes state.
//! `watchmark reconcile` does the same for a recorded runner output, once.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod render;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
