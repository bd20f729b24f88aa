// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the data watchmark consumes.
//!
//! Two formats are described here:
//!
//! * [`RunReport`]: the JSON object a watch-mode test process prints once per
//!   run cycle.
//! * [`CaptureSet`]: the named captures a syntax-query engine yields for one
//!   source file. watchmark does not parse source code itself; an external
//!   collaborator evaluates the query and hands over a capture set.

mod captures;
mod exit_codes;
mod report;

pub use captures::*;
pub use exit_codes::*;
pub use report::*;
