// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

mod fixtures;
mod scenarios;
#[cfg(unix)]
mod supervisor;
