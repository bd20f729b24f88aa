// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for watchmark.
//!
//! The basic flow of operations:
//!
//! 1. [`extract`] turns the syntax-query captures for a test file into an
//!    [`IdentifierMap`](identifier::IdentifierMap): one node per test or suite,
//!    keyed by declaration line, with only/skip semantics already applied.
//! 2. A [`WatchProcess`](supervisor::WatchProcess) runs the test runner in watch
//!    mode and streams its output lines back to the host.
//! 3. The [`FrameAssembler`](frame::FrameAssembler) picks complete run reports
//!    out of that output.
//! 4. The [`Reconciler`](reconcile::Reconciler) maps each reported assertion back
//!    onto an identifier, cascades statuses to ancestors and builds diagnostics
//!    using the [`DiagnosticLocator`](locate::DiagnosticLocator).
//!
//! [`RunSession`](session::RunSession) and
//! [`SessionRegistry`](session::SessionRegistry) tie these together per tracked
//! file.

pub mod config;
pub mod errors;
pub mod extract;
pub mod frame;
mod helpers;
pub mod identifier;
pub mod locate;
pub mod reconcile;
pub mod render;
pub mod session;
pub mod signal;
pub mod supervisor;
