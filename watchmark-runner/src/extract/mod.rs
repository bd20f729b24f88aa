// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Building the [`IdentifierMap`](crate::identifier::IdentifierMap) for a file
//! from syntax-query captures.
//!
//! Extraction happens in two phases. The build phase walks the query matches
//! in order and registers one identifier per declaration line, linking each to
//! the root suite of its match. Since the query engine does not promise to
//! report parents before children, or `only` declarations before the siblings
//! they exclude, the correction phase then recomputes statuses over the
//! complete map.

mod imp;
mod only;
mod schema;

pub use imp::*;
pub use schema::*;
