// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::identifier::{IdentifierKind, Status};

/// Capture name for test declarations.
pub const TEST_CAPTURE: &str = "test";
/// Capture name for suites nested inside another suite.
pub const SUITE_CAPTURE: &str = "suite";
/// Capture name for file-level suites.
pub const ROOT_SUITE_CAPTURE: &str = "root_suite";
/// Suffix marking a parameterized-table declaration, e.g. `test.each`.
pub const EACH_SUFFIX: &str = "each";
/// Suffix marking an exclusive declaration, e.g. `test.only`.
pub const ONLY_SUFFIX: &str = "only";
/// Suffix marking a skipped declaration, e.g. `suite.skip`.
pub const SKIP_SUFFIX: &str = "skip";
/// Capture name for a table entry of a root-suite table.
pub const ARGS_CAPTURE: &str = "args";
/// Capture name for a table entry of a test or suite table.
pub const INNER_ARGS_CAPTURE: &str = "inner_args";

/// The static metadata a declaration capture carries.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeclarationRole {
    /// The kind of identifier the capture declares.
    pub kind: IdentifierKind,
    /// [`Status::Pending`] for skipped declarations, otherwise [`Status::Loading`].
    pub status: Status,
    /// True for exclusive declarations.
    pub only: bool,
}

/// What a capture means to the extractor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaptureRole {
    /// A test or suite declaration.
    Declaration(DeclarationRole),
    /// A parameterized-table declaration. Its identifiers are produced once
    /// table entries are seen.
    Each(DeclarationRole),
    /// A table entry belonging to a test or suite table.
    InnerArgs,
    /// A table entry belonging to a root-suite table.
    OuterArgs,
    /// Not relevant to extraction.
    Ignored,
}

impl CaptureRole {
    /// Resolves a capture name.
    ///
    /// Declaration names are `<kind>[.each][.only|.skip]`, with kind one of
    /// [`TEST_CAPTURE`], [`SUITE_CAPTURE`] or [`ROOT_SUITE_CAPTURE`]. Anything
    /// unrecognized is [`CaptureRole::Ignored`].
    pub fn from_name(name: &str) -> Self {
        match name {
            ARGS_CAPTURE => return Self::OuterArgs,
            INNER_ARGS_CAPTURE => return Self::InnerArgs,
            _ => {}
        }

        let mut parts = name.split('.');
        let kind = match parts.next() {
            Some(TEST_CAPTURE) => IdentifierKind::Test,
            Some(SUITE_CAPTURE) => IdentifierKind::Suite,
            Some(ROOT_SUITE_CAPTURE) => IdentifierKind::RootSuite,
            _ => return Self::Ignored,
        };

        let mut each = false;
        let mut only = false;
        let mut skip = false;
        for part in parts {
            match part {
                EACH_SUFFIX => each = true,
                ONLY_SUFFIX => only = true,
                SKIP_SUFFIX => skip = true,
                _ => return Self::Ignored,
            }
        }

        let role = DeclarationRole {
            kind,
            status: if skip { Status::Pending } else { Status::Loading },
            only,
        };
        if each {
            Self::Each(role)
        } else {
            Self::Declaration(role)
        }
    }
}

/// Capture roles resolved once for a query's capture names, indexed the same way.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CaptureSchema {
    roles: Vec<CaptureRole>,
}

impl CaptureSchema {
    /// Resolves every capture name.
    pub fn compile<S: AsRef<str>>(capture_names: &[S]) -> Self {
        let roles = capture_names
            .iter()
            .map(|name| CaptureRole::from_name(name.as_ref()))
            .collect();
        Self { roles }
    }

    /// Returns the role for the capture at `index`. Out-of-range indexes are
    /// [`CaptureRole::Ignored`].
    pub fn role(&self, index: u32) -> CaptureRole {
        self.roles
            .get(index as usize)
            .copied()
            .unwrap_or(CaptureRole::Ignored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn declaration(kind: IdentifierKind, status: Status, only: bool) -> DeclarationRole {
        DeclarationRole { kind, status, only }
    }

    #[test_case("test", CaptureRole::Declaration(declaration(IdentifierKind::Test, Status::Loading, false)) ; "test")]
    #[test_case("test.only", CaptureRole::Declaration(declaration(IdentifierKind::Test, Status::Loading, true)) ; "test only")]
    #[test_case("test.skip", CaptureRole::Declaration(declaration(IdentifierKind::Test, Status::Pending, false)) ; "test skip")]
    #[test_case("suite", CaptureRole::Declaration(declaration(IdentifierKind::Suite, Status::Loading, false)) ; "suite")]
    #[test_case("root_suite.only", CaptureRole::Declaration(declaration(IdentifierKind::RootSuite, Status::Loading, true)) ; "root suite only")]
    #[test_case("test.each", CaptureRole::Each(declaration(IdentifierKind::Test, Status::Loading, false)) ; "test each")]
    #[test_case("root_suite.each.skip", CaptureRole::Each(declaration(IdentifierKind::RootSuite, Status::Pending, false)) ; "root suite each skip")]
    #[test_case("args", CaptureRole::OuterArgs ; "args")]
    #[test_case("inner_args", CaptureRole::InnerArgs ; "inner args")]
    #[test_case("name", CaptureRole::Ignored ; "helper capture")]
    #[test_case("test.concurrent", CaptureRole::Ignored ; "unknown suffix")]
    fn from_name(name: &str, expected: CaptureRole) {
        assert_eq!(CaptureRole::from_name(name), expected);
    }

    #[test]
    fn compile_indexes_roles() {
        let schema = CaptureSchema::compile(&["root_suite", "name", "test.only"]);
        assert_eq!(
            schema.role(0),
            CaptureRole::Declaration(declaration(IdentifierKind::RootSuite, Status::Loading, false))
        );
        assert_eq!(schema.role(1), CaptureRole::Ignored);
        assert_eq!(
            schema.role(2),
            CaptureRole::Declaration(declaration(IdentifierKind::Test, Status::Loading, true))
        );
        assert_eq!(schema.role(3), CaptureRole::Ignored);
    }
}
