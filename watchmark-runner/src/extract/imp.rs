// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    only::correct_statuses,
    schema::{CaptureRole, CaptureSchema, DeclarationRole},
};
use crate::identifier::{Identifier, IdentifierKind, IdentifierMap, Position, Status};
use tracing::debug;
use watchmark_metadata::{CaptureSet, QueryMatch, SourceRange};

/// Builds the identifier map for a file from its capture set.
///
/// This is a pure function of the captures: running it twice on the same input
/// produces the same map.
pub fn extract(captures: &CaptureSet) -> IdentifierMap {
    let schema = CaptureSchema::compile(&captures.capture_names);
    let mut builder = MapBuilder::default();
    for query_match in &captures.matches {
        builder.add_match(&schema, query_match);
    }
    builder.finish()
}

#[derive(Debug, Default)]
struct MapBuilder {
    map: IdentifierMap,
    // Set once any `only` declaration has been registered.
    saw_only: bool,
}

impl MapBuilder {
    fn add_match(&mut self, schema: &CaptureSchema, query_match: &QueryMatch) {
        let mut scope = MatchScope::default();

        for capture in &query_match.captures {
            match schema.role(capture.index) {
                CaptureRole::Declaration(role) => {
                    let identifier = declaration(role, capture.range);
                    self.register(&mut scope, identifier);
                }
                CaptureRole::Each(role) => {
                    let identifier = declaration(role, capture.range);
                    scope.stash_each(identifier);
                }
                CaptureRole::InnerArgs => {
                    let entry = Position::from(capture.range.start);
                    match scope.inner_variant(entry) {
                        Some(variant) => self.register(&mut scope, variant),
                        None => debug!("inner table entry at {entry} has no table declaration"),
                    }
                }
                CaptureRole::OuterArgs => {
                    let entry = Position::from(capture.range.start);
                    match scope.root_variant(entry) {
                        Some(variant) => self.register(&mut scope, variant),
                        None => debug!("table entry at {entry} has no root table declaration"),
                    }
                }
                CaptureRole::Ignored => {}
            }
        }

        // Tables without any entries still show up, as their declarations.
        for decl in scope.take_unmerged_each() {
            let is_root = decl.kind == IdentifierKind::RootSuite;
            let line = decl.line();
            self.insert(decl, scope.parent);
            if is_root && scope.parent.is_none() {
                scope.parent = Some(line);
            }
        }

        // The parent of held identifiers is known now.
        for identifier in std::mem::take(&mut scope.holding) {
            self.insert(identifier, scope.parent);
        }
    }

    fn register(&mut self, scope: &mut MatchScope, identifier: Identifier) {
        if scope.root_each_unresolved() {
            scope.holding.push(identifier);
            return;
        }

        let line = identifier.line();
        let is_root = identifier.kind == IdentifierKind::RootSuite;
        self.insert(identifier, scope.parent);
        if is_root && scope.parent.is_none() {
            scope.parent = Some(line);
        }
    }

    fn insert(&mut self, mut identifier: Identifier, parent: Option<usize>) {
        let line = identifier.line();
        // An identifier is never its own parent.
        let parent = parent.filter(|&parent| parent != line);
        let parent_info = parent
            .and_then(|parent| self.map.get(parent))
            .map(|parent| (parent.status, parent.skipped, parent.only));

        match self.map.get_mut(line) {
            None => {
                if let Some((parent_status, parent_skipped, parent_only)) = parent_info {
                    identifier.skipped |= parent_skipped;
                    if parent_status == Status::Pending {
                        identifier.status = Status::Pending;
                    }
                    if self.saw_only && !identifier.only && !parent_only {
                        identifier.status = Status::Pending;
                    }
                } else if self.saw_only && !identifier.only {
                    identifier.status = Status::Pending;
                }
                identifier.parent = parent;

                let only = identifier.only;
                if only {
                    identifier.has_only = true;
                }
                self.map.insert(identifier);
                if only {
                    self.saw_only = true;
                    self.propagate_has_only(line);
                }
            }
            Some(existing) => {
                if existing.parent.is_none() && parent.is_some() {
                    existing.parent = parent;
                    if let Some((_, parent_skipped, _)) = parent_info {
                        existing.skipped |= parent_skipped;
                    }
                    if existing.only {
                        self.propagate_has_only(line);
                    }
                }
            }
        }
    }

    fn propagate_has_only(&mut self, line: usize) {
        let ancestors: Vec<usize> = self.map.ancestors(line).collect();
        for ancestor in ancestors {
            if let Some(identifier) = self.map.get_mut(ancestor) {
                identifier.has_only = true;
            }
        }
    }

    fn finish(mut self) -> IdentifierMap {
        correct_statuses(&mut self.map, self.saw_only);
        self.map
    }
}

/// Per-match state. Reset for every match.
#[derive(Debug, Default)]
struct MatchScope {
    // The first root suite registered in this match.
    parent: Option<usize>,
    each_test: Option<EachSlot>,
    each_suite: Option<EachSlot>,
    each_root: Option<EachSlot>,
    // Which of the test and suite tables was declared last.
    last_inner: Option<IdentifierKind>,
    // Identifiers whose parent is a root table that has no entry yet.
    holding: Vec<Identifier>,
}

#[derive(Debug)]
struct EachSlot {
    decl: Identifier,
    merged: bool,
}

impl MatchScope {
    fn stash_each(&mut self, decl: Identifier) {
        let kind = decl.kind;
        let slot = Some(EachSlot {
            decl,
            merged: false,
        });
        match kind {
            IdentifierKind::Test => self.each_test = slot,
            IdentifierKind::Suite => self.each_suite = slot,
            IdentifierKind::RootSuite => self.each_root = slot,
        }
        if kind != IdentifierKind::RootSuite {
            self.last_inner = Some(kind);
        }
    }

    fn root_each_unresolved(&self) -> bool {
        self.each_root.as_ref().is_some_and(|slot| !slot.merged)
    }

    fn inner_variant(&mut self, entry: Position) -> Option<Identifier> {
        let slot = match self.last_inner? {
            IdentifierKind::Test => self.each_test.as_mut(),
            IdentifierKind::Suite => self.each_suite.as_mut(),
            IdentifierKind::RootSuite => None,
        }?;
        slot.merged = true;
        Some(slot.decl.table_variant(entry))
    }

    fn root_variant(&mut self, entry: Position) -> Option<Identifier> {
        let slot = self.each_root.as_mut()?;
        slot.merged = true;
        Some(slot.decl.table_variant(entry))
    }

    fn take_unmerged_each(&mut self) -> Vec<Identifier> {
        // Root first so that the other tables can hang off it.
        [
            self.each_root.take(),
            self.each_suite.take(),
            self.each_test.take(),
        ]
        .into_iter()
        .flatten()
        .filter(|slot| !slot.merged)
        .map(|slot| slot.decl)
        .collect()
    }
}

fn declaration(role: DeclarationRole, range: SourceRange) -> Identifier {
    let mut identifier = Identifier::new(role.kind, range.start.into(), Some(range.end.row));
    identifier.only = role.only;
    identifier.skipped = role.status == Status::Pending;
    identifier.status = role.status;
    identifier
}
