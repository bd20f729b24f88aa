// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::identifier::{IdentifierMap, Status};

/// Recomputes statuses once the whole file has been seen.
///
/// While building, an identifier registered before the first `only` in the file
/// can't know it is excluded, and a suite registered before its exclusive child
/// can't know it stays eligible. With every `only` flag in place, an identifier is
/// pending if it is skipped, or if the file has an `only` and neither the
/// identifier, one of its descendants, nor its parent is marked `only`.
pub(super) fn correct_statuses(map: &mut IdentifierMap, saw_only: bool) {
    if !saw_only {
        return;
    }

    let statuses: Vec<(usize, Status)> = map
        .iter()
        .map(|identifier| {
            let parent_only = identifier
                .parent
                .and_then(|parent| map.get(parent))
                .is_some_and(|parent| parent.only);
            let excluded = !identifier.only && !identifier.has_only && !parent_only;
            let status = if identifier.skipped || excluded {
                Status::Pending
            } else {
                Status::Loading
            };
            (identifier.line(), status)
        })
        .collect();

    for (line, status) in statuses {
        if let Some(identifier) = map.get_mut(line) {
            identifier.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{Identifier, IdentifierKind, Position};
    use pretty_assertions::assert_eq;

    fn node(line: usize, parent: Option<usize>, status: Status) -> Identifier {
        Identifier {
            parent,
            status,
            ..Identifier::new(IdentifierKind::Test, Position::new(line, 0), Some(line))
        }
    }

    #[test]
    fn untouched_without_only() {
        let mut map: IdentifierMap = [node(0, None, Status::Pending), node(1, None, Status::Loading)]
            .into_iter()
            .collect();
        let before = map.clone();
        correct_statuses(&mut map, false);
        assert_eq!(map, before);
    }

    #[test]
    fn ancestors_of_only_are_restored() {
        let mut map: IdentifierMap = [
            Identifier {
                has_only: true,
                ..node(0, None, Status::Pending)
            },
            Identifier {
                only: true,
                has_only: true,
                ..node(1, Some(0), Status::Loading)
            },
            node(2, Some(0), Status::Loading),
            Identifier {
                skipped: true,
                ..node(3, Some(1), Status::Pending)
            },
            node(4, Some(1), Status::Pending),
        ]
        .into_iter()
        .collect();

        correct_statuses(&mut map, true);
        let statuses: Vec<_> = map.iter().map(|identifier| identifier.status).collect();
        assert_eq!(
            statuses,
            vec![
                Status::Loading,
                Status::Loading,
                Status::Pending,
                Status::Pending,
                Status::Loading,
            ]
        );
    }
}
