// Copyright (c) The watchmark Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for watchmark-runner.

use std::borrow::Cow;

/// Removes ANSI escape sequences, such as colors, from `s`.
pub(crate) fn strip_ansi(s: &str) -> Cow<'_, str> {
    // Most messages carry no escapes at all.
    if !s.contains('\u{1b}') {
        return Cow::Borrowed(s);
    }
    Cow::Owned(strip_ansi_escapes::strip_str(s))
}

/// Decodes one line of process output, dropping the line terminator.
pub(crate) fn decode_line(bytes: &[u8]) -> String {
    let line = String::from_utf8_lossy(bytes);
    line.trim_end_matches(['\n', '\r']).to_owned()
}

pub(crate) mod plural {
    /// Returns "identifier" if `count` is 1, otherwise "identifiers".
    pub(crate) fn identifiers_str(count: usize) -> &'static str {
        if count == 1 { "identifier" } else { "identifiers" }
    }
}
