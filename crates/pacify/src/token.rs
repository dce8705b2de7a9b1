// Copyright (c) Contributors to the Pacify project.
// SPDX-License-Identifier: Apache-2.0

//! Placeholder token scanning and substitution.

use std::ops::Range;

#[cfg(test)]
#[path = "./token_test.rs"]
mod token_test;

/// The begin/end delimiter pair bracketing a placeholder identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tokens {
    pub begin: String,
    pub end: String,
}

impl Tokens {
    pub fn new<B: Into<String>, E: Into<String>>(begin: B, end: E) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
        }
    }
}

/// One `BEGIN identifier END` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: String,
    /// Byte range of the whole occurrence, delimiters included.
    pub range: Range<usize>,
}

/// Characters allowed inside a placeholder identifier.
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Find every placeholder inside the given ranges of `content`, in order.
///
/// Ranges must lie on character boundaries and must not overlap.
pub fn find_placeholders(content: &str, ranges: &[Range<usize>], tokens: &Tokens) -> Vec<Placeholder> {
    let mut found = Vec::new();
    if tokens.begin.is_empty() || tokens.end.is_empty() {
        return found;
    }

    for range in ranges {
        let segment = &content[range.clone()];
        let mut pos = 0;
        while let Some(offset) = segment[pos..].find(&tokens.begin) {
            let start = pos + offset;
            let ident_start = start + tokens.begin.len();
            let ident_len = identifier_len(&segment[ident_start..], &tokens.end);
            let ident_end = ident_start + ident_len;

            if ident_len > 0 && segment[ident_end..].starts_with(&tokens.end) {
                let end = ident_end + tokens.end.len();
                found.push(Placeholder {
                    name: segment[ident_start..ident_end].to_string(),
                    range: range.start + start..range.start + end,
                });
                pos = end;
            } else {
                pos = ident_start;
            }
        }
    }
    found
}

/// Length of the identifier at the start of `rest`. The identifier ends at
/// the first occurrence of `end`, even when `end` is made of identifier
/// characters.
fn identifier_len(rest: &str, end: &str) -> usize {
    let mut len = 0;
    for c in rest.chars() {
        if rest[len..].starts_with(end) || !is_identifier_char(c) {
            break;
        }
        len += c.len_utf8();
    }
    len
}

/// Replace the placeholders that fall inside `range`, returning the new text
/// of that range. Placeholders without a value are kept verbatim.
pub fn substitute<F>(content: &str, range: Range<usize>, placeholders: &[Placeholder], mut value_of: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(range.len());
    let mut last = range.start;
    for placeholder in placeholders
        .iter()
        .filter(|p| p.range.start >= range.start && p.range.end <= range.end)
    {
        out.push_str(&content[last..placeholder.range.start]);
        match value_of(&placeholder.name) {
            Some(value) => out.push_str(&value),
            None => out.push_str(&content[placeholder.range.clone()]),
        }
        last = placeholder.range.end;
    }
    out.push_str(&content[last..range.end]);
    out
}
