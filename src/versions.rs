//! Natural ordering for version tags.
//!
//! Tags compare segment-wise: runs of digits compare numerically, runs of
//! other characters compare lexicographically. This orders `v1.2` before
//! `v1.10` and handles a leading `v` uniformly.

use std::cmp::Ordering;

/// One lexical chunk of a version tag.
#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Number(u64),
    Text(&'a str),
}

fn chunks(version: &str) -> Vec<Chunk<'_>> {
    let mut out = Vec::new();
    let bytes = version.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let digit = bytes[i].is_ascii_digit();
        while i < bytes.len() && bytes[i].is_ascii_digit() == digit {
            i += 1;
        }
        let piece = &version[start..i];
        if digit {
            // Over-long digit runs fall back to text comparison.
            match piece.parse::<u64>() {
                Ok(n) => out.push(Chunk::Number(n)),
                Err(_) => out.push(Chunk::Text(piece)),
            }
        } else {
            out.push(Chunk::Text(piece));
        }
    }
    out
}

/// Compare two version tags in natural order.
pub fn compare(a: &str, b: &str) -> Ordering {
    let left = chunks(a);
    let right = chunks(b);
    for pair in left.iter().zip(right.iter()) {
        let ord = match pair {
            (Chunk::Number(x), Chunk::Number(y)) => x.cmp(y),
            (Chunk::Text(x), Chunk::Text(y)) => x.cmp(y),
            // Numbers sort before text so "1.0" < "1.0rc"
            (Chunk::Number(_), Chunk::Text(_)) => Ordering::Less,
            (Chunk::Text(_), Chunk::Number(_)) => Ordering::Greater,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    left.len().cmp(&right.len())
}

/// Sort tags ascending in natural order.
pub fn sort_ascending(versions: &mut [String]) {
    versions.sort_by(|a, b| compare(a, b));
}

/// Sort tags descending (newest first), the order repository records use.
pub fn sort_descending(versions: &mut [String]) {
    versions.sort_by(|a, b| compare(b, a));
}

/// The nearest version strictly below `version`, if any.
pub fn nearest_lower<'a>(version: &str, known: &'a [String]) -> Option<&'a String> {
    known
        .iter()
        .filter(|v| compare(v, version) == Ordering::Less)
        .max_by(|a, b| compare(a, b))
}

/// The nearest version strictly above `version`, if any.
pub fn nearest_higher<'a>(version: &str, known: &'a [String]) -> Option<&'a String> {
    known
        .iter()
        .filter(|v| compare(v, version) == Ordering::Greater)
        .min_by(|a, b| compare(a, b))
}
