// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Filename scheme for queue files.
//!
//! Two forms exist inside a working directory:
//! `current-<TS>.bin` (the single file being appended to) and
//! `finalized-<TS>.bin` (sealed files awaiting processing), where `<TS>` is
//! a 20-digit zero-padded decimal timestamp. The fixed width makes
//! lexicographic order equal numeric order, so a plain directory listing
//! sorts files by creation time.

use crate::clock::Timestamp;

/// Digits in the encoded timestamp. 20 covers the full `u64` range.
pub const TIMESTAMP_WIDTH: usize = 20;

const CURRENT_PREFIX: &str = "current-";
const FINALIZED_PREFIX: &str = "finalized-";
const SUFFIX: &str = ".bin";

/// Which of the two filename forms a name matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Current,
    Finalized,
}

/// Name for the file currently being appended to: `current-<TS>.bin`.
#[must_use]
pub fn current_file_name(timestamp: Timestamp) -> String {
    format!("{CURRENT_PREFIX}{timestamp:020}{SUFFIX}")
}

/// Name for a sealed file: `finalized-<TS>.bin`.
#[must_use]
pub fn finalized_file_name(timestamp: Timestamp) -> String {
    format!("{FINALIZED_PREFIX}{timestamp:020}{SUFFIX}")
}

/// Parse a basename into its kind and embedded timestamp.
///
/// Returns `None` for anything that does not round-trip exactly: wrong
/// prefix or suffix, wrong digit count, non-digit characters (signs,
/// whitespace), or values that overflow the timestamp type.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<(FileKind, Timestamp)> {
    if let Some(ts) = parse_with_prefix(name, CURRENT_PREFIX) {
        return Some((FileKind::Current, ts));
    }
    if let Some(ts) = parse_with_prefix(name, FINALIZED_PREFIX) {
        return Some((FileKind::Finalized, ts));
    }
    None
}

fn parse_with_prefix(name: &str, prefix: &str) -> Option<Timestamp> {
    let digits = name.strip_prefix(prefix)?.strip_suffix(SUFFIX)?;
    if digits.len() != TIMESTAMP_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let timestamp: Timestamp = digits.parse().ok()?;
    // Re-emit and compare, so only canonical encodings are accepted.
    if format!("{timestamp:020}") != digits {
        return None;
    }
    Some(timestamp)
}
