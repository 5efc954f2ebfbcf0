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

//! Message append strategies.
//!
//! A strategy serializes one opaque message into the current file and reports
//! the exact number of bytes it added, so the engine's size accounting always
//! matches what the finalize rename will seal. Messages are never parsed;
//! callers own the wire format.

use std::io;

use crate::fs::QueueFile;

/// How messages are laid out in the current file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendStrategy {
    /// Write message bytes as-is.
    Raw,
    /// Write message bytes followed by a separator; the separator counts
    /// toward the reported size.
    Delimited { separator: Vec<u8> },
}

impl Default for AppendStrategy {
    fn default() -> Self { Self::Raw }
}

impl AppendStrategy {
    /// Separator-delimited strategy.
    pub fn delimited(separator: impl Into<Vec<u8>>) -> Self {
        Self::Delimited {
            separator: separator.into(),
        }
    }

    /// Bytes this strategy would append for `message`, without writing.
    #[must_use]
    pub fn message_size(&self, message: &[u8]) -> u64 {
        match self {
            Self::Raw => message.len() as u64,
            Self::Delimited { separator } => (message.len() + separator.len()) as u64,
        }
    }

    /// Write `message` to `file` and flush, returning the bytes appended.
    ///
    /// The bytes are handed to the OS before this returns, so a subsequent
    /// finalize rename seals everything acknowledged so far.
    pub(crate) fn append(&self, file: &mut dyn QueueFile, message: &[u8]) -> io::Result<u64> {
        file.write_all(message)?;
        let written = match self {
            Self::Raw => message.len() as u64,
            Self::Delimited { separator } => {
                file.write_all(separator)?;
                (message.len() + separator.len()) as u64
            }
        };
        file.flush()?;
        Ok(written)
    }
}
