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

//! The consumer-side contract.
//!
//! The queue's dedicated worker thread offers finalized files to a
//! [`Processor`], one at a time and strictly oldest-first. The processor may
//! take as long as it needs; it runs outside every engine lock.

use crate::{clock::Timestamp, status::FileInfo};

/// What the processor did with an offered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileProcessingResult {
    /// Processed; the queue deletes the file before offering the next one.
    Success,
    /// Processed and the processor moved or deleted the file itself; the
    /// queue will not touch it.
    SuccessAndMoved,
    /// The downstream is gone; stop offering files until resumed.
    Unavailable,
    /// Transient failure; offer the same file again after a retry delay.
    FailureNeedRetry,
}

/// User-supplied consumer of finalized files.
pub trait Processor: Send {
    /// Called with the oldest finalized file and the current time.
    fn on_file_ready(&mut self, file: &FileInfo, now: Timestamp) -> FileProcessingResult;
}

impl<F> Processor for F
where
    F: FnMut(&FileInfo, Timestamp) -> FileProcessingResult + Send,
{
    fn on_file_ready(&mut self, file: &FileInfo, now: Timestamp) -> FileProcessingResult {
        self(file, now)
    }
}
