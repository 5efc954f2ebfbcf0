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

//! Filesystem-backed durable message queue.
//!
//! Messages are appended to a single `current-<TS>.bin` file inside a
//! working directory the queue owns. A finalize policy decides when that
//! file is sealed (flushed, closed and atomically renamed to
//! `finalized-<TS>.bin`), after which a dedicated worker thread hands it to
//! a user-supplied [`Processor`], strictly oldest-first. Failed deliveries
//! are retried on an exponential schedule, and a purge policy bounds total
//! disk usage by dropping the oldest sealed files.
//!
//! Features:
//! - Crash-safe: on startup the directory is rescanned, sealed files rejoin
//!   the backlog and the newest interrupted current file is resumed
//! - Pluggable finalize, purge and retry policies plus a mockable clock and
//!   filesystem
//! - Raw or separator-delimited append strategies; payloads stay opaque
//! - Bounded disk usage and strict FIFO delivery across files

mod recovery;
mod worker;

pub mod append;
pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod fs;
pub mod path;
pub mod policy;
pub mod processor;
pub mod queue;
pub mod retry;
pub mod status;

pub use append::AppendStrategy;
pub use builder::QueueBuilder;
pub use clock::{Clock, ManualClock, SystemClock, TimeSpan, Timestamp};
pub use config::QueueConfig;
pub use error::{Error, Result};
pub use fs::{FileSystem, QueueFile, StdFileSystem};
pub use path::{current_file_name, finalized_file_name, parse_file_name, FileKind};
pub use policy::{
    BacklogAwareFinalizePolicy, CapacityPurgePolicy, FinalizePolicy, PurgePolicy,
};
pub use processor::{FileProcessingResult, Processor};
pub use queue::Queue;
pub use retry::{ExponentialBackoff, RetryPolicy};
pub use status::{FileInfo, FinalizedFilesStatus, QueueStatus};
