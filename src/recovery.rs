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

//! Startup recovery.
//!
//! One directory scan before any message is accepted:
//! - every `finalized-*.bin` joins the backlog;
//! - of the `current-*.bin` files a previous session left behind, the newest
//!   is resumed for appending (its embedded timestamp stays the current-file
//!   timestamp, so its eventual finalized name keeps it) and all older ones
//!   are promoted to finalized names on the spot;
//! - anything else in the directory is left alone.
//!
//! Promotion feeds unflushed prior work into the processing pipeline instead
//! of discarding it.

use std::path::Path;

use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    clock::Timestamp,
    error::{RenameSnafu, Result, ScanDirectorySnafu},
    fs::FileSystem,
    path::{finalized_file_name, parse_file_name, FileKind},
    status::{FileInfo, FinalizedFilesStatus},
};

/// A prior session's current file, picked up for further appending.
#[derive(Debug, Clone)]
pub(crate) struct ResumedCurrent {
    pub name:      String,
    pub timestamp: Timestamp,
    pub size:      u64,
}

/// Result of the startup scan.
#[derive(Debug, Default)]
pub(crate) struct RecoveredState {
    pub finalized: FinalizedFilesStatus,
    pub current:   Option<ResumedCurrent>,
}

pub(crate) fn recover(fs: &dyn FileSystem, working_dir: &Path) -> Result<RecoveredState> {
    let names = fs
        .scan_dir(working_dir)
        .context(ScanDirectorySnafu { dir: working_dir })?;

    let mut finalized = Vec::new();
    let mut currents: Vec<(Timestamp, String)> = Vec::new();

    for name in names {
        match parse_file_name(&name) {
            Some((FileKind::Finalized, timestamp)) => {
                if let Some(info) = stat_file(fs, working_dir, &name, timestamp) {
                    finalized.push(info);
                }
            }
            Some((FileKind::Current, timestamp)) => currents.push((timestamp, name)),
            None => debug!(file = %name, "ignoring foreign file in working directory"),
        }
    }

    currents.sort();
    let resumed = currents.pop();

    // Older current files are orphans of interrupted sessions; seal them.
    for (timestamp, name) in currents {
        let promoted = finalized_file_name(timestamp);
        let from = fs.join(working_dir, &name);
        let to = fs.join(working_dir, &promoted);
        fs.rename(&from, &to).context(RenameSnafu {
            from: from.clone(),
            to:   to.clone(),
        })?;
        info!(from = %name, to = %promoted, "promoted orphaned current file");
        if let Some(info) = stat_file(fs, working_dir, &promoted, timestamp) {
            finalized.push(info);
        }
    }

    let current = match resumed {
        Some((timestamp, name)) => {
            let path = fs.join(working_dir, &name);
            match fs.file_size(&path) {
                Ok(size) => {
                    info!(file = %name, size, "resuming current file from previous session");
                    Some(ResumedCurrent {
                        name,
                        timestamp,
                        size,
                    })
                }
                Err(e) => {
                    warn!(file = %name, error = %e, "cannot stat prior current file; starting fresh");
                    None
                }
            }
        }
        None => None,
    };

    let finalized = FinalizedFilesStatus::from_files(finalized);
    info!(
        backlog_files = finalized.queue.len(),
        backlog_bytes = finalized.total_size,
        resumed = current.is_some(),
        "recovery scan complete"
    );

    Ok(RecoveredState { finalized, current })
}

fn stat_file(
    fs: &dyn FileSystem,
    working_dir: &Path,
    name: &str,
    timestamp: Timestamp,
) -> Option<FileInfo> {
    let full_path = fs.join(working_dir, name);
    match fs.file_size(&full_path) {
        Ok(size) => Some(FileInfo {
            name: name.to_string(),
            full_path,
            timestamp,
            size,
        }),
        Err(e) => {
            warn!(file = %name, error = %e, "skipping unreadable finalized file");
            None
        }
    }
}
