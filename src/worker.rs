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

//! Background processor worker.
//!
//! ## Architecture
//!
//! The worker runs on a dedicated thread owned by the
//! [`Queue`](crate::Queue) and is the only caller of the user-supplied
//! [`Processor`]. It sleeps on the engine condvar until a new finalized file
//! is signaled, a retry timer elapses, or shutdown is requested.
//!
//! ```text
//! ┌──────────────┐  rename + notify  ┌──────────────┐   OnFileReady   ┌──────────────┐
//! │ ingest path  │ ────────────────► │    worker    │ ──────────────► │  Processor   │
//! │ (caller)     │                   │ (bg thread)  │                 │ (user code)  │
//! └──────────────┘                   └──────────────┘                 └──────────────┘
//! ```
//!
//! Every wake starts with an authoritative directory rescan: the finalized
//! backlog and its sizes are rebuilt from disk, which is what makes the
//! queue pick up files left behind by earlier sessions. Transient errors
//! never terminate the loop; the only exit is the `destructing` flag.

use std::{path::PathBuf, sync::Arc, time::Duration};

use snafu::ResultExt;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    error::{RemoveSnafu, Result, ScanDirectorySnafu},
    fs::FileSystem,
    path::{parse_file_name, FileKind},
    processor::{FileProcessingResult, Processor},
    queue::Shared,
    retry::RetryPolicy,
    status::{FileInfo, FinalizedFilesStatus},
};

enum Wake {
    Work,
    Shutdown,
}

pub(crate) struct ProcessorWorker {
    shared:            Arc<Shared>,
    fs:                Arc<dyn FileSystem>,
    clock:             Arc<dyn Clock>,
    working_dir:       PathBuf,
    retry:             Box<dyn RetryPolicy>,
    processor:         Box<dyn Processor>,
    drain_on_shutdown: bool,
    /// The processor went unavailable while shutting down; stop draining.
    drain_aborted:     bool,
}

impl ProcessorWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shared: Arc<Shared>,
        fs: Arc<dyn FileSystem>,
        clock: Arc<dyn Clock>,
        working_dir: PathBuf,
        retry: Box<dyn RetryPolicy>,
        processor: Box<dyn Processor>,
        drain_on_shutdown: bool,
    ) -> Self {
        Self {
            shared,
            fs,
            clock,
            working_dir,
            retry,
            processor,
            drain_on_shutdown,
            drain_aborted: false,
        }
    }

    pub fn run(mut self) {
        info!("processor worker starting");

        loop {
            match self.wait_for_work() {
                Wake::Shutdown => break,
                Wake::Work => {
                    if let Err(e) = self.process_pass() {
                        error!(error = ?e, "backlog pass failed; retrying on next wake");
                    }
                }
            }
        }

        info!("processor worker stopped");
    }

    /// Sleep until there is something to do.
    ///
    /// Consumes the `has_new_file` / `force_resume` signals under the engine
    /// lock, so a signal raised while processing is never lost.
    fn wait_for_work(&mut self) -> Wake {
        let shared = self.shared.clone();
        let mut st = shared.state.lock();

        loop {
            let now = self.clock.now();

            if st.destructing {
                let draining = self.drain_on_shutdown
                    && !self.drain_aborted
                    && !st.finalized.queue.is_empty();
                if !draining {
                    return Wake::Shutdown;
                }
                if st.force_resume {
                    st.force_resume = false;
                    self.retry.force_resume(now);
                }
                if st.has_new_file {
                    st.has_new_file = false;
                    self.retry.on_new_file(now);
                }
                if self.retry.ready_to_process(now) {
                    return Wake::Work;
                }
                match self.retry.next_wake(now) {
                    Some(delay) => {
                        let _ = shared
                            .work_ready
                            .wait_for(&mut st, Duration::from_millis(delay));
                    }
                    // Suspended; draining cannot make progress.
                    None => return Wake::Shutdown,
                }
                continue;
            }

            if st.force_resume {
                st.force_resume = false;
                self.retry.force_resume(now);
                return Wake::Work;
            }
            if st.has_new_file {
                st.has_new_file = false;
                self.retry.on_new_file(now);
                return Wake::Work;
            }
            if !st.finalized.queue.is_empty() && self.retry.ready_to_process(now) {
                return Wake::Work;
            }

            match self.retry.next_wake(now) {
                Some(delay) if !st.finalized.queue.is_empty() => {
                    let _ = shared
                        .work_ready
                        .wait_for(&mut st, Duration::from_millis(delay));
                }
                _ => shared.work_ready.wait(&mut st),
            }
        }
    }

    /// One pass: rescan the directory, offer the oldest file, apply the
    /// outcome.
    fn process_pass(&mut self) -> Result<()> {
        let backlog = self.rescan()?;
        let oldest = match backlog.queue.front() {
            Some(file) => file.clone(),
            None => return Ok(()),
        };

        let now = self.clock.now();
        if !self.retry.ready_to_process(now) {
            return Ok(());
        }

        debug!(file = %oldest.name, size = oldest.size, "offering file to processor");
        let result = self.processor.on_file_ready(&oldest, now);

        let now = self.clock.now();
        match result {
            FileProcessingResult::Success => {
                // The file must be gone before the next one is offered.
                self.remove_processed(&oldest)?;
                self.drop_from_backlog(&oldest);
                self.retry.on_success(now);
            }
            FileProcessingResult::SuccessAndMoved => {
                self.drop_from_backlog(&oldest);
                self.retry.on_success(now);
            }
            FileProcessingResult::FailureNeedRetry => {
                debug!(file = %oldest.name, "processor requested retry");
                self.retry.on_failure(now);
            }
            FileProcessingResult::Unavailable => {
                warn!("processor unavailable; suspending deliveries");
                self.retry.on_unavailable(now);
                if self.shared.state.lock().destructing {
                    self.drain_aborted = true;
                }
            }
        }

        Ok(())
    }

    /// Rebuild the finalized backlog from disk and install it as the
    /// authoritative view.
    fn rescan(&self) -> Result<FinalizedFilesStatus> {
        let names = self
            .fs
            .scan_dir(&self.working_dir)
            .context(ScanDirectorySnafu {
                dir: &self.working_dir,
            })?;

        let mut files = Vec::new();
        for name in names {
            let (kind, timestamp) = match parse_file_name(&name) {
                Some(parsed) => parsed,
                None => continue,
            };
            if kind != FileKind::Finalized {
                continue;
            }
            let full_path = self.fs.join(&self.working_dir, &name);
            match self.fs.file_size(&full_path) {
                Ok(size) => files.push(FileInfo {
                    name,
                    full_path,
                    timestamp,
                    size,
                }),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(file = %name, "file vanished during rescan");
                }
                Err(e) => warn!(file = %name, error = %e, "skipping unreadable finalized file"),
            }
        }

        let fresh = FinalizedFilesStatus::from_files(files);
        self.shared.state.lock().finalized = fresh.clone();
        Ok(fresh)
    }

    fn remove_processed(&self, file: &FileInfo) -> Result<()> {
        match self.fs.remove(&file.full_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(file = %file.name, "processed file vanished before removal");
                Ok(())
            }
            Err(e) => Err(e).context(RemoveSnafu {
                path: &file.full_path,
            }),
        }
    }

    fn drop_from_backlog(&self, file: &FileInfo) {
        let mut st = self.shared.state.lock();
        if st.finalized.queue.front() == Some(file) {
            if let Some(info) = st.finalized.queue.pop_front() {
                st.finalized.total_size = st.finalized.total_size.saturating_sub(info.size);
            }
        }
    }
}
