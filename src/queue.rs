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

//! The queue engine.
//!
//! [`Queue`] records messages into a single append-only current file, seals
//! it by renaming it to a finalized name when the finalize policy says so,
//! and hands sealed files to the user's [`Processor`](crate::Processor) on a
//! dedicated thread in strict `(timestamp, name)` order.
//!
//! ## Usage
//!
//! ```ignore
//! let queue = QueueBuilder::new("/var/lib/events")
//!     .append_strategy(AppendStrategy::delimited(b"\n".to_vec()))
//!     .build(uploader)?;
//!
//! queue.push_message("event payload")?;
//! queue.force_processing()?;
//! queue.shutdown()?;
//! ```
//!
//! ## Concurrency
//!
//! `push_message` assumes a single producer; front the queue with a
//! serializing channel if several threads produce. The engine itself is safe
//! against its own worker thread: the shared accounting lives behind one
//! mutex, the worker is signaled through one condvar, and the current file
//! handle is owned exclusively by the ingest path.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::{
    builder::InitHook,
    clock::{Clock, Timestamp},
    config::QueueConfig,
    error::{
        AppendSnafu, CreateFileSnafu, InternalSnafu, OpenFileSnafu, RemoveSnafu, RenameSnafu,
        Result, ScanDirectorySnafu, ShuttingDownSnafu, SyncFileSnafu,
    },
    fs::{FileSystem, QueueFile},
    path::{current_file_name, finalized_file_name, parse_file_name},
    policy::{FinalizePolicy, PurgePolicy},
    processor::Processor,
    recovery,
    retry::RetryPolicy,
    status::{FileInfo, FinalizedFilesStatus, QueueStatus},
    worker::ProcessorWorker,
};

/// State shared between the ingest path and the processor worker, guarded by
/// one mutex and signaled through one condvar.
pub(crate) struct Shared {
    pub state:      Mutex<SharedState>,
    pub work_ready: Condvar,
}

pub(crate) struct SharedState {
    /// Shutdown requested; the only way the worker loop exits.
    pub destructing:             bool,
    /// A file was finalized since the worker last looked.
    pub has_new_file:            bool,
    /// `force_processing` asked for an immediate, unsuspended pass.
    pub force_resume:            bool,
    /// Bytes in the open current file; zero if none.
    pub appended_file_size:      u64,
    /// Creation time of the current file; zero if none.
    pub appended_file_timestamp: Timestamp,
    /// The finalized backlog as last reconciled.
    pub finalized:               FinalizedFilesStatus,
}

impl SharedState {
    pub(crate) fn fresh() -> Self {
        Self {
            destructing:             false,
            has_new_file:            false,
            force_resume:            false,
            appended_file_size:      0,
            appended_file_timestamp: 0,
            finalized:               FinalizedFilesStatus::default(),
        }
    }

    pub(crate) fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            appended_file_size:      self.appended_file_size,
            appended_file_timestamp: self.appended_file_timestamp,
            finalized:               self.finalized.clone(),
        }
    }
}

/// Ingest-side state. The handle is never shared with the worker.
struct IngestState {
    handle:    Option<Box<dyn QueueFile>>,
    file_name: Option<String>,
}

/// A filesystem-backed durable message queue.
///
/// Construct via [`QueueBuilder`](crate::QueueBuilder). Dropping the queue
/// shuts it down; any open current file stays on disk and is picked up by
/// the next session's recovery scan.
pub struct Queue {
    config:          QueueConfig,
    clock:           Arc<dyn Clock>,
    fs:              Arc<dyn FileSystem>,
    finalize_policy: Box<dyn FinalizePolicy>,
    purge_policy:    Box<dyn PurgePolicy>,
    shared:          Arc<Shared>,
    ingest:          Mutex<IngestState>,
    worker_handle:   Option<JoinHandle<()>>,
}

impl Queue {
    /// Recover prior on-disk state and start the processor thread.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn start(
        config: QueueConfig,
        finalize_policy: Box<dyn FinalizePolicy>,
        purge_policy: Box<dyn PurgePolicy>,
        retry_policy: Box<dyn RetryPolicy>,
        clock: Arc<dyn Clock>,
        fs: Arc<dyn FileSystem>,
        init_hook: Option<InitHook>,
        processor: Box<dyn Processor>,
    ) -> Result<Self> {
        fs.create_dir_all(&config.working_dir)
            .context(CreateFileSnafu {
                path: &config.working_dir,
            })?;

        if let Some(hook) = init_hook {
            hook(&config.working_dir);
        }

        let recovered = recovery::recover(fs.as_ref(), &config.working_dir)?;
        let has_backlog = !recovered.finalized.queue.is_empty();

        let mut state = SharedState::fresh();
        state.has_new_file = has_backlog;
        state.finalized = recovered.finalized;
        let file_name = match recovered.current {
            Some(current) => {
                state.appended_file_size = current.size;
                state.appended_file_timestamp = current.timestamp;
                Some(current.name)
            }
            None => None,
        };

        let shared = Arc::new(Shared {
            state:      Mutex::new(state),
            work_ready: Condvar::new(),
        });

        let worker = ProcessorWorker::new(
            shared.clone(),
            fs.clone(),
            clock.clone(),
            config.working_dir.clone(),
            retry_policy,
            processor,
            config.drain_on_shutdown,
        );
        let worker_handle = thread::Builder::new()
            .name("fsq-processor".into())
            .spawn(move || worker.run())?;

        info!(
            dir = ?config.working_dir,
            backlog = has_backlog,
            resumed = file_name.is_some(),
            "queue started"
        );

        Ok(Self {
            config,
            clock,
            fs,
            finalize_policy,
            purge_policy,
            shared,
            ingest: Mutex::new(IngestState {
                handle: None,
                file_name,
            }),
            worker_handle: Some(worker_handle),
        })
    }

    /// Durably append one opaque message.
    ///
    /// The message is fully written and flushed to the current file before
    /// this returns. Afterwards the finalize policy may seal the file and
    /// the purge policy may drop the oldest finalized files.
    ///
    /// # Errors
    ///
    /// Fails fast on filesystem errors. Once shutdown has begun, either
    /// silently drops the message or returns [`Error::ShuttingDown`]
    /// (`reject_push_while_shutting_down`).
    pub fn push_message(&self, message: impl Into<Bytes>) -> Result<()> {
        let message = message.into();

        if self.shared.state.lock().destructing {
            if self.config.reject_push_while_shutting_down {
                return ShuttingDownSnafu.fail();
            }
            debug!("dropping message pushed while shutting down");
            return Ok(());
        }

        let now = self.clock.now();
        let mut ingest = self.ingest.lock();
        self.ensure_current_file(&mut ingest, now)?;

        let path = match ingest.file_name.as_deref() {
            Some(name) => self.fs.join(&self.config.working_dir, name),
            None => {
                return InternalSnafu {
                    message: "no current file after ensure".to_string(),
                }
                .fail()
            }
        };
        let handle = match ingest.handle.as_mut() {
            Some(handle) => handle,
            None => {
                return InternalSnafu {
                    message: "no current handle after ensure".to_string(),
                }
                .fail()
            }
        };

        let written = self
            .config
            .append_strategy
            .append(&mut **handle, &message)
            .context(AppendSnafu { path: &path })?;

        let status = {
            let mut st = self.shared.state.lock();
            st.appended_file_size += written;
            st.snapshot()
        };

        if self.finalize_policy.should_finalize(&status, now) {
            self.finalize_current(&mut ingest)?;
        }
        drop(ingest);

        self.purge_backlog()
    }

    /// Append several messages in order.
    ///
    /// Not atomic: each message is appended individually and the finalize
    /// and purge policies run after each one, exactly as with repeated
    /// [`push_message`](Self::push_message) calls.
    ///
    /// # Errors
    ///
    /// Stops at the first failing append and returns its error.
    pub fn push_messages<I>(&self, messages: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
    {
        for message in messages {
            self.push_message(message)?;
        }
        Ok(())
    }

    /// Seal the current file (if any), wake the worker and clear any retry
    /// suspension so the next pass proceeds immediately.
    ///
    /// Repeated calls while the processor is busy coalesce into one wake.
    pub fn force_processing(&self) -> Result<()> {
        // Resume before sealing, so the worker never consumes the resume
        // signal after a failure that the seal itself triggered.
        self.shared.state.lock().force_resume = true;
        self.shared.work_ready.notify_all();

        let mut ingest = self.ingest.lock();
        self.finalize_current(&mut ingest)
    }

    /// Snapshot of the current file and the finalized backlog.
    #[must_use]
    pub fn status(&self) -> QueueStatus { self.shared.state.lock().snapshot() }

    /// The configuration this queue runs with.
    #[must_use]
    pub fn config(&self) -> &QueueConfig { &self.config }

    /// Delete every file in the working directory that belongs to the queue
    /// (current and finalized alike), resetting the accounting.
    ///
    /// Foreign files are left alone. Intended for tools and tests that want
    /// a clean slate.
    pub fn remove_all_queue_files(&self) -> Result<()> {
        let mut ingest = self.ingest.lock();
        ingest.handle = None;
        ingest.file_name = None;

        let names = self
            .fs
            .scan_dir(&self.config.working_dir)
            .context(ScanDirectorySnafu {
                dir: &self.config.working_dir,
            })?;
        for name in names {
            if parse_file_name(&name).is_none() {
                continue;
            }
            let path = self.fs.join(&self.config.working_dir, &name);
            match self.fs.remove(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).context(RemoveSnafu { path: &path }),
            }
        }

        let mut st = self.shared.state.lock();
        st.finalized = FinalizedFilesStatus::default();
        st.appended_file_size = 0;
        st.appended_file_timestamp = 0;
        Ok(())
    }

    /// Shut down gracefully.
    ///
    /// Signals the worker, closes the current file handle (the file stays on
    /// disk for the next session to recover) and joins the worker thread,
    /// or detaches it per `detach_processor_on_shutdown`. With
    /// `drain_on_shutdown`, the worker first keeps processing until the
    /// backlog is empty or the processor reports `Unavailable`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread panicked.
    pub fn shutdown(mut self) -> Result<()> { self.shutdown_impl() }

    fn shutdown_impl(&mut self) -> Result<()> {
        {
            let mut st = self.shared.state.lock();
            st.destructing = true;
        }
        self.shared.work_ready.notify_all();

        {
            let mut ingest = self.ingest.lock();
            if let Some(mut handle) = ingest.handle.take() {
                // The file stays on disk as current-*.bin for recovery.
                if let Err(e) = handle.flush() {
                    warn!(error = %e, "failed to flush current file during shutdown");
                } else if let Err(e) = handle.sync() {
                    warn!(error = %e, "failed to sync current file during shutdown");
                }
            }
        }

        if let Some(handle) = self.worker_handle.take() {
            if self.config.detach_processor_on_shutdown {
                info!("detaching processor thread");
                drop(handle);
            } else {
                handle.join().map_err(|_| {
                    InternalSnafu {
                        message: "processor thread panicked".to_string(),
                    }
                    .build()
                })?;
            }
        }

        info!("queue shut down");
        Ok(())
    }

    /// Open or create the current file if the ingest path has none.
    fn ensure_current_file(&self, ingest: &mut IngestState, now: Timestamp) -> Result<()> {
        if ingest.handle.is_some() {
            return Ok(());
        }

        if let Some(name) = ingest.file_name.clone() {
            // A file resumed from a previous session, or one whose handle
            // was closed by a failed finalize; reopen it for appending.
            let path = self.fs.join(&self.config.working_dir, &name);
            let handle = self
                .fs
                .open_append(&path)
                .context(OpenFileSnafu { path: &path })?;
            debug!(file = %name, "reopened current file");
            ingest.handle = Some(handle);
            return Ok(());
        }

        let name = current_file_name(now);
        let path = self.fs.join(&self.config.working_dir, &name);
        let handle = self
            .fs
            .create_append(&path)
            .context(CreateFileSnafu { path: &path })?;
        debug!(file = %name, "created current file");
        ingest.handle = Some(handle);
        ingest.file_name = Some(name);

        let mut st = self.shared.state.lock();
        st.appended_file_size = 0;
        st.appended_file_timestamp = now;
        Ok(())
    }

    /// Flush, close and atomically rename the current file to its finalized
    /// name, then signal the worker.
    ///
    /// On rename failure the current-file state is kept (the handle will be
    /// reopened on the next push) and nothing is reported as finalized.
    fn finalize_current(&self, ingest: &mut IngestState) -> Result<()> {
        let name = match ingest.file_name.clone() {
            Some(name) => name,
            None => return Ok(()),
        };
        let from = self.fs.join(&self.config.working_dir, &name);

        if let Some(mut handle) = ingest.handle.take() {
            handle.flush().context(AppendSnafu { path: &from })?;
            handle.sync().context(SyncFileSnafu { path: &from })?;
        }

        let (timestamp, size) = {
            let st = self.shared.state.lock();
            (st.appended_file_timestamp, st.appended_file_size)
        };
        let finalized_name = finalized_file_name(timestamp);
        let to = self.fs.join(&self.config.working_dir, &finalized_name);

        self.fs.rename(&from, &to).context(RenameSnafu {
            from: &from,
            to:   &to,
        })?;

        {
            let mut st = self.shared.state.lock();
            st.finalized.queue.push_back(FileInfo {
                name: finalized_name.clone(),
                full_path: to,
                timestamp,
                size,
            });
            st.finalized.total_size += size;
            st.appended_file_size = 0;
            st.appended_file_timestamp = 0;
            st.has_new_file = true;
        }
        ingest.file_name = None;
        self.shared.work_ready.notify_all();

        info!(file = %finalized_name, size, "finalized current file");
        Ok(())
    }

    /// Drop oldest finalized files while the purge policy demands it.
    fn purge_backlog(&self) -> Result<()> {
        loop {
            let victim = {
                let mut st = self.shared.state.lock();
                if st.finalized.queue.is_empty() || !self.purge_policy.should_purge(&st.snapshot())
                {
                    return Ok(());
                }
                match st.finalized.queue.pop_front() {
                    Some(info) => {
                        st.finalized.total_size =
                            st.finalized.total_size.saturating_sub(info.size);
                        info
                    }
                    None => return Ok(()),
                }
            };

            warn!(file = %victim.name, size = victim.size, "purging oldest finalized file");
            match self.fs.remove(&victim.full_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(file = %victim.name, "purged file already gone");
                }
                Err(e) => {
                    return Err(e).context(RemoveSnafu {
                        path: &victim.full_path,
                    })
                }
            }
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        if self.worker_handle.is_some() {
            if let Err(e) = self.shutdown_impl() {
                warn!(error = %e, "shutdown during drop failed");
            }
        }
    }
}
