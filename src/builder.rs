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

use std::{path::Path, sync::Arc};

use crate::{
    append::AppendStrategy,
    clock::{Clock, SystemClock},
    config::QueueConfig,
    error::Result,
    fs::{FileSystem, StdFileSystem},
    policy::{BacklogAwareFinalizePolicy, CapacityPurgePolicy, FinalizePolicy, PurgePolicy},
    processor::Processor,
    queue::Queue,
    retry::{ExponentialBackoff, RetryPolicy},
};

/// One-time hook run with the working directory before recovery and before
/// the processor thread starts.
pub type InitHook = Box<dyn FnOnce(&Path) + Send>;

/// Fluent configuration for a [`Queue`].
///
/// Every knob has a production-grade default; only the working directory and
/// the processor are mandatory.
///
/// ```ignore
/// let queue = QueueBuilder::new("/var/lib/events")
///     .append_strategy(AppendStrategy::delimited(b"\n".to_vec()))
///     .build(uploader)?;
/// queue.push_message("payload")?;
/// ```
pub struct QueueBuilder {
    config:    QueueConfig,
    finalize:  Box<dyn FinalizePolicy>,
    purge:     Box<dyn PurgePolicy>,
    retry:     Box<dyn RetryPolicy>,
    clock:     Arc<dyn Clock>,
    fs:        Arc<dyn FileSystem>,
    init_hook: Option<InitHook>,
}

impl QueueBuilder {
    pub fn new<P: Into<std::path::PathBuf>>(working_dir: P) -> Self {
        Self::with_config(QueueConfig::new(working_dir))
    }

    /// Start from an existing configuration record, e.g. one produced by
    /// [`QueueConfig::from_env`].
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            config,
            finalize: Box::new(BacklogAwareFinalizePolicy::default()),
            purge: Box::new(CapacityPurgePolicy::default()),
            retry: Box::new(ExponentialBackoff::default()),
            clock: Arc::new(SystemClock),
            fs: Arc::new(StdFileSystem),
            init_hook: None,
        }
    }

    pub fn append_strategy(mut self, strategy: AppendStrategy) -> Self {
        self.config.append_strategy = strategy;
        self
    }

    pub fn finalize_policy(mut self, policy: impl FinalizePolicy + 'static) -> Self {
        self.finalize = Box::new(policy);
        self
    }

    pub fn purge_policy(mut self, policy: impl PurgePolicy + 'static) -> Self {
        self.purge = Box::new(policy);
        self
    }

    pub fn retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry = Box::new(policy);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn detach_processor_on_shutdown(mut self, detach: bool) -> Self {
        self.config.detach_processor_on_shutdown = detach;
        self
    }

    pub fn reject_push_while_shutting_down(mut self, reject: bool) -> Self {
        self.config.reject_push_while_shutting_down = reject;
        self
    }

    pub fn drain_on_shutdown(mut self, drain: bool) -> Self {
        self.config.drain_on_shutdown = drain;
        self
    }

    /// Run `hook` with the working directory exactly once, after the
    /// directory exists but before recovery and before the processor thread
    /// starts. Useful for wiping stale state in tests and tools.
    pub fn init_hook(mut self, hook: impl FnOnce(&Path) + Send + 'static) -> Self {
        self.init_hook = Some(Box::new(hook));
        self
    }

    /// Recover any prior on-disk state, start the processor thread and hand
    /// back a running queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the working directory cannot be created or
    /// scanned, or the processor thread cannot be spawned.
    pub fn build(self, processor: impl Processor + 'static) -> Result<Queue> {
        Queue::start(
            self.config,
            self.finalize,
            self.purge,
            self.retry,
            self.clock,
            self.fs,
            self.init_hook,
            Box::new(processor),
        )
    }
}
