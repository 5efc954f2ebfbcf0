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

use std::path::PathBuf;

use crate::append::AppendStrategy;

/// Plain-data queue configuration.
///
/// The policy objects (finalize, purge, retry), the clock and the filesystem
/// adapter are supplied through [`QueueBuilder`](crate::QueueBuilder); this
/// record holds everything that is cheap to clone and inspect.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Directory exclusively managed by this queue instance.
    pub working_dir: PathBuf,
    /// How messages are serialized into the current file.
    pub append_strategy: AppendStrategy,
    /// Detach the processor thread on shutdown instead of joining it.
    pub detach_processor_on_shutdown: bool,
    /// Fail `push_message` with `ShuttingDown` instead of silently dropping
    /// once shutdown has begun.
    pub reject_push_while_shutting_down: bool,
    /// Keep the processor running at shutdown until the finalized backlog is
    /// empty or the processor reports `Unavailable`.
    pub drain_on_shutdown: bool,
}

impl QueueConfig {
    pub fn new<P: Into<PathBuf>>(working_dir: P) -> Self {
        Self {
            working_dir: working_dir.into(),
            append_strategy: AppendStrategy::default(),
            detach_processor_on_shutdown: false,
            reject_push_while_shutting_down: false,
            drain_on_shutdown: false,
        }
    }

    /// Read behavioral flags from the environment, keeping defaults for
    /// anything unset or unparseable. The core never reads the environment
    /// itself; call this explicitly where deployment wants it.
    ///
    /// Variables:
    /// - `FSQ_DETACH_PROCESSOR_ON_SHUTDOWN`: `true`/`false`
    /// - `FSQ_REJECT_PUSH_WHILE_SHUTTING_DOWN`: `true`/`false`
    /// - `FSQ_DRAIN_ON_SHUTDOWN`: `true`/`false`
    /// - `FSQ_MESSAGE_SEPARATOR`: bytes appended after every message
    pub fn from_env<P: Into<PathBuf>>(working_dir: P) -> Self {
        let mut config = Self::new(working_dir);
        config.detach_processor_on_shutdown = env_flag(
            "FSQ_DETACH_PROCESSOR_ON_SHUTDOWN",
            config.detach_processor_on_shutdown,
        );
        config.reject_push_while_shutting_down = env_flag(
            "FSQ_REJECT_PUSH_WHILE_SHUTTING_DOWN",
            config.reject_push_while_shutting_down,
        );
        config.drain_on_shutdown = env_flag("FSQ_DRAIN_ON_SHUTDOWN", config.drain_on_shutdown);
        if let Ok(separator) = std::env::var("FSQ_MESSAGE_SEPARATOR") {
            if !separator.is_empty() {
                config.append_strategy = AppendStrategy::delimited(separator.into_bytes());
            }
        }
        config
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
