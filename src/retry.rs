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

//! Retry timing for the processor loop.
//!
//! A [`RetryPolicy`] is a small state machine driven by processor outcomes.
//! It decides when the worker may offer the next (or the same) file, and how
//! long the worker should sleep when nothing is ready yet. The default,
//! [`ExponentialBackoff`], draws failure delays from an exponential
//! distribution clamped to `[min, max]`.

use rand::Rng;
use rand_distr::{Distribution, Exp};

use crate::clock::{TimeSpan, Timestamp};

/// Schedules processor attempts after non-success outcomes.
///
/// A backward clock jump must never wedge an implementation: observing
/// `now` earlier than the previous observation resets the schedule to `now`.
pub trait RetryPolicy: Send {
    /// A file was processed; clear delays and any suspension.
    fn on_success(&mut self, now: Timestamp);

    /// The processor asked for a retry; push the schedule out.
    fn on_failure(&mut self, now: Timestamp);

    /// The downstream is gone; stop scheduling attempts.
    fn on_unavailable(&mut self, now: Timestamp);

    /// A new finalized file arrived while waiting.
    fn on_new_file(&mut self, now: Timestamp);

    /// External resume request; the next pass proceeds immediately.
    fn force_resume(&mut self, now: Timestamp);

    /// May the worker invoke the processor right now?
    fn ready_to_process(&mut self, now: Timestamp) -> bool;

    /// How long to wait before the next attempt, or `None` when no timed
    /// wake-up is pending (ready now, or suspended until an external event).
    fn next_wake(&self, now: Timestamp) -> Option<TimeSpan>;
}

/// Exponentially distributed retry delays with a `[min, max]` clamp.
///
/// Failure schedules the next attempt at `max(now, scheduled) + draw`, so
/// consecutive failures keep pushing the schedule out instead of resetting
/// it. `min == max` degenerates to a fixed retry interval. `Unavailable`
/// suspends scheduling entirely until [`force_resume`](RetryPolicy::force_resume)
/// or, when enabled, until a new finalized file arrives.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    mean_ms:            f64,
    min_ms:             f64,
    max_ms:             f64,
    resume_on_new_file: bool,
    last_observed:      Timestamp,
    scheduled:          Timestamp,
    suspended:          bool,
}

impl Default for ExponentialBackoff {
    /// Mean 15 minutes, clamped to one minute and 24 hours.
    fn default() -> Self { Self::new(15 * 60 * 1000, 60 * 1000, 24 * 60 * 60 * 1000) }
}

impl ExponentialBackoff {
    /// All parameters are in the clock's unit (milliseconds for the default
    /// clock).
    #[must_use]
    pub fn new(mean: TimeSpan, min: TimeSpan, max: TimeSpan) -> Self {
        Self {
            mean_ms:            mean as f64,
            min_ms:             min as f64,
            max_ms:             max.max(min) as f64,
            resume_on_new_file: false,
            last_observed:      0,
            scheduled:          0,
            suspended:          false,
        }
    }

    /// Treat the arrival of a new finalized file as a resume request while
    /// suspended.
    #[must_use]
    pub fn resume_on_new_file(mut self, resume: bool) -> Self {
        self.resume_on_new_file = resume;
        self
    }

    fn draw(&self) -> TimeSpan {
        if self.min_ms >= self.max_ms {
            return self.min_ms as TimeSpan;
        }
        let sample = match Exp::new(1.0 / self.mean_ms.max(1.0)) {
            Ok(exp) => exp.sample(&mut rand::thread_rng()),
            // Degenerate mean; fall back to a uniform draw inside the clamp.
            Err(_) => rand::thread_rng().gen_range(self.min_ms..self.max_ms),
        };
        sample.clamp(self.min_ms, self.max_ms) as TimeSpan
    }

    fn observe(&mut self, now: Timestamp) {
        if now < self.last_observed {
            // Clock skew; start a fresh epoch rather than waiting forever.
            self.scheduled = now;
        }
        self.last_observed = now;
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn on_success(&mut self, now: Timestamp) {
        self.last_observed = now;
        self.scheduled = now;
        self.suspended = false;
    }

    fn on_failure(&mut self, now: Timestamp) {
        self.observe(now);
        self.scheduled = self.scheduled.max(now).saturating_add(self.draw());
    }

    fn on_unavailable(&mut self, now: Timestamp) {
        self.observe(now);
        self.suspended = true;
    }

    fn on_new_file(&mut self, now: Timestamp) {
        self.observe(now);
        if self.resume_on_new_file {
            self.suspended = false;
        }
    }

    fn force_resume(&mut self, now: Timestamp) {
        self.last_observed = now;
        self.scheduled = now;
        self.suspended = false;
    }

    fn ready_to_process(&mut self, now: Timestamp) -> bool {
        if self.suspended {
            return false;
        }
        if now < self.last_observed {
            self.last_observed = now;
            self.scheduled = now;
            return true;
        }
        now >= self.scheduled
    }

    fn next_wake(&self, now: Timestamp) -> Option<TimeSpan> {
        if self.suspended || self.scheduled <= now {
            None
        } else {
            Some(self.scheduled - now)
        }
    }
}
