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

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use fsq::{
    AppendStrategy, BacklogAwareFinalizePolicy, CapacityPurgePolicy, Clock, ExponentialBackoff,
    FileInfo, FileProcessingResult, ManualClock, QueueBuilder, SystemClock, Timestamp,
};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Delivery {
    name:     String,
    contents: Vec<u8>,
    now:      Timestamp,
}

/// Records every `on_file_ready` call; replies with a scripted result, then
/// `Success` once the script runs out.
#[derive(Clone, Default)]
struct Recorder {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
    script:     Arc<Mutex<VecDeque<FileProcessingResult>>>,
}

impl Recorder {
    fn with_script(results: impl IntoIterator<Item = FileProcessingResult>) -> Self {
        Self {
            deliveries: Arc::default(),
            script:     Arc::new(Mutex::new(results.into_iter().collect())),
        }
    }

    fn processor(
        &self,
    ) -> impl FnMut(&FileInfo, Timestamp) -> FileProcessingResult + Send + 'static {
        let deliveries = self.deliveries.clone();
        let script = self.script.clone();
        move |file: &FileInfo, now: Timestamp| {
            let contents = std::fs::read(&file.full_path).unwrap_or_default();
            deliveries.lock().unwrap().push(Delivery {
                name: file.name.clone(),
                contents,
                now,
            });
            script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(FileProcessingResult::Success)
        }
    }

    fn len(&self) -> usize { self.deliveries.lock().unwrap().len() }

    fn get(&self, index: usize) -> Delivery { self.deliveries.lock().unwrap()[index].clone() }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Small thresholds matching the behaviors under test: realtime 20B / 10s,
/// backlog 100B / 60s.
fn test_finalize_policy() -> BacklogAwareFinalizePolicy {
    BacklogAwareFinalizePolicy {
        backlog_max_size:  100,
        backlog_max_age:   60_000,
        realtime_max_size: 20,
        realtime_max_age:  10_000,
    }
}

fn newline() -> AppendStrategy { AppendStrategy::delimited(b"\n".to_vec()) }

#[test]
fn test_finalized_by_size() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(101));
    let recorder = Recorder::default();

    let queue = QueueBuilder::new(dir.path())
        .clock(clock.clone())
        .append_strategy(newline())
        .finalize_policy(test_finalize_policy())
        .build(recorder.processor())
        .unwrap();

    queue.push_message("this is").unwrap();
    clock.set(102);
    queue.push_message("a test").unwrap();

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(queue.status().appended_file_size, 15);
    assert_eq!(recorder.len(), 0, "below the size threshold, no finalize");

    clock.set(103);
    queue.push_message("now go ahead and process this stuff").unwrap();

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 1));
    let delivery = recorder.get(0);
    assert_eq!(delivery.name, "finalized-00000000000000000101.bin");
    assert_eq!(
        delivery.contents,
        b"this is\na test\nnow go ahead and process this stuff\n"
    );
    assert_eq!(delivery.now, 103);

    // Success removes the file before anything else is offered.
    assert!(wait_until(Duration::from_secs(5), || {
        !dir.path().join(&delivery.name).exists()
    }));

    queue.shutdown().unwrap();
}

#[test]
fn test_finalized_by_age() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(10_000));
    let recorder = Recorder::default();

    let queue = QueueBuilder::new(dir.path())
        .clock(clock.clone())
        .append_strategy(newline())
        .finalize_policy(test_finalize_policy())
        .build(recorder.processor())
        .unwrap();

    queue.push_message("this too").unwrap();
    clock.set(10_001);
    queue.push_message("shall").unwrap();

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(recorder.len(), 0);

    clock.set(21_000);
    queue.push_message("pass").unwrap();

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 1));
    let delivery = recorder.get(0);
    assert_eq!(delivery.name, "finalized-00000000000000010000.bin");
    assert_eq!(delivery.contents, b"this too\nshall\npass\n");

    queue.shutdown().unwrap();
}

#[test]
fn test_force_processing() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(1001));
    let recorder = Recorder::default();

    let queue = QueueBuilder::new(dir.path())
        .clock(clock.clone())
        .append_strategy(newline())
        .finalize_policy(test_finalize_policy())
        .build(recorder.processor())
        .unwrap();

    queue.push_message("foo").unwrap();
    clock.set(1002);
    queue.push_message("bar").unwrap();
    clock.set(1003);
    queue.push_message("baz").unwrap();

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(recorder.len(), 0, "no threshold hit");

    queue.force_processing().unwrap();

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 1));
    let delivery = recorder.get(0);
    assert_eq!(delivery.name, "finalized-00000000000000001001.bin");
    assert_eq!(delivery.contents, b"foo\nbar\nbaz\n");

    queue.shutdown().unwrap();
}

#[test]
fn test_resumes_orphaned_current() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("current-00000000000000000001.bin"),
        b"meh\n",
    )
    .unwrap();

    let clock = Arc::new(ManualClock::new(1));
    let recorder = Recorder::default();
    let queue = QueueBuilder::new(dir.path())
        .clock(clock)
        .append_strategy(newline())
        .finalize_policy(test_finalize_policy())
        .build(recorder.processor())
        .unwrap();

    queue.push_message("wow").unwrap();
    queue.force_processing().unwrap();

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 1));
    let delivery = recorder.get(0);
    assert_eq!(delivery.name, "finalized-00000000000000000001.bin");
    assert_eq!(delivery.contents, b"meh\nwow\n");

    queue.shutdown().unwrap();
}

#[test]
fn test_multiple_orphans_promoted_in_order() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("current-00000000000000000001.bin"), b"one\n").unwrap();
    std::fs::write(dir.path().join("current-00000000000000000002.bin"), b"two\n").unwrap();
    std::fs::write(
        dir.path().join("current-00000000000000000003.bin"),
        b"three\n",
    )
    .unwrap();

    let clock = Arc::new(ManualClock::new(3));
    let recorder = Recorder::default();
    let queue = QueueBuilder::new(dir.path())
        .clock(clock.clone())
        .append_strategy(newline())
        .finalize_policy(test_finalize_policy())
        .build(recorder.processor())
        .unwrap();

    // The two older orphans are promoted and delivered without any push.
    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 2));
    assert_eq!(recorder.get(0).name, "finalized-00000000000000000001.bin");
    assert_eq!(recorder.get(0).contents, b"one\n");
    assert_eq!(recorder.get(1).name, "finalized-00000000000000000002.bin");
    assert_eq!(recorder.get(1).contents, b"two\n");

    // The newest orphan was resumed as the current file.
    clock.set(4);
    queue.push_message("four").unwrap();
    queue.force_processing().unwrap();

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 3));
    let delivery = recorder.get(2);
    assert_eq!(delivery.name, "finalized-00000000000000000003.bin");
    assert_eq!(delivery.contents, b"three\nfour\n");

    queue.shutdown().unwrap();
}

#[test]
fn test_zero_thresholds_finalize_every_push_in_order() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(1));
    let recorder = Recorder::default();

    let queue = QueueBuilder::new(dir.path())
        .clock(clock.clone())
        .append_strategy(newline())
        .finalize_policy(BacklogAwareFinalizePolicy {
            backlog_max_size:  0,
            backlog_max_age:   0,
            realtime_max_size: 0,
            realtime_max_age:  0,
        })
        .build(recorder.processor())
        .unwrap();

    for (i, message) in ["first", "second", "third"].iter().enumerate() {
        clock.set(i as Timestamp + 1);
        queue.push_message(*message).unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 3));
    // Monotone finalized timestamps, one file per push.
    assert_eq!(recorder.get(0).name, "finalized-00000000000000000001.bin");
    assert_eq!(recorder.get(0).contents, b"first\n");
    assert_eq!(recorder.get(1).name, "finalized-00000000000000000002.bin");
    assert_eq!(recorder.get(1).contents, b"second\n");
    assert_eq!(recorder.get(2).name, "finalized-00000000000000000003.bin");
    assert_eq!(recorder.get(2).contents, b"third\n");

    queue.shutdown().unwrap();
}

#[test]
fn test_success_and_moved_leaves_file_alone() {
    let dir = TempDir::new().unwrap();
    let side = TempDir::new().unwrap();
    let side_path = side.path().to_path_buf();

    let deliveries: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = deliveries.clone();
    let processor = move |file: &FileInfo, _: Timestamp| {
        let target = side_path.join(&file.name);
        std::fs::rename(&file.full_path, &target).unwrap();
        seen.lock().unwrap().push(file.name.clone());
        FileProcessingResult::SuccessAndMoved
    };

    let clock = Arc::new(ManualClock::new(1));
    let queue = QueueBuilder::new(dir.path())
        .clock(clock)
        .append_strategy(newline())
        .build(processor)
        .unwrap();

    queue.push_message("payload").unwrap();
    queue.force_processing().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        deliveries.lock().unwrap().len() == 1
    }));
    let name = deliveries.lock().unwrap()[0].clone();

    // The queue did not touch the moved file and does not re-deliver it.
    assert!(side.path().join(&name).exists());
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(deliveries.lock().unwrap().len(), 1);

    queue.shutdown().unwrap();
}

#[test]
fn test_unavailable_suspends_until_forced() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(1));
    let recorder = Recorder::with_script([FileProcessingResult::Unavailable]);

    let queue = QueueBuilder::new(dir.path())
        .clock(clock)
        .append_strategy(newline())
        .build(recorder.processor())
        .unwrap();

    queue.push_message("stuck").unwrap();
    queue.force_processing().unwrap();

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 1));

    // Suspended: the file stays and is not re-offered on its own.
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(recorder.len(), 1);
    let name = recorder.get(0).name.clone();
    assert!(dir.path().join(&name).exists());

    // An external resume re-offers the same file, now successfully.
    queue.force_processing().unwrap();
    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 2));
    assert_eq!(recorder.get(1).name, name);
    assert!(wait_until(Duration::from_secs(5), || {
        !dir.path().join(&name).exists()
    }));

    queue.shutdown().unwrap();
}

#[test]
fn test_purge_drops_oldest_finalized_files() {
    let dir = TempDir::new().unwrap();
    // One pre-existing finalized file parks the worker inside the processor
    // callback, so the push sequence below runs without interference.
    std::fs::write(dir.path().join("finalized-00000000000000000001.bin"), b"x\n").unwrap();

    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let processor = move |file: &FileInfo, _: Timestamp| {
        entered_tx.send(file.name.clone()).unwrap();
        let _ = release_rx.recv();
        FileProcessingResult::Unavailable
    };

    let clock = Arc::new(ManualClock::new(10));
    let queue = QueueBuilder::new(dir.path())
        .clock(clock.clone())
        .append_strategy(newline())
        .finalize_policy(BacklogAwareFinalizePolicy {
            backlog_max_size:  0,
            backlog_max_age:   0,
            realtime_max_size: 0,
            realtime_max_age:  0,
        })
        .purge_policy(CapacityPurgePolicy {
            max_total_bytes: u64::MAX,
            max_files:       2,
        })
        .build(processor)
        .unwrap();

    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker should offer the seeded file");

    // Every push finalizes; the purge cap of two keeps only the newest.
    for i in 11..=15u64 {
        clock.set(i);
        queue.push_message(format!("m{i}")).unwrap();
    }

    let status = queue.status();
    assert_eq!(status.finalized.queue.len(), 2, "purge enforces the cap");
    let names: Vec<&str> = status
        .finalized
        .queue
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "finalized-00000000000000000014.bin",
            "finalized-00000000000000000015.bin"
        ]
    );
    for purged in [1u64, 11, 12, 13] {
        assert!(
            !dir.path().join(format!("finalized-{purged:020}.bin")).exists(),
            "finalized file {purged} should have been purged"
        );
    }
    assert!(dir.path().join("finalized-00000000000000000014.bin").exists());
    assert!(dir.path().join("finalized-00000000000000000015.bin").exists());

    release_tx.send(()).unwrap();
    queue.shutdown().unwrap();
}

#[test]
fn test_restart_picks_up_finalized_backlog() {
    let dir = TempDir::new().unwrap();

    {
        let clock = Arc::new(ManualClock::new(1));
        let recorder = Recorder::with_script([FileProcessingResult::Unavailable]);
        let queue = QueueBuilder::new(dir.path())
            .clock(clock.clone())
            .append_strategy(newline())
            .finalize_policy(BacklogAwareFinalizePolicy {
                backlog_max_size:  0,
                backlog_max_age:   0,
                realtime_max_size: 0,
                realtime_max_age:  0,
            })
            .build(recorder.processor())
            .unwrap();

        queue.push_message("one").unwrap();
        clock.set(2);
        queue.push_message("two").unwrap();
        // Let the worker suspend on the first offer so both files survive.
        assert!(wait_until(Duration::from_secs(5), || recorder.len() >= 1));
        queue.shutdown().unwrap();
    }

    let recorder = Recorder::default();
    let queue = QueueBuilder::new(dir.path())
        .clock(Arc::new(ManualClock::new(10)))
        .append_strategy(newline())
        .build(recorder.processor())
        .unwrap();

    // No pushes needed: recovery feeds the backlog straight to the worker.
    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 2));
    assert_eq!(recorder.get(0).name, "finalized-00000000000000000001.bin");
    assert_eq!(recorder.get(0).contents, b"one\n");
    assert_eq!(recorder.get(1).name, "finalized-00000000000000000002.bin");
    assert_eq!(recorder.get(1).contents, b"two\n");

    queue.shutdown().unwrap();
}

#[test]
fn test_repeated_force_processing_coalesces() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(1));

    let deliveries: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = deliveries.clone();
    let processor = move |file: &FileInfo, _: Timestamp| {
        // A slow processor, so the extra force calls land while busy.
        std::thread::sleep(Duration::from_millis(20));
        seen.lock().unwrap().push(file.name.clone());
        FileProcessingResult::Success
    };

    let queue = QueueBuilder::new(dir.path())
        .clock(clock)
        .append_strategy(newline())
        .build(processor)
        .unwrap();

    queue.push_message("once").unwrap();
    for _ in 0..5 {
        queue.force_processing().unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || {
        deliveries.lock().unwrap().len() == 1
    }));
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(
        deliveries.lock().unwrap().len(),
        1,
        "coalesced forces must not duplicate delivery"
    );

    queue.shutdown().unwrap();
}

#[test]
fn test_drain_on_shutdown_processes_backlog() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(1));
    let recorder = Recorder::default();

    let queue = QueueBuilder::new(dir.path())
        .clock(clock)
        .append_strategy(newline())
        .drain_on_shutdown(true)
        .build(recorder.processor())
        .unwrap();

    queue.push_message("drain me").unwrap();
    queue.force_processing().unwrap();
    queue.shutdown().unwrap();

    // Shutdown joined the worker only after the backlog was drained.
    assert_eq!(recorder.len(), 1);
    assert_eq!(recorder.get(0).contents, b"drain me\n");
}

#[test]
fn test_restart_with_current_matches_forced_processing() {
    // A stop/restart with a leftover current file behaves like
    // force_processing in the original session: same finalized basename
    // (the pre-existing embedded timestamp), same contents.
    // Path one: push and force within a single session.
    let forced_dir = TempDir::new().unwrap();
    let forced = Recorder::default();
    {
        let queue = QueueBuilder::new(forced_dir.path())
            .clock(Arc::new(ManualClock::new(5)))
            .append_strategy(newline())
            .build(forced.processor())
            .unwrap();
        queue.push_message("alpha").unwrap();
        queue.force_processing().unwrap();
        assert!(wait_until(Duration::from_secs(5), || forced.len() == 1));
        queue.shutdown().unwrap();
    }

    // Path two: push, stop, restart, force.
    let restarted_dir = TempDir::new().unwrap();
    let restarted = Recorder::default();
    {
        let queue = QueueBuilder::new(restarted_dir.path())
            .clock(Arc::new(ManualClock::new(5)))
            .append_strategy(newline())
            .build(|_: &FileInfo, _: Timestamp| FileProcessingResult::Success)
            .unwrap();
        queue.push_message("alpha").unwrap();
        queue.shutdown().unwrap();

        let queue = QueueBuilder::new(restarted_dir.path())
            .clock(Arc::new(ManualClock::new(99)))
            .append_strategy(newline())
            .build(restarted.processor())
            .unwrap();
        queue.force_processing().unwrap();
        assert!(wait_until(Duration::from_secs(5), || restarted.len() == 1));
        queue.shutdown().unwrap();
    }

    assert_eq!(forced.get(0).name, "finalized-00000000000000000005.bin");
    assert_eq!(restarted.get(0).name, forced.get(0).name);
    assert_eq!(restarted.get(0).contents, forced.get(0).contents);
    assert_eq!(restarted.get(0).contents, b"alpha\n");
}

#[test]
fn test_backlog_suppresses_realtime_finalize() {
    let dir = TempDir::new().unwrap();

    // Park the worker inside the first delivery so the backlog stays put.
    let (entered_tx, entered_rx) = std::sync::mpsc::channel();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let processor = move |file: &FileInfo, _: Timestamp| {
        entered_tx.send(file.name.clone()).unwrap();
        let _ = release_rx.recv();
        FileProcessingResult::Unavailable
    };

    let clock = Arc::new(ManualClock::new(1));
    let queue = QueueBuilder::new(dir.path())
        .clock(clock.clone())
        .append_strategy(newline())
        .finalize_policy(BacklogAwareFinalizePolicy {
            backlog_max_size:  1000,
            backlog_max_age:   60_000,
            realtime_max_size: 10,
            realtime_max_age:  10_000,
        })
        .build(processor)
        .unwrap();

    // No backlog yet, so the realtime threshold seals this file.
    queue.push_message("first one long").unwrap();
    entered_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker should offer the sealed file");

    // With a backlog pending, the same sizes no longer trigger a seal.
    for i in 2..=4u64 {
        clock.set(i);
        queue.push_message("equally long xx").unwrap();
    }
    let status = queue.status();
    assert_eq!(status.finalized.queue.len(), 1);
    assert_eq!(status.appended_file_size, 48);
    assert_eq!(status.appended_file_timestamp, 2);

    release_tx.send(()).unwrap();
    queue.shutdown().unwrap();
}

#[test]
fn test_push_messages_batch() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(42));
    let recorder = Recorder::default();

    let queue = QueueBuilder::new(dir.path())
        .clock(clock)
        .append_strategy(newline())
        .build(recorder.processor())
        .unwrap();

    queue.push_messages(["one", "two", "three"]).unwrap();
    queue.force_processing().unwrap();

    assert!(wait_until(Duration::from_secs(5), || recorder.len() == 1));
    let delivery = recorder.get(0);
    assert_eq!(delivery.name, "finalized-00000000000000000042.bin");
    assert_eq!(delivery.contents, b"one\ntwo\nthree\n");

    queue.shutdown().unwrap();
}

#[test]
fn test_retry_latency_percentiles() {
    const WORKERS: usize = 6;
    const FAILURES: usize = 3;
    const RETRY_MS: u64 = 10;
    const P25_MAX_MS: f64 = 5_000.0;
    const P75_MIN_MS: f64 = (FAILURES as u64 * RETRY_MS) as f64;

    struct Worker {
        _dir:     TempDir,
        queue:    fsq::Queue,
        recorder: Recorder,
        push_ts:  Timestamp,
    }

    let clock = SystemClock;
    let mut workers = Vec::new();
    for _ in 0..WORKERS {
        let dir = TempDir::new().unwrap();
        let recorder =
            Recorder::with_script(vec![FileProcessingResult::FailureNeedRetry; FAILURES]);
        let queue = QueueBuilder::new(dir.path())
            .append_strategy(newline())
            .retry_policy(ExponentialBackoff::new(RETRY_MS, RETRY_MS, RETRY_MS))
            .build(recorder.processor())
            .unwrap();
        workers.push(Worker {
            _dir: dir,
            queue,
            recorder,
            push_ts: 0,
        });
    }

    for worker in &mut workers {
        worker.push_ts = clock.now();
        worker.queue.push_message("foo").unwrap();
        worker.queue.force_processing().unwrap();
    }

    assert!(wait_until(Duration::from_secs(30), || {
        workers.iter().all(|w| w.recorder.len() == FAILURES + 1)
    }));

    let mut latencies: Vec<u64> = workers
        .iter()
        .map(|w| {
            let success = w.recorder.get(FAILURES);
            success.now.saturating_sub(w.push_ts)
        })
        .collect();
    latencies.sort_unstable();

    let p25 = percentile(0.25, &latencies);
    let p75 = percentile(0.75, &latencies);
    assert!(p25 <= P25_MAX_MS, "p25 latency {p25}ms too high");
    assert!(p75 >= P75_MIN_MS, "p75 latency {p75}ms too low for {FAILURES} retries");

    for worker in workers {
        worker.queue.shutdown().unwrap();
    }
}

fn percentile(p: f64, sorted: &[u64]) -> f64 {
    assert!(!sorted.is_empty());
    assert!((0.0..=1.0).contains(&p));
    let index = (sorted.len() - 1) as f64 * p;
    let lo = index.floor() as usize;
    let hi = lo + 1;
    let upper_weight = index - lo as f64;
    let mut result = (1.0 - upper_weight) * sorted[lo] as f64;
    if hi < sorted.len() {
        result += upper_weight * sorted[hi] as f64;
    }
    result
}
