//! Worker pool that decodes files off the async runtime.
//!
//! ```text
//!   producer ──push()──► crossbeam channel ──► N worker threads
//!       ▲                                          │ FileScanner::scan
//!       └──── pop_results() ◄── result buffer ◄────┘
//! ```
//!
//! Decoding is CPU and I/O bound, so it runs on dedicated std threads rather
//! than on tokio's blocking pool. The producer throttles itself with
//! [`FileScanQueue::wait`], which parks until the number of in-flight files
//! drops below a threshold.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::{Condvar, Mutex};

use crate::error::Result;
use crate::model::FileKind;
use crate::scanner::{FileScanner, ParsedFile, ScanErrorKind, WalkedFile};

/// One file to decode.
pub struct FileScanTask {
    pub file: WalkedFile,
    pub scanner: Arc<dyn FileScanner>,
}

/// A completed decode. Decoder errors are results too.
#[derive(Debug)]
pub struct FileScanResult {
    pub file: WalkedFile,
    pub kind: FileKind,
    pub scanner_name: &'static str,
    pub parsed: std::result::Result<ParsedFile, ScanErrorKind>,
}

struct Shared {
    abort: Arc<AtomicBool>,
    shutdown: AtomicBool,
    in_flight: Mutex<usize>,
    in_flight_changed: Condvar,
    results: Mutex<VecDeque<FileScanResult>>,
}

impl Shared {
    fn task_done(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        self.in_flight_changed.notify_all();
    }

    fn wait(&self, max_in_flight: usize) {
        let mut in_flight = self.in_flight.lock();
        while *in_flight > max_in_flight {
            self.in_flight_changed.wait(&mut in_flight);
        }
    }
}

/// Fixed-size pool of decoding threads with a shared result buffer.
pub struct FileScanQueue {
    sender: Option<Sender<FileScanTask>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl FileScanQueue {
    /// Start `thread_count` workers. Tasks pushed after `abort` is raised are
    /// dropped without being decoded.
    pub fn new(thread_count: usize, abort: Arc<AtomicBool>) -> Result<Self> {
        let thread_count = thread_count.max(1);
        let (sender, receiver) = unbounded::<FileScanTask>();

        let shared = Arc::new(Shared {
            abort,
            shutdown: AtomicBool::new(false),
            in_flight: Mutex::new(0),
            in_flight_changed: Condvar::new(),
            results: Mutex::new(VecDeque::new()),
        });

        let mut workers = Vec::with_capacity(thread_count);
        for i in 0..thread_count {
            let receiver = receiver.clone();
            let shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("file-scan-{i}"))
                .spawn(move || worker_loop(receiver, shared))?;
            workers.push(handle);
        }

        tracing::debug!(target: "queue::file_scan", threads = thread_count, "File scan queue started");

        Ok(Self {
            sender: Some(sender),
            workers,
            shared,
        })
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }

    /// Queue a file for decoding. Never blocks.
    pub fn push(&self, task: FileScanTask) {
        let Some(sender) = &self.sender else {
            return;
        };

        *self.shared.in_flight.lock() += 1;
        if sender.send(task).is_err() {
            // All workers are gone
            self.shared.task_done();
        }
    }

    /// Pop up to `max` completed results.
    pub fn pop_results(&self, max: usize) -> Vec<FileScanResult> {
        let mut results = self.shared.results.lock();
        let n = max.min(results.len());
        results.drain(..n).collect()
    }

    pub fn results_count(&self) -> usize {
        self.shared.results.lock().len()
    }

    /// Files queued or being decoded.
    pub fn in_flight(&self) -> usize {
        *self.shared.in_flight.lock()
    }

    /// Block the calling thread until at most `max_in_flight` files remain.
    pub fn wait_blocking(&self, max_in_flight: usize) {
        self.shared.wait(max_in_flight);
    }

    /// Async variant of [`Self::wait_blocking`].
    pub async fn wait(&self, max_in_flight: usize) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.wait(max_in_flight)).await?;
        Ok(())
    }

    /// Stop accepting work, drop undispatched tasks and join every worker.
    ///
    /// Decodes already running complete first. Idempotent.
    pub fn shutdown(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.sender.take();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!(target: "queue::file_scan", "File scan worker terminated abnormally");
            }
        }
    }
}

impl Drop for FileScanQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: Receiver<FileScanTask>, shared: Arc<Shared>) {
    while let Ok(task) = receiver.recv() {
        if shared.shutdown.load(Ordering::SeqCst) || shared.abort.load(Ordering::SeqCst) {
            shared.task_done();
            continue;
        }

        let FileScanTask { file, scanner } = task;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| scanner.scan(&file.path)));

        match outcome {
            Ok(parsed) => {
                shared.results.lock().push_back(FileScanResult {
                    file,
                    kind: scanner.kind(),
                    scanner_name: scanner.name(),
                    parsed,
                });
            }
            Err(_) => {
                tracing::error!(
                    target: "queue::file_scan",
                    path = %file.path.display(),
                    scanner = scanner.name(),
                    "Decoder panicked, file skipped"
                );
            }
        }

        // Results are visible before the in-flight count drops
        shared.task_done();
    }
}
