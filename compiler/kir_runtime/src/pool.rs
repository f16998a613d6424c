//! Host execution on a dedicated pool of named worker threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};

use crate::context::{run_item, Context};
use crate::error::{collect_faults, Error, ItemFault, KernelFault, Result};
use crate::kernel::{Kernel, WorkItem};

/// A queued work-item. The flag tells it the pool is shutting down and
/// it must report itself abandoned instead of running.
type Job = Box<dyn FnOnce(bool) + Send + 'static>;

const ABANDONED: &str = "abandoned by pool shutdown";

/// Counts outstanding work-items of one `compute` call.
struct Latch {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl Latch {
    fn new(count: usize) -> Self {
        Latch {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.done.wait(&mut remaining);
        }
    }
}

/// Fixed pool of long-lived workers, created once.
///
/// `close` is a forced, best-effort stop: queued items are abandoned
/// and reported as faults, items already running finish, and the
/// workers exit without being joined. Do not close while a `compute` is
/// outstanding on another thread.
pub struct PoolContext {
    sender: Mutex<Option<Sender<Job>>>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    threads: usize,
}

impl PoolContext {
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let (sender, receiver) = channel::unbounded::<Job>();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("kir-cpu#{index}"))
                .spawn(move || worker_loop(&receiver, &shutdown))
                .map_err(|err| Error::Internal {
                    message: format!("cannot spawn worker thread: {err}"),
                })?;
            workers.push(handle);
        }
        tracing::debug!(threads, "started worker pool");
        Ok(PoolContext {
            sender: Mutex::new(Some(sender)),
            shutdown,
            workers: Mutex::new(workers),
            threads,
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

fn worker_loop(receiver: &Receiver<Job>, shutdown: &AtomicBool) {
    while let Ok(job) = receiver.recv() {
        job(shutdown.load(Ordering::Acquire));
    }
}

fn abandoned(work_item: usize) -> ItemFault {
    ItemFault {
        work_item,
        fault: KernelFault::new(ABANDONED),
    }
}

impl Context for PoolContext {
    fn compute(&self, n: usize, kernel: &Arc<dyn Kernel>) -> Result<()> {
        let sender = self.sender.lock().clone().ok_or(Error::Closed)?;
        if n == 0 {
            return Ok(());
        }
        tracing::trace!(work_items = n, threads = self.threads, "pool compute");

        let latch = Arc::new(Latch::new(n));
        let faults = Arc::new(Mutex::new(Vec::new()));
        for id in 0..n {
            let kernel = Arc::clone(kernel);
            let job_latch = Arc::clone(&latch);
            let job_faults = Arc::clone(&faults);
            let job: Job = Box::new(move |cancelled| {
                let fault = if cancelled {
                    Some(abandoned(id))
                } else {
                    run_item(kernel.as_ref(), WorkItem::new(id, n))
                };
                if let Some(fault) = fault {
                    job_faults.lock().push(fault);
                }
                job_latch.count_down();
            });
            if sender.send(job).is_err() {
                // Every worker is gone; nothing left will run.
                let mut faults = faults.lock();
                for rest in id..n {
                    faults.push(abandoned(rest));
                    latch.count_down();
                }
                break;
            }
        }
        drop(sender);
        latch.wait();

        let faults = std::mem::take(&mut *faults.lock());
        collect_faults(n, faults)
    }

    fn close(&self) -> Result<()> {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        // Dropping the last sender lets idle workers exit once the queue
        // has drained; queued jobs see the flag and abandon themselves.
        self.sender.lock().take();
        let detached = std::mem::take(&mut *self.workers.lock());
        tracing::debug!(threads = detached.len(), "closed worker pool");
        Ok(())
    }
}

impl Drop for PoolContext {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
#[expect(
    clippy::unwrap_used,
    reason = "tests use unwrap for concise assertions"
)]
mod tests;
