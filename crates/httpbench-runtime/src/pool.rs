//! `FixedPool`: N OS threads draining a bounded lock-free queue.
//!
//! The acceptor pushes accepted streams; workers pop and run the handler
//! to completion (one connection at a time per worker). No dynamic
//! scaling. A full queue rejects the job back to the caller.

use httpbench_core::error::{BenchError, Result};

use crossbeam_queue::ArrayQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Idle workers nap this long between queue polls.
const IDLE_PARK: Duration = Duration::from_millis(1);

struct PoolInner<T> {
    queue: ArrayQueue<T>,
    /// Workers currently running a job
    active: AtomicUsize,
    shutdown: AtomicBool,
}

pub struct FixedPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> FixedPool<T> {
    /// Spawn `n` workers running `handler` for every submitted job.
    ///
    /// `queue_depth`: max pending jobs before `submit` fails.
    pub fn new<F>(n: usize, queue_depth: usize, handler: F) -> Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let n = n.max(1);
        let inner = Arc::new(PoolInner {
            queue: ArrayQueue::new(queue_depth.max(1)),
            active: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
        });
        let handler = Arc::new(handler);

        let mut handles = Vec::with_capacity(n);
        for worker_id in 0..n {
            let inner = Arc::clone(&inner);
            let handler = Arc::clone(&handler);
            let name = format!("pool-worker-{}", worker_id);
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(&inner, &*handler))
                .map_err(|source| BenchError::Spawn { name, source })?;
            handles.push(handle);
        }

        Ok(Self { inner, handles })
    }

    /// Queue a job. Gives it back if the queue is full or the pool stopped.
    pub fn submit(&self, job: T) -> std::result::Result<(), T> {
        if self.inner.shutdown.load(Ordering::Relaxed) {
            return Err(job);
        }
        self.inner.queue.push(job)
    }

    pub fn active_workers(&self) -> usize {
        self.inner.active.load(Ordering::Relaxed)
    }

    pub fn total_workers(&self) -> usize {
        self.handles.len()
    }

    /// Stop accepting jobs, let workers finish the current one, join them.
    ///
    /// Jobs still queued are dropped.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<()> {
        self.inner.shutdown.store(true, Ordering::SeqCst);
        let mut result = Ok(());
        for handle in self.handles.drain(..) {
            let name = handle.thread().name().unwrap_or("pool-worker").to_string();
            if handle.join().is_err() && result.is_ok() {
                result = Err(BenchError::WorkerPanicked(name));
            }
        }
        while self.inner.queue.pop().is_some() {}
        result
    }
}

impl<T: Send + 'static> Drop for FixedPool<T> {
    fn drop(&mut self) {
        let _ = self.stop_and_join();
    }
}

fn worker_loop<T>(inner: &PoolInner<T>, handler: &(dyn Fn(T) + Send + Sync)) {
    while !inner.shutdown.load(Ordering::Relaxed) {
        match inner.queue.pop() {
            Some(job) => {
                inner.active.fetch_add(1, Ordering::Relaxed);
                handler(job);
                inner.active.fetch_sub(1, Ordering::Relaxed);
            }
            None => thread::park_timeout(IDLE_PARK),
        }
    }
}
