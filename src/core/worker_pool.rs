//! Fixed-size CPU worker pool for precompute tasks.
//!
//! Tasks are independent closures writing to disjoint outputs; the pool only
//! has to run them and report how many are still outstanding. Workers share a
//! single job channel and join on drop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use crate::error::{RenderError, RenderResult};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    workers: Vec<Worker>,
    sender: Option<mpsc::Sender<Job>>,
    outstanding: Arc<AtomicUsize>,
}

struct Worker {
    #[allow(dead_code)]
    id: usize,
    handle: Option<thread::JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool with `size` worker threads (0 = auto-detect).
    pub fn new(size: usize) -> Self {
        let size = if size == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
        } else {
            size
        };

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let outstanding = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::new(id, Arc::clone(&receiver)));
        }

        log::debug!("worker pool started with {} threads", size);

        Self {
            workers,
            sender: Some(sender),
            outstanding,
        }
    }

    /// Queue a task. The outstanding count is incremented before the task is
    /// visible to any worker and decremented after the closure returns.
    pub fn push_task<F>(&self, f: F) -> RenderResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| RenderError::pool("pool is shutting down"))?;

        let outstanding = Arc::clone(&self.outstanding);
        outstanding.fetch_add(1, Ordering::SeqCst);
        let job: Job = Box::new(move || {
            f();
            outstanding.fetch_sub(1, Ordering::SeqCst);
        });

        sender.send(job).map_err(|_| {
            self.outstanding.fetch_sub(1, Ordering::SeqCst);
            RenderError::pool("failed to submit task: all workers exited")
        })
    }

    /// Number of tasks queued or currently running.
    pub fn tasks_left(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn thread_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker drain remaining jobs and exit.
        drop(self.sender.take());

        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                handle
                    .join()
                    .unwrap_or_else(|_| log::error!("worker thread panicked"));
            }
        }
    }
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Job>>>) -> Worker {
        let handle = thread::spawn(move || loop {
            let receiver = receiver.lock().unwrap();
            match receiver.recv() {
                Ok(job) => {
                    drop(receiver); // Release lock before executing
                    job();
                }
                Err(_) => break, // Channel closed
            }
        });

        Worker {
            id,
            handle: Some(handle),
        }
    }
}
