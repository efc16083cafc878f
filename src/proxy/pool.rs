//! Bounded worker pool for connection handling.
//!
//! A fixed set of threads drains a bounded job queue. When the queue is
//! full, `dispatch` blocks, so a connection flood applies backpressure at
//! the accept loop instead of growing without bound. Dropping the pool
//! closes the queue and joins every worker.

use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<SyncSender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize, queue_depth: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<Job>(queue_depth);
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..workers)
            .map(|id| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("worker-{id}"))
                    .spawn(move || worker_loop(&receiver))
            })
            .collect::<io::Result<Vec<_>>>()?;

        Ok(WorkerPool {
            sender: Some(sender),
            workers,
        })
    }

    /// Queue a job, blocking while the queue is full.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else { return };
        if sender.send(Box::new(job)).is_err() {
            warn!("worker pool is gone, dropping job");
        }
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
    loop {
        // Hold the receiver lock only for the dequeue, never across a job.
        let job = receiver.lock().recv();
        match job {
            Ok(job) => job(),
            Err(_) => break, // queue closed: shut down
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker drain and exit.
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
