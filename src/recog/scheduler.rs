//! Fixed-size worker pool fed through a bounded channel.
//!
//! Submitting blocks while the queue is full. Dropping the task sender is
//! the shutdown signal: workers finish the job in hand, drain the queue and
//! exit.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use log::{debug, warn};

use crate::utils::error::{OcrError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Starts `threads` workers sharing a queue of `capacity` jobs.
    pub fn new(threads: usize, capacity: usize) -> Result<Self> {
        if threads == 0 {
            return Err(OcrError::InvalidArg("worker pool needs at least one thread".into()));
        }
        let (sender, receiver) = bounded::<Job>(capacity);
        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let receiver: Receiver<Job> = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("ocr-worker-{}", i))
                .spawn(move || {
                    for job in receiver.iter() {
                        job();
                    }
                    debug!("worker {} exiting", i);
                })?;
            workers.push(handle);
        }
        debug!("started {} workers", threads);
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Runs `f` on every item and returns the outputs in input order. Blocks
    /// until all of them are done.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Result<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| OcrError::WorkerPool("pool has been shut down".into()))?;
        let f = std::sync::Arc::new(f);
        let (result_sender, result_receiver) = unbounded::<(usize, R)>();
        let count = items.len();

        for (index, item) in items.into_iter().enumerate() {
            let f = std::sync::Arc::clone(&f);
            let results = result_sender.clone();
            let job: Job = Box::new(move || {
                let output = f(item);
                // the caller only stops listening after an error
                let _ = results.send((index, output));
            });
            sender
                .send(job)
                .map_err(|_| OcrError::WorkerPool("task queue disconnected".into()))?;
        }
        drop(result_sender);

        let mut outputs: Vec<Option<R>> = (0..count).map(|_| None).collect();
        for _ in 0..count {
            let (index, output) = result_receiver
                .recv()
                .map_err(|_| OcrError::WorkerPool("worker stopped before finishing its task".into()))?;
            outputs[index] = Some(output);
        }
        outputs
            .into_iter()
            .map(|o| o.ok_or_else(|| OcrError::WorkerPool("missing task result".into())))
            .collect()
    }

    /// Closes the queue and waits for the workers to exit.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_results_in_input_order() {
        let pool = WorkerPool::new(3, 2).unwrap();
        let output = pool.map((0..20).collect(), |i: u64| {
            thread::sleep(std::time::Duration::from_millis(20 - i));
            i * i
        });
        assert_eq!(output.unwrap(), (0..20).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_shutdown_finishes_queued_work() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut pool = WorkerPool::new(2, 4).unwrap();
        let c = Arc::clone(&counter);
        pool.map(vec![1, 2, 3], move |n| {
            c.fetch_add(n, Ordering::SeqCst);
        })
        .unwrap();
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 6);
        assert!(!pool.is_running());
        assert!(matches!(pool.map(vec![1], |n: i32| n), Err(OcrError::WorkerPool(_))));
        // second shutdown is a no-op
        pool.shutdown();
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(WorkerPool::new(0, 1).is_err());
    }
}
