// Copyright (c) 2024 Mike Tsao

use crossbeam::{
    channel::{unbounded, Receiver, Sender},
    sync::WaitGroup,
};
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
    thread::JoinHandle,
};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of threads that runs batches of tasks and waits for all of
/// them.
///
/// A panicking task doesn't take its worker down or keep the batch from
/// finishing; its slot in the results holds the panic instead.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}
impl WorkerPool {
    /// Starts `size` workers (at least one).
    pub fn new_with(size: usize) -> Self {
        let (sender, receiver) = unbounded::<Job>();
        let workers = (0..size.max(1))
            .map(|i| {
                let receiver = receiver.clone();
                std::thread::Builder::new()
                    .name(format!("rulebeat-worker-{i}"))
                    .spawn(move || Self::execute(receiver))
            })
            .filter_map(|r| match r {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::error!("Couldn't start a worker thread: {e}");
                    None
                }
            })
            .collect();
        Self {
            sender: Some(sender),
            workers,
        }
    }

    fn execute(receiver: Receiver<Job>) {
        while let Ok(job) = receiver.recv() {
            job();
        }
    }

    /// How many workers are running.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Runs every task and returns once all have finished. Results are in
    /// task order.
    pub fn run_batch<T, F>(&self, tasks: Vec<F>) -> Vec<Result<T, Box<dyn Any + Send>>>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let count = tasks.len();
        if count == 0 {
            return Vec::default();
        }

        let (result_sender, result_receiver) = unbounded();
        let barrier = WaitGroup::new();
        let mut queued = 0;
        for (index, task) in tasks.into_iter().enumerate() {
            let result_sender = result_sender.clone();
            let barrier = barrier.clone();
            let job: Job = Box::new(move || {
                let result = catch_unwind(AssertUnwindSafe(task));
                let _ = result_sender.send((index, result));
                drop(barrier);
            });
            match self.sender.as_ref() {
                Some(sender) if !self.workers.is_empty() => {
                    if let Err(e) = sender.send(job) {
                        // Nobody is listening, so run it here.
                        (e.into_inner())();
                    }
                }
                _ => job(),
            }
            queued += 1;
        }
        drop(result_sender);
        barrier.wait();

        let mut results: Vec<(usize, Result<T, Box<dyn Any + Send>>)> =
            result_receiver.try_iter().collect();
        debug_assert_eq!(results.len(), queued);
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's loop.
        self.sender = None;
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

/// A readable message from a caught panic.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
