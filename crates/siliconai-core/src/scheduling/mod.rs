//! Bounded worker pool running one task per input shard.

use crate::domain::{ValidatorError, ValidatorResult};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, warn};

/// Work done for a single shard. Implementations share read-only state
/// (geometry, codec) across workers.
pub trait ShardProcessor: Sync {
    type Output: Send;

    fn process(&self, task_id: usize) -> ValidatorResult<Self::Output>;
}

#[derive(Debug)]
pub struct ShardOutcome<T> {
    pub task_id: usize,
    pub result: ValidatorResult<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardPool {
    workers: usize,
}

impl ShardPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Run every task and return the outcomes ordered by task id. A failing
    /// task never stops its siblings.
    pub fn run<P: ShardProcessor>(
        &self,
        processor: &P,
        task_ids: impl IntoIterator<Item = usize>,
    ) -> Vec<ShardOutcome<P::Output>> {
        let task_ids: Vec<usize> = task_ids.into_iter().collect();
        let workers = self.workers.min(task_ids.len().max(1));
        let (task_tx, task_rx) = mpsc::sync_channel::<usize>(workers);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let (result_tx, result_rx) = mpsc::channel::<ShardOutcome<P::Output>>();

        debug!(workers, tasks = task_ids.len(), "starting shard pool");
        let mut outcomes = thread::scope(|scope| {
            for _ in 0..workers {
                let task_rx = Arc::clone(&task_rx);
                let result_tx = result_tx.clone();
                scope.spawn(move || worker_loop(processor, &task_rx, &result_tx));
            }
            drop(result_tx);

            for task_id in task_ids {
                if task_tx.send(task_id).is_err() {
                    break;
                }
            }
            drop(task_tx);

            result_rx.iter().collect::<Vec<_>>()
        });

        outcomes.sort_by_key(|outcome| outcome.task_id);
        outcomes
    }
}

fn worker_loop<P: ShardProcessor>(
    processor: &P,
    tasks: &Mutex<Receiver<usize>>,
    results: &mpsc::Sender<ShardOutcome<P::Output>>,
) {
    loop {
        let next = match tasks.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => return,
        };
        let Ok(task_id) = next else {
            return;
        };

        let result = processor.process(task_id);
        if let Err(error) = &result {
            warn!(task_id, error = %error, "shard failed");
        }
        if results.send(ShardOutcome { task_id, result }).is_err() {
            return;
        }
    }
}

/// First failure among `outcomes`, annotated with its shard.
pub fn first_failure<T>(outcomes: &[ShardOutcome<T>]) -> Option<ValidatorError> {
    outcomes.iter().find_map(|outcome| {
        outcome.result.as_ref().err().map(|error| {
            ValidatorError::new(
                error.category(),
                error.placeholder(),
                format!("shard {}: {}", outcome.task_id, error.message()),
            )
        })
    })
}
