use crate::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// The result of one pool task, tagged with the index it was submitted under.
#[derive(Debug)]
pub struct TaskOutcome<R> {
    pub index: usize,
    pub result: Result<R>,
}

/// Default pool width: one task per available processing unit.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs `tasks` on a fixed number of workers and returns one outcome per
/// task, sorted by submission index.
///
/// Workers claim task indices from a shared counter and push typed results
/// over a channel; a failing task is reported once, with no retries, and the
/// remaining tasks still run. Callers check the aggregate afterwards (see
/// [`collect_results`]).
pub async fn run_tasks<T, R, F, Fut>(tasks: Vec<T>, workers: usize, op: F) -> Vec<TaskOutcome<R>>
where
    T: Clone + Send + Sync + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    let total = tasks.len();
    if total == 0 {
        return Vec::new();
    }

    let tasks = Arc::new(tasks);
    let op = Arc::new(op);
    let next = Arc::new(AtomicUsize::new(0));
    let (tx, mut rx) = mpsc::channel(total);

    let workers = workers.clamp(1, total);
    let mut handles = Vec::with_capacity(workers);

    for _ in 0..workers {
        let tasks = Arc::clone(&tasks);
        let op = Arc::clone(&op);
        let next = Arc::clone(&next);
        let tx = tx.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let index = next.fetch_add(1, Ordering::SeqCst);
                if index >= tasks.len() {
                    break;
                }

                let result = op(tasks[index].clone()).await;
                if tx.send(TaskOutcome { index, result }).await.is_err() {
                    break;
                }
            }
        }));
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(total);
    while let Some(outcome) = rx.recv().await {
        outcomes.push(outcome);
    }

    for handle in handles {
        let _ = handle.await;
    }

    outcomes.sort_by_key(|o| o.index);
    outcomes
}

/// Aggregates pool outcomes: all results in submission order on success,
/// or the first failure wrapped as a task error.
pub fn collect_results<R>(label: &str, outcomes: Vec<TaskOutcome<R>>) -> Result<Vec<R>> {
    let mut results = Vec::with_capacity(outcomes.len());

    for outcome in outcomes {
        match outcome.result {
            Ok(value) => results.push(value),
            Err(e) => {
                return Err(Error::IoTask {
                    task: format!("{label} #{}", outcome.index),
                    message: e.to_string(),
                })
            }
        }
    }

    Ok(results)
}
