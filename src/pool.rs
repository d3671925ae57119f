//! Bounded worker pool for per-image batch tasks.
//!
//! Each task carries everything it needs before dispatch, so workers share
//! nothing but an atomic completed counter. Results come back in submission
//! order even though completion order across workers is arbitrary.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::error::Result;

/// Progress callback, invoked as `(completed, total)` after each task.
///
/// `completed` increases by one on every call. It may be called from any
/// worker thread.
pub type ProgressFn<'a> = &'a (dyn Fn(usize, usize) + Sync);

/// Monotonic completed-task counter feeding an optional callback.
struct Progress<'a> {
    done: AtomicUsize,
    total: usize,
    callback: Option<ProgressFn<'a>>,
}

impl Progress<'_> {
    fn advance(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(cb) = self.callback {
            cb(done, self.total);
        }
    }
}

/// Run `work` over every task and return the results in task order.
///
/// With `workers <= 1` tasks run sequentially on the calling thread.
/// Otherwise they run on a dedicated pool of `workers` threads. A task that
/// panics is mapped through `on_panic`, so one bad item never takes down
/// the batch.
///
/// # Errors
///
/// Returns [`crate::Error::ThreadPool`] if the pool cannot be built. No task
/// has run in that case.
pub fn run_tasks<T, R, W, P>(
    tasks: &[T],
    workers: usize,
    progress: Option<ProgressFn<'_>>,
    work: W,
    on_panic: P,
) -> Result<Vec<R>>
where
    T: Sync,
    R: Send,
    W: Fn(&T) -> R + Sync,
    P: Fn(&T, String) -> R + Sync,
{
    let progress = Progress {
        done: AtomicUsize::new(0),
        total: tasks.len(),
        callback: progress,
    };

    let run_one = |task: &T| {
        let result = match panic::catch_unwind(AssertUnwindSafe(|| work(task))) {
            Ok(r) => r,
            Err(payload) => on_panic(task, panic_message(payload.as_ref())),
        };
        progress.advance();
        result
    };

    if workers <= 1 {
        return Ok(tasks.iter().map(run_one).collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("qr-watermark-{i}"))
        .build()?;
    Ok(pool.install(|| tasks.par_iter().map(run_one).collect()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
