//! Fixed-size worker pool
//!
//! Jobs are pulled from a shared queue by `threads` scoped workers. Once the
//! stop flag is raised no further job is started; jobs already running
//! finish normally.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;

/// Bounded pool of scoped worker threads
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    threads: usize,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `work` on each job, handing every result to `on_complete`.
    ///
    /// Blocks until all started jobs finish. Returns the jobs that were never
    /// started because `stop` was raised, in queue order.
    pub fn run<J, R, W, C>(&self, jobs: Vec<J>, stop: &AtomicBool, work: W, on_complete: C) -> Vec<J>
    where
        J: Send,
        R: Send,
        W: Fn(&J) -> R + Sync,
        C: Fn(J, R) + Sync,
    {
        let workers = self.threads.min(jobs.len()).max(1);
        let queue = Mutex::new(VecDeque::from(jobs));

        thread::scope(|scope| {
            for worker in 0..workers {
                let queue = &queue;
                let work = &work;
                let on_complete = &on_complete;
                scope.spawn(move || loop {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let job = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => None,
                    };
                    let Some(job) = job else {
                        break;
                    };
                    tracing::trace!(worker, "picked up job");
                    let result = work(&job);
                    on_complete(job, result);
                });
            }
        });

        match queue.into_inner() {
            Ok(rest) => rest.into(),
            Err(poisoned) => poisoned.into_inner().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_runs_every_job() {
        let pool = WorkerPool::new(4);
        let stop = AtomicBool::new(false);
        let done = Mutex::new(Vec::new());

        let rest = pool.run(
            (0..20).collect(),
            &stop,
            |n: &i32| n * 2,
            |_, r| done.lock().unwrap().push(r),
        );

        assert!(rest.is_empty());
        let mut done = done.into_inner().unwrap();
        done.sort();
        assert_eq!(done, (0..20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(3);
        let stop = AtomicBool::new(false);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        pool.run(
            (0..12).collect::<Vec<_>>(),
            &stop,
            |_| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                active.fetch_sub(1, Ordering::SeqCst);
            },
            |_, _| {},
        );

        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_stop_leaves_jobs_unstarted() {
        let pool = WorkerPool::new(1);
        let stop = AtomicBool::new(false);

        let rest = pool.run(
            vec![1, 2, 3, 4],
            &stop,
            |n: &i32| *n,
            |_, r| {
                if r == 2 {
                    stop.store(true, Ordering::SeqCst);
                }
            },
        );

        assert_eq!(rest, vec![3, 4]);
    }

    #[test]
    fn test_zero_threads_means_one() {
        assert_eq!(WorkerPool::new(0).threads(), 1);
    }
}
