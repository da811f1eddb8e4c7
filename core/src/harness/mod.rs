use std::{
    fmt::Display,
    num::NonZeroUsize,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering::Relaxed},
        Arc,
    },
    thread::Builder,
    time::Duration,
};

use log::{debug, info, log_enabled, warn, Level};

use crate::{asserted_short_name, fmt_num, prelude::*};

/// Cooperative cancellation handle shared between a run and its workers. Workers check it
/// between increments, never inside the critical section, hence cancelling can not leave
/// the counter in a corrupted state.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.cancelled.store(true, Relaxed);
    }
    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Relaxed)
    }
}

/// Failure of a single worker, always carrying how many increments actually completed so
/// that partial work is never silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkerError {
    #[error("worker cancelled after {completed} of {expected} increments")]
    Interrupted { completed: usize, expected: usize },
    #[error("worker lock acquisition failed after {completed} of {expected} increments: {source}")]
    LockAcquisitionFailed {
        completed: usize,
        expected: usize,
        source: CounterError,
    },
}
impl WorkerError {
    pub fn completed(&self) -> usize {
        match self {
            Self::Interrupted { completed, .. } => *completed,
            Self::LockAcquisitionFailed { completed, .. } => *completed,
        }
    }
}

/// A unit of work which performs a fixed number of increments against the shared counter
/// by repeatedly invoking [ConcurrentCounter::increment_once]. Stateless apart from the
/// counter reference, progress is published via an atomic the spawner retains so that
/// completed work is recoverable even when the worker thread panics.
#[derive(Debug)]
pub struct WorkerTask {
    counter: Arc<ConcurrentCounter>,
    increments: usize,
    acquire_timeout: Option<Duration>,
    token: CancelToken,
    progress: Arc<AtomicUsize>,
}
impl WorkerTask {
    pub fn new(counter: Arc<ConcurrentCounter>, increments: usize, token: CancelToken) -> Self {
        Self {
            counter,
            increments,
            acquire_timeout: None,
            token,
            progress: Arc::new(AtomicUsize::new(0)),
        }
    }
    /// Bounds every lock acquisition, a worker which can not acquire the counter lock within
    /// `timeout` stops and reports [WorkerError::LockAcquisitionFailed].
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }
    /// Progress handle to keep on the spawning side, see [WorkerTask] docs.
    pub fn progress(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.progress)
    }
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }
    /// Runs until all increments completed, the token is cancelled or lock acquisition timed
    /// out. Returns the number of completed increments on success.
    pub fn run(self) -> Result<usize, WorkerError> {
        let mut completed = 0_usize;
        while completed < self.increments {
            if self.token.is_cancelled() {
                return Err(WorkerError::Interrupted { completed, expected: self.increments });
            }
            match self.acquire_timeout {
                None => self.counter.increment_once(),
                Some(timeout) => {
                    if let Err(source) = self.counter.try_increment_once(timeout) {
                        return Err(WorkerError::LockAcquisitionFailed { completed, expected: self.increments, source });
                    }
                }
            }
            completed += 1;
            self.progress.store(completed, Relaxed);
        }
        Ok(completed)
    }
}
impl Display for WorkerTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}<increments: {}, counter: {}>", asserted_short_name!("WorkerTask", Self), fmt_num!(self.increments), self.counter)
    }
}

/// Outcome of one worker after its thread terminated, normally or otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker: usize,
    pub completed: usize,
    pub error: Option<WorkerError>,
}
impl WorkerReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}
impl Display for WorkerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            None => write!(f, "Worker-{}<completed: {}>", self.worker, fmt_num!(self.completed)),
            Some(error) => write!(f, "Worker-{}<completed: {}, error: {}>", self.worker, fmt_num!(self.completed), error),
        }
    }
}

/// Aggregate outcome of a run, distinguishes full success from partial completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    final_count: usize,
    reports: Vec<WorkerReport>,
}
impl RunSummary {
    /// Value of the counter after every worker terminated.
    pub fn final_count(&self) -> usize {
        self.final_count
    }
    pub fn reports(&self) -> &[WorkerReport] {
        &self.reports
    }
    pub fn is_complete(&self) -> bool {
        self.reports.iter().all(|report| report.is_complete())
    }
    /// Sum of increments actually completed across all workers, equals [Self::final_count]
    /// under [SyncPolicy::Mutex] even when some workers were cancelled.
    pub fn completed_increments(&self) -> usize {
        self.reports.iter().map(|report| report.completed).sum()
    }
    pub fn failed_workers(&self) -> impl Iterator<Item = &WorkerReport> {
        self.reports.iter().filter(|report| !report.is_complete())
    }
    pub fn first_error(&self) -> Option<&WorkerError> {
        self.reports.iter().find_map(|report| report.error.as_ref())
    }
}
impl Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}<final: {}, workers: {}, failed: {}>",
            asserted_short_name!("RunSummary", Self),
            fmt_num!(self.final_count),
            self.reports.len(),
            self.failed_workers().count()
        )
    }
}

impl ConcurrentCounter {
    /// Spawns one named thread per worker, each performing `increments_per_worker` increments,
    /// and blocks until every worker terminated, normally or otherwise. Per worker outcomes
    /// are aggregated into the returned [RunSummary], a panicked worker is reported as
    /// [WorkerError::Interrupted] with its last observed progress.
    pub fn run(self: &Arc<Self>, workers: NonZeroUsize, increments_per_worker: usize) -> RunSummary {
        self.run_with_token(workers, increments_per_worker, &CancelToken::new())
    }
    /// Same as [Self::run] with a caller supplied [CancelToken] shared by all workers, which
    /// allows the entire run to be cancelled from another thread.
    pub fn run_with_token(self: &Arc<Self>, workers: NonZeroUsize, increments_per_worker: usize, token: &CancelToken) -> RunSummary {
        let mut joiners = Vec::with_capacity(workers.get());
        for idx in 0..workers.get() {
            let task = WorkerTask::new(Arc::clone(self), increments_per_worker, token.clone());
            let progress = task.progress();
            let jh = Builder::new()
                .name(format!("Worker-{}", idx))
                .spawn(move || task.run())
                .unwrap_or_else(|_| panic!("Failed to spawn worker thread: 'Worker-{}'", idx));
            joiners.push((idx, progress, jh));
        }

        let mut reports = Vec::with_capacity(workers.get());
        for (idx, progress, jh) in joiners {
            let report = match jh.join() {
                Ok(Ok(completed)) => WorkerReport { worker: idx, completed, error: None },
                Ok(Err(error)) => WorkerReport { worker: idx, completed: error.completed(), error: Some(error) },
                Err(_) => {
                    // abnormal termination, recover last published progress
                    let completed = progress.load(Relaxed);
                    warn!("Worker-{} terminated abnormally after {} increments", idx, fmt_num!(completed));
                    WorkerReport {
                        worker: idx,
                        completed,
                        error: Some(WorkerError::Interrupted { completed, expected: increments_per_worker }),
                    }
                }
            };
            if log_enabled!(Level::Debug) {
                debug!("joined {}", report);
            }
            reports.push(report);
        }

        let summary = RunSummary { final_count: self.value(), reports };
        if log_enabled!(Level::Info) {
            info!("{} {}", self, summary);
        }
        summary
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::unittest::setup;
    use log::info;
    use more_asserts::{assert_le, assert_lt};
    use std::thread;

    #[test]
    fn test_run_guarded_is_exact() {
        setup::log::configure_compact(log::LevelFilter::Info);
        const INCREMENTS: usize = 1_000_000;
        let workers = NonZeroUsize::new(10).unwrap();
        let counter = ConcurrentCounter::new_ref(SyncPolicy::Mutex);
        let summary = counter.run(workers, INCREMENTS);
        info!("summary: {}", summary);
        assert!(summary.is_complete());
        assert_eq!(summary.final_count(), workers.get() * INCREMENTS);
        assert_eq!(summary.completed_increments(), workers.get() * INCREMENTS);
    }

    #[test]
    fn test_run_zero_increments() {
        setup::log::configure_compact(log::LevelFilter::Info);
        let counter = ConcurrentCounter::new_ref(SyncPolicy::Mutex);
        let summary = counter.run(NonZeroUsize::new(1).unwrap(), 0);
        info!("summary: {}", summary);
        assert!(summary.is_complete());
        assert_eq!(summary.final_count(), 0);
    }

    #[test]
    fn test_run_unguarded_race_is_observable() {
        setup::log::configure_compact(log::LevelFilter::Info);
        const TRIALS: usize = 20;
        const INCREMENTS: usize = 100_000;
        let racers = NonZeroUsize::new(4).unwrap();
        let mut observed_loss = false;
        for trial in 0..TRIALS {
            let counter = ConcurrentCounter::new_ref(SyncPolicy::None);
            let summary = counter.run(racers, INCREMENTS);
            // every worker finished its loop, losses come from the counter, not the workers
            assert!(summary.is_complete());
            assert_le!(summary.final_count(), racers.get() * INCREMENTS);
            if summary.final_count() < racers.get() * INCREMENTS {
                info!("trial: {}, lost updates: {}", trial, fmt_num!(racers.get() * INCREMENTS - summary.final_count()));
                observed_loss = true;
                break;
            }
        }
        assert!(observed_loss, "no lost update observed in {} trials", TRIALS);
    }

    #[test]
    fn test_cancelled_worker_reports_partial_completion() {
        setup::log::configure_compact(log::LevelFilter::Info);
        const INCREMENTS: usize = 10_000_000;
        let counter = ConcurrentCounter::new_ref(SyncPolicy::Mutex);

        let token = CancelToken::new();
        let task = WorkerTask::new(Arc::clone(&counter), INCREMENTS, token.clone());
        let progress = task.progress();
        let jh = thread::Builder::new().name("Worker-Cancelled".to_owned()).spawn(move || task.run()).unwrap();
        while progress.load(Relaxed) < 500 {
            std::hint::spin_loop();
        }
        token.cancel();
        let res = jh.join().unwrap();
        info!("res: {:?}", res);
        let Err(WorkerError::Interrupted { completed, expected }) = &res else { panic!("expected interruption, got: {:?}", res) };
        assert_eq!(*expected, INCREMENTS);
        assert_le!(500, *completed);
        assert_lt!(*completed, INCREMENTS);
        assert_eq!(counter.value(), *completed);

        // a worker with its own token is unaffected by the cancelled one
        let full_task = WorkerTask::new(Arc::clone(&counter), 10_000, CancelToken::new());
        assert_eq!(full_task.run(), Ok(10_000));
        assert_eq!(counter.value(), *completed + 10_000);
    }

    #[test]
    fn test_run_with_token_cancels_all_workers() {
        setup::log::configure_compact(log::LevelFilter::Info);
        const INCREMENTS: usize = 10_000_000;
        let racers = NonZeroUsize::new(2).unwrap();
        let counter = ConcurrentCounter::new_ref(SyncPolicy::Mutex);
        let token = CancelToken::new();

        let jh = thread::Builder::new()
            .name("Run-Driver".to_owned())
            .spawn({
                let counter = Arc::clone(&counter);
                let token = token.clone();
                move || counter.run_with_token(racers, INCREMENTS, &token)
            })
            .unwrap();
        while counter.value() < 1_000 {
            std::hint::spin_loop();
        }
        token.cancel();
        let summary = jh.join().unwrap();
        info!("summary: {}", summary);
        assert!(!summary.is_complete());
        assert!(matches!(summary.first_error(), Some(WorkerError::Interrupted { .. })));
        // under mutex policy the counter reflects exactly the work that completed
        assert_eq!(summary.final_count(), summary.completed_increments());
        assert_lt!(summary.final_count(), racers.get() * INCREMENTS);
    }

    #[test]
    fn test_panicked_worker_is_reported_not_dropped() {
        setup::log::configure_compact(log::LevelFilter::Info);
        const INCREMENTS: usize = 1_000;
        let counter = ConcurrentCounter::new_ref(SyncPolicy::Mutex);

        let task = WorkerTask::new(Arc::clone(&counter), INCREMENTS, CancelToken::new());
        let progress = task.progress();
        let jh = thread::Builder::new()
            .name("Worker-Panicking".to_owned())
            .spawn(move || {
                let mut completed = 0_usize;
                while completed < 500 {
                    // drive the task's counter directly so the panic lands mid work
                    task.counter.increment_once();
                    completed += 1;
                    task.progress.store(completed, Relaxed);
                }
                panic!("worker gave up");
            })
            .unwrap();
        let res = jh.join();
        assert!(res.is_err());
        let completed = progress.load(Relaxed);
        info!("completed before panic: {}", fmt_num!(completed));
        assert_eq!(completed, 500);
        assert_eq!(counter.value(), 500);
    }
}
