//! Trailing-edge debounce timer.
//!
//! # Responsibility
//! - Collapse bursts of scheduled jobs into one run after a quiet period.
//! - Allow the pending job to be cancelled or run immediately.
//!
//! # Invariants
//! - At most one job is pending; `schedule` replaces it and restarts the
//!   quiet period.
//! - A job runs at most once, either from the timer or from `flush`.
//! - A job that has started runs to completion, and `flush` waits for it
//!   before returning.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;
type JobSlot = Arc<Mutex<Option<Job>>>;

/// Cancellable, flushable debounce timer running on a Tokio runtime.
pub struct Debouncer {
    delay: Duration,
    handle: Handle,
    slot: JobSlot,
    // Held while any job runs, by the timer task or by `flush`.
    running: Arc<Mutex<()>>,
    timer: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Creates a debouncer whose timers run on `handle`.
    pub fn new(delay: Duration, handle: Handle) -> Self {
        Self {
            delay,
            handle,
            slot: Arc::new(Mutex::new(None)),
            running: Arc::new(Mutex::new(())),
            timer: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replaces the pending job with `job` and restarts the quiet period.
    pub fn schedule<F>(&mut self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();

        // Fresh slot per schedule: a timer that already woke up can only
        // ever take the job it was spawned for.
        let slot: JobSlot = Arc::new(Mutex::new(Some(Box::new(job))));
        self.slot = Arc::clone(&slot);
        let running = Arc::clone(&self.running);
        let delay = self.delay;
        self.timer = Some(self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let _running = running.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(job) = take_job(&slot) {
                job();
            }
        }));
    }

    /// Drops the pending job without running it.
    pub fn cancel(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        drop(take_job(&self.slot));
    }

    /// Runs the pending job now, on the calling thread. A job the timer has
    /// already started is waited for instead.
    ///
    /// Returns `true` when a job was still pending.
    pub fn flush(&mut self) -> bool {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        let _running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        match take_job(&self.slot) {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Whether a job is waiting for its quiet period to end.
    pub fn is_pending(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

fn take_job(slot: &JobSlot) -> Option<Job> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;
    use tokio::runtime::Handle;

    fn counter_job(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_trailing_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(400), Handle::current());

        for _ in 0..5 {
            debouncer.schedule(counter_job(&runs));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_job() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(400), Handle::current());

        debouncer.schedule(counter_job(&runs));
        debouncer.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!debouncer.flush());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn flush_waits_for_a_job_the_timer_already_started() {
        let runs = Arc::new(AtomicUsize::new(0));
        let (release, gate) = mpsc::channel::<()>();
        let mut debouncer = Debouncer::new(Duration::from_millis(1), Handle::current());

        let job_runs = Arc::clone(&runs);
        debouncer.schedule(move || {
            let _ = gate.recv();
            job_runs.fetch_add(1, Ordering::SeqCst);
        });
        while debouncer.is_pending() {
            std::thread::sleep(Duration::from_millis(1));
        }

        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            drop(release);
        });
        assert!(!debouncer.flush());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        releaser.join().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn flush_runs_immediately_and_only_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(400), Handle::current());

        debouncer.schedule(counter_job(&runs));
        assert!(debouncer.flush());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
