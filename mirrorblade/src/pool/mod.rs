//! Priority worker pool.
//!
//! Four FIFO lanes drained by a fixed set of worker threads under a
//! weighted-round-robin schedule: the schedule vector concatenates each
//! lane repeated by its weight, and workers advance a shared cursor over
//! it, taking the first non-empty lane within one full revolution. Over
//! long horizons with saturated lanes, executed counts converge to the
//! weight ratios.
//!
//! # Shutdown
//!
//! `stop()` either drains pending work (`drain_on_stop`, the default) or
//! discards it, then joins every worker. `flush()` blocks callers until
//! the lanes are empty or the pool stops.
//!
//! # Failure isolation
//!
//! Task panics are caught at the worker boundary, logged at error level,
//! and counted as executed; they never take a worker down.

mod lane;
mod stats;

pub use lane::Lane;
pub use stats::{LaneStats, PoolStats};

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, trace};

/// Smoothing factor for the per-task timing average.
const EWMA_ALPHA: f64 = 0.1;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Worker-pool errors. Only thread allocation at start is fatal.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to spawn worker thread: {0}")]
    Spawn(std::io::Error),
}

/// Pool sizing and scheduling knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Worker thread count. Defaults to available parallelism, falling
    /// back to 4 when that cannot be determined.
    pub workers: usize,
    pub weight_high: u32,
    pub weight_normal: u32,
    pub weight_low: u32,
    pub weight_io: u32,
    /// Whether `stop()` finishes pending tasks before joining workers.
    pub drain_on_stop: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|p| p.get())
            .unwrap_or(4);
        Self {
            workers,
            weight_high: 8,
            weight_normal: 4,
            weight_low: 1,
            weight_io: 2,
            drain_on_stop: true,
        }
    }
}

impl PoolConfig {
    /// The flatter 3/2/1/1 weighting profile.
    pub fn compact() -> Self {
        Self {
            weight_high: 3,
            weight_normal: 2,
            weight_low: 1,
            weight_io: 1,
            ..Default::default()
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_drain_on_stop(mut self, drain: bool) -> Self {
        self.drain_on_stop = drain;
        self
    }

    fn weight(&self, lane: Lane) -> u32 {
        match lane {
            Lane::High => self.weight_high,
            Lane::Normal => self.weight_normal,
            Lane::Low => self.weight_low,
            Lane::Io => self.weight_io,
        }
    }

    /// Builds the schedule vector: each lane repeated by its weight, in
    /// High, Normal, Low, IO order. Zero weights count as one.
    fn schedule(&self) -> Vec<Lane> {
        let mut schedule = Vec::new();
        for lane in Lane::ALL {
            let n = self.weight(lane).max(1);
            schedule.extend(std::iter::repeat(lane).take(n as usize));
        }
        schedule
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Stopped,
    Running,
    Stopping,
}

struct QueuedTask {
    run: Task,
    enqueued_at: Instant,
}

#[derive(Default)]
struct LaneQueue {
    tasks: VecDeque<QueuedTask>,
    enqueued: u64,
    executed: u64,
}

struct Inner {
    lanes: [LaneQueue; 4],
    schedule: Vec<Lane>,
    cursor: usize,
    state: RunState,
    ewma_usec: f64,
}

impl Inner {
    fn has_pending(&self) -> bool {
        self.lanes.iter().any(|q| !q.tasks.is_empty())
    }

    fn clear_all(&mut self) -> usize {
        let mut dropped = 0;
        for q in &mut self.lanes {
            dropped += q.tasks.len();
            q.tasks.clear();
        }
        dropped
    }

    /// Pops the next task by advancing the cursor up to one full
    /// revolution over the schedule vector.
    fn try_pop(&mut self) -> Option<(QueuedTask, Lane)> {
        for _ in 0..self.schedule.len() {
            let lane = self.schedule[self.cursor];
            self.cursor = (self.cursor + 1) % self.schedule.len();
            if let Some(task) = self.lanes[lane.index()].tasks.pop_front() {
                return Some((task, lane));
            }
        }
        None
    }

    fn stats(&self) -> PoolStats {
        let lane = |l: Lane| {
            let q = &self.lanes[l.index()];
            LaneStats {
                enqueued: q.enqueued,
                executed: q.executed,
                pending: q.tasks.len(),
            }
        };
        PoolStats {
            high: lane(Lane::High),
            normal: lane(Lane::Normal),
            low: lane(Lane::Low),
            io: lane(Lane::Io),
            ewma_usec: self.ewma_usec,
        }
    }
}

/// Multi-lane weighted-round-robin executor.
pub struct WorkerPool {
    config: PoolConfig,
    inner: Mutex<Inner>,
    cv: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes concurrent `stop()` calls so a late caller cannot mark
    /// the pool stopped while another is still draining workers.
    stop_lock: Mutex<()>,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Arc<Self> {
        let schedule = config.schedule();
        Arc::new(Self {
            config,
            inner: Mutex::new(Inner {
                lanes: Default::default(),
                schedule,
                cursor: 0,
                state: RunState::Stopped,
                ewma_usec: 0.0,
            }),
            cv: Condvar::new(),
            workers: Mutex::new(Vec::new()),
            stop_lock: Mutex::new(()),
        })
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(PoolConfig::default())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// A task panic cannot poison the inner mutex (tasks run outside the
    /// lock and are caught), so recovery here only covers panics inside
    /// the pool's own bookkeeping.
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Starts the workers. Idempotent while running.
    pub fn start(self: &Arc<Self>) -> Result<(), PoolError> {
        {
            let mut inner = self.lock_inner();
            if inner.state != RunState::Stopped {
                return Ok(());
            }
            inner.schedule = self.config.schedule();
            inner.cursor = 0;
            inner.ewma_usec = 0.0;
            for q in &mut inner.lanes {
                q.enqueued = 0;
                q.executed = 0;
            }
            inner.state = RunState::Running;
        }

        let count = self.config.workers.max(1);
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let pool = Arc::clone(self);
            let handle = std::thread::Builder::new()
                .name(format!("mb-worker-{i}"))
                .spawn(move || pool.worker_loop(i))
                .map_err(PoolError::Spawn)?;
            handles.push(handle);
        }

        match self.workers.lock() {
            Ok(mut guard) => guard.extend(handles),
            Err(poisoned) => poisoned.into_inner().extend(handles),
        }

        info!(workers = count, "Worker pool started");
        Ok(())
    }

    /// Stops the pool and joins every worker. Idempotent.
    ///
    /// With `drain_on_stop`, workers finish everything already queued;
    /// otherwise all lanes are cleared and workers exit at the next wake.
    pub fn stop(&self) {
        let _stop_guard = match self.stop_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        {
            let mut inner = self.lock_inner();
            if inner.state != RunState::Running {
                return;
            }
            inner.state = RunState::Stopping;
            if !self.config.drain_on_stop {
                let dropped = inner.clear_all();
                if dropped > 0 {
                    debug!(dropped, "Cleared pending tasks on stop");
                }
            }
        }
        self.cv.notify_all();

        let handles: Vec<JoinHandle<()>> = {
            match self.workers.lock() {
                Ok(mut guard) => guard.drain(..).collect(),
                Err(poisoned) => poisoned.into_inner().drain(..).collect(),
            }
        };
        for handle in handles {
            let _ = handle.join();
        }

        {
            let mut inner = self.lock_inner();
            inner.state = RunState::Stopped;
        }
        self.cv.notify_all();
        info!("Worker pool stopped");
    }

    /// Blocks until the pool is not running or all lanes are empty.
    ///
    /// Does not fence out producers: tasks enqueued while flushing extend
    /// the wait.
    pub fn flush(&self) {
        let mut inner = self.lock_inner();
        while inner.state == RunState::Running && inner.has_pending() {
            inner = match self.cv.wait(inner) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Appends a task to `lane`. Returns false when the pool is not
    /// accepting work (stopped or stopping); the callable is dropped.
    pub fn enqueue(&self, lane: Lane, task: impl FnOnce() + Send + 'static) -> bool {
        {
            let mut inner = self.lock_inner();
            if inner.state != RunState::Running {
                return false;
            }
            let queue = &mut inner.lanes[lane.index()];
            queue.tasks.push_back(QueuedTask {
                run: Box::new(task),
                enqueued_at: Instant::now(),
            });
            queue.enqueued += 1;
        }
        self.cv.notify_one();
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock_inner().state == RunState::Running
    }

    /// Atomic snapshot of counters, pending sizes, and timing.
    pub fn stats(&self) -> PoolStats {
        self.lock_inner().stats()
    }

    fn worker_loop(self: &Arc<Self>, index: usize) {
        trace!(worker = index, "Worker started");
        loop {
            let (task, lane) = {
                let mut inner = self.lock_inner();
                loop {
                    match inner.state {
                        RunState::Stopped => return,
                        RunState::Stopping => {
                            if !self.config.drain_on_stop || !inner.has_pending() {
                                return;
                            }
                        }
                        RunState::Running => {}
                    }
                    if let Some(popped) = inner.try_pop() {
                        break popped;
                    }
                    inner = match self.cv.wait(inner) {
                        Ok(guard) => guard,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                }
            };

            self.execute(task, lane);
        }
    }

    /// Runs one task outside the lock, then records its completion.
    fn execute(&self, task: QueuedTask, lane: Lane) {
        let waited_us = task.enqueued_at.elapsed().as_micros() as u64;
        let started = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(task.run));
        let elapsed_us = started.elapsed().as_micros() as f64;

        if let Err(payload) = outcome {
            error!(
                lane = %lane,
                panic = panic_message(&payload),
                "Task panicked"
            );
        }
        trace!(lane = %lane, waited_us, elapsed_us, "Task completed");

        let mut inner = self.lock_inner();
        inner.lanes[lane.index()].executed += 1;
        inner.ewma_usec = if inner.ewma_usec <= 0.0 {
            elapsed_us
        } else {
            EWMA_ALPHA * elapsed_us + (1.0 - EWMA_ALPHA) * inner.ewma_usec
        };
        if !inner.has_pending() {
            // Wake flushers and draining workers.
            self.cv.notify_all();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn small_pool(drain: bool) -> Arc<WorkerPool> {
        WorkerPool::new(
            PoolConfig::default()
                .with_workers(2)
                .with_drain_on_stop(drain),
        )
    }

    #[test]
    fn test_schedule_vector_lengths_match_weights() {
        let cfg = PoolConfig::default();
        let schedule = cfg.schedule();
        assert_eq!(schedule.len(), (8 + 4 + 1 + 2) as usize);
        let highs = schedule.iter().filter(|l| **l == Lane::High).count();
        assert_eq!(highs, 8);
        assert_eq!(schedule[0], Lane::High);
        assert_eq!(*schedule.last().unwrap(), Lane::Io);
    }

    #[test]
    fn test_zero_weight_treated_as_one() {
        let mut cfg = PoolConfig::default();
        cfg.weight_low = 0;
        let lows = cfg.schedule().iter().filter(|l| **l == Lane::Low).count();
        assert_eq!(lows, 1);
    }

    #[test]
    fn test_enqueue_before_start_returns_false() {
        let pool = small_pool(true);
        assert!(!pool.enqueue(Lane::Normal, || {}));
        assert_eq!(pool.stats().enqueued_total(), 0);
    }

    #[test]
    fn test_start_is_idempotent() {
        let pool = small_pool(true);
        pool.start().unwrap();
        pool.start().unwrap();
        assert!(pool.is_running());
        pool.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let pool = small_pool(true);
        pool.start().unwrap();
        pool.stop();
        pool.stop();
        assert!(!pool.is_running());
    }

    #[test]
    fn test_executes_enqueued_tasks() {
        let pool = small_pool(true);
        pool.start().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let counter = Arc::clone(&counter);
            assert!(pool.enqueue(Lane::Normal, move || {
                counter.fetch_add(1, Ordering::Relaxed);
            }));
        }
        pool.flush();
        pool.stop();

        assert_eq!(counter.load(Ordering::Relaxed), 16);
        let stats = pool.stats();
        assert_eq!(stats.executed_total(), 16);
        assert_eq!(stats.enqueued_total(), 16);
    }

    #[test]
    fn test_drain_on_stop_executes_everything() {
        let pool = WorkerPool::new(PoolConfig::default().with_workers(1));
        pool.start().unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.enqueue(Lane::Low, move || {
                std::thread::sleep(Duration::from_millis(1));
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.stop();

        assert_eq!(counter.load(Ordering::Relaxed), 50);
        let stats = pool.stats();
        assert_eq!(stats.executed_total(), stats.enqueued_total());
        assert_eq!(stats.pending_total(), 0);
    }

    #[test]
    fn test_abort_stop_discards_pending() {
        let pool = WorkerPool::new(
            PoolConfig::default()
                .with_workers(1)
                .with_drain_on_stop(false),
        );
        pool.start().unwrap();

        // One slow task keeps the worker busy while the rest queue up.
        pool.enqueue(Lane::High, || std::thread::sleep(Duration::from_millis(100)));
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            pool.enqueue(Lane::Low, move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.stop();

        assert!(counter.load(Ordering::Relaxed) < 50);
        assert_eq!(pool.stats().pending_total(), 0);
    }

    #[test]
    fn test_lane_order_is_fifo() {
        let pool = WorkerPool::new(PoolConfig::default().with_workers(1));
        pool.start().unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let order = Arc::clone(&order);
            pool.enqueue(Lane::Normal, move || {
                order.lock().unwrap().push(i);
            });
        }
        pool.flush();
        pool.stop();

        let order = order.lock().unwrap();
        assert_eq!(*order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let pool = WorkerPool::new(PoolConfig::default().with_workers(1));
        pool.start().unwrap();

        pool.enqueue(Lane::Normal, || panic!("boom"));
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let counter = Arc::clone(&counter);
            pool.enqueue(Lane::Normal, move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
        pool.flush();
        pool.stop();

        assert_eq!(counter.load(Ordering::Relaxed), 1);
        assert_eq!(pool.stats().lane(Lane::Normal).executed, 2);
    }

    #[test]
    fn test_ewma_bootstraps_then_smooths() {
        let pool = WorkerPool::new(PoolConfig::default().with_workers(1));
        pool.start().unwrap();

        pool.enqueue(Lane::Normal, || std::thread::sleep(Duration::from_millis(5)));
        pool.flush();
        let first = pool.stats().ewma_usec;
        assert!(first > 0.0);

        pool.enqueue(Lane::Normal, || {});
        pool.flush();
        let second = pool.stats().ewma_usec;
        assert!(second < first, "fast task should pull the average down");
        pool.stop();
    }

    #[test]
    fn test_flush_returns_when_not_running() {
        let pool = small_pool(true);
        // Never started; must not block.
        pool.flush();
    }

    #[test]
    fn test_restart_resets_counters() {
        let pool = small_pool(true);
        pool.start().unwrap();
        pool.enqueue(Lane::High, || {});
        pool.flush();
        pool.stop();
        assert_eq!(pool.stats().executed_total(), 1);

        pool.start().unwrap();
        assert_eq!(pool.stats().executed_total(), 0);
        assert_eq!(pool.stats().enqueued_total(), 0);
        pool.stop();
    }

    #[test]
    fn test_weighted_distribution_roughly_matches() {
        // Single worker so the schedule fully determines pop order.
        let pool = WorkerPool::new(PoolConfig::default().with_workers(1));
        pool.start().unwrap();

        // A blocker task lets every lane saturate before draining starts.
        let gate = Arc::new(Mutex::new(()));
        let held = gate.lock().unwrap();
        {
            let gate = Arc::clone(&gate);
            pool.enqueue(Lane::High, move || {
                let _g = gate.lock().unwrap();
            });
        }

        let executed: Arc<Mutex<Vec<Lane>>> = Arc::new(Mutex::new(Vec::new()));
        for _ in 0..60 {
            for lane in Lane::ALL {
                let executed = Arc::clone(&executed);
                pool.enqueue(lane, move || {
                    executed.lock().unwrap().push(lane);
                });
            }
        }
        drop(held);
        pool.flush();
        pool.stop();

        let executed = executed.lock().unwrap();
        // Consider only the window where every lane still had work: first
        // 15 full revolutions of the 15-slot schedule.
        let window = &executed[..(15 * 8).min(executed.len())];
        let high = window.iter().filter(|l| **l == Lane::High).count() as f64;
        let normal = window.iter().filter(|l| **l == Lane::Normal).count() as f64;
        assert!(high / normal > 1.5, "high/normal = {}", high / normal);
    }
}
