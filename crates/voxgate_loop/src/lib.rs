#![doc = include_str!("../README.md")]

mod delay;
pub mod metrics;

use std::borrow::Cow;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use crate::delay::DelayQueue;
pub use crate::metrics::{DurationHistogram, LoopMetrics};

/// Tuning knobs of the loop, loaded from the `eventLoop` config section.
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Target time between tick starts.
    pub tick_interval: Duration,
    /// Hard cap on actions drained per tick, across all priorities.
    pub max_actions_per_tick: usize,
    /// Individual actions slower than this are logged.
    pub slow_action_threshold: Duration,
    /// Ready-queue depth above which fresh enqueues are dropped.
    pub max_queue_depth: usize,
    /// How long a graceful shutdown keeps draining queued work.
    pub shutdown_grace: Duration,
    /// Whether to log the per-tick histogram on shutdown.
    pub detailed_metrics: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            max_actions_per_tick: 256,
            slow_action_threshold: Duration::from_millis(10),
            max_queue_depth: 4096,
            shutdown_grace: Duration::from_secs(5),
            detailed_metrics: false,
        }
    }
}

/// Scheduling priority. Per tick, all ready `High` actions run before any
/// `Normal` action, which run before any `Low` action.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

impl Priority {
    pub const ALL: [Self; 3] = [Self::High, Self::Normal, Self::Low];
}

/// Identifies one queued action for cancellation.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ActionId(u64);

type SyncFn<S> = Box<dyn FnOnce(&mut S, &LoopHandle<S>) -> anyhow::Result<()> + Send>;
type AsyncFn<S> = Box<dyn FnOnce(LoopHandle<S>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

enum Work<S> {
    Sync(SyncFn<S>),
    Async(AsyncFn<S>),
}

struct Action<S> {
    id: ActionId,
    name: Cow<'static, str>,
    priority: Priority,
    work: Work<S>,
}

enum Command<S> {
    Ready(Action<S>),
    Delayed(Action<S>, Instant),
}

/// State shared between the loop and its handles.
struct Shared {
    next_id: AtomicU64,
    /// Ids of actions that are queued or delayed but not yet started.
    pending: Mutex<FxHashSet<u64>>,
    /// Ids cancelled while still pending; the loop skips them on dequeue.
    cancelled: Mutex<FxHashSet<u64>>,
    shutdown: AtomicBool,
    ready_depth: AtomicUsize,
    depth_limit: usize,
    dropped: AtomicU64,
}

/// A cloneable, thread-safe way to feed work to the loop.
///
/// Async tasks and transport I/O threads hold one of these; everything they
/// want to do to domain state goes through [`enqueue`](Self::enqueue) and
/// runs serially on the loop.
pub struct LoopHandle<S> {
    tx: flume::Sender<Command<S>>,
    shared: Arc<Shared>,
}

impl<S> Clone for LoopHandle<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<S: 'static> LoopHandle<S> {
    /// Enqueues a synchronous action. Returns an id that can cancel it
    /// until it starts.
    pub fn enqueue(
        &self,
        priority: Priority,
        name: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&mut S, &LoopHandle<S>) -> anyhow::Result<()> + Send + 'static,
    ) -> ActionId {
        self.submit(priority, name.into(), Work::Sync(Box::new(f)), None)
    }

    /// Enqueues an action that fires no earlier than `delay` from now.
    pub fn enqueue_delayed(
        &self,
        delay: Duration,
        priority: Priority,
        name: impl Into<Cow<'static, str>>,
        f: impl FnOnce(&mut S, &LoopHandle<S>) -> anyhow::Result<()> + Send + 'static,
    ) -> ActionId {
        self.submit(
            priority,
            name.into(),
            Work::Sync(Box::new(f)),
            Some(Instant::now() + delay),
        )
    }

    /// Enqueues an async task. When dequeued, the future is spawned and
    /// the loop moves on; the task must route any domain mutation back
    /// through the handle it receives.
    pub fn enqueue_async<F, Fut>(
        &self,
        priority: Priority,
        name: impl Into<Cow<'static, str>>,
        f: F,
    ) -> ActionId
    where
        F: FnOnce(LoopHandle<S>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.submit(
            priority,
            name.into(),
            Work::Async(Box::new(move |handle| Box::pin(f(handle)))),
            None,
        )
    }

    fn submit(
        &self,
        priority: Priority,
        name: Cow<'static, str>,
        work: Work<S>,
        fire_at: Option<Instant>,
    ) -> ActionId {
        let id = ActionId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));

        if self.shared.shutdown.load(Ordering::Acquire) {
            debug!(action = %name, "loop is shutting down; dropping enqueue");
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return id;
        }

        if fire_at.is_none() && self.shared.ready_depth.load(Ordering::Relaxed) >= self.shared.depth_limit
        {
            warn!(action = %name, "ready queues are full; dropping enqueue");
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
            return id;
        }

        self.shared.pending.lock().insert(id.0);

        let action = Action { id, name, priority, work };
        let command = match fire_at {
            Some(at) => Command::Delayed(action, at),
            None => Command::Ready(action),
        };

        if self.tx.send(command).is_err() {
            self.shared.pending.lock().remove(&id.0);
        }

        id
    }

    /// Cancels a queued or delayed action. Returns `false` once the action
    /// has already started (or finished, or was never accepted).
    pub fn cancel(&self, id: ActionId) -> bool {
        if self.shared.pending.lock().remove(&id.0) {
            self.shared.cancelled.lock().insert(id.0);
            true
        } else {
            false
        }
    }

    /// Asks the loop to stop. Queued work is drained for the configured
    /// grace period; new enqueues are refused immediately.
    pub fn shutdown(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }
}

type SystemFn<S> = Box<dyn FnMut(&mut S, &LoopHandle<S>) -> anyhow::Result<()> + Send>;
type TickObserver = Box<dyn FnMut(Duration) + Send>;
type TickResetObserver = Box<dyn FnMut() + Send>;

/// The prioritized cooperative scheduler.
///
/// Exactly one thread drives the loop, and that thread is the single
/// writer of the domain state `S`. Session listeners, timers, and
/// generation completions all run here.
pub struct EventLoop<S> {
    config: LoopConfig,
    queues: [VecDeque<Action<S>>; 3],
    delayed: DelayQueue<Action<S>>,
    rx: flume::Receiver<Command<S>>,
    handle: LoopHandle<S>,
    systems: Vec<(Cow<'static, str>, SystemFn<S>)>,
    on_tick: Vec<TickObserver>,
    on_tick_reset: Vec<TickResetObserver>,
    tick_count: u64,
    metrics: LoopMetrics,
}

impl<S: 'static> EventLoop<S> {
    pub fn new(config: LoopConfig) -> Self {
        let (tx, rx) = flume::unbounded();

        let shared = Arc::new(Shared {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(FxHashSet::default()),
            cancelled: Mutex::new(FxHashSet::default()),
            shutdown: AtomicBool::new(false),
            ready_depth: AtomicUsize::new(0),
            depth_limit: config.max_queue_depth,
            dropped: AtomicU64::new(0),
        });

        Self {
            config,
            queues: [VecDeque::new(), VecDeque::new(), VecDeque::new()],
            delayed: DelayQueue::default(),
            rx,
            handle: LoopHandle { tx, shared },
            systems: Vec::new(),
            on_tick: Vec::new(),
            on_tick_reset: Vec::new(),
            tick_count: 0,
            metrics: LoopMetrics::default(),
        }
    }

    pub fn handle(&self) -> LoopHandle<S> {
        self.handle.clone()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn metrics(&self) -> &LoopMetrics {
        &self.metrics
    }

    /// Registers a function that runs at the start of every tick, before
    /// the action queues drain. Transport polling and cache eviction live
    /// here.
    pub fn add_system(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        f: impl FnMut(&mut S, &LoopHandle<S>) -> anyhow::Result<()> + Send + 'static,
    ) {
        self.systems.push((name.into(), Box::new(f)));
    }

    /// Observes the duration of every completed tick.
    pub fn on_tick(&mut self, f: impl FnMut(Duration) + Send + 'static) {
        self.on_tick.push(Box::new(f));
    }

    /// Observes the tick counter wrapping back to zero.
    pub fn on_tick_reset(&mut self, f: impl FnMut() + Send + 'static) {
        self.on_tick_reset.push(Box::new(f));
    }

    /// Drives the loop until [`LoopHandle::shutdown`] is called, then
    /// drains queued work for the grace period.
    pub async fn run(mut self, state: &mut S) -> LoopMetrics {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        while !self.handle.is_shutdown() {
            interval.tick().await;
            self.tick(state);
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        while self.has_ready_work() && Instant::now() < deadline {
            self.tick(state);
            tokio::task::yield_now().await;
        }

        if self.has_ready_work() {
            warn!("shutdown grace expired with work still queued");
        }

        info!("event loop stopped: {}", self.metrics.summary());

        if self.config.detailed_metrics {
            for (bound_us, count) in self.metrics.tick_durations.buckets() {
                if count > 0 {
                    debug!(bound_us, count, "tick duration bucket");
                }
            }
        }

        self.metrics
    }

    /// Runs a single tick: ingest commands, promote due delayed actions,
    /// run systems, then drain the priority queues up to the cap.
    pub fn tick(&mut self, state: &mut S) {
        let start = Instant::now();

        self.ingest_commands();

        for action in self.delayed.pop_due(start) {
            self.queues[action.priority as usize].push_back(action);
        }

        for (name, system) in &mut self.systems {
            let t = Instant::now();

            if let Err(e) = system(state, &self.handle) {
                warn!(system = %name, "system failed: {e:#}");
                self.metrics.actions_failed += 1;
            }

            let elapsed = t.elapsed();
            if elapsed > self.config.slow_action_threshold {
                warn!(system = %name, ?elapsed, "slow system");
                self.metrics.slow_actions += 1;
            }
        }

        let mut budget = self.config.max_actions_per_tick;

        for priority in Priority::ALL {
            while budget > 0 {
                let Some(action) = self.queues[priority as usize].pop_front() else {
                    break;
                };

                budget -= 1;
                self.run_action(state, action);
            }
        }

        self.publish_depth();

        self.metrics.ticks += 1;
        self.metrics.actions_dropped =
            self.handle.shared.dropped.load(Ordering::Relaxed);

        let duration = start.elapsed();
        self.metrics.tick_durations.record(duration);

        self.tick_count = self.tick_count.wrapping_add(1);
        if self.tick_count == 0 {
            for observer in &mut self.on_tick_reset {
                observer();
            }
        }

        for observer in &mut self.on_tick {
            observer(duration);
        }
    }

    fn ingest_commands(&mut self) {
        for command in self.rx.try_iter() {
            match command {
                Command::Ready(action) => {
                    let depth: usize = self.queues.iter().map(VecDeque::len).sum();

                    if depth >= self.config.max_queue_depth {
                        warn!(action = %action.name, "ready queues are full; dropping action");
                        self.handle.shared.dropped.fetch_add(1, Ordering::Relaxed);
                        self.handle.shared.pending.lock().remove(&action.id.0);
                        continue;
                    }

                    self.queues[action.priority as usize].push_back(action);
                }
                Command::Delayed(action, fire_at) => {
                    self.delayed.schedule(fire_at, action);
                }
            }
        }

        self.publish_depth();
    }

    fn publish_depth(&self) {
        let depth: usize = self.queues.iter().map(VecDeque::len).sum();
        self.handle
            .shared
            .ready_depth
            .store(depth, Ordering::Relaxed);
    }

    fn run_action(&mut self, state: &mut S, action: Action<S>) {
        let shared = &self.handle.shared;

        // Past this point the action counts as started and can no longer
        // be cancelled.
        shared.pending.lock().remove(&action.id.0);
        if shared.cancelled.lock().remove(&action.id.0) {
            self.metrics.actions_cancelled += 1;
            return;
        }

        match action.work {
            Work::Sync(f) => {
                let t = Instant::now();

                if let Err(e) = f(state, &self.handle) {
                    warn!(action = %action.name, "action failed: {e:#}");
                    self.metrics.actions_failed += 1;
                }

                let elapsed = t.elapsed();
                if elapsed > self.config.slow_action_threshold {
                    warn!(action = %action.name, ?elapsed, "slow action");
                    self.metrics.slow_actions += 1;
                }

                self.metrics.actions_processed += 1;
            }
            Work::Async(f) => {
                tokio::spawn(f(self.handle.clone()));
                self.metrics.async_tasks_started += 1;
            }
        }
    }

    fn has_ready_work(&self) -> bool {
        self.queues.iter().any(|q| !q.is_empty())
    }

    /// Number of ready plus delayed actions. Exposed for tests and the
    /// shutdown path.
    pub fn queued_len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum::<usize>() + self.delayed.len()
    }

    #[cfg(test)]
    fn set_tick_count(&mut self, count: u64) {
        self.tick_count = count;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use pretty_assertions::assert_eq;

    use super::*;

    type Log = Vec<&'static str>;

    fn quiet_config() -> LoopConfig {
        LoopConfig {
            tick_interval: Duration::from_millis(1),
            ..LoopConfig::default()
        }
    }

    #[test]
    fn priorities_drain_in_strict_order() {
        let mut lp = EventLoop::<Log>::new(quiet_config());
        let handle = lp.handle();

        handle.enqueue(Priority::Low, "low", |log, _| {
            log.push("low");
            Ok(())
        });
        handle.enqueue(Priority::Normal, "normal", |log, _| {
            log.push("normal");
            Ok(())
        });
        handle.enqueue(Priority::High, "high", |log, _| {
            log.push("high");
            Ok(())
        });

        let mut log = Log::new();
        lp.tick(&mut log);

        assert_eq!(log, ["high", "normal", "low"]);
    }

    #[test]
    fn per_tick_cap_is_respected() {
        let mut lp = EventLoop::<u32>::new(LoopConfig {
            max_actions_per_tick: 2,
            ..quiet_config()
        });
        let handle = lp.handle();

        for _ in 0..5 {
            handle.enqueue(Priority::Normal, "incr", |n, _| {
                *n += 1;
                Ok(())
            });
        }

        let mut n = 0;
        lp.tick(&mut n);
        assert_eq!(n, 2);

        lp.tick(&mut n);
        lp.tick(&mut n);
        assert_eq!(n, 5);
    }

    #[test]
    fn cancel_before_first_tick_means_never_runs() {
        let mut lp = EventLoop::<u32>::new(quiet_config());
        let handle = lp.handle();

        let id = handle.enqueue(Priority::Normal, "incr", |n, _| {
            *n += 1;
            Ok(())
        });

        assert!(handle.cancel(id));
        // Cancelling twice reports failure.
        assert!(!handle.cancel(id));

        let mut n = 0;
        lp.tick(&mut n);

        assert_eq!(n, 0);
        assert_eq!(lp.metrics().actions_cancelled, 1);
    }

    #[test]
    fn cancel_after_run_fails() {
        let mut lp = EventLoop::<u32>::new(quiet_config());
        let handle = lp.handle();

        let id = handle.enqueue(Priority::Normal, "incr", |n, _| {
            *n += 1;
            Ok(())
        });

        let mut n = 0;
        lp.tick(&mut n);

        assert_eq!(n, 1);
        assert!(!handle.cancel(id));
    }

    #[test]
    fn delayed_actions_fire_only_once_due() {
        let mut lp = EventLoop::<u32>::new(quiet_config());
        let handle = lp.handle();

        handle.enqueue_delayed(Duration::from_millis(20), Priority::Normal, "later", |n, _| {
            *n += 1;
            Ok(())
        });

        let mut n = 0;
        lp.tick(&mut n);
        assert_eq!(n, 0);

        std::thread::sleep(Duration::from_millis(25));
        lp.tick(&mut n);
        assert_eq!(n, 1);
    }

    #[test]
    fn delayed_actions_can_be_cancelled_while_parked() {
        let mut lp = EventLoop::<u32>::new(quiet_config());
        let handle = lp.handle();

        let id = handle.enqueue_delayed(Duration::from_secs(60), Priority::Normal, "later", |n, _| {
            *n += 1;
            Ok(())
        });

        let mut n = 0;
        lp.tick(&mut n); // Parks the action in the delay heap.
        assert!(handle.cancel(id));

        lp.tick(&mut n);
        assert_eq!(n, 0);
    }

    #[test]
    fn failing_actions_are_swallowed() {
        let mut lp = EventLoop::<u32>::new(quiet_config());
        let handle = lp.handle();

        handle.enqueue(Priority::Normal, "boom", |_, _| anyhow::bail!("listener bug"));
        handle.enqueue(Priority::Normal, "incr", |n, _| {
            *n += 1;
            Ok(())
        });

        let mut n = 0;
        lp.tick(&mut n);

        assert_eq!(n, 1, "the loop must survive a failing action");
        assert_eq!(lp.metrics().actions_failed, 1);
    }

    #[test]
    fn full_queues_drop_fresh_enqueues() {
        let mut lp = EventLoop::<u32>::new(LoopConfig {
            max_queue_depth: 1,
            max_actions_per_tick: 0,
            ..quiet_config()
        });
        let handle = lp.handle();

        for _ in 0..3 {
            handle.enqueue(Priority::Normal, "incr", |n, _| {
                *n += 1;
                Ok(())
            });
        }

        let mut n = 0;
        lp.tick(&mut n);

        assert_eq!(lp.metrics().actions_dropped, 2);
        assert_eq!(lp.queued_len(), 1);
    }

    #[test]
    fn tick_counter_wrap_fires_reset_observers() {
        let resets = Arc::new(AtomicU32::new(0));

        let mut lp = EventLoop::<u32>::new(quiet_config());
        let observed = resets.clone();
        lp.on_tick_reset(move || {
            observed.fetch_add(1, Ordering::Relaxed);
        });

        lp.set_tick_count(u64::MAX);

        let mut n = 0;
        lp.tick(&mut n);

        assert_eq!(resets.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn systems_run_every_tick_before_actions() {
        let mut lp = EventLoop::<Log>::new(quiet_config());
        lp.add_system("pump", |log: &mut Log, _| {
            log.push("system");
            Ok(())
        });

        let handle = lp.handle();
        handle.enqueue(Priority::High, "act", |log, _| {
            log.push("action");
            Ok(())
        });

        let mut log = Log::new();
        lp.tick(&mut log);
        lp.tick(&mut log);

        assert_eq!(log, ["system", "action", "system"]);
    }

    #[tokio::test]
    async fn async_tasks_feed_results_back_as_actions() {
        let mut lp = EventLoop::<u32>::new(quiet_config());
        let handle = lp.handle();

        handle.enqueue_async(Priority::Normal, "fetch", |handle| async move {
            // Simulate off-loop work, then hand the result back.
            tokio::time::sleep(Duration::from_millis(5)).await;
            handle.enqueue(Priority::Normal, "apply", |n, _| {
                *n += 41;
                Ok(())
            });
        });

        let mut n = 1;
        lp.tick(&mut n); // Spawns the task.
        assert_eq!(n, 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        lp.tick(&mut n); // Applies the enqueued result.

        assert_eq!(n, 42);
        assert_eq!(lp.metrics().async_tasks_started, 1);
    }

    #[tokio::test]
    async fn shutdown_drains_queued_work() {
        let mut lp = EventLoop::<u32>::new(quiet_config());
        let handle = lp.handle();

        handle.enqueue(Priority::Normal, "incr", |n, _| {
            *n += 1;
            Ok(())
        });
        handle.shutdown();

        // Enqueues after shutdown are refused.
        handle.enqueue(Priority::Normal, "late", |n, _| {
            *n += 100;
            Ok(())
        });

        let mut n = 0;
        let metrics = lp.run(&mut n).await;

        assert_eq!(n, 1);
        assert_eq!(metrics.actions_processed, 1);
    }
}
