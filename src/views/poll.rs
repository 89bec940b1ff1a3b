use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Background refresh concerns; at most one live loop per concern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PollConcern {
    Logs,
    Tasks,
}

/// Counter of view activations, bumped on every navigation
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Start a new generation and return it
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.current() == generation
    }
}

/// A running timed repetition
#[derive(Debug)]
pub struct PollHandle {
    generation: u64,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the loop; stopping a finished loop is a no-op
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Owner of every poll loop in the session
#[derive(Debug, Clone)]
pub struct PollSet {
    handles: Arc<Mutex<HashMap<PollConcern, PollHandle>>>,
    generation: Generation,
}

impl PollSet {
    pub fn new(generation: Generation) -> Self {
        Self {
            handles: Arc::new(Mutex::new(HashMap::new())),
            generation,
        }
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<PollConcern, PollHandle>> {
        self.handles.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run `tick` every `period`, starting one period from now.
    ///
    /// Replaces any loop already registered for `concern`. The loop ends by
    /// itself on the first tick after `generation` stops being current. A
    /// `generation` that is already stale registers nothing.
    pub fn spawn<F, Fut>(&self, concern: PollConcern, generation: u64, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if !self.generation.is_current(generation) {
            debug!("Not starting {:?} poll loop for stale generation {}", concern, generation);
            return;
        }

        let current = self.generation.clone();
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if !current.is_current(generation) {
                    debug!("Stopping stale {:?} poll loop of generation {}", concern, generation);
                    break;
                }
                tick().await;
            }
        });

        let previous = self.handles().insert(concern, PollHandle { generation, task });
        if let Some(previous) = previous {
            previous.cancel();
        }
        debug!("Started {:?} poll loop every {:?}", concern, period);
    }

    /// Cancel the loop of one concern; returns whether one was registered
    pub fn cancel(&self, concern: PollConcern) -> bool {
        match self.handles().remove(&concern) {
            Some(handle) => {
                handle.cancel();
                debug!("Cancelled {:?} poll loop", concern);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<PollHandle> = self.handles().drain().map(|(_, handle)| handle).collect();
        for handle in drained {
            handle.cancel();
        }
    }

    /// Whether a live loop is registered for `concern`
    pub fn is_active(&self, concern: PollConcern) -> bool {
        self.handles()
            .get(&concern)
            .map_or(false, |handle| !handle.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_loop(polls: &PollSet, generation: u64) -> Arc<AtomicUsize> {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        polls.spawn(PollConcern::Tasks, generation, Duration::from_secs(5), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        ticks
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_ticks_on_interval() {
        let generation = Generation::default();
        let polls = PollSet::new(generation.clone());
        let ticks = counting_loop(&polls, generation.current());

        time::sleep(Duration::from_millis(4_900)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(10_200)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        assert!(polls.is_active(PollConcern::Tasks));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let generation = Generation::default();
        let polls = PollSet::new(generation.clone());
        let ticks = counting_loop(&polls, generation.current());

        assert!(polls.cancel(PollConcern::Tasks));
        assert!(!polls.cancel(PollConcern::Tasks));
        polls.cancel_all();

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert!(!polls.is_active(PollConcern::Tasks));
    }

    #[tokio::test(start_paused = true)]
    async fn test_respawn_replaces_previous_loop() {
        let generation = Generation::default();
        let polls = PollSet::new(generation.clone());
        let first = counting_loop(&polls, generation.current());
        let second = counting_loop(&polls, generation.current());

        time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_loop_stops_itself() {
        let generation = Generation::default();
        let polls = PollSet::new(generation.clone());
        let ticks = counting_loop(&polls, generation.current());

        // A navigation the loop was never told about
        generation.advance();

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert!(!polls.is_active(PollConcern::Tasks));
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_stale_spawn_keeps_live_loop() {
        let generation = Generation::default();
        let polls = PollSet::new(generation.clone());
        let stale_generation = generation.current();
        let live_generation = generation.advance();

        let live = counting_loop(&polls, live_generation);
        let stale = counting_loop(&polls, stale_generation);

        time::sleep(Duration::from_millis(10_100)).await;
        assert_eq!(live.load(Ordering::SeqCst), 2);
        assert_eq!(stale.load(Ordering::SeqCst), 0);
        assert!(polls.is_active(PollConcern::Tasks));
    }
}
