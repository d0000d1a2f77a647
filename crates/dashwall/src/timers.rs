//! Timer host abstraction.
//!
//! Live renderers schedule their repaint loops through a [`TimerHost`], with
//! every timer tagged by an owner key (the widget id). Destroying a widget
//! clears its owner, so no callback outlives the instance that registered it.
//! [`ManualTimers`] is a virtual clock used by tests; [`TokioTimers`] runs one
//! task per timer on a tokio runtime.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

pub type TimerCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Periodic timers never run faster than this.
const MIN_PERIOD: Duration = Duration::from_millis(1);

pub trait TimerHost: Send + Sync {
    fn set_interval(&self, owner: &str, period: Duration, callback: TimerCallback) -> TimerId;

    fn set_timeout(&self, owner: &str, delay: Duration, callback: TimerCallback) -> TimerId;

    /// Returns `false` when the timer already fired or was cleared.
    fn clear(&self, id: TimerId) -> bool;

    /// Clears every timer registered by `owner`, returning how many were live.
    fn clear_owner(&self, owner: &str) -> usize;

    fn pending(&self) -> usize;

    fn pending_for(&self, owner: &str) -> usize;
}

/// Source of the current instant for renderers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct ManualEntry {
    id: TimerId,
    owner: String,
    due: Duration,
    period: Option<Duration>,
    callback: TimerCallback,
}

struct ManualState {
    start: DateTime<Utc>,
    elapsed: Duration,
    next_id: u64,
    timers: Vec<ManualEntry>,
}

/// Deterministic timer host driven by [`ManualTimers::advance`]. Also acts as
/// the [`Clock`], so renderers observe virtual time.
pub struct ManualTimers {
    state: Mutex<ManualState>,
}

impl ManualTimers {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(ManualState {
                start,
                elapsed: Duration::ZERO,
                next_id: 0,
                timers: Vec::new(),
            }),
        }
    }

    fn schedule(&self, owner: &str, delay: Duration, period: Option<Duration>, callback: TimerCallback) -> TimerId {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let due = state.elapsed + delay;
        state.timers.push(ManualEntry {
            id,
            owner: owner.to_string(),
            due,
            period,
            callback,
        });
        id
    }

    /// Moves virtual time forward, firing every callback that falls due in
    /// due order. Callbacks run without the internal lock held and may
    /// schedule or clear timers.
    pub fn advance(&self, by: Duration) -> usize {
        let target = lock(&self.state).elapsed + by;
        let mut fired = 0;
        loop {
            let callback = {
                let mut state = lock(&self.state);
                let next = state
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| entry.due <= target)
                    .min_by_key(|(_, entry)| (entry.due, entry.id))
                    .map(|(idx, _)| idx);
                let Some(idx) = next else {
                    state.elapsed = target;
                    break;
                };
                let due = state.timers[idx].due;
                state.elapsed = due;
                match state.timers[idx].period {
                    Some(period) => {
                        let entry = &mut state.timers[idx];
                        entry.due = due + period;
                        entry.callback.clone()
                    }
                    None => state.timers.remove(idx).callback,
                }
            };
            callback();
            fired += 1;
        }
        fired
    }

    pub fn elapsed(&self) -> Duration {
        lock(&self.state).elapsed
    }
}

impl TimerHost for ManualTimers {
    fn set_interval(&self, owner: &str, period: Duration, callback: TimerCallback) -> TimerId {
        let period = period.max(MIN_PERIOD);
        self.schedule(owner, period, Some(period), callback)
    }

    fn set_timeout(&self, owner: &str, delay: Duration, callback: TimerCallback) -> TimerId {
        self.schedule(owner, delay, None, callback)
    }

    fn clear(&self, id: TimerId) -> bool {
        let mut state = lock(&self.state);
        let before = state.timers.len();
        state.timers.retain(|entry| entry.id != id);
        before != state.timers.len()
    }

    fn clear_owner(&self, owner: &str) -> usize {
        let mut state = lock(&self.state);
        let before = state.timers.len();
        state.timers.retain(|entry| entry.owner != owner);
        before - state.timers.len()
    }

    fn pending(&self) -> usize {
        lock(&self.state).timers.len()
    }

    fn pending_for(&self, owner: &str) -> usize {
        lock(&self.state)
            .timers
            .iter()
            .filter(|entry| entry.owner == owner)
            .count()
    }
}

impl Clock for ManualTimers {
    fn now(&self) -> DateTime<Utc> {
        let state = lock(&self.state);
        let elapsed = chrono::Duration::from_std(state.elapsed).unwrap_or(chrono::Duration::zero());
        state.start + elapsed
    }
}

struct TokioEntry {
    owner: String,
    task: AbortHandle,
}

#[derive(Default)]
struct TokioState {
    next_id: u64,
    tasks: HashMap<TimerId, TokioEntry>,
}

/// Runs each timer as a task on the given runtime; clearing aborts the task.
pub struct TokioTimers {
    handle: Handle,
    state: Arc<Mutex<TokioState>>,
}

impl TokioTimers {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            state: Arc::new(Mutex::new(TokioState::default())),
        }
    }
}

impl TimerHost for TokioTimers {
    fn set_interval(&self, owner: &str, period: Duration, callback: TimerCallback) -> TimerId {
        let period = period.max(MIN_PERIOD);
        // The lock is held across the spawn so the entry exists before the
        // task can observe the map.
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let task = self.handle.spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                callback();
            }
        });
        state.tasks.insert(
            id,
            TokioEntry {
                owner: owner.to_string(),
                task: task.abort_handle(),
            },
        );
        tracing::trace!(owner, timer = id.0, ?period, "interval scheduled");
        id
    }

    fn set_timeout(&self, owner: &str, delay: Duration, callback: TimerCallback) -> TimerId {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = TimerId(state.next_id);
        let registry = self.state.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&registry).tasks.remove(&id);
            callback();
        });
        state.tasks.insert(
            id,
            TokioEntry {
                owner: owner.to_string(),
                task: task.abort_handle(),
            },
        );
        tracing::trace!(owner, timer = id.0, ?delay, "timeout scheduled");
        id
    }

    fn clear(&self, id: TimerId) -> bool {
        match lock(&self.state).tasks.remove(&id) {
            Some(entry) => {
                entry.task.abort();
                true
            }
            None => false,
        }
    }

    fn clear_owner(&self, owner: &str) -> usize {
        let mut state = lock(&self.state);
        let ids: Vec<TimerId> = state
            .tasks
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(entry) = state.tasks.remove(id) {
                entry.task.abort();
            }
        }
        if !ids.is_empty() {
            tracing::trace!(owner, cleared = ids.len(), "timers cleared");
        }
        ids.len()
    }

    fn pending(&self) -> usize {
        lock(&self.state).tasks.len()
    }

    fn pending_for(&self, owner: &str) -> usize {
        lock(&self.state)
            .tasks
            .values()
            .filter(|entry| entry.owner == owner)
            .count()
    }
}

impl Drop for TokioTimers {
    fn drop(&mut self) {
        for (_, entry) in lock(&self.state).tasks.drain() {
            entry.task.abort();
        }
    }
}
