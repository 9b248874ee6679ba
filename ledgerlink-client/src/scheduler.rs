//! Timers owned by the engine
//!
//! Every timer the client uses (reconnect backoff, connect-attempt deadline,
//! liveliness watchdog, per-call timeouts) is a named deadline
//! in one [`Scheduler`]. The engine sleeps until the earliest deadline and
//! then drains whatever expired. Everything runs on `tokio::time`, so a
//! paused runtime drives it deterministically.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

/// Identity of a timer; arming a key again replaces its deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    Reconnect,
    ConnectTimeout,
    Liveliness,
    CallTimeout(u64),
}

#[derive(Debug, Default)]
pub struct Scheduler {
    deadlines: HashMap<TimerKey, Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `key` to fire `after` from now
    pub fn arm(&mut self, key: TimerKey, after: Duration) {
        self.deadlines.insert(key, Instant::now() + after);
    }

    /// Disarm `key`; true if it was armed
    pub fn cancel(&mut self, key: TimerKey) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    #[cfg(test)]
    fn is_armed(&self, key: TimerKey) -> bool {
        self.deadlines.contains_key(&key)
    }

    /// Disarm every timer
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn take_expired(&mut self, now: Instant) -> Vec<TimerKey> {
        let mut due: Vec<(Instant, TimerKey)> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, deadline)| (*deadline, *key))
            .collect();
        due.sort();
        for (_, key) in &due {
            self.deadlines.remove(key);
        }
        due.into_iter().map(|(_, key)| key).collect()
    }
}

/// Sleep until `deadline`, or forever when there is none
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Wall-clock milliseconds advanced by the runtime clock
///
/// Anchored to the system time once, then moved forward with
/// `tokio::time::Instant`, so ids stamped with it look like real
/// timestamps and still follow a paused test clock.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
    origin_ms: u64,
}

impl Clock {
    pub fn new() -> Self {
        let origin_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            origin: Instant::now(),
            origin_ms,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.origin_ms + self.origin.elapsed().as_millis() as u64
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
