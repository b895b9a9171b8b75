//! Rate-limited, deduplicating work queue of app names.
//!
//! The queue tracks each key through a small state machine: absent, pending
//! (eligible now), delayed (waiting out a backoff), in-flight (handed to a
//! consumer), or in-flight + dirty (re-added while processing, redelivered
//! once after [`RateLimitedQueue::done`]). At most one consumer holds a
//! given key at any instant.
//!
//! All operations are internally synchronized; [`RateLimitedQueue::get`] is
//! the only blocking call and parks consumers on a condvar until a key
//! becomes eligible or the queue shuts down. No external scheduling library
//! is involved.

use std::cmp::{self, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use gantry_core::AppName;

/// Exponential per-key failure backoff: `base * 2^attempts`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the retry following `attempts` consecutive failures.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempts.min(31));
        cmp::min(self.base.saturating_mul(factor), self.max)
    }
}

#[derive(Debug, PartialEq, Eq)]
struct DelayedKey {
    at: Instant,
    key: AppName,
}

impl Ord for DelayedKey {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.at.cmp(&other.at).then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for DelayedKey {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
struct State {
    /// Keys eligible for delivery, oldest first. Never contains an
    /// in-flight key.
    ready: VecDeque<AppName>,
    /// Set view of `ready` for O(1) dedup.
    pending: HashSet<AppName>,
    /// Delay-scheduled keys, earliest deadline on top. Entries whose
    /// deadline disagrees with `deadlines` are stale and skipped.
    delayed: BinaryHeap<Reverse<DelayedKey>>,
    /// Authoritative eligibility deadline per delayed key.
    deadlines: HashMap<AppName, Instant>,
    in_flight: HashSet<AppName>,
    /// In-flight keys that were re-added and must be redelivered once.
    dirty: HashSet<AppName>,
    /// Consecutive-failure counters feeding the backoff.
    attempts: HashMap<AppName, u32>,
    shutting_down: bool,
}

/// Dedup work queue with per-key exponential backoff.
#[derive(Debug)]
pub struct RateLimitedQueue {
    state: Mutex<State>,
    ready_cond: Condvar,
    backoff: ExponentialBackoff,
}

impl RateLimitedQueue {
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            state: Mutex::new(State::default()),
            ready_cond: Condvar::new(),
            backoff,
        }
    }

    /// Mark `key` as wanting immediate processing.
    ///
    /// Idempotent: a key already eligible stays queued once; a key already
    /// in flight is marked dirty and redelivered once after its current
    /// processing finishes. Returns `false` once the queue has shut down.
    pub fn add(&self, key: AppName) -> bool {
        let mut st = self.state.lock().unwrap();
        if st.shutting_down {
            return false;
        }
        if st.in_flight.contains(&key) {
            st.dirty.insert(key);
            return true;
        }
        // An immediate add supersedes any scheduled retry.
        st.deadlines.remove(&key);
        if st.pending.insert(key.clone()) {
            st.ready.push_back(key);
            self.ready_cond.notify_one();
        }
        true
    }

    /// Schedule `key` to become eligible after its computed backoff delay.
    ///
    /// The delay doubles with every call for the same key since its last
    /// [`RateLimitedQueue::forget`], bounded by the configured maximum.
    pub fn add_rate_limited(&self, key: AppName) {
        let mut st = self.state.lock().unwrap();
        if st.shutting_down {
            return;
        }
        let attempts = {
            let counter = st.attempts.entry(key.clone()).or_insert(0);
            let current = *counter;
            *counter += 1;
            current
        };
        if st.pending.contains(&key) {
            // Already eligible; delaying would only postpone delivery.
            return;
        }
        let at = Instant::now() + self.backoff.delay_for(attempts);
        match st.deadlines.get(&key) {
            // Keep the earliest deadline already scheduled.
            Some(existing) if *existing <= at => return,
            _ => {}
        }
        st.deadlines.insert(key.clone(), at);
        st.delayed.push(Reverse(DelayedKey { at, key }));
        // Waiters may be parked against a later deadline; force a recompute.
        self.ready_cond.notify_all();
    }

    /// Reset the failure counter for `key` (call after a success).
    pub fn forget(&self, key: &AppName) {
        self.state.lock().unwrap().attempts.remove(key);
    }

    /// Consecutive-failure count currently recorded for `key`.
    pub fn requeues(&self, key: &AppName) -> u32 {
        self.state
            .lock()
            .unwrap()
            .attempts
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Blocking pop. Parks the caller until a key is eligible, then marks it
    /// in-flight and returns it. Returns `None` once the queue shuts down.
    pub fn get(&self) -> Option<AppName> {
        let mut st = self.state.lock().unwrap();
        loop {
            if st.shutting_down {
                return None;
            }
            let now = Instant::now();
            Self::promote_due(&mut st, now);
            if let Some(key) = st.ready.pop_front() {
                st.pending.remove(&key);
                st.in_flight.insert(key.clone());
                return Some(key);
            }
            st = match Self::next_deadline(&st) {
                Some(at) => {
                    let wait = at.saturating_duration_since(now);
                    self.ready_cond.wait_timeout(st, wait).unwrap().0
                }
                None => self.ready_cond.wait(st).unwrap(),
            };
        }
    }

    /// Mark `key` as no longer in flight. A key made dirty while in flight
    /// is immediately re-queued (unless the queue has shut down).
    pub fn done(&self, key: &AppName) {
        let mut st = self.state.lock().unwrap();
        st.in_flight.remove(key);
        if st.shutting_down {
            return;
        }
        if st.dirty.remove(key) && st.pending.insert(key.clone()) {
            st.ready.push_back(key.clone());
            self.ready_cond.notify_one();
        }
    }

    /// Stop all eligibility transitions and wake every blocked
    /// [`RateLimitedQueue::get`] with the shutdown signal.
    pub fn shut_down(&self) {
        self.state.lock().unwrap().shutting_down = true;
        self.ready_cond.notify_all();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().unwrap().shutting_down
    }

    /// Number of keys eligible for delivery right now.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Move every delayed key whose deadline has passed into the eligible
    /// set, or mark it dirty if it is back in flight by now. Drops stale
    /// heap entries along the way, so afterwards the heap top (if any) is a
    /// live future deadline.
    fn promote_due(st: &mut State, now: Instant) {
        loop {
            let (due, stale) = match st.delayed.peek() {
                Some(Reverse(top)) => (
                    top.at <= now,
                    st.deadlines.get(&top.key) != Some(&top.at),
                ),
                None => break,
            };
            if stale {
                st.delayed.pop();
                continue;
            }
            if !due {
                break;
            }
            let Reverse(DelayedKey { key, .. }) = st.delayed.pop().unwrap();
            st.deadlines.remove(&key);
            if st.in_flight.contains(&key) {
                st.dirty.insert(key);
            } else if st.pending.insert(key.clone()) {
                st.ready.push_back(key);
            }
        }
    }

    fn next_deadline(st: &State) -> Option<Instant> {
        st.delayed.peek().map(|Reverse(top)| top.at)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    use proptest::prelude::*;

    use super::*;

    fn queue(base: Duration, max: Duration) -> Arc<RateLimitedQueue> {
        Arc::new(RateLimitedQueue::new(ExponentialBackoff::new(base, max)))
    }

    fn fast_queue() -> Arc<RateLimitedQueue> {
        queue(Duration::from_millis(5), Duration::from_secs(1000))
    }

    fn key(name: &str) -> AppName {
        AppName::from(name)
    }

    /// Run `get` on a helper thread, reporting the key and how long the call
    /// blocked.
    fn get_in_background(
        queue: &Arc<RateLimitedQueue>,
    ) -> mpsc::Receiver<(Option<AppName>, Duration)> {
        let (tx, rx) = mpsc::channel();
        let queue = Arc::clone(queue);
        thread::spawn(move || {
            let start = Instant::now();
            let got = queue.get();
            let _ = tx.send((got, start.elapsed()));
        });
        rx
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff =
            ExponentialBackoff::new(Duration::from_millis(5), Duration::from_secs(1000));
        assert_eq!(backoff.delay_for(0), Duration::from_millis(5));
        assert_eq!(backoff.delay_for(1), Duration::from_millis(10));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(20));

        let capped = ExponentialBackoff::new(Duration::from_millis(5), Duration::from_millis(12));
        assert_eq!(capped.delay_for(0), Duration::from_millis(5));
        assert_eq!(capped.delay_for(1), Duration::from_millis(10));
        assert_eq!(capped.delay_for(2), Duration::from_millis(12));
        assert_eq!(capped.delay_for(63), Duration::from_millis(12));
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_bounded(
            base_ms in 1u64..50,
            max_ms in 50u64..5_000,
            a in 0u32..64,
            b in 0u32..64,
        ) {
            let backoff = ExponentialBackoff::new(
                Duration::from_millis(base_ms),
                Duration::from_millis(max_ms),
            );
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(backoff.delay_for(lo) <= backoff.delay_for(hi));
            prop_assert!(backoff.delay_for(hi) <= Duration::from_millis(max_ms));
        }
    }

    #[test]
    fn add_dedups_pending_keys() {
        let q = fast_queue();
        assert!(q.add(key("myapp")));
        assert!(q.add(key("myapp")));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn add_while_in_flight_marks_dirty_and_redelivers_once() {
        let q = fast_queue();
        q.add(key("myapp"));

        let got = q.get().unwrap();
        assert_eq!(got, key("myapp"));
        assert!(q.is_empty());

        // Re-added (twice) while processing: no second delivery yet.
        q.add(key("myapp"));
        q.add(key("myapp"));
        assert!(q.is_empty());

        q.done(&key("myapp"));
        assert_eq!(q.len(), 1);

        // Exactly one redelivery.
        assert_eq!(q.get().unwrap(), key("myapp"));
        q.done(&key("myapp"));
        assert!(q.is_empty());
    }

    #[test]
    fn rate_limited_key_waits_out_its_delay() {
        let q = queue(Duration::from_millis(40), Duration::from_secs(1000));
        let rx = get_in_background(&q);
        // Let the consumer park before the key is scheduled.
        thread::sleep(Duration::from_millis(50));

        let scheduled = Instant::now();
        q.add_rate_limited(key("myapp"));
        assert!(q.is_empty());

        let (got, _) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, Some(key("myapp")));
        // Some slack for coarse timers; the point is that delivery was not
        // immediate.
        assert!(scheduled.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn delayed_key_is_overtaken_by_immediate_add() {
        let q = queue(Duration::from_millis(100), Duration::from_secs(1000));
        q.add_rate_limited(key("failing"));
        q.add(key("healthy"));

        assert_eq!(q.get().unwrap(), key("healthy"));
    }

    #[test]
    fn requeues_counts_and_forget_resets() {
        let q = fast_queue();
        q.add_rate_limited(key("myapp"));
        q.add_rate_limited(key("myapp"));
        q.add_rate_limited(key("myapp"));
        assert_eq!(q.requeues(&key("myapp")), 3);
        assert_eq!(q.requeues(&key("other")), 0);

        q.forget(&key("myapp"));
        assert_eq!(q.requeues(&key("myapp")), 0);
    }

    #[test]
    fn shutdown_unblocks_waiting_consumers() {
        let q = fast_queue();
        let rx = get_in_background(&q);

        thread::sleep(Duration::from_millis(50));
        q.shut_down();

        let (got, _) = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(got, None);
    }

    #[test]
    fn adds_are_refused_after_shutdown() {
        let q = fast_queue();
        q.shut_down();

        assert!(!q.add(key("myapp")));
        q.add_rate_limited(key("myapp"));
        assert!(q.is_empty());
        assert!(q.get().is_none());
    }

    #[test]
    fn dirty_key_is_dropped_on_shutdown() {
        let q = fast_queue();
        q.add(key("myapp"));
        let got = q.get().unwrap();
        q.add(key("myapp"));

        q.shut_down();
        q.done(&got);
        assert!(q.is_empty());
    }
}
