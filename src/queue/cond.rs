// src/queue/cond.rs

//! Condition variable whose wakeups can be aimed at waiters by hint.
//!
//! Every parked waiter registers an opaque hint (for the scheduler: the host
//! its worker is bound to). `wake_one` prefers a waiter whose hint is in the
//! given list and falls back to the longest-parked waiter; `wake_many` wakes
//! at most one waiter per distinct hint, so a batch of newly ready work for
//! one host does not stampede every idle worker.
//!
//! The waiter bookkeeping is private. Each waiter parks on its own
//! `Condvar`, always paired with the caller's mutex; wakers are expected to
//! hold that same mutex so a wakeup cannot slip in between registration and
//! parking.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::trace;

/// Result of a single [`HintedCondvar::park`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Notified,
    TimedOut,
}

#[derive(Default)]
struct Slot {
    cv: Condvar,
}

struct Waiter<H> {
    ticket: u64,
    hint: H,
    slot: Weak<Slot>,
}

pub struct HintedCondvar<H> {
    waiters: Mutex<VecDeque<Waiter<H>>>,
    next_ticket: AtomicU64,
}

impl<H> fmt::Debug for HintedCondvar<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HintedCondvar")
            .field("waiting", &self.waiters.lock().len())
            .finish()
    }
}

impl<H> Default for HintedCondvar<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> HintedCondvar<H> {
    pub fn new() -> Self {
        Self {
            waiters: Mutex::new(VecDeque::new()),
            next_ticket: AtomicU64::new(0),
        }
    }

    /// Number of currently parked waiters.
    pub fn waiting(&self) -> usize {
        self.waiters.lock().len()
    }

    /// Park the current thread until woken or until `timeout` elapses.
    ///
    /// `guard` is released while parked and re-acquired before returning.
    pub fn park<T>(&self, guard: &mut MutexGuard<'_, T>, hint: H, timeout: Duration) -> WaitOutcome {
        let slot = Arc::new(Slot::default());
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.waiters.lock().push_back(Waiter {
            ticket,
            hint,
            slot: Arc::downgrade(&slot),
        });

        let deadline = Instant::now() + timeout;
        loop {
            let result = slot.cv.wait_until(guard, deadline);
            if result.timed_out() {
                // A waker may have claimed us right at the deadline.
                return if self.deregister(ticket) {
                    WaitOutcome::TimedOut
                } else {
                    WaitOutcome::Notified
                };
            }
            if !self.is_registered(ticket) {
                return WaitOutcome::Notified;
            }
            // Spurious wakeup; still registered, park again.
        }
    }

    /// Wake every parked waiter regardless of hint.
    pub fn wake_all(&self) -> usize {
        let mut waiters = self.waiters.lock();
        let mut woken = 0;
        while let Some(w) = waiters.pop_front() {
            if let Some(slot) = w.slot.upgrade() {
                slot.cv.notify_one();
                woken += 1;
            }
        }
        trace!(woken, "hinted condvar: wake_all");
        woken
    }

    fn is_registered(&self, ticket: u64) -> bool {
        self.waiters.lock().iter().any(|w| w.ticket == ticket)
    }

    /// Remove `ticket` from the wait set. Returns `false` if a waker already
    /// removed it.
    fn deregister(&self, ticket: u64) -> bool {
        let mut waiters = self.waiters.lock();
        match waiters.iter().position(|w| w.ticket == ticket) {
            Some(idx) => {
                waiters.remove(idx);
                true
            }
            None => false,
        }
    }
}

impl<H: PartialEq + fmt::Debug> HintedCondvar<H> {
    /// Wake one waiter, preferring a parked waiter whose hint appears in
    /// `hints` (earlier hints first, longest-parked first within a hint);
    /// otherwise the longest-parked waiter. An empty `hints` slice is a plain
    /// wake-one.
    ///
    /// Returns `false` if nobody was parked.
    pub fn wake_one(&self, hints: &[H]) -> bool {
        let mut waiters = self.waiters.lock();
        loop {
            let idx = hints
                .iter()
                .find_map(|h| waiters.iter().position(|w| &w.hint == h))
                .or(if waiters.is_empty() { None } else { Some(0) });
            let Some(waiter) = idx.and_then(|i| waiters.remove(i)) else {
                trace!(?hints, "hinted condvar: wake_one found no waiter");
                return false;
            };
            match waiter.slot.upgrade() {
                Some(slot) => {
                    trace!(?hints, hint = ?waiter.hint, remaining = waiters.len(), "hinted condvar: wake_one");
                    slot.cv.notify_one();
                    return true;
                }
                // Waiter went away without deregistering; pick again.
                None => continue,
            }
        }
    }

    /// For each distinct hint, wake at most one waiter carrying exactly that
    /// hint. Waiters with non-matching hints are left parked.
    ///
    /// Returns the number of waiters woken.
    pub fn wake_many(&self, hints: &[H]) -> usize {
        let mut waiters = self.waiters.lock();
        let mut seen: Vec<&H> = Vec::new();
        let mut woken = 0;

        for hint in hints {
            if seen.contains(&hint) {
                continue;
            }
            seen.push(hint);

            while let Some(idx) = waiters.iter().position(|w| &w.hint == hint) {
                let Some(waiter) = waiters.remove(idx) else {
                    break;
                };
                if let Some(slot) = waiter.slot.upgrade() {
                    slot.cv.notify_one();
                    woken += 1;
                    break;
                }
            }
        }

        trace!(?hints, woken, remaining = waiters.len(), "hinted condvar: wake_many");
        woken
    }
}
