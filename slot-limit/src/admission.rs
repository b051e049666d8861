use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use quanta::Clock;
use quanta::Instant;

use super::Reason;
use super::Strategy;

/// Receipt for an admitted request.
///
/// Names the wall-clock second the request was counted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    second: u32,
}

impl Ticket {
    pub fn second(&self) -> u32 {
        self.second
    }
}

/// A one-second admission window.
///
/// Admits at most `limit` requests per wall-clock second. The window second and
/// the in-window count share a single `AtomicU64` (second in the high half,
/// count in the low half), so rolling the window, checking the limit and
/// counting the request are one compare-and-swap. Two concurrent requests can
/// never both observe a free slot.
///
/// Admitted requests hand their [`Ticket`] back through [`Strategy::complete`],
/// which gives the slot back if the window has not rolled in the meantime.
#[derive(Debug)]
pub struct AdmissionWindow {
    limit: u32,
    state: AtomicU64,
    clock: Clock,
    /// The clock reading taken at construction.
    anchor: Instant,
    /// Time since the unix epoch at `anchor`.
    origin: Duration,
}

#[inline]
fn pack(second: u32, count: u32) -> u64 {
    (u64::from(second) << 32) | u64::from(count)
}

#[inline]
fn unpack(state: u64) -> (u32, u32) {
    ((state >> 32) as u32, state as u32)
}

impl AdmissionWindow {
    /// Creates a new `AdmissionWindow` driven by the system clock.
    ///
    /// # Arguments
    ///
    /// * `limit` - The maximum number of requests admitted within one second.
    pub fn new(limit: NonZeroU32) -> Self {
        Self::with_clock(limit, Clock::new(), SystemTime::now())
    }

    /// Creates a new `AdmissionWindow` reading time from `clock`.
    ///
    /// `origin` is the wall-clock time that corresponds to the clock's current
    /// reading; window seconds are counted from there.
    pub fn with_clock(limit: NonZeroU32, clock: Clock, origin: SystemTime) -> Self {
        let anchor = clock.now();
        Self {
            limit: limit.get(),
            state: AtomicU64::new(0),
            clock,
            anchor,
            origin: origin.duration_since(UNIX_EPOCH).unwrap_or_default(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// The window second and count as last stored.
    pub fn snapshot(&self) -> (u32, u32) {
        unpack(self.state.load(Ordering::Acquire))
    }

    fn now(&self) -> Duration {
        self.origin + self.clock.now().duration_since(self.anchor)
    }
}

impl Strategy for AdmissionWindow {
    #[inline]
    fn process(&self) -> ControlFlow<Reason, Ticket> {
        let now = self.now();
        let second = now.as_secs() as u32;

        let previous = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                let (window, count) = unpack(state);
                // A racing caller may already have rolled to a later second.
                let (window, count) = if second > window {
                    (second, 0)
                } else {
                    (window, count)
                };
                if count < self.limit {
                    Some(pack(window, count + 1))
                } else {
                    None
                }
            });

        match previous {
            Ok(state) => {
                let (window, _) = unpack(state);
                ControlFlow::Continue(Ticket {
                    second: window.max(second),
                })
            }
            Err(state) => {
                let (window, _) = unpack(state);
                let next = Duration::from_secs(u64::from(window.max(second)) + 1);
                ControlFlow::Break(Reason::RateLimitExceeded {
                    retry_after: next.saturating_sub(now),
                })
            }
        }
    }

    fn complete(&self, ticket: Ticket) {
        // Once the window rolls the count restarts at zero, so a stale ticket has
        // nothing left to give back.
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |state| {
                let (window, count) = unpack(state);
                if window == ticket.second && count > 0 {
                    Some(pack(window, count - 1))
                } else {
                    None
                }
            });
    }
}
