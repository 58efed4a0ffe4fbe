//! Idle debouncing and per-frame coalescing.
//!
//! The engine never sleeps or spawns timers. Deadlines are plain values and
//! the host drives them by calling `tick(now)` / `frame()`, so cancelling a
//! timer is just dropping its pending value.

use std::time::Duration;
use web_time::Instant;

/// Holds the most recent value of a rapidly changing quantity and releases it
/// once input has been idle for `delay`.
///
/// Every [`push`](Self::push) replaces the pending value and restarts the
/// idle window, so the released value is always the last sample pushed.
#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    /// Idle window after the last push before the value is released.
    delay: Duration,
    /// Value waiting to be released.
    pending: Option<T>,
    /// Time of the last push.
    last_change: Option<Instant>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            last_change: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Record a new sample, replacing any pending one.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        self.last_change = Some(now);
    }

    /// Whether a value is waiting for the idle window to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn peek(&self) -> Option<&T> {
        self.pending.as_ref()
    }

    /// Instant at which the pending value becomes due.
    pub fn deadline(&self) -> Option<Instant> {
        match (&self.pending, self.last_change) {
            (Some(_), Some(at)) => Some(at + self.delay),
            _ => None,
        }
    }

    /// Release the pending value if the idle window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        self.last_change = None;
        self.pending.take()
    }

    /// Release the pending value immediately, ignoring the idle window.
    pub fn flush(&mut self) -> Option<T> {
        self.last_change = None;
        self.pending.take()
    }

    /// Drop the pending value without releasing it.
    pub fn cancel(&mut self) {
        if self.pending.is_some() {
            log::trace!("Debouncer: pending value cancelled");
        }
        self.pending = None;
        self.last_change = None;
    }
}

/// Single-slot coalescer that applies at most one sample per display frame.
///
/// High-frequency input stores its latest sample here and requests a frame;
/// the frame callback takes whatever sample is current. Samples that arrive
/// between frames overwrite each other.
#[derive(Debug, Clone)]
pub struct FrameGate<T> {
    slot: Option<T>,
}

impl<T> FrameGate<T> {
    pub fn new() -> Self {
        Self { slot: None }
    }

    /// Store a sample. Returns `true` if this is the first sample since the
    /// last frame, i.e. the caller should request a frame.
    pub fn offer(&mut self, sample: T) -> bool {
        let needs_frame = self.slot.is_none();
        self.slot = Some(sample);
        needs_frame
    }

    /// Modify the pending sample in place, or seed it if there is none.
    pub fn merge(&mut self, seed: T, f: impl FnOnce(&mut T)) -> bool {
        let needs_frame = self.slot.is_none();
        f(self.slot.get_or_insert(seed));
        needs_frame
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }

    /// Take the sample for this frame.
    pub fn take(&mut self) -> Option<T> {
        self.slot.take()
    }

    pub fn cancel(&mut self) {
        self.slot = None;
    }
}

impl<T> Default for FrameGate<T> {
    fn default() -> Self {
        Self::new()
    }
}
