//! Macro Scheduler: cancellable one-shot and repeating timers on the sink clock.
//!
//! A timer is identified by its [`Token`] for its whole life. A repeating timer
//! and a self-rescheduling chain re-arm under the *same* token, so cancelling
//! the token a composition recorded stops the chain no matter how many times
//! it has fired.
//!
//! Firing is split in two so the caller can run the task between the halves:
//! [`Scheduler::pop_due`] hands the timer out and marks it in flight;
//! [`Scheduler::rearm`] puts it back. Cancelling a token while it is in flight
//! clears the mark, and the later `rearm` is refused.

use rand::{Rng, RngCore};

/// Shortest delay a timer can re-arm with (seconds).
pub const MIN_DELAY: f64 = 0.001;

/// Cancellation handle of one scheduled event.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

/// How a repeating timer computes its next delay.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Interval {
    Fixed(f64),
    /// Uniform draw in `[min, max]` seconds on every firing.
    Uniform { min: f64, max: f64 },
}

impl Interval {
    pub fn uniform(min: f64, max: f64) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        Interval::Uniform { min: lo.max(0.0), max: hi.max(0.0) }
    }

    pub fn draw(&self, rng: &mut dyn RngCore) -> f64 {
        match *self {
            Interval::Fixed(d) => d.max(0.0),
            Interval::Uniform { min, max } if max > min => rng.gen_range(min..=max),
            Interval::Uniform { min, .. } => min,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TimerKind {
    OneShot,
    Repeating(Interval),
}

/// What a fired task asks for next.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Rearm {
    /// Use the timer's own interval (one-shots stop).
    Interval,
    /// Fire again after exactly this many seconds (self-rescheduling).
    After(f64),
    Stop,
}

/// A timer handed out by [`Scheduler::pop_due`].
#[derive(Debug)]
pub struct Fired<T> {
    pub token: Token,
    /// When it was due.
    pub due: f64,
    /// Clock at which it was popped.
    pub fired_at: f64,
    pub kind: TimerKind,
    pub task: T,
}

#[derive(Debug)]
struct Entry<T> {
    token: Token,
    due: f64,
    kind: TimerKind,
    task: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    next_token: u64,
    entries: Vec<Entry<T>>,
    in_flight: Option<Token>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self { next_token: 0, entries: Vec::new(), in_flight: None }
    }

    /// Arm a timer `first_delay` seconds after `now`.
    pub fn schedule(&mut self, kind: TimerKind, now: f64, first_delay: f64, task: T) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.entries.push(Entry { token, due: now + first_delay.max(0.0), kind, task });
        token
    }

    /// Disarm `token`. Returns whether anything was pending or in flight.
    pub fn cancel(&mut self, token: Token) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.token != token);
        let mut hit = self.entries.len() != before;
        if self.in_flight == Some(token) {
            self.in_flight = None;
            hit = true;
        }
        hit
    }

    /// Take the earliest timer due at or before `now`.
    pub fn pop_due(&mut self, now: f64) -> Option<Fired<T>> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= now)
            .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due))
            .map(|(i, _)| i)?;
        let Entry { token, due, kind, task } = self.entries.swap_remove(idx);
        self.in_flight = Some(token);
        Some(Fired { token, due, fired_at: now, kind, task })
    }

    /// Return a fired timer to the queue. Refused (and the task dropped) when
    /// the token was cancelled while in flight, or when nothing asks to re-arm.
    pub fn rearm(&mut self, fired: Fired<T>, rearm: Rearm, rng: &mut dyn RngCore) -> bool {
        if self.in_flight != Some(fired.token) {
            return false;
        }
        self.in_flight = None;
        let delay = match (rearm, fired.kind) {
            (Rearm::Stop, _) | (Rearm::Interval, TimerKind::OneShot) => return false,
            (Rearm::Interval, TimerKind::Repeating(iv)) => iv.draw(rng),
            (Rearm::After(d), _) => d,
        };
        self.entries.push(Entry {
            token: fired.token,
            due: fired.fired_at + delay.max(MIN_DELAY),
            kind: fired.kind,
            task: fired.task,
        });
        true
    }

    /// Timers waiting to fire.
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn is_pending(&self, token: Token) -> bool {
        self.entries.iter().any(|e| e.token == token) || self.in_flight == Some(token)
    }

    /// Due time of `token`, if queued.
    pub fn due(&self, token: Token) -> Option<f64> {
        self.entries.iter().find(|e| e.token == token).map(|e| e.due)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.in_flight = None;
    }
}
