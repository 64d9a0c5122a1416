//! Time-stamped parameter automation.
//!
//! A [`Lane`] is the render-side value of one parameter (a layer gain, a filter
//! cutoff, an oscillator pitch, the master gain). The control side never writes
//! values directly; it pushes [`Point`]s ("reach `value` by `time`") and the
//! render side evaluates the lane at its own clock.
//!
//! Segment shapes follow the usual audio-parameter semantics:
//! - `Step`        : hold the previous value, jump at `time`
//! - `Linear`      : straight line from the previous point
//! - `Exponential` : geometric curve from the previous point (values floored
//!                   at [`EXP_FLOOR`], so decays towards "zero" are well defined)
//!
//! Invariants
//! - Pending point times are non-decreasing. A point pushed earlier than the
//!   latest time already on the lane is moved forward to that time.
//! - When no points are pending, the anchor follows the evaluation clock, so a
//!   ramp pushed later starts from the value at that moment rather than from
//!   the last point reached long ago.

use alloc::collections::VecDeque;

use num_traits::float::FloatCore;

use crate::dsp::{exp_interp, lerp};

/// Smallest magnitude an exponential segment interpolates through.
pub const EXP_FLOOR: f32 = 1.0e-4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Curve {
    Step,
    Linear,
    Exponential,
}

/// One automation instruction: be at `value` by `time` (seconds, sink clock).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Point {
    pub time: f64,
    pub value: f32,
    pub curve: Curve,
}

impl Point {
    #[inline] pub fn step(time: f64, value: f32) -> Self { Self { time, value, curve: Curve::Step } }
    #[inline] pub fn linear(time: f64, value: f32) -> Self { Self { time, value, curve: Curve::Linear } }
    #[inline] pub fn exponential(time: f64, value: f32) -> Self { Self { time, value, curve: Curve::Exponential } }
}

/// Render-side automation state for one parameter.
#[derive(Clone, Debug)]
pub struct Lane {
    anchor_time: f64,
    anchor_value: f32,
    pending: VecDeque<Point>,
}

impl Lane {
    pub fn new(value: f32) -> Self {
        Self { anchor_time: 0.0, anchor_value: value, pending: VecDeque::new() }
    }

    /// Latest time on the lane (last pending point, or the anchor).
    #[inline]
    pub fn latest_time(&self) -> f64 {
        self.pending.back().map_or(self.anchor_time, |p| p.time)
    }

    #[inline] pub fn pending(&self) -> usize { self.pending.len() }
    #[inline] pub fn is_settled(&self) -> bool { self.pending.is_empty() }

    /// Append a point, clamping its time so the lane stays monotonic.
    /// Returns the point as stored.
    pub fn push(&mut self, mut point: Point) -> Point {
        let floor = self.latest_time();
        if point.time < floor {
            point.time = floor;
        }
        self.pending.push_back(point);
        point
    }

    /// Drop every pending point at or after `time` and hold the value the lane
    /// would have had there.
    pub fn cancel_from(&mut self, time: f64) {
        if !self.pending.iter().any(|p| p.time >= time) {
            return;
        }
        let hold = self.peek(time);
        self.pending.retain(|p| p.time < time);
        self.push(Point::step(time, hold));
    }

    /// Evaluate at `t` without consuming points.
    pub fn peek(&self, t: f64) -> f32 {
        let mut anchor = (self.anchor_time, self.anchor_value);
        for p in &self.pending {
            if p.time <= t {
                anchor = (p.time, p.value);
            } else {
                return segment(anchor, p, t);
            }
        }
        anchor.1
    }

    /// Evaluate at `t` and retire every point already reached.
    /// Calls are expected with non-decreasing `t`.
    pub fn value_at(&mut self, t: f64) -> f32 {
        while let Some(p) = self.pending.front() {
            if p.time > t {
                break;
            }
            self.anchor_time = p.time;
            self.anchor_value = p.value;
            self.pending.pop_front();
        }
        match self.pending.front() {
            Some(next) => segment((self.anchor_time, self.anchor_value), next, t),
            None => {
                self.anchor_time = self.anchor_time.max(t);
                self.anchor_value
            }
        }
    }
}

#[inline]
fn segment((t0, v0): (f64, f32), next: &Point, t: f64) -> f32 {
    let span = next.time - t0;
    if span <= 0.0 {
        return next.value;
    }
    #[allow(clippy::cast_possible_truncation)]
    let frac = (((t - t0) / span) as f32).clamp(0.0, 1.0);
    match next.curve {
        Curve::Step => v0,
        Curve::Linear => lerp(v0, next.value, frac),
        Curve::Exponential => {
            let sign = if next.value < 0.0 { -1.0 } else { 1.0 };
            let a = FloatCore::abs(v0).max(EXP_FLOOR);
            let b = FloatCore::abs(next.value).max(EXP_FLOOR);
            sign * exp_interp(a, b, frac)
        }
    }
}

// ------------------------------------ Tests --------------------------------------
