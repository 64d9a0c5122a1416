//! Scheduled cues: what a Macro Scheduler timer does when it fires.
//!
//! Every cue writes time-stamped automation into layers it was handed at
//! composition time and tells the scheduler how to re-arm. Nothing here holds
//! a sink or a clock; both arrive through [`CueContext`].
//!
//! - [`BurstCue`]   : open-and-decay one burst layer (droplet, crackle, gust, clink)
//! - [`DriftCue`]   : self-rescheduling slow ramp of a bed's gain and cutoff
//! - [`ChirpCue`]   : one bird voice, a phrase of pitch-swept notes
//! - [`ThunderCue`] : a clap with a falling low-pass sweep that also lifts the rain bed

use rand::{Rng, RngCore};
use soundbed_core::automation::Point;

use crate::graph::{AudioSink, Param};
use crate::layers::{BurstShape, Span};
use crate::scheduler::Rearm;

/// What a firing cue gets to work with.
pub struct CueContext<'a> {
    pub sink: &'a mut dyn AudioSink,
    pub rng: &'a mut dyn RngCore,
    /// Sink clock at the moment of firing.
    pub now: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Cue {
    Burst(BurstCue),
    Drift(DriftCue),
    Chirp(ChirpCue),
    Thunder(ThunderCue),
}

impl Cue {
    pub fn fire(&mut self, ctx: &mut CueContext<'_>) -> Rearm {
        match self {
            Cue::Burst(c) => c.fire(ctx),
            Cue::Drift(c) => c.fire(ctx),
            Cue::Chirp(c) => c.fire(ctx),
            Cue::Thunder(c) => c.fire(ctx),
        }
    }
}

/// Spike a burst layer. Repeats on the timer's own interval.
#[derive(Clone, Debug, PartialEq)]
pub struct BurstCue {
    gain: Param,
    shape: BurstShape,
    /// Optional retune of the layer's first filter before each burst.
    cutoff: Option<(Param, Span)>,
    busy_until: f64,
}

impl BurstCue {
    pub fn new(gain: Param, shape: BurstShape) -> Self {
        Self { gain, shape, cutoff: None, busy_until: 0.0 }
    }

    pub fn retune(mut self, cutoff: Option<Param>, span: Span) -> Self {
        self.cutoff = cutoff.map(|p| (p, span));
        self
    }

    fn fire(&mut self, ctx: &mut CueContext<'_>) -> Rearm {
        // Bursts on one layer never overlap; a late one starts when the last ends.
        let start = ctx.now.max(self.busy_until);
        if let Some((param, span)) = self.cutoff {
            ctx.sink.schedule_ramp(param, Point::step(start, span.draw(ctx.rng)));
        }
        self.busy_until = self.shape.write(ctx.sink, self.gain, start, ctx.rng);
        Rearm::Interval
    }
}

/// Accent fired at the top of a swell (foam on a breaking wave).
#[derive(Clone, Debug, PartialEq)]
pub struct Crest {
    pub gain: Param,
    pub shape: BurstShape,
    /// Only swells reaching at least this bed gain trigger the accent.
    pub threshold: f32,
}

/// Slow, unbounded modulation of a steady layer. Each ramp re-arms the chain
/// for the moment it completes, with fresh targets.
#[derive(Clone, Debug, PartialEq)]
pub struct DriftCue {
    gain: Param,
    gain_range: Span,
    cutoff: Option<(Param, Span)>,
    duration: Span,
    crest: Option<Crest>,
}

impl DriftCue {
    pub fn new(gain: Param, gain_range: Span, duration: Span) -> Self {
        Self { gain, gain_range, cutoff: None, duration, crest: None }
    }

    pub fn with_cutoff(mut self, cutoff: Option<Param>, range: Span) -> Self {
        self.cutoff = cutoff.map(|p| (p, range));
        self
    }

    pub fn with_crest(mut self, crest: Crest) -> Self {
        self.crest = Some(crest);
        self
    }

    fn fire(&mut self, ctx: &mut CueContext<'_>) -> Rearm {
        let d = f64::from(self.duration.draw(ctx.rng).max(0.05));
        let until = ctx.now + d;
        let level = self.gain_range.draw(ctx.rng);
        ctx.sink.schedule_ramp(self.gain, Point::linear(until, level));
        if let Some((param, range)) = self.cutoff {
            ctx.sink.schedule_ramp(param, Point::exponential(until, range.draw(ctx.rng).max(1.0)));
        }
        if let Some(crest) = &self.crest {
            if level >= crest.threshold {
                crest.shape.write(ctx.sink, crest.gain, until, ctx.rng);
            }
        }
        Rearm::After(d)
    }
}

/// One bird voice: a phrase of 2..=5 swept notes, then a random pause.
#[derive(Clone, Debug, PartialEq)]
pub struct ChirpCue {
    gain: Param,
    pitch: Param,
    /// Note start frequency (Hz).
    base: Span,
    /// End/start frequency ratio of each note's sweep.
    sweep: Span,
    note_len: Span,
    note_gap: Span,
    peak: Span,
    pause: Span,
}

impl ChirpCue {
    pub fn new(gain: Param, pitch: Param, base: Span, pause: Span) -> Self {
        Self {
            gain,
            pitch,
            base,
            sweep: Span::new(0.6, 1.6),
            note_len: Span::new(0.05, 0.15),
            note_gap: Span::new(0.03, 0.12),
            peak: Span::new(0.05, 0.15),
            pause,
        }
    }

    pub fn peak(mut self, peak: Span) -> Self {
        self.peak = peak;
        self
    }

    fn fire(&mut self, ctx: &mut CueContext<'_>) -> Rearm {
        let notes = ctx.rng.gen_range(2..=5);
        let mut t = ctx.now;
        for _ in 0..notes {
            let len = f64::from(self.note_len.draw(ctx.rng));
            let f0 = self.base.draw(ctx.rng);
            let f1 = f0 * self.sweep.draw(ctx.rng);
            let peak = self.peak.draw(ctx.rng);

            ctx.sink.schedule_ramp(self.pitch, Point::step(t, f0));
            ctx.sink.schedule_ramp(self.pitch, Point::exponential(t + len, f1));

            let attack = (len * 0.2).min(0.01);
            ctx.sink.schedule_ramp(self.gain, Point::step(t, 0.0));
            ctx.sink.schedule_ramp(self.gain, Point::linear(t + attack, peak));
            ctx.sink.schedule_ramp(self.gain, Point::exponential(t + len, 0.0));

            t += len + f64::from(self.note_gap.draw(ctx.rng));
        }
        Rearm::After(t - ctx.now + f64::from(self.pause.draw(ctx.rng)))
    }
}

/// A thunder clap over a rain bed.
#[derive(Clone, Debug, PartialEq)]
pub struct ThunderCue {
    gain: Param,
    cutoff: Option<Param>,
    rain: Param,
    rain_level: f32,
    clap: BurstShape,
    /// Low-pass sweep from `sweep.hi` down to `sweep.lo` (Hz) over the decay.
    sweep: Span,
    /// Rain bed multiplier at the clap.
    boost: Span,
    busy_until: f64,
}

impl ThunderCue {
    pub fn new(gain: Param, cutoff: Option<Param>, rain: Param, rain_level: f32) -> Self {
        Self {
            gain,
            cutoff,
            rain,
            rain_level,
            clap: BurstShape::new(Span::new(0.01, 0.05), Span::new(0.6, 0.9), Span::new(3.0, 6.0)),
            sweep: Span::new(120.0, 800.0),
            boost: Span::new(1.3, 1.8),
            busy_until: 0.0,
        }
    }

    fn fire(&mut self, ctx: &mut CueContext<'_>) -> Rearm {
        let start = ctx.now.max(self.busy_until);
        let end = self.clap.write(ctx.sink, self.gain, start, ctx.rng);

        if let Some(cutoff) = self.cutoff {
            ctx.sink.schedule_ramp(cutoff, Point::step(start, self.sweep.hi));
            ctx.sink.schedule_ramp(cutoff, Point::exponential(end, self.sweep.lo));
        }

        let lifted = (self.rain_level * self.boost.draw(ctx.rng)).min(1.0);
        let hold = start + (end - start) * 0.3;
        ctx.sink.schedule_ramp(self.rain, Point::linear(start + 0.3, lifted));
        ctx.sink.schedule_ramp(self.rain, Point::linear(hold.max(start + 0.3), lifted));
        ctx.sink.schedule_ramp(self.rain, Point::linear(end, self.rain_level));

        self.busy_until = end;
        Rearm::Interval
    }
}
