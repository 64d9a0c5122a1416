//! Preset Composer: one declarative recipe per soundscape.
//!
//! A recipe only connects layers (steady or burst) and subscribes cues to the
//! Macro Scheduler. Every layer and token it creates is recorded in the
//! returned [`Composition`], whose teardown is the only way to release them.

use rand::{Rng, RngCore};
use soundbed_core::noise::NoiseKind;

use crate::bank::NoiseBank;
use crate::cues::{BurstCue, ChirpCue, Crest, Cue, DriftCue, ThunderCue};
use crate::graph::{AudioSink, Layer, LayerDesc, Param};
use crate::layers::{self, BurstShape, Span};
use crate::preset::Preset;
use crate::scheduler::{Interval, Scheduler, TimerKind, Token};

/// The live realization of one preset.
#[derive(Debug)]
#[must_use = "a composition must be torn down to release its layers and timers"]
pub struct Composition {
    preset: Preset,
    layers: Vec<Layer>,
    tokens: Vec<Token>,
}

impl Composition {
    #[inline] pub fn preset(&self) -> Preset { self.preset }
    #[inline] pub fn layer_count(&self) -> usize { self.layers.len() }
    #[inline] pub fn token_count(&self) -> usize { self.tokens.len() }
    #[inline] pub fn tokens(&self) -> &[Token] { &self.tokens }

    /// Cancel every timer, then disconnect every layer.
    pub fn teardown<T>(self, sink: &mut dyn AudioSink, scheduler: &mut Scheduler<T>) {
        let Composition { preset, layers, tokens } = self;
        let cancelled = tokens.into_iter().filter(|t| scheduler.cancel(*t)).count();
        let disconnected = layers.len();
        for layer in layers {
            sink.disconnect(layer);
        }
        tracing::debug!(preset = %preset, cancelled, disconnected, "composition torn down");
    }
}

/// Parameters of a connected layer, kept by the recipe for wiring cues.
#[derive(Copy, Clone, Debug)]
struct Wired {
    gain: Param,
    cutoff: Option<Param>,
    pitch: Option<Param>,
}

struct Builder<'a, T> {
    bank: &'a NoiseBank,
    sink: &'a mut dyn AudioSink,
    scheduler: &'a mut Scheduler<T>,
    rng: &'a mut dyn RngCore,
    now: f64,
    layers: Vec<Layer>,
    tokens: Vec<Token>,
}

impl<T: From<Cue>> Builder<'_, T> {
    /// A looped noise source at a random read offset.
    fn noise(&mut self, kind: NoiseKind) -> LayerDesc {
        let buffer = self.bank.buffer(kind);
        let offset = self.rng.gen_range(0..buffer.len().max(1));
        LayerDesc::noise(buffer).offset(offset)
    }

    fn keep(&mut self, layer: Layer) -> Wired {
        let wired = Wired { gain: layer.gain(), cutoff: layer.cutoff(0), pitch: layer.pitch() };
        self.layers.push(layer);
        wired
    }

    fn steady(&mut self, desc: LayerDesc) -> Wired {
        let layer = layers::steady(self.sink, desc);
        self.keep(layer)
    }

    fn burst(&mut self, desc: LayerDesc) -> Wired {
        let layer = layers::burst(self.sink, desc);
        self.keep(layer)
    }

    /// Repeating cue, first firing one interval from now.
    fn every(&mut self, interval: Interval, cue: Cue) {
        let first = interval.draw(self.rng);
        self.every_after(interval, first, cue);
    }

    fn every_after(&mut self, interval: Interval, first: f64, cue: Cue) {
        let token = self.scheduler.schedule(TimerKind::Repeating(interval), self.now, first, T::from(cue));
        self.tokens.push(token);
    }

    /// Self-rescheduling cue.
    fn chain(&mut self, first: f64, cue: Cue) {
        let token = self.scheduler.schedule(TimerKind::OneShot, self.now, first, T::from(cue));
        self.tokens.push(token);
    }

    fn bird(&mut self, base: Span, pause: Span, peak: Span) {
        let voice = self.burst(LayerDesc::tone(base.lo));
        let Some(pitch) = voice.pitch else { return };
        let first = f64::from(pause.draw(self.rng)) * 0.5;
        self.chain(first, Cue::Chirp(ChirpCue::new(voice.gain, pitch, base, pause).peak(peak)));
    }

    fn finish(self, preset: Preset) -> Composition {
        Composition { preset, layers: self.layers, tokens: self.tokens }
    }
}

/// Build `preset` on `sink`, arming its cues on `scheduler` relative to `now`.
pub fn compose<T: From<Cue>>(
    preset: Preset,
    bank: &NoiseBank,
    sink: &mut dyn AudioSink,
    scheduler: &mut Scheduler<T>,
    rng: &mut dyn RngCore,
    now: f64,
) -> Composition {
    let mut b = Builder { bank, sink, scheduler, rng, now, layers: Vec::new(), tokens: Vec::new() };
    match preset {
        Preset::Rain => rain(&mut b),
        Preset::Fireplace => fireplace(&mut b),
        Preset::Waves => waves(&mut b),
        Preset::Wind => wind(&mut b),
        Preset::Birds => birds(&mut b),
        Preset::Thunder => thunder(&mut b),
        Preset::Cafe => cafe(&mut b),
        Preset::Forest => forest(&mut b),
        Preset::WhiteNoise => white_noise(&mut b),
    }
    let c = b.finish(preset);
    tracing::debug!(preset = %preset, layers = c.layer_count(), timers = c.token_count(), "composition built");
    c
}

// ------------------------------------ Recipes ------------------------------------

fn rain<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let bed = b.noise(NoiseKind::Pink).lowpass(1_200.0, 0.7).gain(0.35);
    b.steady(bed);

    let drop = BurstShape::new(Span::fixed(0.002), Span::new(0.15, 0.45), Span::new(0.02, 0.08));
    for _ in 0..2 {
        let src = b.noise(NoiseKind::White).bandpass(3_500.0, 4.0);
        let drops = b.burst(src);
        let cue = BurstCue::new(drops.gain, drop).retune(drops.cutoff, Span::new(2_500.0, 4_500.0));
        b.every(Interval::uniform(0.03, 0.25), Cue::Burst(cue));
    }
}

fn fireplace<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let bed = b.noise(NoiseKind::Brown).lowpass(400.0, 0.7).gain(0.5);
    b.steady(bed);

    let src = b.noise(NoiseKind::White).bandpass(2_500.0, 2.5);
    let crackle = b.burst(src);
    let shape = BurstShape::new(Span::fixed(0.001), Span::new(0.2, 0.5), Span::new(0.01, 0.05));
    let cue = BurstCue::new(crackle.gain, shape).retune(crackle.cutoff, Span::new(1_500.0, 3_500.0));
    b.every(Interval::uniform(0.05, 0.4), Cue::Burst(cue));

    let src = b.noise(NoiseKind::White).bandpass(1_200.0, 1.5);
    let pops = b.burst(src);
    let shape = BurstShape::new(Span::fixed(0.002), Span::new(0.5, 0.9), Span::new(0.05, 0.15));
    let cue = BurstCue::new(pops.gain, shape).retune(pops.cutoff, Span::new(800.0, 2_000.0));
    b.every(Interval::uniform(1.0, 4.0), Cue::Burst(cue));
}

fn waves<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let src = b.noise(NoiseKind::Pink).lowpass(600.0, 0.7).gain(0.3);
    let bed = b.steady(src);
    let src = b.noise(NoiseKind::White).highpass(2_500.0, 0.7);
    let foam = b.burst(src);

    let crest = Crest {
        gain: foam.gain,
        shape: BurstShape::new(Span::new(0.3, 0.6), Span::new(0.1, 0.25), Span::new(1.0, 2.0)).linear_release(),
        threshold: 0.4,
    };
    let swell = DriftCue::new(bed.gain, Span::new(0.15, 0.6), Span::new(3.0, 7.0))
        .with_cutoff(bed.cutoff, Span::new(300.0, 1_500.0))
        .with_crest(crest);
    b.chain(0.0, Cue::Drift(swell));
}

fn wind<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let src = b.noise(NoiseKind::Pink).bandpass(500.0, 0.8).gain(0.35);
    let bed = b.steady(src);
    let drift = DriftCue::new(bed.gain, Span::new(0.15, 0.5), Span::new(2.0, 6.0))
        .with_cutoff(bed.cutoff, Span::new(250.0, 900.0));
    b.chain(0.0, Cue::Drift(drift));

    let src = b.noise(NoiseKind::Brown).lowpass(300.0, 0.7);
    let gusts = b.burst(src);
    let shape = BurstShape::new(Span::new(0.8, 2.0), Span::new(0.4, 0.8), Span::new(1.5, 4.0)).linear_release();
    b.every(Interval::uniform(4.0, 12.0), Cue::Burst(BurstCue::new(gusts.gain, shape)));
}

fn birds<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let pause = Span::new(1.0, 4.0);
    let peak = Span::new(0.05, 0.15);
    b.bird(Span::new(2_000.0, 3_200.0), pause, peak);
    b.bird(Span::new(2_800.0, 4_200.0), pause, peak);
    b.bird(Span::new(1_600.0, 2_600.0), pause, peak);
}

fn thunder<T: From<Cue>>(b: &mut Builder<'_, T>) {
    const RAIN_LEVEL: f32 = 0.2;
    let src = b.noise(NoiseKind::Pink).lowpass(1_500.0, 0.7).gain(RAIN_LEVEL);
    let rain = b.steady(src);
    let src = b.noise(NoiseKind::Brown).lowpass(800.0, 0.8);
    let boom = b.burst(src);

    let first = f64::from(Span::new(2.0, 6.0).draw(b.rng));
    let cue = ThunderCue::new(boom.gain, boom.cutoff, rain.gain, RAIN_LEVEL);
    b.every_after(Interval::uniform(8.0, 20.0), first, Cue::Thunder(cue));
}

fn cafe<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let src = b.noise(NoiseKind::Pink).bandpass(800.0, 0.6).gain(0.3);
    let bed = b.steady(src);
    b.chain(0.0, Cue::Drift(DriftCue::new(bed.gain, Span::new(0.2, 0.4), Span::new(4.0, 10.0))));

    let src = b.noise(NoiseKind::White).highpass(4_000.0, 2.0);
    let clinks = b.burst(src);
    let shape = BurstShape::new(Span::fixed(0.001), Span::new(0.1, 0.3), Span::new(0.05, 0.2));
    let cue = BurstCue::new(clinks.gain, shape).retune(clinks.cutoff, Span::new(3_000.0, 6_000.0));
    b.every(Interval::uniform(1.5, 6.0), Cue::Burst(cue));
}

fn forest<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let src = b.noise(NoiseKind::Pink).bandpass(400.0, 0.7).gain(0.25);
    let bed = b.steady(src);
    let drift = DriftCue::new(bed.gain, Span::new(0.1, 0.35), Span::new(4.0, 9.0))
        .with_cutoff(bed.cutoff, Span::new(250.0, 700.0));
    b.chain(0.0, Cue::Drift(drift));

    let pause = Span::new(3.0, 9.0);
    let peak = Span::new(0.03, 0.1);
    b.bird(Span::new(2_200.0, 3_400.0), pause, peak);
    b.bird(Span::new(1_800.0, 2_800.0), pause, peak);
}

fn white_noise<T: From<Cue>>(b: &mut Builder<'_, T>) {
    let src = b.noise(NoiseKind::White).gain(0.3);
    b.steady(src);
}
