//! Layer Primitives: steady beds, silent burst layers and burst envelopes.

use rand::{Rng, RngCore};
use soundbed_core::automation::{Curve, Point};

use crate::graph::{AudioSink, Layer, LayerDesc, Param};

/// A closed range of values a cue draws from on every firing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Span {
    pub lo: f32,
    pub hi: f32,
}

impl Span {
    pub const fn new(lo: f32, hi: f32) -> Self {
        Self { lo, hi }
    }

    pub const fn fixed(v: f32) -> Self {
        Self { lo: v, hi: v }
    }

    pub fn draw(&self, rng: &mut dyn RngCore) -> f32 {
        if self.hi > self.lo {
            rng.gen_range(self.lo..=self.hi)
        } else {
            self.lo
        }
    }

    pub fn contains(&self, v: f32) -> bool {
        v >= self.lo.min(self.hi) && v <= self.hi.max(self.lo)
    }
}

/// Connect a continuous layer at its descriptor gain.
pub fn steady(sink: &mut dyn AudioSink, desc: LayerDesc) -> Layer {
    sink.connect(desc)
}

/// Connect a layer held silent until a cue opens it.
pub fn burst(sink: &mut dyn AudioSink, desc: LayerDesc) -> Layer {
    sink.connect(desc.gain(0.0))
}

/// Attack/peak/release envelope written as automation.
///
/// A zero-length attack jumps to the peak; the release always lands on 0,
/// so every burst ends silent without further bookkeeping.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BurstShape {
    pub attack: Span,
    pub peak: Span,
    pub release: Span,
    pub release_curve: Curve,
}

impl BurstShape {
    pub const fn new(attack: Span, peak: Span, release: Span) -> Self {
        Self { attack, peak, release, release_curve: Curve::Exponential }
    }

    pub const fn linear_release(mut self) -> Self {
        self.release_curve = Curve::Linear;
        self
    }

    /// Write one burst on `gain` starting at `start`; returns when it ends.
    pub fn write(&self, sink: &mut dyn AudioSink, gain: Param, start: f64, rng: &mut dyn RngCore) -> f64 {
        let attack = f64::from(self.attack.draw(rng).max(0.0));
        let peak = self.peak.draw(rng).max(0.0);
        let release = f64::from(self.release.draw(rng).max(0.001));

        let top = start + attack;
        if attack > 0.0 {
            sink.schedule_ramp(gain, Point::step(start, 0.0));
            sink.schedule_ramp(gain, Point::linear(top, peak));
        } else {
            sink.schedule_ramp(gain, Point::step(start, peak));
        }
        let end = top + release;
        let tail = match self.release_curve {
            Curve::Linear | Curve::Step => Point::linear(end, 0.0),
            Curve::Exponential => Point::exponential(end, 0.0),
        };
        sink.schedule_ramp(gain, tail);
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::OfflineSink;
    use crate::bank::NoiseBank;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use soundbed_core::noise::NoiseKind;

    #[test]
    fn span_draws_inside_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let span = Span::new(2_500.0, 4_500.0);
        for _ in 0..1_000 {
            assert!(span.contains(span.draw(&mut rng)));
        }
        assert_eq!(Span::fixed(3.0).draw(&mut rng), 3.0);
    }

    #[test]
    fn burst_layer_starts_silent_and_returns_to_silence() {
        let sr = 8_000.0;
        let bank = NoiseBank::new(sr, 1.0, 4);
        let mut sink = OfflineSink::new(sr);
        sink.resume().expect("resume");
        sink.schedule_ramp(Param::Master, Point::step(0.0, 1.0));
        let layer = burst(&mut sink, LayerDesc::noise(bank.buffer(NoiseKind::White)).bandpass(3_000.0, 3.0).gain(0.8));

        let mut rng = StdRng::seed_from_u64(2);
        let shape = BurstShape::new(Span::fixed(0.005), Span::new(0.3, 0.6), Span::new(0.05, 0.1));
        let end = shape.write(&mut sink, layer.gain(), 0.1, &mut rng);
        assert!(end > 0.1 && end <= 0.1 + 0.005 + 0.1 + 1e-6);

        let mut out = vec![0.0_f32; 4_000];
        sink.render(&mut out);
        assert!(out[..700].iter().all(|s| s.abs() < 1e-6), "silent before the burst");
        assert!(out[800..1_700].iter().any(|s| s.abs() > 1e-3), "audible during the burst");
        assert!(out[2_000..].iter().all(|s| s.abs() < 1e-3), "silent after the burst");
    }
}
