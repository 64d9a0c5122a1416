//! Render-side building blocks.
//!
//! These run inside the render graph (the audio thread for real-time output).
//! Nothing here allocates per sample; a [`Voice`] allocates once, when the
//! control side builds it from a [`LayerDesc`].
//!
//! Contents:
//! - `Osc`        : sine oscillator with stable phase wrap
//! - `NoiseLoop`    : looped reader over a shared noise buffer
//! - `Voice`        : one layer: source → filter stages → gain, each parameter
//!                    driven by an automation lane

use std::sync::Arc;

use soundbed_core::automation::Lane;
use soundbed_core::dsp::{fast_sin, TAU};
use soundbed_core::filters::SvfTpt;

use crate::bank::NoiseBuffer;
use crate::graph::{LayerDesc, LayerId, Param, Source};

/// Free-running sine oscillator.
#[derive(Copy, Clone, Debug)]
pub struct Osc {
    phase: f32,   // [0,1)
    freq:  f32,   // Hz
}

impl Osc {
    #[inline] pub fn new(freq_hz: f32) -> Self { Self { phase: 0.0, freq: freq_hz.max(0.0) } }
    #[inline] pub fn set_freq(&mut self, hz: f32) { self.freq = hz.max(0.0); }

    /// Advance one sample and return the oscillator sample.
    #[inline]
    pub fn next(&mut self, sr: f32) -> f32 {
        self.phase = (self.phase + self.freq / sr) % 1.0;
        fast_sin(TAU * self.phase)
    }
}

/// Looped reader over an immutable noise buffer.
#[derive(Clone, Debug)]
pub struct NoiseLoop {
    buffer: Arc<NoiseBuffer>,
    pos: usize,
}

impl NoiseLoop {
    pub fn new(buffer: Arc<NoiseBuffer>, start: usize) -> Self {
        let pos = start % buffer.len().max(1);
        Self { buffer, pos }
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let samples = self.buffer.samples();
        if samples.is_empty() {
            return 0.0;
        }
        let s = samples[self.pos];
        self.pos += 1;
        if self.pos >= samples.len() {
            self.pos = 0;
        }
        s
    }
}

#[derive(Clone, Debug)]
enum VoiceSource {
    Noise(NoiseLoop),
    Tone { osc: Osc, pitch: Lane },
}

#[derive(Clone, Debug)]
struct Stage {
    svf: SvfTpt,
    cutoff: Lane,
}

/// One rendered layer.
#[derive(Clone, Debug)]
pub struct Voice {
    id: LayerId,
    source: VoiceSource,
    stages: Vec<Stage>,
    gain: Lane,
    nyquist_guard: f32,
}

impl Voice {
    pub fn new(id: LayerId, desc: LayerDesc, sr: f32) -> Self {
        let source = match desc.source {
            Source::Noise { buffer, start } => VoiceSource::Noise(NoiseLoop::new(buffer, start)),
            Source::Tone { freq } => VoiceSource::Tone { osc: Osc::new(freq), pitch: Lane::new(freq) },
        };
        let stages = desc
            .filters
            .iter()
            .map(|f| Stage { svf: SvfTpt::new(f.mode, f.freq, f.q, sr), cutoff: Lane::new(f.freq) })
            .collect();
        Self { id, source, stages, gain: Lane::new(desc.gain), nyquist_guard: 0.45 * sr }
    }

    #[inline] pub fn id(&self) -> LayerId { self.id }

    /// The lane behind `param`, if it belongs to this voice.
    pub fn lane_mut(&mut self, param: Param) -> Option<&mut Lane> {
        match param {
            Param::Gain(id) if id == self.id => Some(&mut self.gain),
            Param::Pitch(id) if id == self.id => match &mut self.source {
                VoiceSource::Tone { pitch, .. } => Some(pitch),
                VoiceSource::Noise(_) => None,
            },
            Param::Cutoff(id, stage) if id == self.id => {
                self.stages.get_mut(usize::from(stage)).map(|s| &mut s.cutoff)
            }
            _ => None,
        }
    }

    /// Control-rate update: retune filter stages from their lanes.
    pub fn update_controls(&mut self, t: f64) {
        for stage in &mut self.stages {
            let hz = stage.cutoff.value_at(t);
            stage.svf.set_cutoff_hz(hz);
        }
    }

    /// Next sample at time `t`.
    #[inline]
    pub fn next(&mut self, t: f64, sr: f32) -> f32 {
        let g = self.gain.value_at(t);
        let silent = g == 0.0 && self.gain.is_settled();

        let mut x = match &mut self.source {
            VoiceSource::Noise(noise) => noise.next(),
            VoiceSource::Tone { osc, pitch } => {
                osc.set_freq(pitch.value_at(t).min(self.nyquist_guard));
                osc.next(sr)
            }
        };
        if silent {
            // Keep the source position moving; skip the filters entirely.
            return 0.0;
        }
        for stage in &mut self.stages {
            x = stage.svf.process(x);
        }
        x * g
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::NoiseBank;
    use soundbed_core::automation::Point;
    use soundbed_core::noise::NoiseKind;

    #[test]
    fn osc_stays_in_range() {
        let mut osc = Osc::new(440.0);
        for _ in 0..48_000 {
            let s = osc.next(48_000.0);
            assert!((-1.001..=1.001).contains(&s));
        }
    }

    #[test]
    fn noise_loop_wraps() {
        let bank = NoiseBank::new(1_000.0, 1.0, 1);
        let buf = bank.buffer(NoiseKind::White);
        let first = buf.samples()[0];
        let mut reader = NoiseLoop::new(buf, 0);
        for _ in 0..1_000 {
            reader.next();
        }
        assert_eq!(reader.next(), first);
    }

    #[test]
    fn silent_voice_outputs_zero_until_its_gain_opens() {
        let bank = NoiseBank::new(8_000.0, 1.0, 2);
        let desc = LayerDesc::noise(bank.buffer(NoiseKind::White)).bandpass(2_000.0, 2.0);
        let mut voice = Voice::new(LayerId(0), desc, 8_000.0);
        let sr = 8_000.0;
        for i in 0..100 {
            assert_eq!(voice.next(f64::from(i) / 8_000.0, sr), 0.0);
        }
        let lane = voice.lane_mut(Param::Gain(LayerId(0))).expect("gain lane");
        lane.push(Point::step(0.02, 0.5));
        let loud = (200..800).map(|i| voice.next(f64::from(i) / 8_000.0, sr).abs()).fold(0.0_f32, f32::max);
        assert!(loud > 0.0);
    }

    #[test]
    fn lanes_are_addressed_by_owner() {
        let bank = NoiseBank::new(8_000.0, 0.5, 2);
        let desc = LayerDesc::noise(bank.buffer(NoiseKind::Pink)).lowpass(800.0, 0.7);
        let mut voice = Voice::new(LayerId(3), desc, 8_000.0);
        assert!(voice.lane_mut(Param::Cutoff(LayerId(3), 0)).is_some());
        assert!(voice.lane_mut(Param::Cutoff(LayerId(3), 1)).is_none());
        assert!(voice.lane_mut(Param::Pitch(LayerId(3))).is_none());
        assert!(voice.lane_mut(Param::Gain(LayerId(4))).is_none());
    }
}
