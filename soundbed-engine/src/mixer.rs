//! Render-side graph: voices summed into a master gain.
//!
//! The mixer is driven only through [`Command`]s, so the same code runs
//! in-process behind [`OfflineSink`](crate::offline::OfflineSink) and on the
//! audio thread behind [`CpalSink`](crate::realtime::CpalSink).

use soundbed_core::automation::{Lane, Point};
use soundbed_core::dsp::soft_clip;
use soundbed_core::filters::DcBlock;

use crate::graph::{LayerId, Param};
use crate::nodes::Voice;

/// Filter cutoffs are re-evaluated every this many frames.
const CONTROL_PERIOD: u64 = 32;

/// One control → render message.
#[derive(Debug)]
pub enum Command {
    Connect(Box<Voice>),
    Disconnect(LayerId),
    Ramp(Param, Point),
    Cancel(Param, f64),
}

#[derive(Debug)]
pub struct Mixer {
    sr: f32,
    frame: u64,
    voices: Vec<Voice>,
    master: Lane,
    dc: DcBlock,
}

impl Mixer {
    pub fn new(sample_rate: f32, master: f32) -> Self {
        Self {
            sr: sample_rate,
            frame: 0,
            voices: Vec::with_capacity(16),
            master: Lane::new(master),
            dc: DcBlock::new(10.0, sample_rate),
        }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }
    #[inline] pub fn frame(&self) -> u64 { self.frame }
    #[inline] pub fn voices(&self) -> usize { self.voices.len() }

    /// Clock in seconds.
    #[allow(clippy::cast_precision_loss)]
    #[inline]
    pub fn time(&self) -> f64 {
        self.frame as f64 / f64::from(self.sr)
    }

    /// Current master lane value, without consuming points.
    pub fn master_at(&self, t: f64) -> f32 {
        self.master.peek(t)
    }

    pub fn apply(&mut self, cmd: Command) {
        match cmd {
            Command::Connect(voice) => self.voices.push(*voice),
            Command::Disconnect(id) => self.voices.retain(|v| v.id() != id),
            Command::Ramp(param, point) => {
                if let Some(lane) = self.lane_mut(param) {
                    lane.push(point);
                }
            }
            Command::Cancel(param, from) => {
                if let Some(lane) = self.lane_mut(param) {
                    lane.cancel_from(from);
                }
            }
        }
    }

    fn lane_mut(&mut self, param: Param) -> Option<&mut Lane> {
        match param {
            Param::Master => Some(&mut self.master),
            Param::Gain(id) | Param::Pitch(id) | Param::Cutoff(id, _) => self
                .voices
                .iter_mut()
                .find(|v| v.id() == id)
                .and_then(|v| v.lane_mut(param)),
        }
    }

    /// Render one mono sample and advance the clock.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let t = self.time();
        if self.frame % CONTROL_PERIOD == 0 {
            for v in &mut self.voices {
                v.update_controls(t);
            }
        }
        let sr = self.sr;
        let sum: f32 = self.voices.iter_mut().map(|v| v.next(t, sr)).sum();
        let g = self.master.value_at(t);
        self.frame += 1;
        soft_clip(self.dc.process(sum) * g).clamp(-1.0, 1.0)
    }

    pub fn render(&mut self, out: &mut [f32]) {
        for s in out.iter_mut() {
            *s = self.next();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::NoiseBank;
    use crate::graph::LayerDesc;
    use soundbed_core::noise::NoiseKind;

    fn mixer_with_voice(gain: f32) -> Mixer {
        let bank = NoiseBank::new(8_000.0, 1.0, 9);
        let mut m = Mixer::new(8_000.0, 1.0);
        let desc = LayerDesc::noise(bank.buffer(NoiseKind::Pink)).lowpass(1_000.0, 0.7).gain(gain);
        m.apply(Command::Connect(Box::new(Voice::new(LayerId(1), desc, 8_000.0))));
        m
    }

    #[test]
    fn clock_advances_per_sample() {
        let mut m = Mixer::new(8_000.0, 0.5);
        let mut out = [0.0_f32; 800];
        m.render(&mut out);
        assert_eq!(m.frame(), 800);
        assert!((m.time() - 0.1).abs() < 1e-9);
        assert!(out.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn output_is_bounded() {
        let mut m = mixer_with_voice(4.0);
        let mut out = vec![0.0_f32; 8_000];
        m.render(&mut out);
        assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
        assert!(out.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn master_ramp_silences_output() {
        let mut m = mixer_with_voice(0.5);
        m.apply(Command::Ramp(Param::Master, Point::linear(0.1, 0.0)));
        let mut out = vec![0.0_f32; 1_600];
        m.render(&mut out);
        assert!(out[900..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn disconnect_removes_the_voice() {
        let mut m = mixer_with_voice(0.5);
        assert_eq!(m.voices(), 1);
        m.apply(Command::Disconnect(LayerId(2)));
        assert_eq!(m.voices(), 1);
        m.apply(Command::Disconnect(LayerId(1)));
        assert_eq!(m.voices(), 0);
    }

    #[test]
    fn ramps_to_unknown_layers_are_ignored() {
        let mut m = mixer_with_voice(0.5);
        m.apply(Command::Ramp(Param::Gain(LayerId(7)), Point::step(0.0, 1.0)));
        m.apply(Command::Cancel(Param::Cutoff(LayerId(1), 3), 0.0));
        assert_eq!(m.voices(), 1);
    }
}
