//! Filters for layer voicing and the master bus.
//!
//! - [`DcBlock`] : one-pole high-pass ahead of the master gain; brown noise wanders
//! - [`SvfTpt`]  : zero-delay-feedback state-variable filter (Zavalishin TPT form),
//!   stable under the constant cutoff automation layers receive (swells,
//!   thunder sweeps, per-droplet retunes)

use crate::dsp::{kill_denormals, one_pole_coeff_hz, tpt_g};

/// `y[n] = x[n] - x[n-1] + b·y[n-1]`, `b = exp(-2π fc / sr)`.
#[derive(Copy, Clone, Debug)]
pub struct DcBlock {
    b: f32,
    x1: f32,
    y1: f32,
}

impl DcBlock {
    pub fn new(cut_hz: f32, sr: f32) -> Self {
        Self { b: one_pole_coeff_hz(cut_hz.max(0.0), sr.max(1.0)), x1: 0.0, y1: 0.0 }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = kill_denormals(x - self.x1 + self.b * self.y1);
        self.x1 = x;
        self.y1 = y;
        y
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SvfMode {
    Lowpass,
    Highpass,
    /// Normalized to unity gain at the center frequency.
    Bandpass,
}

#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    mode: SvfMode,
    sr: f32,
    cut: f32,
    /// Damping, `1 / (2Q)`.
    r: f32,
    g: f32,
    s1: f32,
    s2: f32,
}

impl SvfTpt {
    pub fn new(mode: SvfMode, cut_hz: f32, q: f32, sr: f32) -> Self {
        let sr = sr.max(1.0);
        let cut = cut_hz.max(0.0);
        Self { mode, sr, cut, r: 0.5 / q.max(1e-4), g: tpt_g(cut, sr), s1: 0.0, s2: 0.0 }
    }

    /// Retune; the `tan` is skipped when the cutoff did not move.
    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        let cut = cut_hz.max(0.0);
        if cut != self.cut {
            self.cut = cut;
            self.g = tpt_g(cut, self.sr);
        }
    }

    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let g = self.g;
        let hp = (x - (2.0 * self.r + g) * self.s1 - self.s2) / (1.0 + 2.0 * self.r * g + g * g);
        let bp = g * hp + self.s1;
        self.s1 = kill_denormals(bp + g * hp);
        let lp = g * bp + self.s2;
        self.s2 = kill_denormals(lp + g * bp);
        match self.mode {
            SvfMode::Lowpass => lp,
            SvfMode::Highpass => hp,
            SvfMode::Bandpass => 2.0 * self.r * bp,
        }
    }
}
