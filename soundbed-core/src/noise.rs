//! Colored-noise shapers.
//!
//! Each shaper turns a stream of white samples in [-1, 1] into one colored
//! sample. They hold no buffers and pull no RNG themselves; the caller owns the
//! random source, which keeps this module `no_std` and deterministic under a
//! seeded generator.
//!
//! - `PinkFilter`  : six recursive poles plus a one-sample tap (the Kellett
//!                   "refined" pink approximation, ~-3 dB/octave)
//! - `BrownFilter` : leaky integrator, ~-6 dB/octave
//!
//! Outputs are scaled by fixed gains and then clamped, so every sample lands in
//! [-1, 1] regardless of how long the white stream runs.

use crate::dsp::clamp;

/// Noise color.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NoiseKind {
    White,
    Pink,
    Brown,
}

impl NoiseKind {
    pub const ALL: [NoiseKind; 3] = [NoiseKind::White, NoiseKind::Pink, NoiseKind::Brown];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            NoiseKind::White => 0,
            NoiseKind::Pink => 1,
            NoiseKind::Brown => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NoiseKind::White => "white",
            NoiseKind::Pink => "pink",
            NoiseKind::Brown => "brown",
        }
    }
}

/// Pole/gain pairs for the six recursive pink stages.
const PINK_POLES: [(f32, f32); 6] = [
    (0.998_86, 0.055_517_9),
    (0.993_32, 0.075_075_9),
    (0.969_00, 0.153_852_0),
    (0.866_50, 0.310_485_6),
    (0.550_00, 0.532_952_2),
    (-0.761_6, -0.016_898_0),
];
const PINK_DIRECT: f32 = 0.5362;
const PINK_TAP: f32 = 0.115_926;
const PINK_GAIN: f32 = 0.11;

/// Kellett pink-noise filter: a weighted sum of six one-pole low-passes.
#[derive(Copy, Clone, Debug, Default)]
pub struct PinkFilter {
    b: [f32; 6],
    tap: f32,
}

impl PinkFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape one white sample.
    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        let mut sum = 0.0;
        for (state, &(pole, gain)) in self.b.iter_mut().zip(PINK_POLES.iter()) {
            *state = pole * *state + white * gain;
            sum += *state;
        }
        let out = (sum + self.tap + white * PINK_DIRECT) * PINK_GAIN;
        self.tap = white * PINK_TAP;
        clamp(out, -1.0, 1.0)
    }
}

/// Integration step for brown noise.
const BROWN_STEP: f32 = 0.02;
/// Makeup gain applied after integration.
const BROWN_GAIN: f32 = 3.5;

/// Leaky integrator: `y[n] = (y[n-1] + k·white[n]) / (1 + k)`, output `y·gain`.
#[derive(Copy, Clone, Debug, Default)]
pub struct BrownFilter {
    last: f32,
}

impl BrownFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        self.last = (self.last + BROWN_STEP * white) / (1.0 + BROWN_STEP);
        clamp(self.last * BROWN_GAIN, -1.0, 1.0)
    }
}

/// Stateful shaper for any [`NoiseKind`].
#[derive(Copy, Clone, Debug)]
pub enum Shaper {
    White,
    Pink(PinkFilter),
    Brown(BrownFilter),
}

impl Shaper {
    pub fn new(kind: NoiseKind) -> Self {
        match kind {
            NoiseKind::White => Shaper::White,
            NoiseKind::Pink => Shaper::Pink(PinkFilter::new()),
            NoiseKind::Brown => Shaper::Brown(BrownFilter::new()),
        }
    }

    /// Shape one white sample in [-1, 1].
    #[inline]
    pub fn process(&mut self, white: f32) -> f32 {
        match self {
            Shaper::White => clamp(white, -1.0, 1.0),
            Shaper::Pink(p) => p.process(white),
            Shaper::Brown(b) => b.process(white),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Tiny xorshift so the tests do not depend on an RNG crate.
    struct XorShift(u32);
    impl XorShift {
        fn white(&mut self) -> f32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            self.0 = x;
            (x as f32 / u32::MAX as f32) * 2.0 - 1.0
        }
    }

    fn run(kind: NoiseKind, n: usize) -> Vec<f32> {
        let mut rng = XorShift(0x9E37_79B9);
        let mut shaper = Shaper::new(kind);
        (0..n).map(|_| shaper.process(rng.white())).collect()
    }

    fn mean_abs_step(xs: &[f32]) -> f32 {
        xs.windows(2).map(|w| (w[1] - w[0]).abs()).sum::<f32>() / (xs.len() - 1) as f32
    }

    #[test]
    fn every_color_is_bounded() {
        for kind in NoiseKind::ALL {
            let xs = run(kind, 200_000);
            assert!(xs.iter().all(|x| (-1.0..=1.0).contains(x)), "{kind:?} out of range");
            assert!(xs.iter().any(|x| x.abs() > 0.05), "{kind:?} is silent");
        }
    }

    #[test]
    fn darker_colors_move_slower() {
        // Sample-to-sample movement is a cheap proxy for high-frequency energy.
        let white = mean_abs_step(&run(NoiseKind::White, 50_000));
        let pink = mean_abs_step(&run(NoiseKind::Pink, 50_000));
        let brown = mean_abs_step(&run(NoiseKind::Brown, 50_000));
        assert!(white > pink && pink > brown, "white={white} pink={pink} brown={brown}");
    }
}
