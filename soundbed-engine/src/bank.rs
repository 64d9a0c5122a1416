//! Noise Bank: memoized colored-noise loop buffers.
//!
//! Every preset is carved out of the same three buffers (white, pink, brown).
//! Each buffer is synthesized once per bank, on first request, and shared
//! read-only (`Arc`) by any number of playing layers.
//!
//! The loop seam is crossfaded: the buffer is synthesized `SEAM_SECONDS`
//! longer than its nominal length and the overhang is blended into the head,
//! so wrapping from the last sample to the first continues the same waveform.

use std::cell::{Cell, OnceCell};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use soundbed_core::dsp::lerp;
use soundbed_core::noise::{NoiseKind, Shaper};

/// Length of the blended region at the loop point.
const SEAM_SECONDS: f32 = 0.05;

/// Immutable loop buffer of one noise color.
#[derive(Debug)]
pub struct NoiseBuffer {
    kind: NoiseKind,
    samples: Box<[f32]>,
}

impl NoiseBuffer {
    /// Synthesize `seconds` of `kind` noise at `sample_rate`.
    pub fn synthesize(kind: NoiseKind, sample_rate: f32, seconds: f32, rng: &mut dyn RngCore) -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let len = ((sample_rate * seconds) as usize).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seam = ((sample_rate * SEAM_SECONDS) as usize).min(len / 2);

        let mut shaper = Shaper::new(kind);
        let raw: Vec<f32> = (0..len + seam)
            .map(|_| shaper.process(rng.gen_range(-1.0..=1.0)))
            .collect();

        let mut samples = raw[..len].to_vec();
        for (i, s) in samples.iter_mut().take(seam).enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let w = i as f32 / seam as f32;
            *s = lerp(raw[len + i], *s, w);
        }

        Self { kind, samples: samples.into_boxed_slice() }
    }

    #[inline] pub fn kind(&self) -> NoiseKind { self.kind }
    #[inline] pub fn samples(&self) -> &[f32] { &self.samples }
    #[inline] pub fn len(&self) -> usize { self.samples.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.samples.is_empty() }
}

/// Lazily-filled cache of the three noise buffers for one engine.
#[derive(Debug)]
pub struct NoiseBank {
    sample_rate: f32,
    seconds: f32,
    seed: u64,
    cells: [OnceCell<Arc<NoiseBuffer>>; 3],
    synthesized: Cell<usize>,
}

impl NoiseBank {
    pub fn new(sample_rate: f32, seconds: f32, seed: u64) -> Self {
        Self {
            sample_rate,
            seconds,
            seed,
            cells: Default::default(),
            synthesized: Cell::new(0),
        }
    }

    /// The buffer for `kind`, synthesizing it on first request.
    pub fn buffer(&self, kind: NoiseKind) -> Arc<NoiseBuffer> {
        let cell = &self.cells[kind.index()];
        Arc::clone(cell.get_or_init(|| {
            self.synthesized.set(self.synthesized.get() + 1);
            let mut rng = StdRng::seed_from_u64(self.seed ^ (kind.index() as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
            let buf = NoiseBuffer::synthesize(kind, self.sample_rate, self.seconds, &mut rng);
            tracing::debug!(kind = kind.name(), samples = buf.len(), "noise buffer synthesized");
            Arc::new(buf)
        }))
    }

    pub fn is_cached(&self, kind: NoiseKind) -> bool {
        self.cells[kind.index()].get().is_some()
    }

    /// How many syntheses this bank has run.
    pub fn synthesized(&self) -> usize {
        self.synthesized.get()
    }

    /// Drop every cached buffer. Layers still holding one keep it alive.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.take();
        }
    }
}
