//! Engine configuration.

/// Tunables for an [`Engine`](crate::Engine). Defaults suit interactive use.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Master volume before any `play`/`set_volume` call supplies one.
    pub default_volume: f32,
    /// Length of the master-gain ramp applied by `set_volume` (seconds).
    pub volume_ramp: f64,
    /// Loop length of each noise buffer (seconds).
    pub noise_seconds: f32,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Frames rendered between scheduler pumps by offline rendering.
    pub quantum: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_volume: 0.5,
            volume_ramp: 0.05,
            noise_seconds: 4.0,
            seed: None,
            quantum: 128,
        }
    }
}

impl EngineConfig {
    pub fn with_default_volume(mut self, v: f32) -> Self {
        self.default_volume = v.clamp(0.0, 1.0);
        self
    }

    pub fn with_volume_ramp(mut self, seconds: f64) -> Self {
        self.volume_ramp = seconds.max(0.0);
        self
    }

    pub fn with_noise_seconds(mut self, seconds: f32) -> Self {
        self.noise_seconds = seconds.max(0.5);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_quantum(mut self, frames: usize) -> Self {
        self.quantum = frames.max(1);
        self
    }
}
