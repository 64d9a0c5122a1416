//! Playback Controller: lifecycle and crossfade state machine.
//!
//! The [`Engine`] is an ordinary value owned by its caller. It enforces the
//! "at most one live composition" rule, owns the only writer of the master
//! gain, and drives the Macro Scheduler from the sink clock through
//! [`Engine::pump`].
//!
//! ```text
//! Idle ──play──▶ Playing(A) ──crossfade(B)──▶ CrossfadingOut(A→B)
//!                    ▲                               │ switch timer
//!                    └──── ramp done ◀── CrossfadingIn(B) ◀┘
//! ```
//!
//! `stop`, `play` and `crossfade` cancel a pending switch timer before doing
//! anything else, so a superseded crossfade can never restart its preset.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use soundbed_core::automation::Point;

use crate::bank::NoiseBank;
use crate::composer::{compose, Composition};
use crate::config::EngineConfig;
use crate::cues::{Cue, CueContext};
use crate::error::{EngineError, Result};
use crate::graph::{AudioSink, Backend, OutputState, Param};
use crate::offline::OfflineBackend;
use crate::preset::Preset;
use crate::scheduler::{Rearm, Scheduler, TimerKind, Token};

/// What a scheduler timer runs.
#[derive(Debug)]
pub enum Task {
    Cue(Cue),
    /// Mid-point of a crossfade.
    Switch,
}

impl From<Cue> for Task {
    fn from(cue: Cue) -> Self {
        Task::Cue(cue)
    }
}

/// Observable playback state.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing(Preset),
    CrossfadingOut { from: Preset, to: Preset },
    CrossfadingIn(Preset),
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Fade {
    None,
    Out { from: Preset, to: Preset, token: Token, target: f32, half: f64 },
    In { until: f64, target: f32 },
}

pub struct Engine<B: Backend> {
    backend: B,
    config: EngineConfig,
    sink: Option<B::Sink>,
    bank: Option<NoiseBank>,
    scheduler: Scheduler<Task>,
    composition: Option<Composition>,
    fade: Fade,
    volume: f32,
    rng: StdRng,
}

impl<B: Backend> Engine<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, EngineConfig::default())
    }

    pub fn with_config(backend: B, config: EngineConfig) -> Self {
        let rng = config.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            backend,
            volume: config.default_volume.clamp(0.0, 1.0),
            config,
            sink: None,
            bank: None,
            scheduler: Scheduler::new(),
            composition: None,
            fade: Fade::None,
            rng,
        }
    }

    #[inline] pub fn config(&self) -> &EngineConfig { &self.config }

    /// Start `name` at `volume` (or the current volume), replacing whatever plays.
    pub fn play(&mut self, name: &str, volume: Option<f32>) -> Result<()> {
        let preset: Preset = name.parse()?;
        self.play_preset(preset, volume)
    }

    pub fn play_preset(&mut self, preset: Preset, volume: Option<f32>) -> Result<()> {
        let vol = match volume {
            Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
            Some(v) => {
                tracing::warn!(volume = v, "ignoring non-finite volume");
                self.volume
            }
            None => self.volume,
        };
        // A failed activation leaves any crossfade in flight untouched.
        self.activate(preset, vol)?;
        self.cancel_fade();
        self.volume = vol;
        Ok(())
    }

    /// Tear the composition down and suspend output. No-op when idle.
    pub fn stop(&mut self) {
        self.cancel_fade();
        let stopped = self.teardown_composition();
        if let Some(sink) = self.sink.as_mut() {
            if sink.state() == OutputState::Running {
                sink.suspend();
            }
        }
        if let Some(preset) = stopped {
            tracing::info!(preset = %preset, "playback stopped");
        }
    }

    /// Clamp to `[0, 1]` and ramp the master gain there.
    ///
    /// During a fade-out the new value becomes the fade-in target; during a
    /// fade-in it replaces the target the ramp is heading to.
    pub fn set_volume(&mut self, v: f32) {
        if !v.is_finite() {
            tracing::warn!(volume = v, "ignoring non-finite volume");
            return;
        }
        let v = v.clamp(0.0, 1.0);
        self.volume = v;
        self.settle_fade();

        let ramp = self.config.volume_ramp;
        let Some(sink) = self.sink.as_mut() else { return };
        let now = sink.current_time();
        let at = match &mut self.fade {
            Fade::Out { target, .. } => {
                *target = v;
                return;
            }
            Fade::In { until, target } => {
                *target = v;
                (*until).max(now + ramp)
            }
            Fade::None => now + ramp,
        };
        sink.cancel_ramps(Param::Master, now);
        sink.schedule_ramp(Param::Master, Point::linear(at, v));
    }

    #[inline] pub fn volume(&self) -> f32 { self.volume }

    pub fn crossfade(&mut self, name: &str, duration: Duration) -> Result<()> {
        let preset: Preset = name.parse()?;
        self.crossfade_to(preset, duration)
    }

    /// Fade out over half of `duration`, switch, fade back in over the rest.
    /// With nothing playing, starts `to` silent and only fades in.
    pub fn crossfade_to(&mut self, to: Preset, duration: Duration) -> Result<()> {
        let half = duration.as_secs_f64() / 2.0;
        self.cancel_fade();

        let Some(from) = self.current_preset() else {
            self.activate(to, 0.0)?;
            self.fade_in(half);
            return Ok(());
        };
        let Some(sink) = self.sink.as_mut() else {
            return Err(EngineError::unavailable("output handle missing while playing"));
        };
        let now = sink.current_time();
        sink.cancel_ramps(Param::Master, now);
        sink.schedule_ramp(Param::Master, Point::linear(now + half, 0.0));
        let token = self.scheduler.schedule(TimerKind::OneShot, now, half, Task::Switch);
        self.fade = Fade::Out { from, to, token, target: self.volume, half };
        tracing::debug!(from = %from, to = %to, half, "crossfade out");
        Ok(())
    }

    pub fn current_preset(&self) -> Option<Preset> {
        self.composition.as_ref().map(Composition::preset)
    }

    pub fn is_playing(&self) -> bool {
        self.composition.is_some()
    }

    pub fn state(&self) -> PlaybackState {
        match (self.fade, self.current_preset()) {
            (Fade::Out { from, to, .. }, _) => PlaybackState::CrossfadingOut { from, to },
            (Fade::In { until, .. }, Some(p)) if self.time() < until => PlaybackState::CrossfadingIn(p),
            (_, Some(p)) => PlaybackState::Playing(p),
            (_, None) => PlaybackState::Idle,
        }
    }

    pub fn output_state(&self) -> OutputState {
        self.sink.as_ref().map_or(OutputState::Uninitialized, AudioSink::state)
    }

    /// Sink clock in seconds (0 before the output exists).
    pub fn time(&self) -> f64 {
        self.sink.as_ref().map_or(0.0, AudioSink::current_time)
    }

    /// Fire every timer due at the current sink clock. Returns how many fired.
    pub fn pump(&mut self) -> usize {
        let mut fired_count = 0;
        loop {
            let Some(sink) = self.sink.as_mut() else { break };
            let now = sink.current_time();
            let Some(mut fired) = self.scheduler.pop_due(now) else { break };
            fired_count += 1;

            let rearm = match &mut fired.task {
                Task::Cue(cue) => {
                    let mut ctx = CueContext { sink, rng: &mut self.rng, now };
                    cue.fire(&mut ctx)
                }
                Task::Switch => Rearm::Stop,
            };
            let switch = matches!(fired.task, Task::Switch).then_some(fired.token);
            self.scheduler.rearm(fired, rearm, &mut self.rng);
            if let Some(token) = switch {
                self.finish_switch(token);
            }
        }
        self.settle_fade();
        fired_count
    }

    /// Timers still armed.
    pub fn pending_events(&self) -> usize {
        self.scheduler.pending()
    }

    /// Layers connected in the render graph.
    pub fn layer_count(&self) -> usize {
        self.sink.as_ref().map_or(0, AudioSink::connected)
    }

    #[inline] pub fn sink(&self) -> Option<&B::Sink> { self.sink.as_ref() }
    #[inline] pub fn bank(&self) -> Option<&NoiseBank> { self.bank.as_ref() }

    /// Stop, release the output and drop the noise cache.
    pub fn destroy(mut self) {
        self.release();
    }

    // ---------------------------------------------------------------------------

    fn ensure_output(&mut self) -> Result<()> {
        if self.sink.is_none() {
            let sink = self.backend.open().inspect_err(|e| tracing::error!(error = %e, "audio output unavailable"))?;
            tracing::info!(sample_rate = sink.sample_rate(), "audio output acquired");
            self.sink = Some(sink);
        }
        if self.bank.is_none() {
            let sr = self.sink.as_ref().map_or(48_000.0, AudioSink::sample_rate);
            let seed = self.rng.next_u64();
            self.bank = Some(NoiseBank::new(sr, self.config.noise_seconds, seed));
        }
        Ok(())
    }

    /// Replace the composition with `preset`, master gain jumping to `gain`.
    fn activate(&mut self, preset: Preset, gain: f32) -> Result<()> {
        self.ensure_output()?;
        let (Some(sink), Some(bank)) = (self.sink.as_mut(), self.bank.as_ref()) else {
            return Err(EngineError::unavailable("output handle missing after initialization"));
        };
        sink.resume()?;

        if let Some(old) = self.composition.take() {
            old.teardown(sink, &mut self.scheduler);
        }
        let now = sink.current_time();
        let composition = compose(preset, bank, sink, &mut self.scheduler, &mut self.rng, now);
        sink.cancel_ramps(Param::Master, now);
        sink.schedule_ramp(Param::Master, Point::step(now, gain));
        self.composition = Some(composition);
        tracing::info!(preset = %preset, volume = gain, "preset activated");
        Ok(())
    }

    fn teardown_composition(&mut self) -> Option<Preset> {
        let composition = self.composition.take()?;
        let preset = composition.preset();
        match self.sink.as_mut() {
            Some(sink) => composition.teardown(sink, &mut self.scheduler),
            None => {
                for token in composition.tokens() {
                    self.scheduler.cancel(*token);
                }
            }
        }
        Some(preset)
    }

    fn cancel_fade(&mut self) {
        match std::mem::replace(&mut self.fade, Fade::None) {
            Fade::Out { token, from, to, .. } => {
                self.scheduler.cancel(token);
                tracing::debug!(from = %from, to = %to, "pending crossfade switch cancelled");
            }
            Fade::In { .. } | Fade::None => {}
        }
    }

    fn fade_in(&mut self, half: f64) {
        let target = self.volume;
        let Some(sink) = self.sink.as_mut() else { return };
        let now = sink.current_time();
        let until = now + half;
        sink.schedule_ramp(Param::Master, Point::linear(until, target));
        self.fade = Fade::In { until, target };
        tracing::debug!(until, target, "crossfade in");
    }

    fn finish_switch(&mut self, token: Token) {
        let Fade::Out { token: pending, to, target, half, .. } = self.fade else { return };
        if pending != token {
            return;
        }
        self.fade = Fade::None;
        self.stop();
        if let Err(e) = self.activate(to, 0.0) {
            tracing::error!(error = %e, preset = %to, "crossfade switch failed");
            return;
        }
        self.volume = target;
        self.fade_in(half);
    }

    fn settle_fade(&mut self) {
        if let Fade::In { until, .. } = self.fade {
            if self.time() >= until {
                self.fade = Fade::None;
                tracing::debug!("crossfade complete");
            }
        }
    }

    fn release(&mut self) {
        self.stop();
        self.scheduler.clear();
        if let Some(mut bank) = self.bank.take() {
            bank.clear();
        }
        if let Some(mut sink) = self.sink.take() {
            sink.suspend();
            tracing::info!("audio output released");
        }
    }
}

impl<B: Backend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<B: Backend> std::fmt::Debug for Engine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state())
            .field("output", &self.output_state())
            .field("volume", &self.volume)
            .field("pending_events", &self.pending_events())
            .finish_non_exhaustive()
    }
}

impl Engine<OfflineBackend> {
    /// Engine over an in-process sink at `sample_rate`.
    pub fn offline(sample_rate: f32, config: EngineConfig) -> Self {
        Self::with_config(OfflineBackend::new(sample_rate), config)
    }

    /// Render mono samples, firing due timers between quanta.
    pub fn render(&mut self, out: &mut [f32]) {
        let quantum = self.config.quantum.max(1);
        for chunk in out.chunks_mut(quantum) {
            self.pump();
            match self.sink.as_mut() {
                Some(sink) => sink.render(chunk),
                None => chunk.fill(0.0),
            }
        }
        self.pump();
    }

    /// Render and discard `seconds` of output.
    pub fn advance(&mut self, seconds: f64) {
        let sr = self.sink.as_ref().map_or(0.0, AudioSink::sample_rate);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut frames = (seconds.max(0.0) * f64::from(sr)).round() as usize;
        let mut scratch = vec![0.0_f32; self.config.quantum.max(1)];
        while frames > 0 {
            let n = frames.min(scratch.len());
            self.render(&mut scratch[..n]);
            frames -= n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine<OfflineBackend> {
        Engine::offline(8_000.0, EngineConfig::default().with_seed(7).with_noise_seconds(1.0))
    }

    #[test]
    fn starts_uninitialized_and_idle() {
        let e = engine();
        assert_eq!(e.output_state(), OutputState::Uninitialized);
        assert_eq!(e.state(), PlaybackState::Idle);
        assert_eq!(e.volume(), 0.5);
        assert!(e.bank().is_none());
    }

    #[test]
    fn play_initializes_lazily_and_stop_suspends() {
        let mut e = engine();
        e.play("rain", Some(0.8)).expect("play");
        assert_eq!(e.output_state(), OutputState::Running);
        assert_eq!(e.state(), PlaybackState::Playing(Preset::Rain));
        assert_eq!(e.volume(), 0.8);
        e.stop();
        assert_eq!(e.output_state(), OutputState::Suspended);
        e.stop();
        assert_eq!(e.state(), PlaybackState::Idle);
    }

    #[test]
    fn volume_ramps_instead_of_jumping() {
        let mut e = engine();
        e.play("white_noise", Some(0.2)).expect("play");
        e.set_volume(1.0);
        let now = e.time();
        let sink = e.sink().expect("sink");
        let mid = sink.master_at(now + 0.025);
        assert!(mid > 0.2 && mid < 1.0, "mid-ramp value {mid}");
        assert!((sink.master_at(now + 0.06) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn set_volume_during_fade_out_becomes_fade_in_target() {
        let mut e = engine();
        e.play("rain", Some(0.6)).expect("play");
        e.crossfade("waves", Duration::from_millis(1_000)).expect("crossfade");
        e.set_volume(0.3);
        e.advance(0.6);
        assert_eq!(e.state(), PlaybackState::CrossfadingIn(Preset::Waves));
        e.advance(0.6);
        let sink = e.sink().expect("sink");
        assert!((sink.master_at(e.time()) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn crossfade_from_idle_fades_in() {
        let mut e = engine();
        e.crossfade("forest", Duration::from_secs(2)).expect("crossfade");
        assert_eq!(e.state(), PlaybackState::CrossfadingIn(Preset::Forest));
        assert_eq!(e.sink().expect("sink").master_at(0.0), 0.0);
        e.advance(1.1);
        assert_eq!(e.state(), PlaybackState::Playing(Preset::Forest));
    }

    #[test]
    fn non_finite_volume_is_ignored() {
        let mut e = engine();
        e.set_volume(f32::NAN);
        assert_eq!(e.volume(), 0.5);
    }
}
