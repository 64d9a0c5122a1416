//! Playback lifecycle against the offline backend.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use approx::assert_relative_eq;
use soundbed_core::automation::Point;
use soundbed_core::noise::NoiseKind;
use soundbed_engine::graph::{Layer, LayerDesc, Param};
use soundbed_engine::{
    AudioSink, Backend, Engine, EngineConfig, EngineError, OfflineBackend, OfflineSink, OutputState, PlaybackState,
    Preset,
};

const SR: f32 = 16_000.0;

fn engine() -> Engine<OfflineBackend> {
    Engine::offline(SR, EngineConfig::default().with_seed(0xA11CE).with_noise_seconds(2.0))
}

#[test]
fn play_then_stop_leaves_nothing_behind() {
    let mut e = engine();
    for preset in Preset::ALL {
        e.play_preset(preset, Some(0.5)).expect("play");
        assert!(e.layer_count() > 0);
        e.advance(1.5);
        e.stop();
        assert_eq!(e.pending_events(), 0, "{preset} left timers armed");
        assert_eq!(e.layer_count(), 0, "{preset} left layers connected");
    }
}

#[test]
fn only_one_composition_is_alive() {
    let mut reference = engine();
    reference.play("birds", None).expect("play");
    let (layers, events) = (reference.layer_count(), reference.pending_events());

    let mut e = engine();
    e.play("thunder", None).expect("play thunder");
    e.play("birds", None).expect("play birds");
    assert_eq!(e.current_preset(), Some(Preset::Birds));
    assert_eq!(e.layer_count(), layers);
    assert_eq!(e.pending_events(), events);
}

#[test]
fn volume_is_clamped() {
    let mut e = engine();
    e.set_volume(-0.4);
    assert_eq!(e.volume(), 0.0);
    e.set_volume(1.7);
    assert_eq!(e.volume(), 1.0);
    e.play("rain", Some(3.0)).expect("play");
    assert_eq!(e.volume(), 1.0);
}

#[test]
fn crossfade_switches_at_the_midpoint() {
    let mut e = engine();
    e.play("rain", Some(0.6)).expect("play");
    e.crossfade("fireplace", Duration::from_millis(2_000)).expect("crossfade");
    assert_eq!(e.state(), PlaybackState::CrossfadingOut { from: Preset::Rain, to: Preset::Fireplace });

    e.advance(0.9);
    assert_eq!(e.current_preset(), Some(Preset::Rain));

    e.advance(1.2);
    assert_eq!(e.current_preset(), Some(Preset::Fireplace));
    assert_eq!(e.state(), PlaybackState::Playing(Preset::Fireplace));
    let sink = e.sink().expect("sink");
    assert_relative_eq!(sink.master_at(e.time()), 0.6, epsilon = 1e-6);
}

#[test]
fn stop_during_crossfade_cancels_the_switch() {
    let mut e = engine();
    e.play("rain", None).expect("play");
    e.crossfade("waves", Duration::from_millis(2_000)).expect("crossfade");
    e.advance(0.9);
    e.stop();

    e.advance(1.2);
    assert!(!e.is_playing());
    assert_eq!(e.current_preset(), None);
    assert_eq!(e.pending_events(), 0);
    assert_eq!(e.state(), PlaybackState::Idle);
}

#[test]
fn new_play_supersedes_a_pending_crossfade() {
    let mut e = engine();
    e.play("rain", None).expect("play");
    e.crossfade("waves", Duration::from_millis(1_000)).expect("crossfade");
    e.advance(0.2);
    e.play("cafe", Some(0.4)).expect("play cafe");
    e.advance(2.0);
    assert_eq!(e.current_preset(), Some(Preset::Cafe));
    assert_eq!(e.state(), PlaybackState::Playing(Preset::Cafe));
}

#[test]
fn crossfade_supersedes_a_pending_crossfade() {
    let mut e = engine();
    e.play("rain", Some(0.6)).expect("play");
    e.crossfade("waves", Duration::from_millis(2_000)).expect("crossfade");
    e.advance(0.5);
    e.crossfade("cafe", Duration::from_millis(2_000)).expect("second crossfade");
    assert_eq!(e.state(), PlaybackState::CrossfadingOut { from: Preset::Rain, to: Preset::Cafe });

    for _ in 0..6 {
        e.advance(0.1);
        assert_ne!(e.current_preset(), Some(Preset::Waves));
    }
    assert_eq!(e.current_preset(), Some(Preset::Rain), "t=1.1");

    e.advance(1.0);
    assert_eq!(e.current_preset(), Some(Preset::Cafe), "t=2.1");
    e.advance(0.5);
    assert_eq!(e.state(), PlaybackState::Playing(Preset::Cafe));
    let sink = e.sink().expect("sink");
    assert_relative_eq!(sink.master_at(e.time()), 0.6, epsilon = 1e-6);
}

#[test]
fn stop_during_fade_in_stays_stopped() {
    let mut e = engine();
    e.play("rain", None).expect("play");
    e.crossfade("forest", Duration::from_millis(1_000)).expect("crossfade");
    e.advance(0.7);
    assert_eq!(e.state(), PlaybackState::CrossfadingIn(Preset::Forest));

    e.stop();
    e.advance(2.0);
    assert_eq!(e.state(), PlaybackState::Idle);
    assert_eq!(e.current_preset(), None);
    assert_eq!(e.pending_events(), 0);
    assert_eq!(e.layer_count(), 0);
}

#[test]
fn play_during_fade_in_takes_over() {
    let mut e = engine();
    e.play("rain", Some(0.6)).expect("play");
    e.crossfade("forest", Duration::from_millis(1_000)).expect("crossfade");
    e.advance(0.7);
    e.play("cafe", Some(0.3)).expect("play cafe");
    assert_eq!(e.state(), PlaybackState::Playing(Preset::Cafe));

    e.advance(1.0);
    assert_eq!(e.current_preset(), Some(Preset::Cafe));
    let sink = e.sink().expect("sink");
    assert_relative_eq!(sink.master_at(e.time()), 0.3, epsilon = 1e-6);
}

#[test]
fn noise_buffers_are_cached() {
    let mut e = engine();
    e.play("rain", None).expect("play");
    let bank = e.bank().expect("bank built on first play");
    let a = bank.buffer(NoiseKind::Pink);
    let b = bank.buffer(NoiseKind::Pink);
    assert!(Arc::ptr_eq(&a, &b));
    let before = bank.synthesized();
    e.play("wind", None).expect("play wind");
    let bank = e.bank().expect("bank persists");
    let _ = bank.buffer(NoiseKind::Pink);
    assert_eq!(bank.synthesized(), before + 1, "only brown noise was new");
}

#[test]
fn noise_is_bounded() {
    let mut e = engine();
    e.play("white_noise", None).expect("play");
    let bank = e.bank().expect("bank");
    for kind in NoiseKind::ALL {
        let buf = bank.buffer(kind);
        assert!(buf.samples().iter().all(|s| (-1.0..=1.0).contains(s)), "{} out of range", kind.name());
    }
}

#[test]
fn invalid_preset_changes_nothing() {
    let mut e = engine();
    assert!(matches!(e.play("not-a-real-preset", None), Err(EngineError::InvalidPreset(_))));
    assert_eq!(e.output_state(), OutputState::Uninitialized);

    e.play("forest", None).expect("play");
    let layers = e.layer_count();
    let err = e.crossfade("lava", Duration::from_secs(1)).expect_err("unknown preset");
    assert_eq!(err, EngineError::InvalidPreset("lava".into()));
    assert_eq!(e.current_preset(), Some(Preset::Forest));
    assert_eq!(e.layer_count(), layers);
}

#[test]
fn rain_scenario() {
    let mut e = engine();
    e.play("rain", None).expect("play");
    assert!(e.is_playing());
    assert_eq!(e.current_preset(), Some(Preset::Rain));
    e.stop();
    assert!(!e.is_playing());
    assert_eq!(e.current_preset(), None);
}

#[test]
fn rendered_output_is_bounded_and_audible() {
    let mut e = engine();
    e.play("thunder", Some(1.0)).expect("play");
    let mut out = vec![0.0_f32; SR as usize * 3];
    e.render(&mut out);
    assert!(out.iter().all(|s| (-1.0..=1.0).contains(s)));
    let rms = (out.iter().map(|s| s * s).sum::<f32>() / out.len() as f32).sqrt();
    assert!(rms > 1e-3, "rms {rms}");
}

#[test]
fn self_rescheduling_chains_die_with_their_composition() {
    let mut e = engine();
    e.play("waves", None).expect("play");
    e.advance(20.0);
    assert_eq!(e.pending_events(), 1);
    e.play("white_noise", None).expect("play");
    e.advance(20.0);
    assert_eq!(e.pending_events(), 0);
}

#[test]
fn destroy_consumes_the_engine() {
    let mut e = engine();
    e.play("cafe", None).expect("play");
    e.destroy();
}

/// Refuses output a fixed number of times, like a platform awaiting a user gesture.
struct Gated {
    refusals: usize,
    inner: OfflineBackend,
}

impl Backend for Gated {
    type Sink = OfflineSink;

    fn open(&mut self) -> soundbed_engine::Result<OfflineSink> {
        if self.refusals > 0 {
            self.refusals -= 1;
            return Err(EngineError::unavailable("output blocked until user gesture"));
        }
        self.inner.open()
    }
}

#[test]
fn unavailable_output_can_be_retried() {
    let mut e = Engine::new(Gated { refusals: 1, inner: OfflineBackend::new(SR) });
    let err = e.play("rain", None).expect_err("first open refused");
    assert!(matches!(err, EngineError::EngineUnavailable(_)));
    assert_eq!(e.output_state(), OutputState::Uninitialized);
    assert!(!e.is_playing());
    assert_eq!(e.pending_events(), 0);

    e.play("rain", None).expect("retry succeeds");
    assert_eq!(e.output_state(), OutputState::Running);
    assert!(e.is_playing());
}

/// Offline sink whose `resume` can be made to fail, like a device that
/// disappears mid-session. The test keeps a handle to render it.
struct Flaky {
    refuse: Rc<Cell<bool>>,
    sink: Rc<RefCell<OfflineSink>>,
}

struct FlakySink {
    refuse: Rc<Cell<bool>>,
    inner: Rc<RefCell<OfflineSink>>,
}

impl Backend for Flaky {
    type Sink = FlakySink;

    fn open(&mut self) -> soundbed_engine::Result<FlakySink> {
        Ok(FlakySink { refuse: Rc::clone(&self.refuse), inner: Rc::clone(&self.sink) })
    }
}

impl AudioSink for FlakySink {
    fn sample_rate(&self) -> f32 { self.inner.borrow().sample_rate() }
    fn current_time(&self) -> f64 { self.inner.borrow().current_time() }
    fn connect(&mut self, desc: LayerDesc) -> Layer { self.inner.borrow_mut().connect(desc) }
    fn schedule_ramp(&mut self, param: Param, point: Point) { self.inner.borrow_mut().schedule_ramp(param, point) }
    fn cancel_ramps(&mut self, param: Param, from: f64) { self.inner.borrow_mut().cancel_ramps(param, from) }
    fn disconnect(&mut self, layer: Layer) { self.inner.borrow_mut().disconnect(layer) }
    fn resume(&mut self) -> soundbed_engine::Result<()> {
        if self.refuse.get() {
            return Err(EngineError::unavailable("device lost"));
        }
        self.inner.borrow_mut().resume()
    }
    fn suspend(&mut self) { self.inner.borrow_mut().suspend() }
    fn state(&self) -> OutputState { self.inner.borrow().state() }
    fn connected(&self) -> usize { self.inner.borrow().connected() }
}

fn run(e: &mut Engine<Flaky>, sink: &RefCell<OfflineSink>, seconds: f64) {
    let mut buf = [0.0_f32; 128];
    let mut frames = (seconds * f64::from(SR)).round() as usize;
    while frames > 0 {
        let n = frames.min(buf.len());
        e.pump();
        sink.borrow_mut().render(&mut buf[..n]);
        frames -= n;
    }
    e.pump();
}

#[test]
fn failed_play_keeps_the_crossfade_in_flight() {
    let refuse = Rc::new(Cell::new(false));
    let sink = Rc::new(RefCell::new(OfflineSink::new(SR)));
    let backend = Flaky { refuse: Rc::clone(&refuse), sink: Rc::clone(&sink) };
    let mut e = Engine::with_config(backend, EngineConfig::default().with_seed(7).with_noise_seconds(2.0));

    e.play("rain", Some(0.6)).expect("play");
    e.crossfade("waves", Duration::from_millis(2_000)).expect("crossfade");
    run(&mut e, &sink, 0.5);

    refuse.set(true);
    let err = e.play("cafe", None).expect_err("resume refused");
    assert!(matches!(err, EngineError::EngineUnavailable(_)));
    assert_eq!(e.state(), PlaybackState::CrossfadingOut { from: Preset::Rain, to: Preset::Waves });
    assert_eq!(e.volume(), 0.6);

    refuse.set(false);
    run(&mut e, &sink, 1.6);
    assert_eq!(e.state(), PlaybackState::Playing(Preset::Waves));
    assert_relative_eq!(sink.borrow().master_at(e.time()), 0.6, epsilon = 1e-6);
}
