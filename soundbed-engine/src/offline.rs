//! Host-pulled rendering: the mixer runs in-process and its clock advances
//! only when the caller asks for samples.

use soundbed_core::automation::Point;

use crate::error::Result;
use crate::graph::{AudioSink, Backend, Layer, LayerDesc, LayerIds, OutputState, Param};
use crate::mixer::{Command, Mixer};
use crate::nodes::Voice;

/// Opens [`OfflineSink`]s. Never fails.
#[derive(Copy, Clone, Debug)]
pub struct OfflineBackend {
    sample_rate: f32,
}

impl OfflineBackend {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate: sample_rate.max(1.0) }
    }
}

impl Backend for OfflineBackend {
    type Sink = OfflineSink;

    fn open(&mut self) -> Result<OfflineSink> {
        Ok(OfflineSink::new(self.sample_rate))
    }
}

#[derive(Debug)]
pub struct OfflineSink {
    mixer: Mixer,
    ids: LayerIds,
    state: OutputState,
}

impl OfflineSink {
    pub fn new(sample_rate: f32) -> Self {
        Self { mixer: Mixer::new(sample_rate, 0.0), ids: LayerIds::default(), state: OutputState::Suspended }
    }

    /// Fill `out` with mono samples. While suspended the output is silent
    /// and the clock does not move.
    pub fn render(&mut self, out: &mut [f32]) {
        if self.state == OutputState::Running {
            self.mixer.render(out);
        } else {
            out.fill(0.0);
        }
    }

    /// Master gain the render side will apply at time `t`.
    pub fn master_at(&self, t: f64) -> f32 {
        self.mixer.master_at(t)
    }
}

impl AudioSink for OfflineSink {
    fn sample_rate(&self) -> f32 {
        self.mixer.sample_rate()
    }

    fn current_time(&self) -> f64 {
        self.mixer.time()
    }

    fn connect(&mut self, desc: LayerDesc) -> Layer {
        let id = self.ids.next();
        let layer = Layer::new(id, &desc);
        let voice = Voice::new(id, desc, self.mixer.sample_rate());
        self.mixer.apply(Command::Connect(Box::new(voice)));
        layer
    }

    fn schedule_ramp(&mut self, param: Param, point: Point) {
        self.mixer.apply(Command::Ramp(param, point));
    }

    fn cancel_ramps(&mut self, param: Param, from: f64) {
        self.mixer.apply(Command::Cancel(param, from));
    }

    fn disconnect(&mut self, layer: Layer) {
        self.mixer.apply(Command::Disconnect(layer.id()));
    }

    fn resume(&mut self) -> Result<()> {
        self.state = OutputState::Running;
        Ok(())
    }

    fn suspend(&mut self) {
        self.state = OutputState::Suspended;
    }

    fn state(&self) -> OutputState {
        self.state
    }

    fn connected(&self) -> usize {
        self.mixer.voices()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::NoiseBank;
    use soundbed_core::noise::NoiseKind;

    #[test]
    fn suspended_sink_is_silent_and_frozen() {
        let mut sink = OfflineBackend::new(8_000.0).open().expect("offline open");
        let bank = NoiseBank::new(8_000.0, 1.0, 1);
        let _layer = sink.connect(LayerDesc::noise(bank.buffer(NoiseKind::White)).gain(0.5));
        sink.schedule_ramp(Param::Master, Point::step(0.0, 1.0));

        let mut out = [1.0_f32; 256];
        sink.render(&mut out);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(sink.current_time(), 0.0);

        sink.resume().expect("resume");
        sink.render(&mut out);
        assert!(sink.current_time() > 0.0);
        assert!(out.iter().any(|s| *s != 0.0));
    }

    #[test]
    fn connect_and_disconnect_track_live_layers() {
        let mut sink = OfflineSink::new(8_000.0);
        let bank = NoiseBank::new(8_000.0, 1.0, 1);
        let a = sink.connect(LayerDesc::noise(bank.buffer(NoiseKind::Pink)));
        let b = sink.connect(LayerDesc::noise(bank.buffer(NoiseKind::Brown)).lowpass(300.0, 0.7));
        assert_ne!(a.id(), b.id());
        assert_eq!(sink.connected(), 2);
        assert_eq!(b.cutoff(0), Some(Param::Cutoff(b.id(), 0)));
        sink.disconnect(a);
        sink.disconnect(b);
        assert_eq!(sink.connected(), 0);
    }
}
