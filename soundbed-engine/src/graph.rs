//! Control/render seam.
//!
//! The control side (scheduler, presets, playback controller) never touches
//! live audio state. It talks to an [`AudioSink`], which owns the render graph,
//! through four verbs: connect a layer, schedule a time-stamped ramp on one of
//! its parameters, cancel pending ramps, disconnect the layer. Whether the
//! render graph runs in-process ([`OfflineSink`](crate::offline::OfflineSink))
//! or on a real-time audio thread ([`CpalSink`](crate::realtime::CpalSink))
//! is invisible above this module.
//!
//! A [`Backend`] acquires a sink. Acquisition is the only fallible step that
//! depends on the platform, and it happens once per engine.

use std::sync::Arc;

use soundbed_core::automation::Point;
use soundbed_core::filters::SvfMode;

use crate::bank::NoiseBuffer;
use crate::error::Result;

/// Identifier of a connected layer, unique per sink.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub(crate) u32);

/// An automatable parameter in the render graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    /// The master output gain. Written only by the playback controller.
    Master,
    /// A layer's gain.
    Gain(LayerId),
    /// A tone layer's oscillator frequency (Hz).
    Pitch(LayerId),
    /// Cutoff/center frequency (Hz) of one filter stage of a layer.
    Cutoff(LayerId, u8),
}

/// Where a layer's signal comes from.
#[derive(Clone, Debug)]
pub enum Source {
    /// A shared noise buffer, looped, read from `start`.
    Noise { buffer: Arc<NoiseBuffer>, start: usize },
    /// A free-running sine with an automatable pitch.
    Tone { freq: f32 },
}

/// One filter stage.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FilterDesc {
    pub mode: SvfMode,
    pub freq: f32,
    pub q: f32,
}

/// Everything the render side needs to build one layer.
#[derive(Clone, Debug)]
pub struct LayerDesc {
    pub source: Source,
    pub filters: Vec<FilterDesc>,
    pub gain: f32,
}

impl LayerDesc {
    pub fn noise(buffer: Arc<NoiseBuffer>) -> Self {
        Self { source: Source::Noise { buffer, start: 0 }, filters: Vec::new(), gain: 0.0 }
    }

    pub fn tone(freq: f32) -> Self {
        Self { source: Source::Tone { freq }, filters: Vec::new(), gain: 0.0 }
    }

    /// Start reading a noise source at `offset` (wrapped to the buffer length).
    /// Layers sharing one buffer use different offsets so they do not correlate.
    pub fn offset(mut self, offset: usize) -> Self {
        if let Source::Noise { buffer, start } = &mut self.source {
            *start = offset % buffer.len().max(1);
        }
        self
    }

    pub fn filter(mut self, mode: SvfMode, freq: f32, q: f32) -> Self {
        self.filters.push(FilterDesc { mode, freq, q });
        self
    }

    #[inline] pub fn lowpass(self, freq: f32, q: f32) -> Self { self.filter(SvfMode::Lowpass, freq, q) }
    #[inline] pub fn highpass(self, freq: f32, q: f32) -> Self { self.filter(SvfMode::Highpass, freq, q) }
    #[inline] pub fn bandpass(self, freq: f32, q: f32) -> Self { self.filter(SvfMode::Bandpass, freq, q) }

    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = gain.max(0.0);
        self
    }

    pub fn is_tone(&self) -> bool {
        matches!(self.source, Source::Tone { .. })
    }
}

/// Control-side handle of a connected layer.
///
/// Not `Clone`: the composition that connected it owns it and hands it back
/// to [`AudioSink::disconnect`] exactly once.
#[derive(Debug, PartialEq, Eq)]
pub struct Layer {
    id: LayerId,
    stages: u8,
    tone: bool,
}

impl Layer {
    pub(crate) fn new(id: LayerId, desc: &LayerDesc) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let stages = desc.filters.len().min(u8::MAX as usize) as u8;
        Self { id, stages, tone: desc.is_tone() }
    }

    #[inline] pub fn id(&self) -> LayerId { self.id }
    #[inline] pub fn gain(&self) -> Param { Param::Gain(self.id) }

    pub fn cutoff(&self, stage: u8) -> Option<Param> {
        (stage < self.stages).then_some(Param::Cutoff(self.id, stage))
    }

    pub fn pitch(&self) -> Option<Param> {
        self.tone.then_some(Param::Pitch(self.id))
    }
}

/// Phase of the output handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputState {
    /// No output resources allocated.
    Uninitialized,
    /// Resources allocated, not producing sound; clock frozen.
    Suspended,
    /// Rendering.
    Running,
}

/// The render path as seen from the control thread.
pub trait AudioSink {
    fn sample_rate(&self) -> f32;

    /// Audio clock in seconds. Advances only while running.
    fn current_time(&self) -> f64;

    /// Build a layer in the render graph and return its handle.
    fn connect(&mut self, desc: LayerDesc) -> Layer;

    /// Enqueue one automation point for `param`.
    fn schedule_ramp(&mut self, param: Param, point: Point);

    /// Drop `param`'s pending points at or after `from`, holding its value there.
    fn cancel_ramps(&mut self, param: Param, from: f64);

    /// Stop the layer's source and remove its filters and gain from the graph.
    fn disconnect(&mut self, layer: Layer);

    fn resume(&mut self) -> Result<()>;
    fn suspend(&mut self);
    fn state(&self) -> OutputState;

    /// Layers currently connected in the render graph.
    fn connected(&self) -> usize;
}

/// Acquires an output sink.
pub trait Backend {
    type Sink: AudioSink;

    /// Fails with [`EngineUnavailable`](crate::EngineError::EngineUnavailable)
    /// when the platform refuses output.
    fn open(&mut self) -> Result<Self::Sink>;
}

/// Sequential layer-id allocator shared by the sink implementations.
#[derive(Debug, Default)]
pub(crate) struct LayerIds(u32);

impl LayerIds {
    pub(crate) fn next(&mut self) -> LayerId {
        let id = LayerId(self.0);
        self.0 = self.0.wrapping_add(1);
        id
    }
}
