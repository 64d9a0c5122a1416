//! Real-time output through CPAL.
//!
//! The mixer lives inside the stream callback. The control side reaches it
//! only through a lock-free SPSC command queue; the callback publishes its
//! frame counter through an atomic, which is the sink clock. Commands that do
//! not fit in the queue wait in a local backlog and go out first on the next
//! call, so nothing is ever dropped and order is kept.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use soundbed_core::automation::Point;

use crate::error::{EngineError, Result};
use crate::graph::{AudioSink, Backend, Layer, LayerDesc, LayerIds, OutputState, Param};
use crate::mixer::{Command, Mixer};
use crate::nodes::Voice;

/// Command queue slots. Bursty presets write a handful of points per cue.
const COMMAND_CAPACITY: usize = 1024;

/// Names of the host's output devices.
pub fn output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.output_devices().map_err(EngineError::unavailable)?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Opens the default (or a named) output device.
#[derive(Clone, Debug, Default)]
pub struct CpalBackend {
    device: Option<String>,
    sample_rate: Option<u32>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }

    pub fn with_sample_rate(mut self, sr: u32) -> Self {
        self.sample_rate = Some(sr);
        self
    }

    fn pick_device(&self, host: &cpal::Host) -> Result<cpal::Device> {
        if let Some(name) = &self.device {
            let mut devices = host.output_devices().map_err(EngineError::unavailable)?;
            return devices
                .find(|d| d.name().is_ok_and(|n| n == *name))
                .ok_or_else(|| EngineError::unavailable(format!("output device not found: {name}")));
        }
        host.default_output_device()
            .ok_or_else(|| EngineError::unavailable("no default output device"))
    }

    fn pick_config(&self, device: &cpal::Device) -> Result<cpal::SupportedStreamConfig> {
        let default = device.default_output_config().map_err(EngineError::unavailable)?;
        let Some(sr) = self.sample_rate else { return Ok(default) };
        let ranges = device.supported_output_configs().map_err(EngineError::unavailable)?;
        ranges
            .filter(|r| (r.min_sample_rate().0..=r.max_sample_rate().0).contains(&sr))
            .max_by_key(|r| (r.sample_format() == cpal::SampleFormat::F32, r.channels() == default.channels()))
            .map(|r| r.with_sample_rate(cpal::SampleRate(sr)))
            .ok_or_else(|| EngineError::unavailable(format!("device does not support {sr} Hz")))
    }
}

impl Backend for CpalBackend {
    type Sink = CpalSink;

    fn open(&mut self) -> Result<CpalSink> {
        let host = cpal::default_host();
        let device = self.pick_device(&host)?;
        let supported = self.pick_config(&device)?;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.config();

        #[allow(clippy::cast_precision_loss)]
        let sr = config.sample_rate.0 as f32;
        let (commands, queue) = HeapRb::<Command>::new(COMMAND_CAPACITY).split();
        let clock = Arc::new(AtomicU64::new(0));
        let mixer = Mixer::new(sr, 0.0);

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, mixer, queue, Arc::clone(&clock))?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, mixer, queue, Arc::clone(&clock))?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, mixer, queue, Arc::clone(&clock))?,
            other => return Err(EngineError::unavailable(format!("unsupported sample format: {other:?}"))),
        };
        if let Err(e) = stream.pause() {
            tracing::warn!(error = %e, "stream cannot pause; it will run until dropped");
        }

        tracing::debug!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            format = ?format,
            "cpal stream built"
        );

        Ok(CpalSink {
            stream,
            commands,
            backlog: VecDeque::new(),
            clock,
            sr,
            state: OutputState::Suspended,
            ids: LayerIds::default(),
            live: 0,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut mixer: Mixer,
    mut queue: HeapCons<Command>,
    clock: Arc<AtomicU64>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels.max(1));
    device
        .build_output_stream(
            cfg,
            move |output: &mut [T], _| {
                while let Some(cmd) = queue.try_pop() {
                    mixer.apply(cmd);
                }
                for frame in output.chunks_mut(channels) {
                    let v = T::from_sample(mixer.next());
                    frame.fill(v);
                }
                clock.store(mixer.frame(), Ordering::Release);
            },
            |e| tracing::error!(error = %e, "cpal stream error"),
            None,
        )
        .map_err(EngineError::unavailable)
}

/// Control-side handle of a running CPAL stream.
pub struct CpalSink {
    stream: cpal::Stream,
    commands: HeapProd<Command>,
    backlog: VecDeque<Command>,
    clock: Arc<AtomicU64>,
    sr: f32,
    state: OutputState,
    ids: LayerIds,
    live: usize,
}

impl CpalSink {
    fn flush(&mut self) {
        while let Some(cmd) = self.backlog.pop_front() {
            if let Err(cmd) = self.commands.try_push(cmd) {
                self.backlog.push_front(cmd);
                break;
            }
        }
    }

    fn send(&mut self, cmd: Command) {
        self.flush();
        if !self.backlog.is_empty() {
            self.backlog.push_back(cmd);
            return;
        }
        if let Err(cmd) = self.commands.try_push(cmd) {
            tracing::warn!(backlog = self.backlog.len() + 1, "command queue full; deferring");
            self.backlog.push_back(cmd);
        }
    }
}

impl AudioSink for CpalSink {
    fn sample_rate(&self) -> f32 {
        self.sr
    }

    #[allow(clippy::cast_precision_loss)]
    fn current_time(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / f64::from(self.sr)
    }

    fn connect(&mut self, desc: LayerDesc) -> Layer {
        let id = self.ids.next();
        let layer = Layer::new(id, &desc);
        self.send(Command::Connect(Box::new(Voice::new(id, desc, self.sr))));
        self.live += 1;
        layer
    }

    fn schedule_ramp(&mut self, param: Param, point: Point) {
        self.send(Command::Ramp(param, point));
    }

    fn cancel_ramps(&mut self, param: Param, from: f64) {
        self.send(Command::Cancel(param, from));
    }

    fn disconnect(&mut self, layer: Layer) {
        self.send(Command::Disconnect(layer.id()));
        self.live = self.live.saturating_sub(1);
    }

    fn resume(&mut self) -> Result<()> {
        self.flush();
        if self.state != OutputState::Running {
            self.stream.play().map_err(EngineError::unavailable)?;
            self.state = OutputState::Running;
        }
        Ok(())
    }

    fn suspend(&mut self) {
        if self.state == OutputState::Running {
            if let Err(e) = self.stream.pause() {
                tracing::warn!(error = %e, "failed to pause output stream");
            }
            self.state = OutputState::Suspended;
        }
    }

    fn state(&self) -> OutputState {
        self.state
    }

    fn connected(&self) -> usize {
        self.live
    }
}
