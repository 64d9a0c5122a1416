//! soundbed engine: procedural ambient soundscapes.
//!
//! Crate layout:
//! - [`bank`]       : memoized white/pink/brown noise loop buffers
//! - [`graph`]      : the `AudioSink`/`Backend` seam between control and render
//! - [`nodes`]      : render-side oscillators, noise readers and voices
//! - [`mixer`]      : render-side graph driven by commands
//! - [`offline`]    : host-pulled sink (tests, file rendering, FFI)
//! - `realtime`     : CPAL sink (feature `realtime`)
//! - [`layers`]     : steady and burst layer primitives
//! - [`scheduler`]  : cancellable one-shot/repeating timers
//! - [`cues`]       : what timers do when they fire
//! - [`composer`]   : the nine preset recipes
//! - [`controller`] : playback lifecycle and crossfades
//!
//! The control side only ever enqueues time-stamped automation; it never
//! reads or mutates render state synchronously.

pub mod bank;
pub mod composer;
pub mod config;
pub mod controller;
pub mod cues;
pub mod error;
pub mod graph;
pub mod layers;
pub mod mixer;
pub mod nodes;
pub mod offline;
pub mod preset;
pub mod scheduler;

cfg_if::cfg_if! {
    if #[cfg(feature = "realtime")] {
        pub mod realtime;
        pub use realtime::{output_devices, CpalBackend, CpalSink};
    }
}

// Re-export some commonly used items to make downstream imports ergonomic.
pub use config::EngineConfig;
pub use controller::{Engine, PlaybackState};
pub use error::{EngineError, Result};
pub use graph::{AudioSink, Backend, OutputState};
pub use offline::{OfflineBackend, OfflineSink};
pub use preset::Preset;
