//! C ABI wrapper for the soundbed engine.
//!
//! The host owns the audio device and pulls samples with
//! `soundbed_render_interleaved_f32`; scheduler timers fire inside that call,
//! on the render clock. Everything else mirrors the playback API: play, stop,
//! volume, crossfade and state queries.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `SoundbedEngine` (heap-allocated; release it with
//!   `soundbed_destroy`).
//! - Status codes: `SOUNDBED_OK`, `SOUNDBED_ERR_ARG`, `SOUNDBED_ERR_PRESET`,
//!   `SOUNDBED_ERR_UNAVAILABLE`.
//! - Render path produces **mono** internally and duplicates to N channels.
//!
//! Threading
//! - The object is NOT thread-safe; call all functions from the same thread.

use std::ffi::{c_char, CStr};
use std::time::Duration;

use soundbed_engine::{Engine, EngineConfig, EngineError, OfflineBackend, Preset};

pub const SOUNDBED_OK: i32 = 0;
pub const SOUNDBED_ERR_ARG: i32 = -1;
pub const SOUNDBED_ERR_PRESET: i32 = -2;
pub const SOUNDBED_ERR_UNAVAILABLE: i32 = -3;

/// Opaque engine wrapper we hand to C.
pub struct SoundbedEngine {
    inner: Engine<OfflineBackend>,
    mono: Vec<f32>,
}

fn status(e: &EngineError) -> i32 {
    match e {
        EngineError::InvalidPreset(_) => SOUNDBED_ERR_PRESET,
        EngineError::EngineUnavailable(_) => SOUNDBED_ERR_UNAVAILABLE,
    }
}

fn preset_name(p: Preset) -> &'static CStr {
    match p {
        Preset::Rain => c"rain",
        Preset::Fireplace => c"fireplace",
        Preset::Waves => c"waves",
        Preset::Wind => c"wind",
        Preset::Birds => c"birds",
        Preset::Thunder => c"thunder",
        Preset::Cafe => c"cafe",
        Preset::Forest => c"forest",
        Preset::WhiteNoise => c"white_noise",
    }
}

fn engine_mut<'a>(engine: *mut SoundbedEngine) -> Option<&'a mut SoundbedEngine> {
    // SAFETY: the host passes either null or a pointer from `soundbed_create`.
    unsafe { engine.as_mut() }
}

fn engine_ref<'a>(engine: *const SoundbedEngine) -> Option<&'a SoundbedEngine> {
    // SAFETY: as above.
    unsafe { engine.as_ref() }
}

fn name_arg<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    // SAFETY: non-null, and the host guarantees a NUL-terminated string.
    unsafe { CStr::from_ptr(name) }.to_str().ok()
}

// --- Creation / destruction -------------------------------------------------------

/// Create an engine rendering at `sample_rate`. Nothing plays until
/// `soundbed_play`. Returns null for a non-positive or non-finite rate.
#[no_mangle]
pub extern "C" fn soundbed_create(sample_rate: f32) -> *mut SoundbedEngine {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return std::ptr::null_mut();
    }
    let eng = SoundbedEngine {
        inner: Engine::offline(sample_rate, EngineConfig::default()),
        mono: Vec::new(),
    };
    Box::into_raw(Box::new(eng))
}

/// Destroy an engine previously returned by `soundbed_create`.
#[no_mangle]
pub extern "C" fn soundbed_destroy(engine: *mut SoundbedEngine) {
    if !engine.is_null() {
        // SAFETY: produced by `Box::into_raw` in `soundbed_create`, released once.
        let eng = unsafe { Box::from_raw(engine) };
        eng.inner.destroy();
    }
}

// --- Playback ---------------------------------------------------------------------

/// Start preset `name`. A negative `volume` keeps the current volume.
#[no_mangle]
pub extern "C" fn soundbed_play(engine: *mut SoundbedEngine, name: *const c_char, volume: f32) -> i32 {
    let (Some(e), Some(name)) = (engine_mut(engine), name_arg(name)) else { return SOUNDBED_ERR_ARG };
    let volume = (volume >= 0.0).then_some(volume);
    match e.inner.play(name, volume) {
        Ok(()) => SOUNDBED_OK,
        Err(err) => {
            tracing::debug!(error = %err, "soundbed_play rejected");
            status(&err)
        }
    }
}

#[no_mangle]
pub extern "C" fn soundbed_stop(engine: *mut SoundbedEngine) {
    if let Some(e) = engine_mut(engine) {
        e.inner.stop();
    }
}

/// Set master volume; clamped to [0, 1].
#[no_mangle]
pub extern "C" fn soundbed_set_volume(engine: *mut SoundbedEngine, volume: f32) {
    if let Some(e) = engine_mut(engine) {
        e.inner.set_volume(volume);
    }
}

#[no_mangle]
pub extern "C" fn soundbed_get_volume(engine: *const SoundbedEngine) -> f32 {
    engine_ref(engine).map_or(0.0, |e| e.inner.volume())
}

/// Crossfade to preset `name` over `duration_ms`.
#[no_mangle]
pub extern "C" fn soundbed_crossfade(engine: *mut SoundbedEngine, name: *const c_char, duration_ms: u32) -> i32 {
    let (Some(e), Some(name)) = (engine_mut(engine), name_arg(name)) else { return SOUNDBED_ERR_ARG };
    match e.inner.crossfade(name, Duration::from_millis(u64::from(duration_ms))) {
        Ok(()) => SOUNDBED_OK,
        Err(err) => status(&err),
    }
}

#[no_mangle]
pub extern "C" fn soundbed_is_playing(engine: *const SoundbedEngine) -> bool {
    engine_ref(engine).is_some_and(|e| e.inner.is_playing())
}

/// Identifier of the live preset as a static NUL-terminated string, or null.
#[no_mangle]
pub extern "C" fn soundbed_current_preset(engine: *const SoundbedEngine) -> *const c_char {
    engine_ref(engine)
        .and_then(|e| e.inner.current_preset())
        .map_or(std::ptr::null(), |p| preset_name(p).as_ptr())
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels` channels.
/// The engine is mono; each sample is duplicated to all channels.
///
/// Returns the number of frames rendered (0 on error).
#[no_mangle]
pub extern "C" fn soundbed_render_interleaved_f32(
    engine: *mut SoundbedEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let Some(e) = engine_mut(engine) else { return 0 };
    let (n, ch) = (frames as usize, channels as usize);
    // SAFETY: the host provides room for `frames * channels` samples.
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, n * ch) };

    if e.mono.len() < n {
        e.mono.resize(n, 0.0);
    }
    e.inner.render(&mut e.mono[..n]);
    for (frame, &s) in out.chunks_exact_mut(ch).zip(&e.mono[..n]) {
        frame.fill(s);
    }
    frames
}
