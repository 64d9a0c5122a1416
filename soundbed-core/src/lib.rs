#![cfg_attr(not(feature = "std"), no_std)]
//! soundbed core: no_std-ready DSP primitives for procedural soundscapes.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm`/`micromath` math backends
//! - `fast-math`: enable approximations (polys/rationals) for tanh/trig, etc.
//!
//! Modules
//! - [`dsp`]        : math backend, utils (clamp, lerp, fast trig, soft clip)
//! - [`filters`]    : DC blocker, TPT SVF
//! - [`noise`]      : white/pink/brown shapers
//! - [`automation`] : time-stamped parameter lanes (step/linear/exponential)
//!
//! Nothing here allocates per sample. Automation lanes allocate when points are
//! pushed, which happens on the control side's schedule, not per sample.

extern crate alloc;

pub mod automation;
pub mod dsp;
pub mod filters;
pub mod noise;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::automation::{Curve, Lane, Point, EXP_FLOOR};
    pub use crate::dsp::{clamp, exp_interp, fast_sin, kill_denormals, lerp, soft_clip, tpt_g, TAU};
    pub use crate::filters::{DcBlock, SvfMode, SvfTpt};
    pub use crate::noise::{BrownFilter, NoiseKind, PinkFilter, Shaper};
}
