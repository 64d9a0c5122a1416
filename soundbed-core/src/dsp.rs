//! Scalar math for the render path.
//!
//! The transcendental functions come from one of three backends, picked at
//! compile time: `micromath` (feature `micromath`), `libm` (feature `no-std`)
//! or the standard library. `fast-math` swaps the hot-path sine and tanh for
//! polynomial/rational approximations.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

mod backend {
    use cfg_if::cfg_if;

    cfg_if! {
        if #[cfg(feature = "micromath")] {
            use micromath::F32Ext as _;
            #[inline] pub fn sin(x: f32) -> f32 { x.sin() }
            #[inline] pub fn exp(x: f32) -> f32 { x.exp() }
            #[inline] pub fn ln(x: f32) -> f32 { x.ln() }
            #[inline] pub fn tanh(x: f32) -> f32 { x.tanh() }
            #[inline] pub fn tan(x: f32) -> f32 { x.sin() / x.cos() }
        } else if #[cfg(feature = "no-std")] {
            #[inline] pub fn sin(x: f32) -> f32 { libm::sinf(x) }
            #[inline] pub fn exp(x: f32) -> f32 { libm::expf(x) }
            #[inline] pub fn ln(x: f32) -> f32 { libm::logf(x) }
            #[inline] pub fn tanh(x: f32) -> f32 { libm::tanhf(x) }
            #[inline] pub fn tan(x: f32) -> f32 { libm::tanf(x) }
        } else {
            #[inline] pub fn sin(x: f32) -> f32 { x.sin() }
            #[inline] pub fn exp(x: f32) -> f32 { x.exp() }
            #[inline] pub fn ln(x: f32) -> f32 { x.ln() }
            #[inline] pub fn tanh(x: f32) -> f32 { x.tanh() }
            #[inline] pub fn tan(x: f32) -> f32 { x.tan() }
        }
    }
}

pub const TAU: f32 = 2.0 * PI;

/// Filter state below this magnitude is flushed to zero.
pub const DENORMAL_FLOOR: f32 = 1.0e-20;

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    x.max(lo).min(hi)
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn kill_denormals(x: f32) -> f32 {
    if x > -DENORMAL_FLOOR && x < DENORMAL_FLOOR { 0.0 } else { x }
}

/// `a * (b/a)^t` for positive `a` and `b`: the exponential automation curve.
#[inline]
pub fn exp_interp(a: f32, b: f32, t: f32) -> f32 {
    a * backend::exp(t * backend::ln(b / a))
}

/// Sine. Under `fast-math`: range-reduced odd 5th-order polynomial, ~1e-3 error.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let k = num_traits::float::FloatCore::round(x / TAU);
            let xr = x - k * TAU;
            let x2 = xr * xr;
            xr * (0.999_979_313_3 + x2 * (-0.166_624_432_0 + x2 * 0.008_308_978_98))
        } else {
            backend::sin(x)
        }
    }
}

/// Output saturator, tanh-shaped. Under `fast-math`: `x(27+x²)/(27+9x²)`.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            let x2 = x * x;
            x * (27.0 + x2) / (27.0 + 9.0 * x2)
        } else {
            backend::tanh(x)
        }
    }
}

/// One-pole smoothing coefficient `exp(-2π fc / sr)`.
#[inline]
pub fn one_pole_coeff_hz(cut_hz: f32, sr: f32) -> f32 {
    let fc = clamp(cut_hz, 0.0, 0.499 * sr);
    backend::exp(-TAU * fc / sr)
}

/// Prewarped integrator gain `tan(π fc / sr)` for the TPT SVF, cutoff held
/// under 0.49·sr.
#[inline]
pub fn tpt_g(cut_hz: f32, sr: f32) -> f32 {
    let x = PI * clamp(cut_hz, 1.0, 0.49 * sr) / sr;
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            fast_sin(x) / fast_sin(x + 0.5 * PI)
        } else {
            backend::tan(x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn clamp_respects_both_bounds() {
        assert_eq!(clamp(-0.4, 0.0, 1.0), 0.0);
        assert_eq!(clamp(1.7, 0.0, 1.0), 1.0);
        assert_eq!(clamp(0.25, 0.0, 1.0), 0.25);
    }

    #[test]
    fn soft_clip_is_bounded() {
        for x in [-10.0, -2.0, -1.0, 0.0, 1.0, 2.0, 10.0] {
            let y = soft_clip(x);
            assert!((-1.0 - 1e-4..=1.0 + 1e-4).contains(&y), "x={x} y={y}");
        }
    }

    #[test]
    fn exp_interp_hits_endpoints() {
        assert_relative_eq!(exp_interp(0.5, 0.001, 0.0), 0.5, epsilon = 1e-6);
        assert_relative_eq!(exp_interp(0.5, 0.001, 1.0), 0.001, epsilon = 1e-6);
        assert_relative_eq!(exp_interp(1.0, 0.01, 0.5), 0.1, epsilon = 1e-4);
    }

    #[test]
    fn tpt_g_stays_finite_near_nyquist() {
        let g = tpt_g(30_000.0, 16_000.0);
        assert!(g.is_finite() && g > 0.0);
    }

    #[test]
    fn denormals_flush_to_zero() {
        assert_eq!(kill_denormals(1.0e-30), 0.0);
        assert_eq!(kill_denormals(-0.5), -0.5);
    }
}
