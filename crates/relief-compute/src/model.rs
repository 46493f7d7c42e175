//! Illumination model shared by every backend.
//!
//! Given the local gradients of the elevation surface and the sun position,
//! computes slope, aspect and a Lambertian-style illumination term mapped
//! from `[-1, 1]` to `[0, 1]`:
//!
//! ```text
//! slope  = pi/2 - atan(sqrt(x^2 + y^2))
//! aspect = atan2(-x, y)
//! illum  = sin_alt * sin(slope) + cos_alt * cos(slope) * cos((azimuth - pi/2) - aspect)
//! result = (illum + 1) / 2
//! ```
//!
//! A gradient that is not finite (its stencil touched a `NaN` or infinite
//! elevation) yields `NaN` rather than a saturated angle.
//!
//! `x` is the gradient along rows, `y` along columns. The functions are
//! generic over [`Real`] so the host kernel (`f64`) and the emulated device
//! (`f32`) evaluate the very same expression.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::ops::{Add, Div, Mul, Neg, Sub};

/// Default sun azimuth in degrees (south-west).
pub const DEFAULT_AZIMUTH: f64 = 225.0;

/// Default sun altitude in degrees above the horizon.
pub const DEFAULT_ALTITUDE: f64 = 25.0;

/// Floating-point type a kernel evaluates in.
pub trait Real:
    Copy
    + Send
    + Sync
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + 'static
{
    const ONE: Self;
    const HALF: Self;
    const TWO: Self;
    const HALF_PI: Self;
    const NAN: Self;

    fn from_f64(v: f64) -> Self;
    fn sin(self) -> Self;
    fn cos(self) -> Self;
    fn atan(self) -> Self;
    fn atan2(self, other: Self) -> Self;
    fn sqrt(self) -> Self;
    fn is_finite(self) -> bool;
}

macro_rules! impl_real {
    ($t:ident) => {
        impl Real for $t {
            const ONE: Self = 1.0;
            const HALF: Self = 0.5;
            const TWO: Self = 2.0;
            const HALF_PI: Self = std::$t::consts::FRAC_PI_2;
            const NAN: Self = $t::NAN;

            #[inline]
            fn from_f64(v: f64) -> Self {
                v as $t
            }
            #[inline]
            fn sin(self) -> Self {
                <$t>::sin(self)
            }
            #[inline]
            fn cos(self) -> Self {
                <$t>::cos(self)
            }
            #[inline]
            fn atan(self) -> Self {
                <$t>::atan(self)
            }
            #[inline]
            fn atan2(self, other: Self) -> Self {
                <$t>::atan2(self, other)
            }
            #[inline]
            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }
            #[inline]
            fn is_finite(self) -> bool {
                <$t>::is_finite(self)
            }
        }
    };
}

impl_real!(f32);
impl_real!(f64);

/// Sun position in degrees.
///
/// No range is enforced: out-of-range angles wrap through the trigonometry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HillshadeParams {
    /// Compass direction the light comes from.
    pub azimuth: f64,
    /// Angle of the light above the horizon.
    pub altitude: f64,
}

impl HillshadeParams {
    pub fn new(azimuth: f64, altitude: f64) -> Self {
        Self { azimuth, altitude }
    }
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self::new(DEFAULT_AZIMUTH, DEFAULT_ALTITUDE)
    }
}

/// Grid-invariant lighting constants, computed once per invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lighting<T> {
    pub sin_altitude: T,
    pub cos_altitude: T,
    /// Azimuth in radians after re-basing to `360 - azimuth`.
    pub azimuth_rad: T,
}

impl<T: Real> Lighting<T> {
    /// Converts degrees to the constants the kernels consume.
    ///
    /// The compass azimuth is re-based as `360 - azimuth` before conversion.
    /// Trigonometry is done in `f64` and narrowed afterwards.
    pub fn from_params(params: &HillshadeParams) -> Self {
        let altitude_rad = params.altitude.to_radians();
        let azimuth_rad = (360.0 - params.azimuth) * std::f64::consts::PI / 180.0;
        Self {
            sin_altitude: T::from_f64(altitude_rad.sin()),
            cos_altitude: T::from_f64(altitude_rad.cos()),
            azimuth_rad: T::from_f64(azimuth_rad),
        }
    }
}

/// Slope angle from gradients, in radians from vertical.
#[inline]
pub fn slope<T: Real>(x: T, y: T) -> T {
    T::HALF_PI - (x * x + y * y).sqrt().atan()
}

/// Aspect angle from gradients.
#[inline]
pub fn aspect<T: Real>(x: T, y: T) -> T {
    (-x).atan2(y)
}

/// Illumination in `[0, 1]`, host form (aspect computed separately).
#[inline]
pub fn shade<T: Real>(x: T, y: T, light: &Lighting<T>) -> T {
    if !(x.is_finite() && y.is_finite()) {
        return T::NAN;
    }
    let slope = slope(x, y);
    let aspect = aspect(x, y);
    let shaded = light.sin_altitude * slope.sin()
        + light.cos_altitude * slope.cos() * ((light.azimuth_rad - T::HALF_PI) - aspect).cos();
    (shaded + T::ONE) / T::TWO
}

/// Illumination in `[0, 1]`, device form.
///
/// Folds the `azimuth - pi/2` offset into the aspect term. Algebraically
/// equal to [`shade`].
#[inline]
pub fn shade_folded<T: Real>(x: T, y: T, light: &Lighting<T>) -> T {
    if !(x.is_finite() && y.is_finite()) {
        return T::NAN;
    }
    let slope = slope(x, y);
    let aspect = (light.azimuth_rad - T::HALF_PI) - (-x).atan2(y);

    let sin_part = light.sin_altitude * slope.sin();
    let cos_part = light.cos_altitude * slope.cos() * aspect.cos();

    (sin_part + cos_part + T::ONE) * T::HALF
}
