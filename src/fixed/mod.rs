use std::fmt::{Debug, Formatter, Result as FmtResult};

/// Fractional bits of the activation/weight format.
pub const FRAC_BITS: u32 = 10;

/// Fractional bits carried by the wide accumulator (product of two Q6.10 values).
pub const ACC_FRAC_BITS: u32 = 2 * FRAC_BITS;

const SCALE: f32 = (1i32 << FRAC_BITS) as f32;

/// Q6.10 signed fixed point in 16 bits: 6 integer bits (sign included),
/// 10 fractional bits. Conversions round half toward +inf and saturate.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fixed(i16);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(1 << FRAC_BITS);
    pub const MIN: Fixed = Fixed(i16::MIN);
    pub const MAX: Fixed = Fixed(i16::MAX);

    pub fn from_f32(value: f32) -> Self {
        // `as` saturates out-of-range values into the i16 domain
        Fixed((value * SCALE + 0.5).floor() as i16)
    }

    pub fn to_f32(self) -> f32 {
        self.0 as f32 / SCALE
    }

    pub const fn from_raw(raw: i16) -> Self {
        Fixed(raw)
    }

    pub const fn raw(self) -> i16 {
        self.0
    }

    pub fn relu(self) -> Self {
        if self.0 < 0 { Fixed::ZERO } else { self }
    }
}

impl Debug for Fixed {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Fixed({})", self.to_f32())
    }
}

fn saturate(raw: i64) -> Fixed {
    Fixed(raw.clamp(i16::MIN as i64, i16::MAX as i64) as i16)
}

/// Widened accumulator holding 20 fractional bits in an i64. Products of two
/// `Fixed` values accumulate exactly; rounding and saturation happen once,
/// on the final narrowing back to `Fixed`.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Accum(i64);

impl Accum {
    pub const ZERO: Accum = Accum(0);

    /// Multiply-accumulate one `activation × weight` term.
    pub fn mac(&mut self, a: Fixed, b: Fixed) {
        self.0 += a.0 as i64 * b.0 as i64;
    }

    /// Accumulate a plain value (aligned from 10 to 20 fractional bits).
    pub fn add(&mut self, v: Fixed) {
        self.0 += (v.0 as i64) << FRAC_BITS;
    }

    pub fn raw(self) -> i64 {
        self.0
    }

    /// Narrow to Q6.10, rounding half toward +inf, then saturating.
    pub fn to_fixed(self) -> Fixed {
        let half = 1i64 << (FRAC_BITS - 1);
        // arithmetic shift floors, so add-half-then-shift rounds half up
        saturate((self.0 + half) >> FRAC_BITS)
    }

    /// Divide by `divisor` and narrow to Q6.10 in a single rounding step.
    pub fn to_fixed_div(self, divisor: usize) -> Fixed {
        debug_assert!(divisor > 0, "division by zero element count");
        let d = (divisor as i64) << FRAC_BITS;
        saturate((self.0 + (d >> 1)).div_euclid(d))
    }
}

impl Debug for Accum {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Accum({})", self.0 as f64 / (1u64 << ACC_FRAC_BITS) as f64)
    }
}
