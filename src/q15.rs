/*! Q15 fixed point arithmetic.

A [`Q15`] is a signed fraction in `[-1, 1)`, an [`I1F15`] from the `fixed`
crate underneath. All arithmetic saturates to `[Q15::MIN, Q15::MAX]`
instead of wrapping.

Dot products accumulate raw products in 64 bits and only saturate once, at
the end. [`Q15::mul_shift`] and [`dot`] round to nearest when scaling back
down, and can scale the result up by a post-shift.
*/
use fixed::types::I1F15;
use serde::{Deserialize, Serialize};

/// Number of fractional bits.
pub const FRAC_BITS: u32 = 15;

/// Q15 fixed point sample.
///
/// Serialized as its raw `i16`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i16", into = "i16")]
pub struct Q15(I1F15);

impl Q15 {
    /// Zero.
    pub const ZERO: Q15 = Q15(I1F15::ZERO);

    /// Largest representable value, just below 1.0.
    pub const MAX: Q15 = Q15(I1F15::MAX);

    /// Smallest representable value, -1.0.
    pub const MIN: Q15 = Q15(I1F15::MIN);

    /// Create from raw integer representation.
    #[must_use]
    pub const fn from_raw(raw: i16) -> Self {
        Self(I1F15::from_bits(raw))
    }

    /// Raw integer representation.
    #[must_use]
    pub const fn raw(self) -> i16 {
        self.0.to_bits()
    }

    /// Clamp a wide raw intermediate into range.
    #[must_use]
    pub fn saturate(v: i64) -> Self {
        Self::from_raw(v.clamp(i16::MIN as i64, i16::MAX as i64) as i16)
    }

    /// Convert from float, rounding and saturating.
    ///
    /// # Panics
    /// Panics if `v` is NaN.
    #[must_use]
    pub fn from_f32(v: f32) -> Self {
        Self(I1F15::saturating_from_num(v))
    }

    /// Convert to float.
    #[must_use]
    pub fn to_f32(self) -> f32 {
        self.0.to_num()
    }

    /// Little endian bytes.
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    /// From little endian bytes.
    #[must_use]
    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(I1F15::from_le_bytes(bytes))
    }

    /// Saturating absolute value. `abs(-1.0)` becomes `Q15::MAX`.
    #[must_use]
    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    /// Multiply, with the product scaled up by `2^post_shift`.
    ///
    /// The product is rounded half up. With `post_shift == 0` this is plain
    /// Q15 multiplication.
    #[must_use]
    pub fn mul_shift(self, other: Q15, post_shift: u8) -> Self {
        let p = self.raw() as i64 * other.raw() as i64;
        Self::saturate(round_shift(p, FRAC_BITS - post_shift as u32))
    }
}

impl std::ops::Add for Q15 {
    type Output = Q15;
    fn add(self, other: Q15) -> Q15 {
        Q15(self.0.saturating_add(other.0))
    }
}

impl std::ops::AddAssign for Q15 {
    fn add_assign(&mut self, other: Q15) {
        *self = *self + other;
    }
}

impl std::ops::Sub for Q15 {
    type Output = Q15;
    fn sub(self, other: Q15) -> Q15 {
        Q15(self.0.saturating_sub(other.0))
    }
}

impl std::ops::Neg for Q15 {
    type Output = Q15;
    fn neg(self) -> Q15 {
        Q15(self.0.saturating_neg())
    }
}

impl std::ops::Mul for Q15 {
    type Output = Q15;
    fn mul(self, other: Q15) -> Q15 {
        Q15(self.0.saturating_mul(other.0))
    }
}

impl From<i16> for Q15 {
    fn from(raw: i16) -> Self {
        Self::from_raw(raw)
    }
}

impl From<Q15> for i16 {
    fn from(v: Q15) -> Self {
        v.raw()
    }
}

impl From<I1F15> for Q15 {
    fn from(v: I1F15) -> Self {
        Self(v)
    }
}

impl From<Q15> for I1F15 {
    fn from(v: Q15) -> Self {
        v.0
    }
}

impl std::fmt::Display for Q15 {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:.5}", self.to_f32())
    }
}

/// Arithmetic right shift, rounding half up.
#[must_use]
pub fn round_shift(v: i64, shift: u32) -> i64 {
    if shift == 0 {
        v
    } else {
        (v + (1i64 << (shift - 1))) >> shift
    }
}

/// Saturating multiply-accumulate of two equal length sequences.
///
/// The full precision sum is scaled by `2^post_shift` before the final
/// saturation, so the taps can represent gains outside `[-1, 1)`.
#[must_use]
pub fn dot<A, B>(a: A, b: B, post_shift: u8) -> Q15
where
    A: IntoIterator<Item = Q15>,
    B: IntoIterator<Item = Q15>,
{
    let acc: i64 = a
        .into_iter()
        .zip(b)
        .map(|(x, y)| x.raw() as i64 * y.raw() as i64)
        .sum();
    Q15::saturate(round_shift(acc, FRAC_BITS - post_shift as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(raw: i16) -> Q15 {
        Q15::from_raw(raw)
    }

    #[test]
    fn add_saturates() {
        assert_eq!(q(30000) + q(30000), Q15::MAX);
        assert_eq!(q(-30000) + q(-30000), Q15::MIN);
        assert_eq!(q(100) + q(-300), q(-200));
    }

    #[test]
    fn sub_saturates() {
        assert_eq!(q(-30000) - q(30000), Q15::MIN);
        assert_eq!(q(30000) - q(-30000), Q15::MAX);
        assert_eq!(q(5) - q(10), q(-5));
    }

    #[test]
    fn abs_of_min() {
        assert_eq!(Q15::MIN.abs(), Q15::MAX);
        assert_eq!(q(-7).abs(), q(7));
        assert_eq!(-Q15::MIN, Q15::MAX);
    }

    #[test]
    fn mul() {
        // 0.5 * 0.5 = 0.25
        assert_eq!(q(16384) * q(16384), q(8192));
        // -1 * -1 does not fit.
        assert_eq!(Q15::MIN * Q15::MIN, Q15::MAX);
        assert_eq!(Q15::MIN * Q15::MAX, q(-32767));
        assert_eq!(q(1) * q(1), Q15::ZERO);
    }

    #[test]
    fn mul_post_shift() {
        // Rounded, not truncated.
        assert_eq!(q(3).mul_shift(q(16384), 0), q(2));
        assert_eq!(q(-3).mul_shift(q(16384), 0), q(-1));
        // 0.25 * 0.5 scaled by 4 = 0.5
        assert_eq!(q(8192).mul_shift(q(16384), 2), q(16384));
        assert_eq!(q(16384).mul_shift(q(16384), 3), Q15::MAX);
        assert_eq!(Q15::MIN.mul_shift(Q15::MIN, 0), Q15::MAX);
    }

    #[test]
    fn dot_product() {
        let a = [q(16384), q(16384), q(-8192)];
        let b = [q(16384), q(8192), q(16384)];
        // 0.25 + 0.125 - 0.125
        assert_eq!(dot(a, b, 0), q(8192));
        // Intermediate overflow is fine as long as the result fits.
        let a = [Q15::MAX, Q15::MAX, Q15::MIN];
        let b = [Q15::MAX, Q15::MAX, Q15::MAX];
        assert_eq!(dot(a, b, 0), q(32765));
        assert_eq!(dot([Q15::MAX; 4], [Q15::MAX; 4], 0), Q15::MAX);
        assert_eq!(dot([Q15::MIN; 4], [Q15::MAX; 4], 0), Q15::MIN);
        // 0.25 * 0.25 scaled by 2.
        assert_eq!(dot([q(8192)], [q(8192)], 1), q(4096));
    }

    #[test]
    fn float_conversion() {
        assert_eq!(Q15::from_f32(0.5), q(16384));
        assert_eq!(Q15::from_f32(2.0), Q15::MAX);
        assert_eq!(Q15::from_f32(-1.0), Q15::MIN);
        assert_eq!(Q15::from_f32(0.001), q(33));
        assert!((q(16384).to_f32() - 0.5).abs() < 1e-6);
        assert_eq!(Q15::from(I1F15::from_num(0.25)), q(8192));
    }

    #[test]
    fn bytes() {
        assert_eq!(q(0x1234).to_le_bytes(), [0x34, 0x12]);
        assert_eq!(Q15::from_le_bytes([0xfe, 0xff]), q(-2));
        assert_eq!(Q15::MIN.to_le_bytes(), [0x00, 0x80]);
    }

    #[test]
    fn serde_raw() -> crate::Result<()> {
        assert_eq!(serde_json::to_string(&q(-1234))?, "-1234");
        assert_eq!(serde_json::from_str::<Q15>("33")?, q(33));
        assert_eq!(serde_json::to_string(&[q(1), Q15::MAX])?, "[1,32767]");
        Ok(())
    }
}
