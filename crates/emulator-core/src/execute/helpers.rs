//! Arithmetic helpers shared by the instruction handlers.

use crate::memory::DataWidth;

/// Signed overflow of `result = src + dst` at width `W`: both inputs share a
/// sign that the result does not.
#[must_use]
pub const fn add_overflow<W: DataWidth>(src: u16, dst: u16, result: u16) -> bool {
    (!(src ^ dst) & (src ^ result)) & W::SIGN != 0
}

/// Signed overflow of `result = minuend - subtrahend` at width `W`: the
/// inputs differ in sign and the result takes the subtrahend's sign.
#[must_use]
pub const fn sub_overflow<W: DataWidth>(minuend: u16, subtrahend: u16, result: u16) -> bool {
    ((minuend ^ subtrahend) & (minuend ^ result)) & W::SIGN != 0
}

/// Outcome of an arithmetic shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftResult {
    /// Shifted word.
    pub value: u16,
    /// Last bit shifted out.
    pub carry: bool,
    /// Sign changed during a left shift.
    pub overflow: bool,
}

/// Arithmetic shift of a word by the six-bit signed count in `count`.
///
/// Counts `0..=31` shift left; `32..=63` encode right shifts of `64 - count`.
/// A left shift overflows when the result no longer equals the value shifted
/// at full precision.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
pub fn arithmetic_shift(value: u16, count: u16) -> ShiftResult {
    let count = count & 0o77;
    let wide = i64::from(value as i16);
    if count & 0o40 != 0 {
        let amount = 64 - u32::from(count);
        ShiftResult {
            value: (wide >> amount) as u16,
            carry: (wide >> (amount - 1)) & 1 != 0,
            overflow: false,
        }
    } else if count == 0 {
        ShiftResult {
            value,
            carry: false,
            overflow: false,
        }
    } else {
        let amount = u32::from(count);
        let shifted = wide << amount;
        let result = shifted as u16;
        ShiftResult {
            value: result,
            carry: ((u64::from(value) << amount) >> 16) & 1 != 0,
            overflow: shifted != i64::from(result as i16),
        }
    }
}

/// Signed 16 x 16 bit product.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn multiply(lhs: u16, rhs: u16) -> i32 {
    i32::from(lhs as i16) * i32::from(rhs as i16)
}
