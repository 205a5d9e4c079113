//! Access widths and alignment policy.
//!
//! [`DataWidth`] is the one place that knows the byte order of the machine:
//! everything above it handles values as zero-extended `u16`.

use crate::TrapKind;

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Byte {}
    impl Sealed for super::Word {}
}

/// Width of a data access. Implemented only by [`Byte`] and [`Word`].
pub trait DataWidth: sealed::Sealed + Copy + 'static {
    /// Access size in bytes.
    const BYTES: u16;
    /// Mask of the significant bits within a `u16`.
    const MASK: u16;
    /// Sign bit within a `u16`.
    const SIGN: u16;

    /// Decodes `Self::BYTES` little-endian bytes into a zero-extended word.
    fn decode(bytes: &[u8]) -> u16;

    /// Encodes the low `Self::BYTES` of `value` little-endian into `bytes`.
    fn encode(value: u16, bytes: &mut [u8]);

    /// Whether `value` is negative at this width.
    #[must_use]
    fn is_negative(value: u16) -> bool {
        value & Self::SIGN != 0
    }

    /// Whether `value` is zero at this width.
    #[must_use]
    fn is_zero(value: u16) -> bool {
        value & Self::MASK == 0
    }

    /// Sign-extends a value of this width to a full word.
    #[must_use]
    fn sign_extend(value: u16) -> u16 {
        let value = value & Self::MASK;
        if Self::is_negative(value) {
            value | !Self::MASK
        } else {
            value
        }
    }
}

/// 8-bit access marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Byte {}

/// 16-bit access marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Word {}

impl DataWidth for Byte {
    const BYTES: u16 = 1;
    const MASK: u16 = 0x00FF;
    const SIGN: u16 = 0x0080;

    fn decode(bytes: &[u8]) -> u16 {
        u16::from(bytes[0])
    }

    fn encode(value: u16, bytes: &mut [u8]) {
        bytes[0] = value.to_le_bytes()[0];
    }
}

impl DataWidth for Word {
    const BYTES: u16 = 2;
    const MASK: u16 = 0xFFFF;
    const SIGN: u16 = 0x8000;

    fn decode(bytes: &[u8]) -> u16 {
        u16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn encode(value: u16, bytes: &mut [u8]) {
        bytes[..2].copy_from_slice(&value.to_le_bytes());
    }
}

/// Validates alignment of an access of width `W`.
///
/// # Errors
///
/// Returns [`TrapKind::OddAddress`] for a word access at an odd address.
pub fn validate_alignment<W: DataWidth>(addr: u16) -> Result<(), TrapKind> {
    if W::BYTES == 2 && addr & 1 != 0 {
        Err(TrapKind::OddAddress)
    } else {
        Ok(())
    }
}
