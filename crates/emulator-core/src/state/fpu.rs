/// `FPS` bit selecting double-precision floating operands.
pub const FPS_FD: u16 = 1 << 7;
/// `FPS` bit selecting 32-bit integer operands for conversions.
pub const FPS_FL: u16 = 1 << 6;

/// Floating-point status word.
///
/// Only the mode bits set by `setd` and `seti` are modelled. No floating
/// arithmetic reads them yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct FpuStatus(u16);

impl FpuStatus {
    /// Raw status word.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Whether floating operands are double precision.
    #[must_use]
    pub const fn double_precision(self) -> bool {
        self.0 & FPS_FD != 0
    }

    /// Whether integer conversions use 32-bit operands.
    #[must_use]
    pub const fn long_integers(self) -> bool {
        self.0 & FPS_FL != 0
    }

    /// Sets or clears `FD`.
    pub const fn set_double_precision(&mut self, enabled: bool) {
        self.set(FPS_FD, enabled);
    }

    /// Sets or clears `FL`.
    pub const fn set_long_integers(&mut self, enabled: bool) {
        self.set(FPS_FL, enabled);
    }

    const fn set(&mut self, mask: u16, enabled: bool) {
        if enabled {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }
}
