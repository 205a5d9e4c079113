//! Condition code updates.

use crate::memory::DataWidth;
use crate::state::{Psw, PSW_C, PSW_N, PSW_V, PSW_Z};

/// Per-flag condition code update. `None` leaves the flag unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagsUpdate {
    /// Negative.
    pub n: Option<bool>,
    /// Zero.
    pub z: Option<bool>,
    /// Overflow.
    pub v: Option<bool>,
    /// Carry.
    pub c: Option<bool>,
}

impl FlagsUpdate {
    /// `N` and `Z` from `result` at width `W`; `V` and `C` untouched.
    #[must_use]
    pub fn nz<W: DataWidth>(result: u16) -> Self {
        Self {
            n: Some(W::is_negative(result)),
            z: Some(W::is_zero(result)),
            v: None,
            c: None,
        }
    }

    /// Replaces the overflow update.
    #[must_use]
    pub const fn with_v(mut self, v: bool) -> Self {
        self.v = Some(v);
        self
    }

    /// Replaces the carry update.
    #[must_use]
    pub const fn with_c(mut self, c: bool) -> Self {
        self.c = Some(c);
        self
    }

    /// Writes the selected flags into `psw`.
    pub fn apply(self, psw: &mut Psw) {
        for (mask, value) in [
            (PSW_N, self.n),
            (PSW_Z, self.z),
            (PSW_V, self.v),
            (PSW_C, self.c),
        ] {
            if let Some(value) = value {
                psw.set_flag(mask, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FlagsUpdate;
    use crate::memory::{Byte, Word};
    use crate::state::{Psw, PSW_C, PSW_N, PSW_V, PSW_Z};

    #[test]
    fn nz_follows_width() {
        assert_eq!(FlagsUpdate::nz::<Word>(0x8000).n, Some(true));
        assert_eq!(FlagsUpdate::nz::<Byte>(0x8000).n, Some(false));
        assert_eq!(FlagsUpdate::nz::<Byte>(0x8000).z, Some(true));
    }

    #[test]
    fn apply_leaves_unselected_flags_alone() {
        let mut psw = Psw::from_raw(PSW_C | PSW_V);
        FlagsUpdate::nz::<Word>(0).with_v(false).apply(&mut psw);
        assert_eq!(psw.raw(), PSW_C | PSW_Z);

        FlagsUpdate::nz::<Word>(0xFFFF).with_c(false).apply(&mut psw);
        assert_eq!(psw.raw(), PSW_N);
    }
}
