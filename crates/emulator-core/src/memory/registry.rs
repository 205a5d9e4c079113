//! Devices attached to the I/O page and the registry that routes accesses to them.

use std::fmt;

use thiserror::Error;

use super::map::{IO_PAGE_END, IO_PAGE_START};
use crate::TrapKind;

/// A memory-mapped device occupying a window of the I/O page.
///
/// Offsets are relative to the window base. `buf` is one byte for byte
/// accesses and two little-endian bytes for word accesses; word accesses are
/// always at even offsets.
pub trait Device {
    /// Short name used in diagnostics.
    fn name(&self) -> &str {
        "device"
    }

    /// Reads device registers into `buf`.
    ///
    /// # Errors
    ///
    /// Returns the trap the access should raise, typically
    /// [`TrapKind::MemoryManagement`] for an offset with no register behind it.
    fn load(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), TrapKind>;

    /// Writes `buf` to device registers.
    ///
    /// # Errors
    ///
    /// Returns the trap the access should raise.
    fn store(&mut self, offset: u16, buf: &[u8]) -> Result<(), TrapKind>;
}

/// Reasons a device cannot be attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AttachError {
    /// Window has no bytes.
    #[error("device window is empty")]
    Empty,
    /// Window base is odd.
    #[error("device window base {base:06o} is not word aligned")]
    Unaligned {
        /// Requested base.
        base: u16,
    },
    /// Window leaves the I/O page.
    #[error("device window {base:06o}+{len:o} is outside the i/o page")]
    OutsideIoPage {
        /// Requested base.
        base: u16,
        /// Requested length.
        len: u16,
    },
    /// Window intersects an attached device.
    #[error("device window {base:06o}+{len:o} overlaps {existing_base:06o}")]
    Overlap {
        /// Requested base.
        base: u16,
        /// Requested length.
        len: u16,
        /// Base of the device already attached there.
        existing_base: u16,
    },
}

/// A device together with the window it answers.
pub struct DeviceBinding {
    base: u16,
    len: u16,
    device: Box<dyn Device>,
}

impl DeviceBinding {
    /// First address of the window.
    #[must_use]
    pub const fn base(&self) -> u16 {
        self.base
    }

    /// Window size in bytes.
    #[must_use]
    pub const fn len(&self) -> u16 {
        self.len
    }

    /// Last address of the window.
    #[must_use]
    pub const fn end(&self) -> u16 {
        self.base + (self.len - 1)
    }

    /// Whether `addr` falls in the window.
    #[must_use]
    pub const fn contains(&self, addr: u16) -> bool {
        addr >= self.base && addr <= self.end()
    }

    /// Forwards a read. `addr` must be in the window.
    pub(crate) fn load(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), TrapKind> {
        let offset = addr - self.base;
        if usize::from(offset) + buf.len() > usize::from(self.len) {
            return Err(TrapKind::MemoryManagement);
        }
        self.device.load(offset, buf)
    }

    /// Forwards a write. `addr` must be in the window.
    pub(crate) fn store(&mut self, addr: u16, buf: &[u8]) -> Result<(), TrapKind> {
        let offset = addr - self.base;
        if usize::from(offset) + buf.len() > usize::from(self.len) {
            return Err(TrapKind::MemoryManagement);
        }
        self.device.store(offset, buf)
    }
}

impl fmt::Debug for DeviceBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBinding")
            .field("name", &self.device.name())
            .field("base", &format_args!("{:06o}", self.base))
            .field("len", &self.len)
            .finish()
    }
}

/// Non-overlapping device windows, kept sorted by base address.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    bindings: Vec<DeviceBinding>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bindings: Vec::new(),
        }
    }

    /// Attaches `device` at `base..base + len`.
    ///
    /// # Errors
    ///
    /// Returns [`AttachError`] when the window is empty, odd, leaves the I/O
    /// page, or overlaps an attached device.
    pub fn attach(
        &mut self,
        base: u16,
        len: u16,
        device: Box<dyn Device>,
    ) -> Result<(), AttachError> {
        if len == 0 {
            return Err(AttachError::Empty);
        }
        if base & 1 != 0 {
            return Err(AttachError::Unaligned { base });
        }
        let fits = base >= IO_PAGE_START && u32::from(base) + u32::from(len) <= u32::from(IO_PAGE_END) + 1;
        if !fits {
            return Err(AttachError::OutsideIoPage { base, len });
        }
        let end = base + (len - 1);
        if let Some(existing) = self
            .bindings
            .iter()
            .find(|binding| base <= binding.end() && binding.base() <= end)
        {
            return Err(AttachError::Overlap {
                base,
                len,
                existing_base: existing.base(),
            });
        }

        log::debug!(
            "attached {} at {base:06o}..={end:06o}",
            device.name()
        );
        let index = self.bindings.partition_point(|binding| binding.base() < base);
        self.bindings.insert(index, DeviceBinding { base, len, device });
        Ok(())
    }

    /// Binding whose window contains `addr`.
    pub fn find_mut(&mut self, addr: u16) -> Option<&mut DeviceBinding> {
        let index = self.bindings.partition_point(|binding| binding.end() < addr);
        self.bindings
            .get_mut(index)
            .filter(|binding| binding.contains(addr))
    }

    /// Attached windows in address order.
    pub fn bindings(&self) -> impl Iterator<Item = &DeviceBinding> + '_ {
        self.bindings.iter()
    }

    /// Number of attached devices.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no device is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{AttachError, Device, DeviceRegistry};
    use crate::TrapKind;

    struct Latch {
        value: [u8; 2],
    }

    impl Device for Latch {
        fn load(&mut self, offset: u16, buf: &mut [u8]) -> Result<(), TrapKind> {
            let start = usize::from(offset);
            buf.copy_from_slice(&self.value[start..start + buf.len()]);
            Ok(())
        }

        fn store(&mut self, offset: u16, buf: &[u8]) -> Result<(), TrapKind> {
            let start = usize::from(offset);
            self.value[start..start + buf.len()].copy_from_slice(buf);
            Ok(())
        }
    }

    fn latch() -> Box<dyn Device> {
        Box::new(Latch { value: [0; 2] })
    }

    #[test]
    fn attach_rejects_bad_windows() {
        let mut registry = DeviceRegistry::new();
        assert_eq!(registry.attach(0o170000, 0, latch()), Err(AttachError::Empty));
        assert_eq!(
            registry.attach(0o170001, 2, latch()),
            Err(AttachError::Unaligned { base: 0o170001 })
        );
        assert_eq!(
            registry.attach(0o157776, 4, latch()),
            Err(AttachError::OutsideIoPage {
                base: 0o157776,
                len: 4
            })
        );
        assert_eq!(
            registry.attach(0o177776, 4, latch()),
            Err(AttachError::OutsideIoPage {
                base: 0o177776,
                len: 4
            })
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn overlapping_windows_are_rejected() {
        let mut registry = DeviceRegistry::new();
        registry.attach(0o170000, 8, latch()).unwrap();
        assert_eq!(
            registry.attach(0o170006, 2, latch()),
            Err(AttachError::Overlap {
                base: 0o170006,
                len: 2,
                existing_base: 0o170000
            })
        );
        registry.attach(0o170010, 2, latch()).unwrap();
        registry.attach(0o177776, 2, latch()).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn lookup_finds_the_containing_window() {
        let mut registry = DeviceRegistry::new();
        registry.attach(0o177560, 8, latch()).unwrap();
        registry.attach(0o170000, 2, latch()).unwrap();

        let bases: Vec<u16> = registry.bindings().map(|binding| binding.base()).collect();
        assert_eq!(bases, [0o170000, 0o177560]);

        assert_eq!(registry.find_mut(0o177566).map(|b| b.base()), Some(0o177560));
        assert_eq!(registry.find_mut(0o170001).map(|b| b.base()), Some(0o170000));
        assert!(registry.find_mut(0o170002).is_none());
        assert!(registry.find_mut(0o177570).is_none());
    }

    #[test]
    fn accesses_past_the_window_trap() {
        let mut registry = DeviceRegistry::new();
        registry.attach(0o170000, 3, latch()).unwrap();
        let binding = registry.find_mut(0o170002).unwrap();
        let mut word = [0_u8; 2];
        assert_eq!(
            binding.load(0o170002, &mut word),
            Err(TrapKind::MemoryManagement)
        );
        binding.store(0o170000, &[1, 2]).unwrap();
        binding.load(0o170000, &mut word).unwrap();
        assert_eq!(word, [1, 2]);
    }
}
