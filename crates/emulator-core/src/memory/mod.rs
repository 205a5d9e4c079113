//! Physical memory: flat core below the I/O page, attached devices above it.

/// Access widths and alignment policy.
pub mod access;
/// Fixed address map.
pub mod map;
/// Device trait and attach/lookup registry.
pub mod registry;

use thiserror::Error;

pub use access::{validate_alignment, Byte, DataWidth, Word};
pub use map::{decode_memory_region, MemoryRegion, IO_PAGE_END, IO_PAGE_START, MAX_CORE_BYTES};
pub use registry::{AttachError, Device, DeviceBinding, DeviceRegistry};

use crate::TrapKind;

/// Reasons a program image cannot be placed in core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ImageLoadError {
    /// Image base is odd.
    #[error("image base {base:06o} is not word aligned")]
    Unaligned {
        /// Requested base.
        base: u16,
    },
    /// Image does not fit in core.
    #[error("image of {len} bytes at {base:06o} exceeds core of {core_bytes} bytes")]
    TooLarge {
        /// Requested base.
        base: u16,
        /// Image length in bytes.
        len: usize,
        /// Core size in bytes.
        core_bytes: usize,
    },
}

/// Core storage plus the device registry.
///
/// Every data access goes through [`Memory::load`] or [`Memory::store`],
/// which check alignment, then route to core or to a device.
#[derive(Debug)]
pub struct Memory {
    core: Box<[u8]>,
    devices: DeviceRegistry,
}

impl Memory {
    /// Allocates zeroed core of `core_bytes`, clamped to [`MAX_CORE_BYTES`]
    /// and rounded down to a whole number of words.
    #[must_use]
    pub fn new(core_bytes: usize) -> Self {
        let size = core_bytes.min(MAX_CORE_BYTES) & !1;
        if size != core_bytes {
            log::warn!("core size {core_bytes} adjusted to {size} bytes");
        }
        Self {
            core: vec![0; size].into_boxed_slice(),
            devices: DeviceRegistry::new(),
        }
    }

    /// Core bytes.
    #[must_use]
    pub fn core(&self) -> &[u8] {
        &self.core
    }

    /// Mutable core bytes.
    pub fn core_mut(&mut self) -> &mut [u8] {
        &mut self.core
    }

    /// Core size in bytes.
    #[must_use]
    pub fn core_len(&self) -> usize {
        self.core.len()
    }

    /// Attached devices.
    #[must_use]
    pub const fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Attaches a device to the I/O page.
    ///
    /// # Errors
    ///
    /// See [`DeviceRegistry::attach`].
    pub fn attach(
        &mut self,
        base: u16,
        len: u16,
        device: Box<dyn Device>,
    ) -> Result<(), AttachError> {
        self.devices.attach(base, len, device)
    }

    /// Copies `image` into core at `base`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageLoadError`] when `base` is odd or the image runs past
    /// the end of core.
    pub fn load_image(&mut self, base: u16, image: &[u8]) -> Result<(), ImageLoadError> {
        if base & 1 != 0 {
            return Err(ImageLoadError::Unaligned { base });
        }
        let start = usize::from(base);
        let core_bytes = self.core.len();
        let Some(target) = self.core.get_mut(start..start + image.len()) else {
            return Err(ImageLoadError::TooLarge {
                base,
                len: image.len(),
                core_bytes,
            });
        };
        target.copy_from_slice(image);
        Ok(())
    }

    /// Reads a value of width `W`, zero-extended.
    ///
    /// # Errors
    ///
    /// [`TrapKind::OddAddress`] for an odd word access,
    /// [`TrapKind::MemoryManagement`] when nothing backs the address, or any
    /// trap raised by the device.
    pub fn load<W: DataWidth>(&mut self, addr: u16) -> Result<u16, TrapKind> {
        validate_alignment::<W>(addr)?;
        let width = usize::from(W::BYTES);
        match decode_memory_region(addr) {
            MemoryRegion::Core => {
                let start = usize::from(addr);
                self.core
                    .get(start..start + width)
                    .map(W::decode)
                    .ok_or(TrapKind::MemoryManagement)
            }
            MemoryRegion::IoPage => {
                let binding = self
                    .devices
                    .find_mut(addr)
                    .ok_or(TrapKind::MemoryManagement)?;
                let mut buf = [0_u8; 2];
                binding.load(addr, &mut buf[..width])?;
                Ok(W::decode(&buf[..width]))
            }
        }
    }

    /// Writes the low `W` bits of `value`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Memory::load`].
    pub fn store<W: DataWidth>(&mut self, addr: u16, value: u16) -> Result<(), TrapKind> {
        validate_alignment::<W>(addr)?;
        let width = usize::from(W::BYTES);
        match decode_memory_region(addr) {
            MemoryRegion::Core => {
                let start = usize::from(addr);
                let target = self
                    .core
                    .get_mut(start..start + width)
                    .ok_or(TrapKind::MemoryManagement)?;
                W::encode(value, target);
                Ok(())
            }
            MemoryRegion::IoPage => {
                let binding = self
                    .devices
                    .find_mut(addr)
                    .ok_or(TrapKind::MemoryManagement)?;
                let mut buf = [0_u8; 2];
                W::encode(value, &mut buf[..width]);
                binding.store(addr, &buf[..width])
            }
        }
    }

    /// Reads an aligned core word without touching devices.
    ///
    /// Returns `None` for odd addresses and addresses outside core.
    #[must_use]
    pub fn peek_word(&self, addr: u16) -> Option<u16> {
        if addr & 1 != 0 {
            return None;
        }
        let start = usize::from(addr);
        self.core.get(start..start + 2).map(Word::decode)
    }
}
