//! Physical address map: core memory below the I/O page, device registers above.

/// First address of the I/O page.
pub const IO_PAGE_START: u16 = 0o160000;
/// Last address of the I/O page.
pub const IO_PAGE_END: u16 = 0o177777;
/// Largest core size in bytes; core can never overlap the I/O page.
pub const MAX_CORE_BYTES: usize = IO_PAGE_START as usize;

/// Region classification for physical addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryRegion {
    /// Core memory (`0o000000..=0o157777`).
    Core,
    /// I/O page (`0o160000..=0o177777`), served by attached devices.
    IoPage,
}

impl MemoryRegion {
    /// Returns the inclusive bounds for this region.
    #[must_use]
    pub const fn bounds(self) -> (u16, u16) {
        match self {
            Self::Core => (0, IO_PAGE_START - 1),
            Self::IoPage => (IO_PAGE_START, IO_PAGE_END),
        }
    }

    /// Returns `true` when `addr` belongs to this region.
    #[must_use]
    pub const fn contains(self, addr: u16) -> bool {
        let (start, end) = self.bounds();
        addr >= start && addr <= end
    }
}

/// Decodes an address into its region.
#[must_use]
pub const fn decode_memory_region(addr: u16) -> MemoryRegion {
    if addr >= IO_PAGE_START {
        MemoryRegion::IoPage
    } else {
        MemoryRegion::Core
    }
}

const _: () = assert!(IO_PAGE_START % 2 == 0, "i/o page must start word aligned");

#[cfg(test)]
mod tests {
    use super::{decode_memory_region, MemoryRegion, IO_PAGE_START};

    #[test]
    fn boundary_addresses_decode_to_expected_regions() {
        assert_eq!(decode_memory_region(0), MemoryRegion::Core);
        assert_eq!(decode_memory_region(IO_PAGE_START - 1), MemoryRegion::Core);
        assert_eq!(decode_memory_region(IO_PAGE_START), MemoryRegion::IoPage);
        assert_eq!(decode_memory_region(u16::MAX), MemoryRegion::IoPage);
    }

    #[test]
    fn every_address_belongs_to_exactly_one_region() {
        for addr in 0_u16..=u16::MAX {
            let hits = [MemoryRegion::Core, MemoryRegion::IoPage]
                .iter()
                .filter(|region| region.contains(addr))
                .count();
            assert_eq!(hits, 1, "address {addr:06o}");
            assert!(decode_memory_region(addr).contains(addr));
        }
    }
}
