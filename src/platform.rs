use embedded_storage::nor_flash::NorFlash;

/// A NOR flash whose program operation wraps around inside a page instead of carrying on into
/// the next one (e.g. S25FL512S: 512 byte pages, 256 KiB sectors). `ERASE_SIZE` is the section.
///
/// See `sim::SimFlash` for an example implementation.
pub trait PagedFlash: NorFlash {
    const PAGE_SIZE: usize;
}

impl<T: PagedFlash> PagedFlash for &mut T {
    const PAGE_SIZE: usize = T::PAGE_SIZE;
}

pub trait AlignedOps: PagedFlash {
    fn align_read_floor(offset: usize) -> usize {
        align_floor(offset, Self::READ_SIZE)
    }

    fn align_read_ceil(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_write_floor(offset: usize) -> usize {
        align_floor(offset, Self::WRITE_SIZE)
    }

    fn align_write_ceil(size: usize) -> usize {
        align_ceil(size, Self::WRITE_SIZE)
    }

    /// True if `[address, address + len)` touches more than one page.
    fn straddles_page(address: u32, len: usize) -> bool {
        (address as usize % Self::PAGE_SIZE) + len > Self::PAGE_SIZE
    }

    fn is_section_aligned(address: u32) -> bool {
        (address as usize).is_multiple_of(Self::ERASE_SIZE)
    }
}

#[inline(always)]
const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: PagedFlash> AlignedOps for T {}
