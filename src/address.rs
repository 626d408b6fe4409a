use crate::error::Error;
use crate::platform::PagedFlash;

/// Section and page size of the flash, read from the device type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    pub section_size: u32,
    pub page_size: u32,
}

impl Geometry {
    /// Pages have to tile a section exactly and be a multiple of the device's read and write
    /// granularity, otherwise aligned accesses could leave the page.
    pub fn of<F: PagedFlash>() -> Result<Self, Error> {
        let page = F::PAGE_SIZE;
        let section = F::ERASE_SIZE;
        if page == 0
            || section < page
            || !section.is_multiple_of(page)
            || !page.is_multiple_of(F::READ_SIZE)
            || !page.is_multiple_of(F::WRITE_SIZE)
            || section > u32::MAX as usize
        {
            return Err(Error::InvalidGeometry);
        }

        Ok(Self {
            section_size: section as u32,
            page_size: page as u32,
        })
    }

    pub const fn pages_per_section(&self) -> u32 {
        self.section_size / self.page_size
    }

    /// Number of whole sections needed to hold `bytes`.
    pub fn sections_for(&self, bytes: u64) -> u32 {
        bytes.div_ceil(self.section_size as u64) as u32
    }
}

/// Position inside a table of sections: section index into the table, page within the section
/// and byte offset within the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Location {
    pub section: u32,
    pub page: u32,
    pub offset: u32,
}

impl Location {
    pub const fn new(section: u32, page: u32, offset: u32) -> Self {
        Self {
            section,
            page,
            offset,
        }
    }

    /// Flat flash address. Every component is range checked against the geometry and the
    /// section table, so an out of range location never turns into a write elsewhere.
    pub fn to_address(&self, geometry: &Geometry, sections: &[u32]) -> Result<u32, Error> {
        if self.page >= geometry.pages_per_section() || self.offset >= geometry.page_size {
            return Err(Error::OutOfBounds);
        }
        let base = *sections
            .get(self.section as usize)
            .ok_or(Error::OutOfBounds)?;

        self.page
            .checked_mul(geometry.page_size)
            .and_then(|it| it.checked_add(self.offset))
            .and_then(|it| it.checked_add(base))
            .ok_or(Error::OutOfBounds)
    }

    /// Inverse of `to_address`; fails if `address` is in none of the sections.
    pub fn from_address(
        geometry: &Geometry,
        sections: &[u32],
        address: u32,
    ) -> Result<Self, Error> {
        sections
            .iter()
            .position(|&base| {
                address >= base && ((address - base) as u64) < geometry.section_size as u64
            })
            .map(|section| {
                let within = address - sections[section];
                Self {
                    section: section as u32,
                    page: within / geometry.page_size,
                    offset: within % geometry.page_size,
                }
            })
            .ok_or(Error::OutOfBounds)
    }

    /// True if `len` bytes starting here end on the same page.
    pub fn fits(&self, geometry: &Geometry, len: usize) -> bool {
        self.offset as usize + len <= geometry.page_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: Geometry = Geometry {
        section_size: 2048,
        page_size: 512,
    };

    #[test]
    fn location_round_trips_through_the_section_table() {
        let sections = [0x1000, 0x1800, 0x2000];
        let location = Location::new(1, 3, 17);

        let address = location.to_address(&GEOMETRY, &sections).unwrap();
        assert_eq!(address, 0x1800 + 3 * 512 + 17);
        assert_eq!(
            Location::from_address(&GEOMETRY, &sections, address).unwrap(),
            location
        );
    }

    #[test]
    fn out_of_range_components_are_rejected() {
        let sections = [0x1000];
        assert_eq!(
            Location::new(1, 0, 0).to_address(&GEOMETRY, &sections),
            Err(Error::OutOfBounds)
        );
        assert_eq!(
            Location::new(0, 4, 0).to_address(&GEOMETRY, &sections),
            Err(Error::OutOfBounds)
        );
        assert_eq!(
            Location::new(0, 0, 512).to_address(&GEOMETRY, &sections),
            Err(Error::OutOfBounds)
        );
        assert_eq!(
            Location::from_address(&GEOMETRY, &sections, 0x1800),
            Err(Error::OutOfBounds)
        );
    }

    #[test]
    fn address_overflow_is_rejected() {
        let sections = [u32::MAX - 100];
        assert_eq!(
            Location::new(0, 1, 0).to_address(&GEOMETRY, &sections),
            Err(Error::OutOfBounds)
        );
    }

    #[test]
    fn fits_inside_page() {
        assert!(Location::new(0, 0, 500).fits(&GEOMETRY, 12));
        assert!(!Location::new(0, 0, 500).fits(&GEOMETRY, 13));
    }

    #[test]
    fn sections_for_rounds_up() {
        assert_eq!(GEOMETRY.sections_for(0), 0);
        assert_eq!(GEOMETRY.sections_for(1), 1);
        assert_eq!(GEOMETRY.sections_for(2048), 1);
        assert_eq!(GEOMETRY.sections_for(2049), 2);
    }
}
