//! Status variables: one 4 byte slot per index at the start of the FRAM.
//!
//! With triple redundancy the copies of index `i` live at `i`, `i + K` and `i + 2K`; reads
//! return the value at least two copies agree on. If all three differ the first copy is
//! returned and the disagreement is logged, the corruption is not repaired.

use crate::error::Error;
use crate::media::{Media, Region};
use crate::platform::PagedFlash;
#[cfg(feature = "defmt")]
use defmt::{error, trace};
use embedded_storage::Storage;

pub const VALUE_SIZE: usize = size_of::<u32>();

pub(crate) struct StatusTable {
    variables: usize,
    copies: usize,
}

impl StatusTable {
    pub(crate) fn new(variables: usize, copies: usize) -> Self {
        Self { variables, copies }
    }

    pub(crate) fn variables(&self) -> usize {
        self.variables
    }

    fn address(&self, index: usize, copy: usize) -> u32 {
        ((copy * self.variables + index) * VALUE_SIZE) as u32
    }

    pub(crate) fn read_bits<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        index: usize,
    ) -> Result<u32, Error> {
        #[cfg(feature = "defmt")]
        trace!("read status: {}", index);

        if index >= self.variables {
            return Err(Error::IndexOutOfBounds);
        }

        let mut copies = [0u32; 3];
        for (copy, value) in copies.iter_mut().enumerate().take(self.copies) {
            let mut raw = [0u8; VALUE_SIZE];
            media.read(Region::Fram, self.address(index, copy), &mut raw)?;
            *value = u32::from_le_bytes(raw);
        }

        if self.copies < 3 {
            return Ok(copies[0]);
        }

        let [first, second, third] = copies;
        match majority(first, second, third) {
            Some(value) => Ok(value),
            None => {
                #[cfg(feature = "defmt")]
                error!(
                    "status {}: copies disagree: {:#x} {:#x} {:#x}",
                    index, first, second, third
                );

                #[cfg(feature = "debug-logs")]
                println!("status: index {index}: copies disagree: {first:#x} {second:#x} {third:#x}");

                Ok(first)
            }
        }
    }

    pub(crate) fn write_bits<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        index: usize,
        bits: u32,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write status: {} = {:#x}", index, bits);

        if index >= self.variables {
            return Err(Error::IndexOutOfBounds);
        }

        for copy in 0..self.copies {
            media.write(Region::Fram, self.address(index, copy), &bits.to_le_bytes())?;
        }
        Ok(())
    }
}

/// The value shared by at least two of the three copies.
pub fn majority(first: u32, second: u32, third: u32) -> Option<u32> {
    if first == second || first == third {
        Some(first)
    } else if second == third {
        Some(second)
    } else {
        None
    }
}
