//! Uniform read/write/erase over the two backing devices.
//!
//! Flash accesses are bounds checked and must stay inside one page: the device would wrap a
//! straddling program operation around to the start of the page and silently corrupt it.
//! Nothing is retried here; device errors surface as `FlashError` / `FramError`.

use crate::error::Error;
use crate::platform::{AlignedOps, PagedFlash};
use alloc::vec;
#[cfg(feature = "defmt")]
use defmt::trace;
use embedded_storage::Storage;

#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Region {
    /// Block erasable NOR flash, split into sections and pages
    Flash,
    /// Byte addressable ferroelectric memory
    Fram,
}

pub struct Media<F, M> {
    flash: F,
    fram: M,
}

impl<F: PagedFlash, M: Storage> Media<F, M> {
    pub fn new(flash: F, fram: M) -> Self {
        Self { flash, fram }
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn fram(&self) -> &M {
        &self.fram
    }

    pub fn fram_mut(&mut self) -> &mut M {
        &mut self.fram
    }

    pub fn into_inner(self) -> (F, M) {
        (self.flash, self.fram)
    }

    pub fn flash_capacity(&self) -> usize {
        self.flash.capacity()
    }

    pub fn fram_capacity(&self) -> usize {
        self.fram.capacity()
    }

    pub fn read(&mut self, region: Region, address: u32, buf: &mut [u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("read {}: @{:#x}[{}]", region, address, buf.len());

        #[cfg(feature = "debug-logs")]
        println!("  media: read {region}: @{address:#08x}[{}]", buf.len());

        match region {
            Region::Flash => self.read_flash(address, buf),
            Region::Fram => {
                check_range(address, buf.len(), self.fram.capacity())?;
                self.fram
                    .read(address, buf)
                    .map_err(|_| Error::FramError)
            }
        }
    }

    pub fn write(&mut self, region: Region, address: u32, data: &[u8]) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("write {}: @{:#x}[{}]", region, address, data.len());

        #[cfg(feature = "debug-logs")]
        println!("  media: write {region}: @{address:#08x}[{}]", data.len());

        match region {
            Region::Flash => self.write_flash(address, data),
            Region::Fram => {
                check_range(address, data.len(), self.fram.capacity())?;
                self.fram
                    .write(address, data)
                    .map_err(|_| Error::FramError)
            }
        }
    }

    /// Erase exactly the flash section starting at `section_address`.
    pub fn erase(&mut self, section_address: u32) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("erase: @{:#x}", section_address);

        #[cfg(feature = "debug-logs")]
        println!("  media: erase: @{section_address:#08x}");

        if !F::is_section_aligned(section_address) {
            return Err(Error::AlignmentViolation);
        }
        check_range(section_address, F::ERASE_SIZE, self.flash.capacity())?;

        self.flash
            .erase(section_address, section_address + F::ERASE_SIZE as u32)
            .map_err(|_| Error::FlashError)
    }

    fn check_flash_access(&self, address: u32, len: usize) -> Result<(), Error> {
        check_range(address, len, self.flash.capacity())?;
        if F::straddles_page(address, len) {
            return Err(Error::AlignmentViolation);
        }
        Ok(())
    }

    fn read_flash(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Error> {
        self.check_flash_access(address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }

        let start = F::align_read_floor(address as usize);
        let end = F::align_read_ceil(address as usize + buf.len());
        if start == address as usize && end == address as usize + buf.len() {
            return self
                .flash
                .read(address, buf)
                .map_err(|_| Error::FlashError);
        }

        // page size is a multiple of READ_SIZE, so the widened window stays inside the page
        let mut window = vec![0u8; end - start];
        self.flash
            .read(start as u32, &mut window)
            .map_err(|_| Error::FlashError)?;
        let skip = address as usize - start;
        buf.copy_from_slice(&window[skip..skip + buf.len()]);
        Ok(())
    }

    fn write_flash(&mut self, address: u32, data: &[u8]) -> Result<(), Error> {
        self.check_flash_access(address, data.len())?;
        if data.is_empty() {
            return Ok(());
        }

        let start = F::align_write_floor(address as usize);
        let end = F::align_write_ceil(address as usize + data.len());
        if start == address as usize && end == address as usize + data.len() {
            return self
                .flash
                .write(address, data)
                .map_err(|_| Error::FlashError);
        }

        // programming 0xFF leaves NOR cells untouched, so padding both ends is harmless
        let mut window = vec![0xFFu8; end - start];
        let skip = address as usize - start;
        window[skip..skip + data.len()].copy_from_slice(data);
        self.flash
            .write(start as u32, &window)
            .map_err(|_| Error::FlashError)
    }
}

fn check_range(address: u32, len: usize, capacity: usize) -> Result<(), Error> {
    match (address as usize).checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(Error::OutOfBounds),
    }
}
