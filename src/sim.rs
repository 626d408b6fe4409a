//! RAM backed devices for host side tests and simulation.
//!
//! `SimFlash` behaves like a paged NOR flash: erase sets a section to 0xFF, a program operation
//! can only clear bits and wraps around to the start of the page when it runs past its end.
//! Both devices log every operation and can be told to fail after a number of them.

use crate::platform::PagedFlash;
use alloc::vec;
use alloc::vec::Vec;
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use embedded_storage::{ReadStorage, Storage};

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct SimError;

impl NorFlashError for SimError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

/// `SECTION` bytes per erase block, `PAGE` bytes per program page.
pub struct SimFlash<const SECTION: usize, const PAGE: usize> {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
}

impl<const SECTION: usize, const PAGE: usize> SimFlash<SECTION, PAGE> {
    pub fn new(sections: usize) -> Self {
        Self::new_with_fault(sections, usize::MAX)
    }

    pub fn new_with_fault(sections: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0xffu8; SECTION * sections],
            fail_after_operation,
            operations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    /// Fail every operation after the next `operations`.
    pub fn fail_in(&mut self, operations: usize) {
        self.fail_after_operation = self.operations.len() + operations;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    fn check_fault(&self) -> Result<(), SimError> {
        if self.operations.len() >= self.fail_after_operation {
            #[cfg(feature = "debug-logs")]
            println!("    flash: FAULT");
            return Err(SimError);
        }
        Ok(())
    }
}

impl<const SECTION: usize, const PAGE: usize> ErrorType for SimFlash<SECTION, PAGE> {
    type Error = SimError;
}

impl<const SECTION: usize, const PAGE: usize> ReadNorFlash for SimFlash<SECTION, PAGE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        #[cfg(feature = "debug-logs")]
        println!(
            "    flash: read:  0x{offset:06X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );

        self.check_fault()?;
        let offset = offset as usize;
        let source = self
            .buf
            .get(offset..offset + bytes.len())
            .ok_or(SimError)?;

        self.operations.push(Operation::Read {
            offset: offset as u32,
            len: bytes.len(),
        });
        bytes.copy_from_slice(source);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const SECTION: usize, const PAGE: usize> NorFlash for SimFlash<SECTION, PAGE> {
    const WRITE_SIZE: usize = 1;

    const ERASE_SIZE: usize = SECTION;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        #[cfg(feature = "debug-logs")]
        println!(
            "    flash: erase: {from:06X} - {to:06X} #{:>2}",
            self.operations.len()
        );

        self.check_fault()?;
        if !(from as usize).is_multiple_of(SECTION)
            || !(to as usize).is_multiple_of(SECTION)
            || from > to
            || to as usize > self.buf.len()
        {
            return Err(SimError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });
        self.buf[from as usize..to as usize].fill(0xff);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        #[cfg(feature = "debug-logs")]
        println!(
            "    flash: write: 0x{offset:06X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );

        self.check_fault()?;
        let offset = offset as usize;
        if offset >= self.buf.len() {
            return Err(SimError);
        }

        self.operations.push(Operation::Write {
            offset: offset as u32,
            len: bytes.len(),
        });

        // the program buffer wraps inside the page, it never carries into the next one
        let page_start = offset - offset % PAGE;
        for (i, &val) in bytes.iter().enumerate() {
            let address = page_start + (offset % PAGE + i) % PAGE;
            self.buf[address] &= val;
        }
        Ok(())
    }
}

impl<const SECTION: usize, const PAGE: usize> PagedFlash for SimFlash<SECTION, PAGE> {
    const PAGE_SIZE: usize = PAGE;
}

/// Byte addressable memory, zero filled like a fresh FRAM part.
pub struct SimFram {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    pub operations: Vec<Operation>,
}

impl SimFram {
    pub fn new(size: usize) -> Self {
        Self::new_with_fault(size, usize::MAX)
    }

    pub fn new_with_fault(size: usize, fail_after_operation: usize) -> Self {
        Self {
            buf: vec![0u8; size],
            fail_after_operation,
            operations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
    }

    /// Fail every operation after the next `operations`.
    pub fn fail_in(&mut self, operations: usize) {
        self.fail_after_operation = self.operations.len() + operations;
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, SimError> {
        if self.operations.len() >= self.fail_after_operation {
            #[cfg(feature = "debug-logs")]
            println!("    fram: FAULT");
            return Err(SimError);
        }

        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.buf.len() => Ok(start..end),
            _ => Err(SimError),
        }
    }
}

impl ReadStorage for SimFram {
    type Error = SimError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });
        bytes.copy_from_slice(&self.buf[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl Storage for SimFram {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let range = self.range(offset, bytes.len())?;
        self.operations.push(Operation::Write {
            offset,
            len: bytes.len(),
        });
        self.buf[range].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_wraps_inside_the_page() {
        let mut flash = SimFlash::<64, 16>::new(1);
        flash.write(12, &[0u8; 8]).unwrap();

        assert_eq!(&flash.buf[0..4], &[0u8; 4]);
        assert_eq!(&flash.buf[4..12], &[0xffu8; 8]);
        assert_eq!(&flash.buf[12..16], &[0u8; 4]);
        assert_eq!(flash.buf[16], 0xff);
    }

    #[test]
    fn program_only_clears_bits() {
        let mut flash = SimFlash::<64, 16>::new(1);
        flash.write(0, &[0b1010_1010]).unwrap();
        flash.write(0, &[0b0110_0110]).unwrap();
        assert_eq!(flash.buf[0], 0b0010_0010);

        flash.erase(0, 64).unwrap();
        assert_eq!(flash.buf[0], 0xff);
    }

    #[test]
    fn faults_after_configured_operations() {
        let mut fram = SimFram::new_with_fault(16, 1);
        fram.write(0, &[1, 2]).unwrap();
        assert_eq!(fram.write(2, &[3]), Err(SimError));
        assert_eq!(fram.operations.len(), 1);
    }
}
