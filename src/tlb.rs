//! Translation lookaside buffer of the flight plan.
//!
//! Maps the execution time of every live flight plan entry to the flash address of its record.
//! The last slot holds metadata: its address field counts the records written into the active
//! flash section since the last erase.

use crate::error::Error;
use alloc::vec;
use alloc::vec::Vec;

/// Execution time of a free slot
pub const TIME_NULL: i32 = -1;
/// Address of a free slot
pub const ADDRESS_NULL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TlbEntry {
    pub address: u32,
    pub timestamp: i32,
}

impl TlbEntry {
    /// `{address: u32, timestamp: i32}`, little endian
    pub const ENCODED_SIZE: usize = 8;

    pub const FREE: TlbEntry = TlbEntry {
        address: ADDRESS_NULL,
        timestamp: TIME_NULL,
    };

    /// Content of the metadata slot for `used` records.
    pub const fn counter(used: u32) -> TlbEntry {
        TlbEntry {
            address: used,
            timestamp: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.timestamp == TIME_NULL
    }

    pub fn to_bytes(self) -> [u8; Self::ENCODED_SIZE] {
        let mut raw = [0u8; Self::ENCODED_SIZE];
        raw[..4].copy_from_slice(&self.address.to_le_bytes());
        raw[4..].copy_from_slice(&self.timestamp.to_le_bytes());
        raw
    }

    pub fn from_bytes(raw: [u8; Self::ENCODED_SIZE]) -> Self {
        let [a0, a1, a2, a3, t0, t1, t2, t3] = raw;
        Self {
            address: u32::from_le_bytes([a0, a1, a2, a3]),
            timestamp: i32::from_le_bytes([t0, t1, t2, t3]),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tlb {
    entries: Vec<TlbEntry>,
}

impl Tlb {
    /// All slots free, used counter at zero.
    pub fn new(capacity: usize) -> Self {
        let mut entries = vec![TlbEntry::FREE; capacity + 1];
        entries[capacity] = TlbEntry::counter(0);
        Self { entries }
    }

    pub fn encoded_len(capacity: usize) -> usize {
        (capacity + 1) * TlbEntry::ENCODED_SIZE
    }

    pub fn from_bytes(capacity: usize, raw: &[u8]) -> Result<Self, Error> {
        if raw.len() != Self::encoded_len(capacity) {
            return Err(Error::CorruptedBackup);
        }

        let entries = raw
            .chunks_exact(TlbEntry::ENCODED_SIZE)
            .map(|chunk| {
                let mut buf = [0u8; TlbEntry::ENCODED_SIZE];
                buf.copy_from_slice(chunk);
                TlbEntry::from_bytes(buf)
            })
            .collect();
        Ok(Self { entries })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.entries.iter().flat_map(|it| it.to_bytes()).collect()
    }

    /// Number of flight plan slots, without the metadata slot
    pub fn capacity(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn metadata_index(&self) -> usize {
        self.capacity()
    }

    pub fn get(&self, index: usize) -> Option<&TlbEntry> {
        self.entries[..self.capacity()].get(index)
    }

    pub(crate) fn set(&mut self, index: usize, entry: TlbEntry) {
        self.entries[index] = entry;
    }

    /// Records written into the active section since its last erase
    pub fn used(&self) -> u32 {
        self.entries[self.capacity()].address
    }

    pub(crate) fn set_used(&mut self, used: u32) {
        let index = self.capacity();
        self.entries[index] = TlbEntry::counter(used);
    }

    /// Linear scan for an exact timestamp match, metadata slot excluded.
    pub fn find(&self, timestamp: i32) -> Option<usize> {
        self.entries[..self.capacity()]
            .iter()
            .position(|it| it.timestamp == timestamp)
    }

    pub fn find_free(&self) -> Option<usize> {
        self.find(TIME_NULL)
    }

    pub fn live(&self) -> impl Iterator<Item = (usize, &TlbEntry)> {
        self.entries[..self.capacity()]
            .iter()
            .enumerate()
            .filter(|(_, it)| !it.is_free())
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }
}
