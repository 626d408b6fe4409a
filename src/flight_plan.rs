//! Flight plan store: fixed size command records in flash, indexed by the TLB.
//!
//! Records are appended sequentially into the active section. Deleting only frees the TLB slot;
//! the record stays in flash until the section fills up and gets compacted.
//!
//! The TLB in memory only changes after the backup took the change. Crash windows are accepted
//! as is:
//! - an insert persists the TLB slot before the counter and the record. A slot sitting exactly
//!   at the persisted counter is taken as such an interrupted insert on load: the counter is
//!   advanced past it and the slot reads back as an all 0xFF record
//! - a compaction erases the section before the live records are rewritten, an interruption
//!   loses the records not yet copied back. In process this latches `Error::Faulted` until
//!   `reset`; across a power cycle it is not detected.

use crate::address::{Geometry, Location};
use crate::error::Error;
use crate::layout::{BackupLocation, Layout};
use crate::media::{Media, Region};
use crate::platform::PagedFlash;
use crate::tlb::{TIME_NULL, Tlb, TlbEntry};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
#[cfg(feature = "defmt")]
use defmt::{error, trace, warn};
use embedded_storage::Storage;

/// Command name and argument capacity in bytes, not NUL terminated when full
pub const MAX_TEXT_LENGTH: usize = 248;
/// One record per flash page
pub const RECORD_SIZE: usize = 512;

const HEADER_SIZE: usize = 4 * size_of::<i32>();
const COMMAND_OFFSET: usize = HEADER_SIZE;
const ARGS_OFFSET: usize = COMMAND_OFFSET + MAX_TEXT_LENGTH;

const _: () = assert!(
    HEADER_SIZE + 2 * MAX_TEXT_LENGTH == RECORD_SIZE,
    "Flight plan record must fill exactly one flash page"
);

/// A NUL padded string of at most `MAX_TEXT_LENGTH` bytes.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Text([u8; MAX_TEXT_LENGTH]);

impl Text {
    /// Copies `src`, cutting it at the last char boundary that fits.
    ///
    /// Usage: `Text::new("set_mode")`
    pub fn new(src: &str) -> Self {
        let mut end = src.len().min(MAX_TEXT_LENGTH);
        while !src.is_char_boundary(end) {
            end -= 1;
        }

        let mut dst = [0u8; MAX_TEXT_LENGTH];
        dst[..end].copy_from_slice(&src.as_bytes()[..end]);
        Self(dst)
    }

    pub const fn as_bytes(&self) -> &[u8; MAX_TEXT_LENGTH] {
        &self.0
    }

    /// Bytes up to the first NUL. Flash content read back after a crash may not be UTF-8,
    /// in which case the valid prefix is returned.
    pub fn as_str(&self) -> &str {
        let end = self.0.iter().position(|&it| it == 0).unwrap_or(MAX_TEXT_LENGTH);
        match core::str::from_utf8(&self.0[..end]) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&self.0[..e.valid_up_to()]).unwrap_or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_str().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl Default for Text {
    fn default() -> Self {
        Self([0u8; MAX_TEXT_LENGTH])
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Text(\"")?;
        for c in self.as_str().chars() {
            write!(f, "{}", c.escape_debug())?;
        }
        write!(f, "\")")
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Text {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Text({=str})", self.as_str())
    }
}

/// A scheduled command.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlightPlanEntry {
    /// Unix time of the next execution, also the lookup key
    pub time: i32,
    /// Executions per periodic cycle
    pub executions: i32,
    /// Seconds between executions, 0 for one shot commands
    pub period: i32,
    /// Node executing the command
    pub node: i32,
    pub command: Text,
    pub args: Text,
}

impl FlightPlanEntry {
    pub fn new(time: i32, command: &str, args: &str, executions: i32, period: i32, node: i32) -> Self {
        Self {
            time,
            executions,
            period,
            node,
            command: Text::new(command),
            args: Text::new(args),
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut raw = [0u8; RECORD_SIZE];
        raw[0..4].copy_from_slice(&self.time.to_le_bytes());
        raw[4..8].copy_from_slice(&self.executions.to_le_bytes());
        raw[8..12].copy_from_slice(&self.period.to_le_bytes());
        raw[12..16].copy_from_slice(&self.node.to_le_bytes());
        raw[COMMAND_OFFSET..ARGS_OFFSET].copy_from_slice(self.command.as_bytes());
        raw[ARGS_OFFSET..].copy_from_slice(self.args.as_bytes());
        raw
    }

    pub fn from_bytes(raw: &[u8; RECORD_SIZE]) -> Self {
        let field = |at: usize| i32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]]);
        let mut command = [0u8; MAX_TEXT_LENGTH];
        command.copy_from_slice(&raw[COMMAND_OFFSET..ARGS_OFFSET]);
        let mut args = [0u8; MAX_TEXT_LENGTH];
        args.copy_from_slice(&raw[ARGS_OFFSET..]);

        Self {
            time: field(0),
            executions: field(4),
            period: field(8),
            node: field(12),
            command: Text(command),
            args: Text(args),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlightPlanStatistics {
    /// Slots holding a scheduled entry
    pub live: usize,
    /// Slots available for inserts
    pub free: usize,
    /// Records written into the active section since its last erase
    pub used_records: u32,
    /// Deleted records still occupying the active section
    pub dead_records: u32,
    pub records_per_section: u32,
    pub sections: usize,
}

pub(crate) struct FlightPlan {
    tlb: Tlb,
    sections: Vec<u32>,
    geometry: Geometry,
    backup: BackupLocation,
    records_per_section: u32,
    faulted: bool,
}

impl FlightPlan {
    /// Loads and validates the TLB backup, or wipes the store if `drop` is set.
    pub(crate) fn open<F: PagedFlash, M: Storage>(
        media: &mut Media<F, M>,
        layout: &Layout,
        capacity: usize,
        drop: bool,
    ) -> Result<Self, Error> {
        #[cfg(feature = "defmt")]
        trace!("flight plan open: capacity {}, drop {}", capacity, drop);

        let mut flight_plan = Self {
            tlb: Tlb::new(capacity),
            sections: layout.flight_plan.clone(),
            geometry: layout.geometry,
            backup: layout.tlb_backup,
            records_per_section: layout.geometry.section_size / RECORD_SIZE as u32,
            faulted: false,
        };

        if drop {
            flight_plan.reset(media)?;
        } else {
            flight_plan.load_tlb(media)?;
            if flight_plan.validate_tlb()? {
                let used = flight_plan.tlb.used() + 1;
                let counter = (flight_plan.tlb.metadata_index(), TlbEntry::counter(used));
                flight_plan.persist(media, &[counter])?;
                flight_plan.tlb.set_used(used);
            }
        }

        Ok(flight_plan)
    }

    pub(crate) fn tlb(&self) -> &Tlb {
        &self.tlb
    }

    pub(crate) fn records_per_section(&self) -> u32 {
        self.records_per_section
    }

    pub(crate) fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Returns the TLB index the entry was stored at.
    pub(crate) fn insert<F: PagedFlash, M: Storage>(
        &mut self,
        media: &mut Media<F, M>,
        entry: &FlightPlanEntry,
    ) -> Result<usize, Error> {
        #[cfg(feature = "defmt")]
        trace!("insert: time {}", entry.time);

        #[cfg(feature = "debug-logs")]
        println!("flight plan: insert {entry:?}");

        if self.faulted {
            return Err(Error::Faulted);
        }
        if entry.time < 0 {
            return Err(Error::InvalidTimestamp);
        }
        if self.tlb.find(entry.time).is_some() {
            return Err(Error::DuplicateTimestamp);
        }

        if self.tlb.used() >= self.records_per_section {
            self.compact(media)?;
        }

        let index = self.tlb.find_free().ok_or(Error::OutOfSpace)?;
        // every slot is live and they fill the whole section
        if self.tlb.used() >= self.records_per_section {
            return Err(Error::OutOfSpace);
        }

        let address = self.record_address(self.tlb.used())?;
        self.update_tlb(
            media,
            index,
            TlbEntry {
                address,
                timestamp: entry.time,
            },
        )?;
        if let Err(e) = media.write(Region::Flash, address, &entry.to_bytes()) {
            // the record address stays consumed, only the slot is given back
            self.revert(media, index, TlbEntry::FREE);
            return Err(e);
        }

        #[cfg(feature = "debug-logs")]
        println!("flight plan: stored time {} in slot {index} @{address:#08x}", entry.time);

        Ok(index)
    }

    /// Exact match only. `NotFound` is the regular "nothing scheduled" answer.
    pub(crate) fn lookup(&self, timestamp: i32) -> Result<usize, Error> {
        if timestamp == TIME_NULL {
            return Err(Error::NotFound);
        }
        self.tlb.find(timestamp).ok_or(Error::NotFound)
    }

    pub(crate) fn get<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        index: usize,
    ) -> Result<FlightPlanEntry, Error> {
        #[cfg(feature = "defmt")]
        trace!("get: slot {}", index);

        let slot = self.tlb.get(index).ok_or(Error::IndexOutOfBounds)?;
        if slot.is_free() {
            return Err(Error::NotFound);
        }

        let mut raw = [0u8; RECORD_SIZE];
        media.read(Region::Flash, slot.address, &mut raw)?;
        Ok(FlightPlanEntry::from_bytes(&raw))
    }

    /// Frees the TLB slot; the record stays in flash until the next compaction.
    pub(crate) fn delete<F: PagedFlash, M: Storage>(
        &mut self,
        media: &mut Media<F, M>,
        index: usize,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("delete: slot {}", index);

        if self.faulted {
            return Err(Error::Faulted);
        }

        let slot = self.tlb.get(index).ok_or(Error::IndexOutOfBounds)?;
        if slot.is_free() {
            #[cfg(feature = "defmt")]
            warn!("delete: slot {} already free", index);
            return Err(Error::NotFound);
        }

        self.persist(media, &[(index, TlbEntry::FREE)])?;
        self.tlb.set(index, TlbEntry::FREE);
        Ok(())
    }

    /// Erases every flight plan section and persists an empty TLB.
    pub(crate) fn reset<F: PagedFlash, M: Storage>(
        &mut self,
        media: &mut Media<F, M>,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("reset");

        #[cfg(feature = "debug-logs")]
        println!("flight plan: reset {} sections", self.sections.len());

        for &section in &self.sections {
            media.erase(section)?;
        }

        self.tlb = Tlb::new(self.tlb.capacity());
        self.dump_tlb(media)?;
        self.faulted = false;
        Ok(())
    }

    pub(crate) fn statistics(&self) -> FlightPlanStatistics {
        let live = self.tlb.live_count();
        FlightPlanStatistics {
            live,
            free: self.tlb.capacity() - live,
            used_records: self.tlb.used(),
            dead_records: self.tlb.used().saturating_sub(live as u32),
            records_per_section: self.records_per_section,
            sections: self.sections.len(),
        }
    }

    /// Copies the live records of the active section to its front and drops deleted ones.
    pub(crate) fn compact<F: PagedFlash, M: Storage>(
        &mut self,
        media: &mut Media<F, M>,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("compact");

        #[cfg(feature = "debug-logs")]
        println!("flight plan: compact, {} records used", self.tlb.used());

        let section = *self.sections.first().ok_or(Error::OutOfBounds)?;
        let section_bytes = self.records_per_section as usize * RECORD_SIZE;

        let mut scratch: Vec<u8> = Vec::new();
        scratch
            .try_reserve_exact(section_bytes)
            .map_err(|_| Error::AllocationFailure)?;
        scratch.resize(section_bytes, 0);

        // record size equals the page size, one read per page
        for (index, record) in scratch.chunks_exact_mut(RECORD_SIZE).enumerate() {
            media.read(
                Region::Flash,
                section + (index * RECORD_SIZE) as u32,
                record,
            )?;
        }

        match self.rebuild(media, section, &scratch) {
            Ok(()) => Ok(()),
            Err(e) => {
                #[cfg(feature = "defmt")]
                error!("compact: interrupted after erase: {}", e);

                #[cfg(feature = "debug-logs")]
                println!("flight plan: compact interrupted after erase: {e:?}");

                self.faulted = true;
                Err(e)
            }
        }
    }

    fn rebuild<F: PagedFlash, M: Storage>(
        &mut self,
        media: &mut Media<F, M>,
        section: u32,
        scratch: &[u8],
    ) -> Result<(), Error> {
        media.erase(section)?;
        self.tlb.set_used(0);

        for index in 0..self.tlb.capacity() {
            let slot = match self.tlb.get(index) {
                Some(slot) if !slot.is_free() => *slot,
                _ => continue,
            };

            let old = Location::from_address(&self.geometry, &self.sections[..1], slot.address)?;
            let start = old.page as usize * RECORD_SIZE;
            let record = &scratch[start..start + RECORD_SIZE];

            let address = self.record_address(self.tlb.used())?;
            self.update_tlb(
                media,
                index,
                TlbEntry {
                    address,
                    timestamp: slot.timestamp,
                },
            )?;
            media.write(Region::Flash, address, record)?;
        }

        self.dump_tlb(media)
    }

    /// Address of the n-th record written since the last erase.
    fn record_address(&self, n: u32) -> Result<u32, Error> {
        Location::new(n / self.records_per_section, n % self.records_per_section, 0)
            .to_address(&self.geometry, &self.sections)
    }

    /// Persists the slot, then counts the record as used and persists the counter. Memory follows
    /// the backup: a failed step leaves the slot as it was before.
    fn update_tlb<F: PagedFlash, M: Storage>(
        &mut self,
        media: &mut Media<F, M>,
        index: usize,
        entry: TlbEntry,
    ) -> Result<(), Error> {
        let previous = *self.tlb.get(index).ok_or(Error::IndexOutOfBounds)?;
        self.persist(media, &[(index, entry)])?;
        self.tlb.set(index, entry);

        let used = self.tlb.used() + 1;
        let counter = (self.tlb.metadata_index(), TlbEntry::counter(used));
        if let Err(e) = self.persist(media, &[counter]) {
            self.revert(media, index, previous);
            return Err(e);
        }
        self.tlb.set_used(used);
        Ok(())
    }

    /// Restores a slot after a failed update. If the backup refuses that too, memory and backup
    /// can no longer be trusted to agree and the store latches `faulted`.
    fn revert<F: PagedFlash, M: Storage>(
        &mut self,
        media: &mut Media<F, M>,
        index: usize,
        previous: TlbEntry,
    ) {
        match self.persist(media, &[(index, previous)]) {
            Ok(()) => self.tlb.set(index, previous),
            Err(_e) => {
                #[cfg(feature = "defmt")]
                error!("revert: slot {} not restored: {}", index, _e);

                #[cfg(feature = "debug-logs")]
                println!("flight plan: slot {index} not restored: {_e:?}");

                self.faulted = true;
            }
        }
    }

    fn load_tlb<F: PagedFlash, M: Storage>(&mut self, media: &mut Media<F, M>) -> Result<(), Error> {
        let mut raw = vec![0u8; Tlb::encoded_len(self.tlb.capacity())];
        match self.backup {
            BackupLocation::Fram(address) => media.read(Region::Fram, address, &mut raw)?,
            BackupLocation::Flash(address) => {
                let page = self.geometry.page_size as usize;
                for (index, chunk) in raw.chunks_mut(page).enumerate() {
                    media.read(Region::Flash, address + (index * page) as u32, chunk)?;
                }
            }
        }

        self.tlb = Tlb::from_bytes(self.tlb.capacity(), &raw)?;
        Ok(())
    }

    fn dump_tlb<F: PagedFlash, M: Storage>(&self, media: &mut Media<F, M>) -> Result<(), Error> {
        match self.backup {
            BackupLocation::Fram(address) => media.write(Region::Fram, address, &self.tlb.to_bytes()),
            BackupLocation::Flash(address) => self.write_flash_backup(media, address, &self.tlb.to_bytes()),
        }
    }

    /// Writes `changes` on top of the current table to the backup. `self.tlb` is left as is, the
    /// caller commits once this succeeded. The FRAM backup is written slot by slot, the flash
    /// backup is always rewritten as a whole.
    fn persist<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        changes: &[(usize, TlbEntry)],
    ) -> Result<(), Error> {
        match self.backup {
            BackupLocation::Fram(address) => {
                for (index, entry) in changes {
                    let slot = address + (index * TlbEntry::ENCODED_SIZE) as u32;
                    media.write(Region::Fram, slot, &entry.to_bytes())?;
                }
                Ok(())
            }
            BackupLocation::Flash(address) => {
                let mut raw = self.tlb.to_bytes();
                for (index, entry) in changes {
                    let at = index * TlbEntry::ENCODED_SIZE;
                    raw[at..at + TlbEntry::ENCODED_SIZE].copy_from_slice(&entry.to_bytes());
                }
                self.write_flash_backup(media, address, &raw)
            }
        }
    }

    fn write_flash_backup<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        address: u32,
        raw: &[u8],
    ) -> Result<(), Error> {
        media.erase(address)?;
        let page = self.geometry.page_size as usize;
        for (index, chunk) in raw.chunks(page).enumerate() {
            media.write(Region::Flash, address + (index * page) as u32, chunk)?;
        }
        Ok(())
    }

    /// Every live slot has to point at a distinct record below the used counter of the
    /// active section, otherwise the backup does not belong to this layout. One slot exactly at
    /// the counter is an insert cut between its slot and counter update; returns true for it.
    fn validate_tlb(&self) -> Result<bool, Error> {
        let used = self.tlb.used();
        if used > self.records_per_section {
            return Err(Error::CorruptedBackup);
        }

        let mut interrupted = false;
        let mut seen = vec![false; self.records_per_section as usize];
        let mut times: Vec<i32> = Vec::with_capacity(self.tlb.capacity());
        for (_, slot) in self.tlb.live() {
            let location = Location::from_address(&self.geometry, &self.sections[..1], slot.address)
                .map_err(|_| Error::CorruptedBackup)?;
            let record = location.page as usize;
            if slot.timestamp < 0
                || location.offset != 0
                || location.page > used
                || seen[record]
                || times.contains(&slot.timestamp)
            {
                return Err(Error::CorruptedBackup);
            }
            if location.page == used {
                if interrupted {
                    return Err(Error::CorruptedBackup);
                }
                interrupted = true;
            }
            seen[record] = true;
            times.push(slot.timestamp);
        }

        Ok(interrupted)
    }
}
