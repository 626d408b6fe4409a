//! Address table of the repository.
//!
//! ```text
//! flash:  [flash_base] [TLB backup section]? [flight plan sections] [payload 0 sections] ...
//! fram:   [status copy 0] [status copy 1]? [status copy 2]? ... [TLB backup]?
//! ```
//!
//! Everything is derived from the `Config` and the flash geometry, computed once per `init`.

use crate::address::Geometry;
use crate::config::{Config, TlbBackup};
use crate::error::Error;
use crate::flight_plan::RECORD_SIZE;
use crate::status::VALUE_SIZE;
use crate::tlb::Tlb;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BackupLocation {
    Fram(u32),
    Flash(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub geometry: Geometry,
    pub tlb_backup: BackupLocation,
    pub flight_plan: Vec<u32>,
    pub payloads: Vec<u32>,
    pub sections_per_payload: usize,
    /// Bytes of FRAM used by the status variables, starting at 0
    pub status_bytes: u32,
    /// One past the last flash byte owned by the repository
    pub end: u32,
}

impl Layout {
    pub(crate) fn compute(
        geometry: Geometry,
        config: &Config,
        flash_capacity: usize,
        fram_capacity: usize,
    ) -> Result<Self, Error> {
        if config.max_flight_plan_entries == 0
            || !(config.flash_base as u64).is_multiple_of(geometry.section_size as u64)
            || (!config.payloads.is_empty() && config.sections_per_payload == 0)
        {
            return Err(Error::InvalidLayout);
        }

        let section = geometry.section_size as u64;
        let tlb_bytes = Tlb::encoded_len(config.max_flight_plan_entries) as u64;
        let status_bytes = (config.status_copies() as u64)
            .checked_mul(config.status_variables as u64)
            .and_then(|it| it.checked_mul(VALUE_SIZE as u64))
            .ok_or(Error::InvalidLayout)?;

        let mut cursor = config.flash_base as u64;
        let tlb_backup = match config.tlb_backup {
            TlbBackup::Fram => {
                let start = (fram_capacity as u64)
                    .checked_sub(tlb_bytes)
                    .ok_or(Error::InvalidLayout)?;
                if status_bytes > start {
                    return Err(Error::InvalidLayout);
                }
                BackupLocation::Fram(start as u32)
            }
            TlbBackup::Flash => {
                if tlb_bytes > section || status_bytes > fram_capacity as u64 {
                    return Err(Error::InvalidLayout);
                }
                let start = cursor;
                cursor += section;
                BackupLocation::Flash(start as u32)
            }
        };

        let flight_plan_sections = geometry.sections_for(
            config.max_flight_plan_entries as u64 * RECORD_SIZE as u64,
        ) as u64;
        let flight_plan_start = cursor;
        cursor += flight_plan_sections * section;

        let payload_sections = (config.payloads.len() as u64)
            .checked_mul(config.sections_per_payload as u64)
            .ok_or(Error::InvalidLayout)?;
        let payload_start = cursor;
        cursor = payload_sections
            .checked_mul(section)
            .and_then(|it| it.checked_add(cursor))
            .ok_or(Error::InvalidLayout)?;

        if cursor > flash_capacity as u64 || cursor > u32::MAX as u64 {
            return Err(Error::InvalidLayout);
        }

        Ok(Self {
            geometry,
            tlb_backup,
            flight_plan: (0..flight_plan_sections)
                .map(|i| (flight_plan_start + i * section) as u32)
                .collect(),
            payloads: (0..payload_sections)
                .map(|i| (payload_start + i * section) as u32)
                .collect(),
            sections_per_payload: config.sections_per_payload,
            status_bytes: status_bytes as u32,
            end: cursor as u32,
        })
    }

    /// Sections reserved for one payload, in ascending address order.
    pub fn payload_sections(&self, payload: usize) -> Option<&[u32]> {
        let start = payload.checked_mul(self.sections_per_payload)?;
        self.payloads
            .get(start..start.checked_add(self.sections_per_payload)?)
    }

    pub fn section_count(&self) -> usize {
        let tlb = match self.tlb_backup {
            BackupLocation::Flash(_) => 1,
            BackupLocation::Fram(_) => 0,
        };
        tlb + self.flight_plan.len() + self.payloads.len()
    }
}
