use crate::payload::PayloadSchema;
use alloc::vec::Vec;

/// Where the flight plan TLB is backed up.
#[derive(strum::Display, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TlbBackup {
    /// At the end of the FRAM, rewritten one slot at a time
    Fram,
    /// In a dedicated flash section in front of the flight plan, erased and rewritten as a whole
    Flash,
}

/// Capacities of the repository. Any change to these invalidates what is already persisted
/// because every base address is derived from them.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub max_flight_plan_entries: usize,
    /// Number of distinct status variables (K)
    pub status_variables: usize,
    /// Keep three copies of every status variable at `i`, `i + K` and `i + 2K`
    pub triple_redundancy: bool,
    pub payloads: Vec<PayloadSchema>,
    pub sections_per_payload: usize,
    /// First flash byte owned by the repository, must be section aligned
    pub flash_base: u32,
    pub tlb_backup: TlbBackup,
    /// Status variable counting scheduled flight plan entries
    pub queue_variable: Option<usize>,
}

impl Config {
    pub fn new(max_flight_plan_entries: usize, status_variables: usize) -> Self {
        Self {
            max_flight_plan_entries,
            status_variables,
            triple_redundancy: false,
            payloads: Vec::new(),
            sections_per_payload: 1,
            flash_base: 0,
            tlb_backup: TlbBackup::Fram,
            queue_variable: None,
        }
    }

    pub fn with_triple_redundancy(mut self, enabled: bool) -> Self {
        self.triple_redundancy = enabled;
        self
    }

    pub fn with_payloads(mut self, payloads: Vec<PayloadSchema>, sections_per_payload: usize) -> Self {
        self.payloads = payloads;
        self.sections_per_payload = sections_per_payload;
        self
    }

    pub fn with_flash_base(mut self, flash_base: u32) -> Self {
        self.flash_base = flash_base;
        self
    }

    pub fn with_tlb_backup(mut self, tlb_backup: TlbBackup) -> Self {
        self.tlb_backup = tlb_backup;
        self
    }

    pub fn with_queue_variable(mut self, index: usize) -> Self {
        self.queue_variable = Some(index);
        self
    }

    pub(crate) fn status_copies(&self) -> usize {
        if self.triple_redundancy { 3 } else { 1 }
    }
}
