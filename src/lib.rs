#![doc = include_str ! ("../README.md")]
#![cfg_attr(not(target_arch = "x86_64"), no_std)]

pub mod address;
pub mod config;
pub mod error;
pub mod flight_plan;
mod get;
pub mod layout;
pub mod media;
pub mod payload;
pub mod platform;
mod repository;
mod set;
pub mod sim;
pub mod status;
pub mod tlb;
pub mod value;

pub use config::{Config, TlbBackup};
pub use flight_plan::{FlightPlanEntry, FlightPlanStatistics, Text};
pub use get::Get;
pub use payload::PayloadSchema;
pub use repository::Repository;
pub use set::Set;
pub use value::{Value, ValueKind};

extern crate alloc;

use crate::address::Geometry;
use crate::error::Error;
use crate::flight_plan::{FlightPlan, RECORD_SIZE};
use crate::layout::Layout;
use crate::media::Media;
use crate::payload::PayloadTable;
use crate::platform::PagedFlash;
use crate::status::StatusTable;
use crate::tlb::Tlb;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::trace;
use embedded_storage::Storage;

pub(crate) struct Tables {
    layout: Layout,
    status: StatusTable,
    flight_plan: FlightPlan,
    payloads: PayloadTable,
    queue_variable: Option<usize>,
}

/// The storage engine. Owns both devices and, once initialized, the address table, the flight
/// plan TLB and the payload schemas. It does no locking; share it through a `Repository`.
pub struct Engine<F, M> {
    pub(crate) media: Media<F, M>,
    pub(crate) tables: Option<Tables>,
}

impl<F: PagedFlash, M: Storage> Engine<F, M> {
    /// Wraps the devices. Nothing is read until `init`.
    pub fn new(flash: F, fram: M) -> Self {
        Self {
            media: Media::new(flash, fram),
            tables: None,
        }
    }

    /// Computes the address table and loads the flight plan TLB from its backup.
    ///
    /// A second call fails with `AlreadyInitialized` unless `drop` is set. With `drop` the flight
    /// plan sections are erased and an empty TLB is persisted, which is also how a blank device
    /// is prepared. Payload sections are left as they are, see `reset_payloads`.
    pub fn init(&mut self, config: &Config, drop: bool) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("init: drop {}", drop);

        #[cfg(feature = "debug-logs")]
        println!("engine: init {config:?}, drop: {drop}");

        if self.tables.is_some() && !drop {
            return Err(Error::AlreadyInitialized);
        }

        let geometry = Geometry::of::<F>()?;
        if geometry.page_size as usize != RECORD_SIZE {
            return Err(Error::InvalidGeometry);
        }

        let layout = Layout::compute(
            geometry,
            config,
            self.media.flash_capacity(),
            self.media.fram_capacity(),
        )?;

        let variables = config.status_variables;
        if config
            .payloads
            .iter()
            .any(|schema| schema.index_variable >= variables)
            || config.queue_variable.is_some_and(|index| index >= variables)
        {
            return Err(Error::InvalidLayout);
        }

        self.tables = None;
        let flight_plan = FlightPlan::open(
            &mut self.media,
            &layout,
            config.max_flight_plan_entries,
            drop,
        )?;

        self.tables = Some(Tables {
            status: StatusTable::new(variables, config.status_copies()),
            payloads: PayloadTable::new(&layout, &config.payloads),
            flight_plan,
            layout,
            queue_variable: config.queue_variable,
        });
        Ok(())
    }

    /// Releases every table. The devices stay owned by the engine.
    pub fn close(&mut self) {
        self.tables = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.tables.is_some()
    }

    pub fn media(&self) -> &Media<F, M> {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut Media<F, M> {
        &mut self.media
    }

    pub fn into_media(self) -> Media<F, M> {
        self.media
    }

    pub fn layout(&self) -> Result<&Layout, Error> {
        Ok(&self.tables()?.layout)
    }

    fn tables(&self) -> Result<&Tables, Error> {
        self.tables.as_ref().ok_or(Error::NotInitialized)
    }

    fn parts(&mut self) -> Result<(&mut Media<F, M>, &mut Tables), Error> {
        let tables = self.tables.as_mut().ok_or(Error::NotInitialized)?;
        Ok((&mut self.media, tables))
    }

    // status variables

    /// Reads a status variable with the requested interpretation.
    pub fn get_value(&mut self, index: usize, kind: ValueKind) -> Result<Value, Error> {
        let (media, tables) = self.parts()?;
        let bits = tables.status.read_bits(media, index)?;
        Ok(Value::from_bits(kind, bits))
    }

    pub fn set_value(&mut self, index: usize, value: impl Into<Value>) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.status.write_bits(media, index, value.into().to_bits())
    }

    /// Typed read, supported types are i32, u32, f32 and bool.
    pub fn get<R>(&mut self, index: usize) -> Result<R, Error>
    where
        Engine<F, M>: Get<R>,
    {
        Get::get(self, index)
    }

    /// Typed write, supported types are `Value`, i32, u32, f32 and bool.
    pub fn set<R>(&mut self, index: usize, value: R) -> Result<(), Error>
    where
        Engine<F, M>: Set<R>,
    {
        Set::set(self, index, value)
    }

    /// Reads `out.len()` consecutive variables starting at `index`, e.g. the components of an
    /// attitude quaternion.
    pub fn get_values(
        &mut self,
        index: usize,
        kind: ValueKind,
        out: &mut [Value],
    ) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        check_span(index, out.len(), tables.status.variables())?;
        for (offset, value) in out.iter_mut().enumerate() {
            *value = Value::from_bits(kind, tables.status.read_bits(media, index + offset)?);
        }
        Ok(())
    }

    /// Writes consecutive variables starting at `index`. Nothing is written if the span does not
    /// fit the table.
    pub fn set_values(&mut self, index: usize, values: &[Value]) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        check_span(index, values.len(), tables.status.variables())?;
        for (offset, value) in values.iter().enumerate() {
            tables.status.write_bits(media, index + offset, value.to_bits())?;
        }
        Ok(())
    }

    pub fn status_variables(&self) -> Result<usize, Error> {
        Ok(self.tables()?.status.variables())
    }

    // flight plan

    /// Stores a new entry, compacting the active section first if it is full. Returns the
    /// TLB index of the entry.
    pub fn insert(&mut self, entry: &FlightPlanEntry) -> Result<usize, Error> {
        let (media, tables) = self.parts()?;
        let index = tables.flight_plan.insert(media, entry)?;
        self.sync_queue()?;
        Ok(index)
    }

    pub fn lookup_by_time(&self, timestamp: i32) -> Result<usize, Error> {
        self.tables()?.flight_plan.lookup(timestamp)
    }

    pub fn get_by_index(&mut self, index: usize) -> Result<FlightPlanEntry, Error> {
        let (media, tables) = self.parts()?;
        tables.flight_plan.get(media, index)
    }

    pub fn get_by_time(&mut self, timestamp: i32) -> Result<FlightPlanEntry, Error> {
        let index = self.lookup_by_time(timestamp)?;
        self.get_by_index(index)
    }

    pub fn delete_by_index(&mut self, index: usize) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.flight_plan.delete(media, index)?;
        self.sync_queue()
    }

    pub fn delete_by_time(&mut self, timestamp: i32) -> Result<(), Error> {
        let index = self.lookup_by_time(timestamp)?;
        self.delete_by_index(index)
    }

    /// Reads and removes the entry scheduled at `timestamp`.
    pub fn take(&mut self, timestamp: i32) -> Result<FlightPlanEntry, Error> {
        let index = self.lookup_by_time(timestamp)?;
        let entry = self.get_by_index(index)?;
        self.delete_by_index(index)?;
        Ok(entry)
    }

    /// Deletes every entry due at or before `now + 1` and returns how many remain scheduled.
    pub fn purge(&mut self, now: i32) -> Result<usize, Error> {
        let (media, tables) = self.parts()?;
        let due: Vec<usize> = tables
            .flight_plan
            .tlb()
            .live()
            .filter(|(_, slot)| slot.timestamp <= now.saturating_add(1))
            .map(|(index, _)| index)
            .collect();

        let deleted = due
            .into_iter()
            .try_for_each(|index| tables.flight_plan.delete(media, index));

        // entries deleted before a failure stay deleted
        self.sync_queue()?;
        deleted?;
        Ok(self.tables()?.flight_plan.tlb().live_count())
    }

    /// All scheduled entries with their TLB index, in TLB order.
    pub fn entries(&mut self) -> Result<Vec<(usize, FlightPlanEntry)>, Error> {
        let (media, tables) = self.parts()?;
        let indices: Vec<usize> = tables
            .flight_plan
            .tlb()
            .live()
            .map(|(index, _)| index)
            .collect();

        indices
            .into_iter()
            .map(|index| Ok((index, tables.flight_plan.get(media, index)?)))
            .collect()
    }

    /// Erases the flight plan sections and empties the TLB.
    pub fn reset_flight_plan(&mut self) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.flight_plan.reset(media)?;
        self.sync_queue()
    }

    pub fn flight_plan_statistics(&self) -> Result<FlightPlanStatistics, Error> {
        Ok(self.tables()?.flight_plan.statistics())
    }

    pub fn is_flight_plan_faulted(&self) -> Result<bool, Error> {
        Ok(self.tables()?.flight_plan.is_faulted())
    }

    pub fn records_per_section(&self) -> Result<u32, Error> {
        Ok(self.tables()?.flight_plan.records_per_section())
    }

    pub fn tlb(&self) -> Result<&Tlb, Error> {
        Ok(self.tables()?.flight_plan.tlb())
    }

    /// Keeps the configured queue variable equal to the number of scheduled entries.
    fn sync_queue(&mut self) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        match tables.queue_variable {
            Some(index) => {
                let live = tables.flight_plan.tlb().live_count() as u32;
                tables.status.write_bits(media, index, live)
            }
            None => Ok(()),
        }
    }

    // payloads

    pub fn payload_schema(&self, payload: usize) -> Result<&PayloadSchema, Error> {
        self.tables()?.payloads.schema(payload)
    }

    pub fn sample_address(&self, payload: usize, index: u32) -> Result<u32, Error> {
        self.tables()?.payloads.sample_address(payload, index)
    }

    pub fn set_sample(&mut self, payload: usize, index: u32, data: &[u8]) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.payloads.set_sample(media, payload, index, data)
    }

    pub fn get_sample(&mut self, payload: usize, index: u32, out: &mut [u8]) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.payloads.get_sample(media, payload, index, out)
    }

    /// Appends a sample at the payload's index counter and advances the counter. Returns the
    /// index the sample was written to.
    pub fn add_sample(&mut self, payload: usize, data: &[u8]) -> Result<u32, Error> {
        let (media, tables) = self.parts()?;
        let counter = tables.payloads.schema(payload)?.index_variable;
        let index = tables.status.read_bits(media, counter)?;

        tables.payloads.set_sample(media, payload, index, data)?;
        tables.status.write_bits(media, counter, index + 1)?;
        Ok(index)
    }

    /// Reads the sample `offset` positions before the most recent one.
    pub fn get_recent_sample(
        &mut self,
        payload: usize,
        offset: u32,
        out: &mut [u8],
    ) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        let counter = tables.payloads.schema(payload)?.index_variable;
        let next = tables.status.read_bits(media, counter)?;

        let index = next
            .checked_sub(1)
            .and_then(|it| it.checked_sub(offset))
            .ok_or(Error::NotFound)?;
        tables.payloads.get_sample(media, payload, index, out)
    }

    pub fn reset_payload(&mut self, payload: usize) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.payloads.reset_table(media, payload)
    }

    pub fn reset_payloads(&mut self) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.payloads.reset_all(media)
    }

    /// Erases payload and flight plan media and zeroes the payload index counters.
    pub fn delete_memory_sections(&mut self) -> Result<(), Error> {
        let (media, tables) = self.parts()?;
        tables.payloads.reset_all(media)?;
        tables.flight_plan.reset(media)?;

        for payload in 0..tables.payloads.len() {
            let counter = tables.payloads.schema(payload)?.index_variable;
            tables.status.write_bits(media, counter, 0)?;
        }
        self.sync_queue()
    }
}

fn check_span(index: usize, len: usize, variables: usize) -> Result<(), Error> {
    match index.checked_add(len) {
        Some(end) if end <= variables => Ok(()),
        _ => Err(Error::IndexOutOfBounds),
    }
}
