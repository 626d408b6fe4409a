//! Thread safe facade over an [`Engine`].
//!
//! Every operation takes the one lock exactly once, compaction included, and the guard drops on
//! every return path. There is no timeout: a caller blocks for as long as an erase takes.

use crate::error::Error;
use crate::flight_plan::{FlightPlanEntry, FlightPlanStatistics};
use crate::get::Get;
use crate::media::Media;
use crate::payload::PayloadSchema;
use crate::platform::PagedFlash;
use crate::set::Set;
use crate::value::{Value, ValueKind};
use crate::{Config, Engine};
use alloc::vec::Vec;
use embedded_storage::Storage;
use spin::Mutex;

pub struct Repository<F, M> {
    engine: Mutex<Engine<F, M>>,
}

impl<F: PagedFlash, M: Storage> Repository<F, M> {
    pub fn new(flash: F, fram: M) -> Self {
        Self::from_engine(Engine::new(flash, fram))
    }

    pub fn from_engine(engine: Engine<F, M>) -> Self {
        Self {
            engine: Mutex::new(engine),
        }
    }

    pub fn into_engine(self) -> Engine<F, M> {
        self.engine.into_inner()
    }

    pub fn into_media(self) -> Media<F, M> {
        self.into_engine().into_media()
    }

    /// Runs `f` with the lock held, for sequences that have to be atomic as a whole.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine<F, M>) -> R) -> R {
        let mut engine = self.engine.lock();
        f(&mut engine)
    }

    pub fn init(&self, config: &Config, drop: bool) -> Result<(), Error> {
        self.engine.lock().init(config, drop)
    }

    pub fn close(&self) {
        self.engine.lock().close()
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.lock().is_initialized()
    }

    pub fn get_value(&self, index: usize, kind: ValueKind) -> Result<Value, Error> {
        self.engine.lock().get_value(index, kind)
    }

    pub fn set_value(&self, index: usize, value: impl Into<Value>) -> Result<(), Error> {
        self.engine.lock().set_value(index, value)
    }

    pub fn get_values(&self, index: usize, kind: ValueKind, out: &mut [Value]) -> Result<(), Error> {
        self.engine.lock().get_values(index, kind, out)
    }

    pub fn set_values(&self, index: usize, values: &[Value]) -> Result<(), Error> {
        self.engine.lock().set_values(index, values)
    }

    pub fn get<R>(&self, index: usize) -> Result<R, Error>
    where
        Engine<F, M>: Get<R>,
    {
        self.engine.lock().get(index)
    }

    pub fn set<R>(&self, index: usize, value: R) -> Result<(), Error>
    where
        Engine<F, M>: Set<R>,
    {
        self.engine.lock().set(index, value)
    }

    pub fn insert(&self, entry: &FlightPlanEntry) -> Result<usize, Error> {
        self.engine.lock().insert(entry)
    }

    pub fn lookup_by_time(&self, timestamp: i32) -> Result<usize, Error> {
        self.engine.lock().lookup_by_time(timestamp)
    }

    pub fn get_by_index(&self, index: usize) -> Result<FlightPlanEntry, Error> {
        self.engine.lock().get_by_index(index)
    }

    pub fn get_by_time(&self, timestamp: i32) -> Result<FlightPlanEntry, Error> {
        self.engine.lock().get_by_time(timestamp)
    }

    pub fn delete_by_index(&self, index: usize) -> Result<(), Error> {
        self.engine.lock().delete_by_index(index)
    }

    pub fn delete_by_time(&self, timestamp: i32) -> Result<(), Error> {
        self.engine.lock().delete_by_time(timestamp)
    }

    pub fn take(&self, timestamp: i32) -> Result<FlightPlanEntry, Error> {
        self.engine.lock().take(timestamp)
    }

    pub fn purge(&self, now: i32) -> Result<usize, Error> {
        self.engine.lock().purge(now)
    }

    pub fn entries(&self) -> Result<Vec<(usize, FlightPlanEntry)>, Error> {
        self.engine.lock().entries()
    }

    pub fn reset_flight_plan(&self) -> Result<(), Error> {
        self.engine.lock().reset_flight_plan()
    }

    pub fn flight_plan_statistics(&self) -> Result<FlightPlanStatistics, Error> {
        self.engine.lock().flight_plan_statistics()
    }

    pub fn payload_schema(&self, payload: usize) -> Result<PayloadSchema, Error> {
        self.engine.lock().payload_schema(payload).cloned()
    }

    pub fn set_sample(&self, payload: usize, index: u32, data: &[u8]) -> Result<(), Error> {
        self.engine.lock().set_sample(payload, index, data)
    }

    pub fn get_sample(&self, payload: usize, index: u32, out: &mut [u8]) -> Result<(), Error> {
        self.engine.lock().get_sample(payload, index, out)
    }

    pub fn add_sample(&self, payload: usize, data: &[u8]) -> Result<u32, Error> {
        self.engine.lock().add_sample(payload, data)
    }

    pub fn get_recent_sample(&self, payload: usize, offset: u32, out: &mut [u8]) -> Result<(), Error> {
        self.engine.lock().get_recent_sample(payload, offset, out)
    }

    pub fn reset_payload(&self, payload: usize) -> Result<(), Error> {
        self.engine.lock().reset_payload(payload)
    }

    pub fn reset_payloads(&self) -> Result<(), Error> {
        self.engine.lock().reset_payloads()
    }

    pub fn delete_memory_sections(&self) -> Result<(), Error> {
        self.engine.lock().delete_memory_sections()
    }
}
