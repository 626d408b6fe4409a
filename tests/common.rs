#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use obc_storage::sim::{SimFlash, SimFram};
use obc_storage::{Config, Engine, FlightPlanEntry, PayloadSchema};

pub const PAGE_SIZE: usize = 512;
/// Three flight plan records per section
pub const SMALL_SECTION_SIZE: usize = 3 * PAGE_SIZE;
pub const SECTION_SIZE: usize = 4 * PAGE_SIZE;
pub const FRAM_SIZE: usize = 4096;

pub type SmallFlash = SimFlash<SMALL_SECTION_SIZE, PAGE_SIZE>;
pub type Flash = SimFlash<SECTION_SIZE, PAGE_SIZE>;

pub const STATUS_VARIABLES: usize = 8;
pub const TEMPERATURE_INDEX: usize = 4;
pub const IMAGE_INDEX: usize = 5;
pub const QUEUE_INDEX: usize = 6;

/// 20 bytes per sample, 25 samples per page, 24 bytes of every page stay unused
pub fn temperature() -> PayloadSchema {
    PayloadSchema::new("temperature", 20, TEMPERATURE_INDEX).with_fields("%u %f %f %f %f")
}

/// One sample fills a whole page
pub fn image() -> PayloadSchema {
    PayloadSchema::new("image", PAGE_SIZE, IMAGE_INDEX)
}

pub fn config(max_entries: usize) -> Config {
    Config::new(max_entries, STATUS_VARIABLES)
}

pub fn payload_config(max_entries: usize) -> Config {
    config(max_entries).with_payloads(vec![temperature(), image()], 2)
}

/// Three records per section and four slots: the live set is bounded by the section.
pub fn small_engine() -> Engine<SmallFlash, SimFram> {
    let mut engine = Engine::new(SmallFlash::new(8), SimFram::new(FRAM_SIZE));
    engine.init(&config(4), true).unwrap();
    engine
}

pub fn engine(config: &Config) -> Engine<Flash, SimFram> {
    let mut engine = Engine::new(Flash::new(16), SimFram::new(FRAM_SIZE));
    engine.init(config, true).unwrap();
    engine
}

pub fn entry(time: i32) -> FlightPlanEntry {
    FlightPlanEntry::new(time, "obc_set_mode", &format!("{time} nominal"), 1, 0, 1)
}

pub fn sample(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}
