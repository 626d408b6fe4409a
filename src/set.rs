use crate::error::Error;
use crate::platform::PagedFlash;
use crate::value::Value;
use crate::Engine;
use embedded_storage::Storage;

pub trait Set<T> {
    fn set(&mut self, index: usize, value: T) -> Result<(), Error>;
}

impl<T, S: Set<T>> Set<T> for &mut S {
    fn set(&mut self, index: usize, value: T) -> Result<(), Error> {
        (*self).set(index, value)
    }
}

impl<F: PagedFlash, M: Storage> Set<Value> for Engine<F, M> {
    fn set(&mut self, index: usize, value: Value) -> Result<(), Error> {
        self.set_value(index, value)
    }
}

impl<F: PagedFlash, M: Storage> Set<i32> for Engine<F, M> {
    fn set(&mut self, index: usize, value: i32) -> Result<(), Error> {
        self.set_value(index, Value::Int32(value))
    }
}

impl<F: PagedFlash, M: Storage> Set<u32> for Engine<F, M> {
    fn set(&mut self, index: usize, value: u32) -> Result<(), Error> {
        self.set_value(index, Value::UInt32(value))
    }
}

impl<F: PagedFlash, M: Storage> Set<f32> for Engine<F, M> {
    fn set(&mut self, index: usize, value: f32) -> Result<(), Error> {
        self.set_value(index, Value::Float32(value))
    }
}

impl<F: PagedFlash, M: Storage> Set<bool> for Engine<F, M> {
    fn set(&mut self, index: usize, value: bool) -> Result<(), Error> {
        self.set_value(index, Value::UInt32(value as u32))
    }
}
