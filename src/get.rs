//! The `Get<T>` trait and its implementation in this module allows providing a single generic,
//! overloaded function `get<T>()` for all status value interpretations.

use crate::error::Error;
use crate::platform::PagedFlash;
use crate::value::{Value, ValueKind};
use crate::Engine;
use embedded_storage::Storage;

pub trait Get<T> {
    fn get(&mut self, index: usize) -> Result<T, Error>;
}

impl<T, G: Get<T>> Get<T> for &mut G {
    fn get(&mut self, index: usize) -> Result<T, Error> {
        (*self).get(index)
    }
}

impl<F: PagedFlash, M: Storage> Get<i32> for Engine<F, M> {
    fn get(&mut self, index: usize) -> Result<i32, Error> {
        let value = self.get_value(index, ValueKind::Int32)?;
        Ok(value.as_i32())
    }
}

impl<F: PagedFlash, M: Storage> Get<u32> for Engine<F, M> {
    fn get(&mut self, index: usize) -> Result<u32, Error> {
        let value = self.get_value(index, ValueKind::UInt32)?;
        Ok(value.as_u32())
    }
}

impl<F: PagedFlash, M: Storage> Get<f32> for Engine<F, M> {
    fn get(&mut self, index: usize) -> Result<f32, Error> {
        let value = self.get_value(index, ValueKind::Float32)?;
        Ok(value.as_f32())
    }
}

impl<F: PagedFlash, M: Storage> Get<bool> for Engine<F, M> {
    fn get(&mut self, index: usize) -> Result<bool, Error> {
        let value: Value = self.get_value(index, ValueKind::UInt32)?;
        Ok(value.as_u32() != 0)
    }
}
