//! Payload sample store: every payload owns `sections_per_payload` contiguous flash sections and
//! fills them with fixed size samples. Samples never cross a page, the tail of a page that can't
//! hold another sample stays unused.

use crate::address::{Geometry, Location};
use crate::error::Error;
use crate::layout::Layout;
use crate::media::{Media, Region};
use crate::platform::PagedFlash;
use alloc::string::String;
use alloc::vec::Vec;
#[cfg(feature = "defmt")]
use defmt::trace;
use embedded_storage::Storage;

#[derive(Debug, Clone, PartialEq)]
pub struct PayloadSchema {
    pub name: String,
    /// Bytes per sample, at most one flash page
    pub record_size: usize,
    /// Status variable holding the next free sample index
    pub index_variable: usize,
    /// Space separated printf style formats of the sample fields, for presentation only
    pub fields: String,
}

impl PayloadSchema {
    pub fn new(name: &str, record_size: usize, index_variable: usize) -> Self {
        Self {
            name: name.into(),
            record_size,
            index_variable,
            fields: String::new(),
        }
    }

    pub fn with_fields(mut self, fields: &str) -> Self {
        self.fields = fields.into();
        self
    }
}

pub(crate) struct PayloadTable {
    schemas: Vec<PayloadSchema>,
    layout: Layout,
}

impl PayloadTable {
    pub(crate) fn new(layout: &Layout, schemas: &[PayloadSchema]) -> Self {
        Self {
            schemas: schemas.to_vec(),
            layout: layout.clone(),
        }
    }

    pub(crate) fn schema(&self, payload: usize) -> Result<&PayloadSchema, Error> {
        self.schemas.get(payload).ok_or(Error::UnknownPayload)
    }

    pub(crate) fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Flash address of sample `index` of `payload`. Fails closed on any overflow of the
    /// payload's sections or the repository's flash range.
    pub(crate) fn sample_address(&self, payload: usize, index: u32) -> Result<u32, Error> {
        let size = self.schema(payload)?.record_size;
        let geometry: &Geometry = &self.layout.geometry;
        if size == 0 {
            return Err(Error::SampleSizeMismatch);
        }
        if size > geometry.page_size as usize {
            return Err(Error::SampleTooLarge);
        }

        let samples_per_page = geometry.page_size / size as u32;
        let samples_per_section = samples_per_page * geometry.pages_per_section();
        let within_section = index % samples_per_section;
        let location = Location::new(
            index / samples_per_section,
            within_section / samples_per_page,
            (within_section % samples_per_page) * size as u32,
        );

        let sections = self
            .layout
            .payload_sections(payload)
            .ok_or(Error::UnknownPayload)?;
        let address = location.to_address(geometry, sections)?;

        match address.checked_add(size as u32) {
            Some(end) if end <= self.layout.end => Ok(address),
            _ => Err(Error::OutOfBounds),
        }
    }

    pub(crate) fn set_sample<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        payload: usize,
        index: u32,
        data: &[u8],
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("set sample: payload {} [{}]", payload, index);

        let address = self.sample_address(payload, index)?;
        if data.len() != self.schema(payload)?.record_size {
            return Err(Error::SampleSizeMismatch);
        }

        #[cfg(feature = "debug-logs")]
        println!("payload: write {payload}[{index}] @{address:#08x}[{}]", data.len());

        media.write(Region::Flash, address, data)
    }

    pub(crate) fn get_sample<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        payload: usize,
        index: u32,
        out: &mut [u8],
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("get sample: payload {} [{}]", payload, index);

        let address = self.sample_address(payload, index)?;
        if out.len() != self.schema(payload)?.record_size {
            return Err(Error::SampleSizeMismatch);
        }

        media.read(Region::Flash, address, out)
    }

    /// Erases exactly the sections of one payload.
    pub(crate) fn reset_table<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
        payload: usize,
    ) -> Result<(), Error> {
        #[cfg(feature = "defmt")]
        trace!("reset payload {}", payload);

        self.schema(payload)?;
        let sections = self
            .layout
            .payload_sections(payload)
            .ok_or(Error::UnknownPayload)?;
        for &section in sections {
            media.erase(section)?;
        }
        Ok(())
    }

    pub(crate) fn reset_all<F: PagedFlash, M: Storage>(
        &self,
        media: &mut Media<F, M>,
    ) -> Result<(), Error> {
        for payload in 0..self.schemas.len() {
            self.reset_table(media, payload)?;
        }
        Ok(())
    }
}
