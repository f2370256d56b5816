//! On-media header layouts
//!
//! Headers are packed, little-endian and field ordered exactly as below.
//! Every field is encoded at an explicit offset; nothing depends on the
//! host's struct layout or alignment.
//!
//! ```text
//! Region: [MagicId:16][DataId:16][Length:W][Crc:C][payload: Length]
//! Page:   [MagicId:16][DataId:16][TotalLength:W][PageOffset:W][PageLength:W][PageCrc:C][payload: PageLength]
//! ```

use core::fmt;
use core::marker::PhantomData;

use flashpage_hal::medium::advance;
use flashpage_hal::{Medium, MediumError};

use crate::id::{Identifier, ID_SIZE, PAGE_MAGIC};

/// Largest supported field width in bytes
pub const MAX_FIELD_SIZE: usize = 4;

/// Largest header any supported field combination produces
pub const MAX_HEADER_SIZE: usize = 2 * ID_SIZE + 3 * MAX_FIELD_SIZE + MAX_FIELD_SIZE;

/// Fixed-width unsigned header field
pub trait Field: Copy + Eq + Ord + fmt::Debug {
    /// Encoded size in bytes
    const SIZE: usize;

    /// Decode from the first `SIZE` bytes
    fn read_le(bytes: &[u8]) -> Self;

    /// Encode into the first `SIZE` bytes
    fn write_le(self, out: &mut [u8]);

    /// Widen to `usize`
    fn to_usize(self) -> usize;

    /// Narrow from `usize`, `None` if the value does not fit
    fn from_usize(value: usize) -> Option<Self>;
}

macro_rules! impl_field {
    ($($t:ty),*) => {
        $(
            impl Field for $t {
                const SIZE: usize = core::mem::size_of::<$t>();

                fn read_le(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; core::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_le_bytes(raw)
                }

                fn write_le(self, out: &mut [u8]) {
                    out[..Self::SIZE].copy_from_slice(&self.to_le_bytes());
                }

                fn to_usize(self) -> usize {
                    self as usize
                }

                fn from_usize(value: usize) -> Option<Self> {
                    <$t>::try_from(value).ok()
                }
            }
        )*
    };
}

impl_field!(u8, u16, u32);

/// Errors from encoding or decoding headers in RAM buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LayoutError {
    /// Buffer shorter than the header
    BufferTooSmall,
    /// Magic does not match the expected format
    BadMagic,
    /// Declared payload runs past the end of the buffer
    PayloadOverflow,
}

/// Field offsets of the single-region header
pub struct RegionLayout<W, C>(PhantomData<(W, C)>);

impl<W: Field, C: Field> RegionLayout<W, C> {
    pub const MAGIC: usize = 0;
    pub const DATA_ID: usize = ID_SIZE;
    pub const LENGTH: usize = 2 * ID_SIZE;
    pub const CRC: usize = Self::LENGTH + W::SIZE;
    /// Header size; the payload starts here
    pub const HEADER_SIZE: usize = Self::CRC + C::SIZE;
}

/// Field offsets of the page header
pub struct PageLayout<W, C>(PhantomData<(W, C)>);

impl<W: Field, C: Field> PageLayout<W, C> {
    pub const MAGIC: usize = 0;
    pub const DATA_ID: usize = ID_SIZE;
    pub const TOTAL_LENGTH: usize = 2 * ID_SIZE;
    pub const PAGE_OFFSET: usize = Self::TOTAL_LENGTH + W::SIZE;
    pub const PAGE_LENGTH: usize = Self::PAGE_OFFSET + W::SIZE;
    pub const PAGE_CRC: usize = Self::PAGE_LENGTH + W::SIZE;
    /// Header size; the page payload starts here
    pub const HEADER_SIZE: usize = Self::PAGE_CRC + C::SIZE;
    /// Size of the metrics block (`TotalLength..=PageCrc`)
    pub const METRICS_SIZE: usize = Self::HEADER_SIZE - Self::TOTAL_LENGTH;

    /// Largest payload a page of `page_capacity` bytes can hold
    pub fn max_page_length(page_capacity: usize) -> Option<usize> {
        page_capacity.checked_sub(Self::HEADER_SIZE)
    }
}

/// Position and integrity metrics of one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMetrics<W, C> {
    /// Size of the whole chained object
    pub total_length: W,
    /// Offset of this page's payload within the object
    pub page_offset: W,
    /// Bytes of payload carried by this page
    pub page_length: W,
    /// Checksum over this page's payload only
    pub page_crc: C,
}

impl<W: Field, C: Field> PageMetrics<W, C> {
    /// Check the size invariants against the page capacity
    pub fn is_consistent(&self, page_capacity: usize) -> bool {
        let Some(max) = PageLayout::<W, C>::max_page_length(page_capacity) else {
            return false;
        };
        self.page_length.to_usize() <= max
            && self.page_length <= self.total_length
            && self.page_offset <= self.total_length
    }

    /// Encode the metrics block (`METRICS_SIZE` bytes)
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, LayoutError> {
        let size = PageLayout::<W, C>::METRICS_SIZE;
        if out.len() < size {
            return Err(LayoutError::BufferTooSmall);
        }
        let base = PageLayout::<W, C>::TOTAL_LENGTH;
        self.total_length.write_le(&mut out[PageLayout::<W, C>::TOTAL_LENGTH - base..]);
        self.page_offset.write_le(&mut out[PageLayout::<W, C>::PAGE_OFFSET - base..]);
        self.page_length.write_le(&mut out[PageLayout::<W, C>::PAGE_LENGTH - base..]);
        self.page_crc.write_le(&mut out[PageLayout::<W, C>::PAGE_CRC - base..]);
        Ok(size)
    }

    /// Decode the metrics block
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        if bytes.len() < PageLayout::<W, C>::METRICS_SIZE {
            return Err(LayoutError::BufferTooSmall);
        }
        let base = PageLayout::<W, C>::TOTAL_LENGTH;
        Ok(Self {
            total_length: W::read_le(&bytes[PageLayout::<W, C>::TOTAL_LENGTH - base..]),
            page_offset: W::read_le(&bytes[PageLayout::<W, C>::PAGE_OFFSET - base..]),
            page_length: W::read_le(&bytes[PageLayout::<W, C>::PAGE_LENGTH - base..]),
            page_crc: C::read_le(&bytes[PageLayout::<W, C>::PAGE_CRC - base..]),
        })
    }
}

/// Decoded page header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader<W, C> {
    pub data_id: Identifier,
    pub metrics: PageMetrics<W, C>,
}

impl<W: Field, C: Field> PageHeader<W, C> {
    /// Encode including the magic; returns the header size
    pub fn encode(&self, out: &mut [u8]) -> Result<usize, LayoutError> {
        let data_id = PageLayout::<W, C>::DATA_ID;
        let metrics = PageLayout::<W, C>::TOTAL_LENGTH;
        let size = PageLayout::<W, C>::HEADER_SIZE;

        if out.len() < size {
            return Err(LayoutError::BufferTooSmall);
        }
        out[..data_id].copy_from_slice(PAGE_MAGIC.as_bytes());
        out[data_id..metrics].copy_from_slice(self.data_id.as_bytes());
        self.metrics.encode(&mut out[metrics..])?;
        Ok(size)
    }

    /// Decode, rejecting buffers without the page magic
    pub fn decode(bytes: &[u8]) -> Result<Self, LayoutError> {
        let data_id = PageLayout::<W, C>::DATA_ID;
        let metrics = PageLayout::<W, C>::TOTAL_LENGTH;

        if bytes.len() < PageLayout::<W, C>::HEADER_SIZE {
            return Err(LayoutError::BufferTooSmall);
        }
        if bytes[..data_id] != PAGE_MAGIC.as_bytes()[..] {
            return Err(LayoutError::BadMagic);
        }
        Ok(Self {
            data_id: read_id(&bytes[data_id..]),
            metrics: PageMetrics::decode(&bytes[metrics..])?,
        })
    }
}

fn read_id(bytes: &[u8]) -> Identifier {
    let mut raw = [0u8; ID_SIZE];
    raw.copy_from_slice(&bytes[..ID_SIZE]);
    Identifier::from_bytes(raw)
}

/// Medium address of a header field
pub(crate) fn field_address(base: u32, offset: usize) -> Result<u32, MediumError> {
    advance(base, offset)
}

/// Read one field from the medium
pub(crate) fn read_field<F: Field, M: Medium>(
    medium: &mut M,
    base: u32,
    offset: usize,
) -> Result<F, MediumError> {
    let mut raw = [0u8; MAX_FIELD_SIZE];
    medium.read(field_address(base, offset)?, &mut raw[..F::SIZE])?;
    Ok(F::read_le(&raw))
}

/// Write one field to the medium as an independent write
pub(crate) fn write_field<F: Field, M: Medium>(
    medium: &mut M,
    base: u32,
    offset: usize,
    value: F,
) -> Result<(), MediumError> {
    let mut raw = [0u8; MAX_FIELD_SIZE];
    value.write_le(&mut raw);
    medium.write(field_address(base, offset)?, &raw[..F::SIZE])
}
