//! Paged chain storage
//!
//! A logical object spread over one or more pages. Every page carries its
//! own header with the object identity, the page's position inside the
//! object and a CRC over the page's own payload, so a changed page can be
//! rewritten without touching the others.
//!
//! ```text
//! [MagicId:16][DataId:16][TotalLength:W][PageOffset:W][PageLength:W][PageCrc:C][payload: PageLength]
//! ```
//!
//! There is no next-page pointer. The caller knows which page addresses
//! to visit, validates each with [`PageChain::check_page`] and assembles
//! payload using `PageOffset`/`PageLength` until `TotalLength` bytes are
//! covered.

use core::marker::PhantomData;

use flashpage_hal::medium::advance;
use flashpage_hal::{Checksum, CrcOf, Medium, MediumError};

use crate::cache::PreFlush;
use crate::error::{AccessError, CheckError, Corruption};
use crate::id::{Identifier, PAGE_MAGIC};
use crate::layout::{
    field_address, write_field, Field, LayoutError, PageHeader, PageLayout, PageMetrics,
    MAX_HEADER_SIZE,
};

/// Page layout for a medium and length width
pub type Layout<M, W> = PageLayout<W, CrcOf<M>>;

/// Page metrics for a medium and length width
pub type Metrics<M, W> = PageMetrics<W, CrcOf<M>>;

/// Which parts of a page to verify
///
/// The default verifies everything. Skipping is for re-confirming pages
/// already validated earlier in the same session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CheckOptions {
    /// Do not recompute the payload CRC
    pub skip_crc: bool,
    /// Do not read or validate the metrics (implies no CRC check)
    pub skip_metrics: bool,
}

impl CheckOptions {
    /// Magic, identity, metrics and CRC
    pub const fn full() -> Self {
        Self {
            skip_crc: false,
            skip_metrics: false,
        }
    }

    /// Magic, identity and metrics
    pub const fn without_crc() -> Self {
        Self {
            skip_crc: true,
            skip_metrics: false,
        }
    }

    /// Magic and identity only
    pub const fn header_only() -> Self {
        Self {
            skip_crc: true,
            skip_metrics: true,
        }
    }
}

/// One page of a chained object
pub struct PageChain<M, W> {
    medium: M,
    data_id: Identifier,
    /// Address of the active page
    address: u32,
    _length: PhantomData<W>,
}

impl<M: Medium, W: Field> PageChain<M, W>
where
    CrcOf<M>: Field,
{
    /// Create a page accessor for the object `data_id`
    pub fn new(medium: M, data_id: Identifier, address: u32) -> Self {
        Self {
            medium,
            data_id,
            address,
            _length: PhantomData,
        }
    }

    /// Identity of the chained object
    pub fn data_id(&self) -> &Identifier {
        &self.data_id
    }

    /// Active page address
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Select the page that `set_header` / `metrics` operate on
    pub fn set_address(&mut self, address: u32) {
        self.address = address;
    }

    /// Validate the page at `address`
    ///
    /// `page_capacity` is the full page size including the header. On
    /// success `address` becomes the active page.
    pub fn check_page(
        &mut self,
        address: u32,
        page_capacity: usize,
        options: CheckOptions,
    ) -> Result<(), CheckError> {
        if !self.medium.compare(address, PAGE_MAGIC.as_bytes())? {
            trace!("page {}: no storage", address);
            return Err(CheckError::NoStorage);
        }

        let id_address = field_address(address, Layout::<M, W>::DATA_ID)?;
        if !self.medium.compare(id_address, self.data_id.as_bytes())? {
            trace!("page {}: another data set", address);
            return Err(CheckError::AnotherStorage);
        }

        if !options.skip_metrics {
            let metrics = self.metrics_at(address)?;
            if !metrics.is_consistent(page_capacity) {
                warn!("page {}: inconsistent metrics", address);
                return Err(CheckError::Corrupted(Corruption::Metrics));
            }

            if !options.skip_crc {
                let payload = field_address(address, Layout::<M, W>::HEADER_SIZE)?;
                // Bounded by page_capacity above
                let len = metrics.page_length.to_usize() as u32;
                if payload
                    .checked_add(len)
                    .map_or(true, |end| end > self.medium.capacity())
                {
                    warn!("page {}: payload runs past the medium", address);
                    return Err(CheckError::Corrupted(Corruption::Metrics));
                }
                if self.medium.calculate_crc(payload, len)? != metrics.page_crc {
                    warn!("page {}: crc mismatch", address);
                    return Err(CheckError::Corrupted(Corruption::Crc));
                }
            }
        }

        self.address = address;
        Ok(())
    }

    /// Metrics of the active page
    pub fn metrics(&mut self) -> Result<Metrics<M, W>, MediumError> {
        self.metrics_at(self.address)
    }

    fn metrics_at(&mut self, address: u32) -> Result<Metrics<M, W>, MediumError> {
        let mut raw = [0u8; MAX_HEADER_SIZE];
        let raw = &mut raw[..Layout::<M, W>::METRICS_SIZE];
        self.medium
            .read(field_address(address, Layout::<M, W>::TOTAL_LENGTH)?, raw)?;
        // Buffer is exactly METRICS_SIZE long
        PageMetrics::decode(raw).map_err(|_| MediumError::Read)
    }

    /// Write the header of the active page
    ///
    /// Writes, in order: magic, data id, total length, page offset, page
    /// length, page CRC. Each is an independent medium write.
    pub fn set_header(&mut self, metrics: &Metrics<M, W>) -> Result<(), MediumError> {
        let base = self.address;
        self.medium.write(base, PAGE_MAGIC.as_bytes())?;
        self.medium.write(
            field_address(base, Layout::<M, W>::DATA_ID)?,
            self.data_id.as_bytes(),
        )?;
        write_field(&mut self.medium, base, Layout::<M, W>::TOTAL_LENGTH, metrics.total_length)?;
        write_field(&mut self.medium, base, Layout::<M, W>::PAGE_OFFSET, metrics.page_offset)?;
        write_field(&mut self.medium, base, Layout::<M, W>::PAGE_LENGTH, metrics.page_length)?;
        write_field(&mut self.medium, base, Layout::<M, W>::PAGE_CRC, metrics.page_crc)?;
        Ok(())
    }

    /// Write one complete page: header with computed CRC, then payload
    ///
    /// `address` becomes the active page.
    pub fn write_page(
        &mut self,
        address: u32,
        total_length: W,
        page_offset: W,
        payload: &[u8],
    ) -> Result<(), AccessError> {
        let page_length = W::from_usize(payload.len()).ok_or(AccessError::TooLarge)?;
        let metrics = PageMetrics {
            total_length,
            page_offset,
            page_length,
            page_crc: <M::Checksum as Checksum>::of(payload),
        };

        self.address = address;
        self.set_header(&metrics)?;
        self.medium.write(
            field_address(address, Layout::<M, W>::HEADER_SIZE)?,
            payload,
        )?;
        debug!("page {}: wrote {} payload bytes", address, payload.len());
        Ok(())
    }

    /// Copy payload bytes of the active page starting at `offset`
    pub fn read_payload(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), AccessError> {
        let page_length = self.metrics()?.page_length.to_usize();
        let end = offset
            .checked_add(buf.len())
            .ok_or(AccessError::OutOfBounds)?;
        if end > page_length {
            return Err(AccessError::OutOfBounds);
        }

        let start = Layout::<M, W>::HEADER_SIZE
            .checked_add(offset)
            .ok_or(AccessError::OutOfBounds)?;
        self.medium.read(advance(self.address, start)?, buf)?;
        Ok(())
    }

    /// Get the medium
    pub fn medium(&self) -> &M {
        &self.medium
    }

    /// Get the medium, mutable
    pub fn medium_mut(&mut self) -> &mut M {
        &mut self.medium
    }

    /// Release the medium
    pub fn into_inner(self) -> M {
        self.medium
    }
}

/// Recompute and store the CRC of a page held in a RAM buffer
///
/// The buffer must start with a page header. Its `PageLength` selects the
/// payload bytes the checksum `K` runs over; the result is written into the
/// `PageCrc` field in place.
pub fn stamp_page_crc<W, K>(page: &mut [u8]) -> Result<K::Output, LayoutError>
where
    W: Field,
    K: Checksum,
    K::Output: Field,
{
    let header = PageHeader::<W, K::Output>::decode(page)?;
    let start = PageLayout::<W, K::Output>::HEADER_SIZE;
    let end = start
        .checked_add(header.metrics.page_length.to_usize())
        .filter(|&end| end <= page.len())
        .ok_or(LayoutError::PayloadOverflow)?;

    let crc = K::of(&page[start..end]);
    crc.write_le(&mut page[PageLayout::<W, K::Output>::PAGE_CRC..]);
    Ok(crc)
}

/// Pre-flush hook that stamps the page CRC just before a page is written
///
/// Pages that do not carry a page header are written untouched.
pub struct CrcStamp<W, K> {
    stamped: usize,
    skipped: usize,
    _marker: PhantomData<(W, K)>,
}

impl<W, K> Default for CrcStamp<W, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W, K> CrcStamp<W, K> {
    /// Create a hook with zeroed counters
    pub const fn new() -> Self {
        Self {
            stamped: 0,
            skipped: 0,
            _marker: PhantomData,
        }
    }

    /// Pages whose CRC was stamped
    pub fn stamped(&self) -> usize {
        self.stamped
    }

    /// Pages left untouched
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<W, K> PreFlush for CrcStamp<W, K>
where
    W: Field,
    K: Checksum,
    K::Output: Field,
{
    fn before_flush(&mut self, page: &mut [u8], address: u32) {
        match stamp_page_crc::<W, K>(page) {
            Ok(_) => self.stamped += 1,
            Err(e) => {
                debug!("page {}: not stamped ({:?})", address, e);
                self.skipped += 1;
            }
        }
    }
}
