//! Single-region storage
//!
//! One self-contained block: header followed by `Length` bytes of payload
//! covered by one CRC.
//!
//! ```text
//! [MagicId:16][DataId:16][Length:W][Crc:C][payload: Length bytes]
//! ```
//!
//! Writes are not atomic. A write interrupted inside the header leaves a
//! region that fails the magic or identity check; one interrupted inside
//! the payload fails the CRC check.

use core::marker::PhantomData;

use flashpage_hal::medium::advance;
use flashpage_hal::{Checksum, CrcOf, Medium};

use crate::error::{AccessError, CheckError, Corruption};
use crate::id::{Identifier, REGION_MAGIC};
use crate::layout::{field_address, read_field, write_field, Field, RegionLayout};

/// Region layout for a medium and length width
pub type Layout<M, W> = RegionLayout<W, CrcOf<M>>;

/// Validates and reads a single region
pub struct RegionReader<M, W> {
    medium: M,
    /// Base address of the last validated region
    address: u32,
    _length: PhantomData<W>,
}

impl<M: Medium, W: Field> RegionReader<M, W>
where
    CrcOf<M>: Field,
{
    /// Create a reader; `address` is used until a successful [`check`](Self::check)
    pub fn new(medium: M, address: u32) -> Self {
        Self {
            medium,
            address,
            _length: PhantomData,
        }
    }

    /// Active base address
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Validate the region at `address` as holding `data_id`
    ///
    /// On success `address` becomes the active base address.
    pub fn check(&mut self, address: u32, data_id: &Identifier) -> Result<(), CheckError> {
        if !self.medium.compare(address, REGION_MAGIC.as_bytes())? {
            trace!("region {}: no storage", address);
            return Err(CheckError::NoStorage);
        }

        let id_address = field_address(address, Layout::<M, W>::DATA_ID)?;
        if !self.medium.compare(id_address, data_id.as_bytes())? {
            trace!("region {}: another data set", address);
            return Err(CheckError::AnotherStorage);
        }

        let length: W = read_field(&mut self.medium, address, Layout::<M, W>::LENGTH)?;
        let stored: CrcOf<M> = read_field(&mut self.medium, address, Layout::<M, W>::CRC)?;

        let payload = field_address(address, Layout::<M, W>::HEADER_SIZE)?;
        let len = u32::try_from(length.to_usize())
            .map_err(|_| CheckError::Corrupted(Corruption::Metrics))?;
        // A length running off the medium is a damaged header, not a device fault
        if payload
            .checked_add(len)
            .map_or(true, |end| end > self.medium.capacity())
        {
            warn!("region {}: length {} exceeds medium", address, len);
            return Err(CheckError::Corrupted(Corruption::Metrics));
        }
        let actual = self.medium.calculate_crc(payload, len)?;
        if actual != stored {
            warn!("region {}: crc mismatch", address);
            return Err(CheckError::Corrupted(Corruption::Crc));
        }

        self.address = address;
        Ok(())
    }

    /// Stored payload length
    pub fn length(&mut self) -> Result<W, AccessError> {
        Ok(read_field(&mut self.medium, self.address, Layout::<M, W>::LENGTH)?)
    }

    /// Copy `buf.len()` payload bytes starting at `offset`
    ///
    /// Fails with [`AccessError::OutOfBounds`] if the span reaches past
    /// the stored `Length`.
    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<(), AccessError> {
        let length = self.length()?.to_usize();
        let end = offset
            .checked_add(buf.len())
            .ok_or(AccessError::OutOfBounds)?;
        if end > length {
            return Err(AccessError::OutOfBounds);
        }

        let start = Layout::<M, W>::HEADER_SIZE
            .checked_add(offset)
            .ok_or(AccessError::OutOfBounds)?;
        let address = advance(self.address, start)?;
        self.medium.read(address, buf)?;
        Ok(())
    }

    /// Read the whole payload and decode it with postcard
    #[cfg(feature = "serde")]
    pub fn load<T: serde::de::DeserializeOwned>(
        &mut self,
        scratch: &mut [u8],
    ) -> Result<T, AccessError> {
        let len = self.length()?.to_usize();
        let buf = scratch.get_mut(..len).ok_or(AccessError::TooLarge)?;
        self.read(0, buf)?;
        postcard::from_bytes(buf).map_err(|_| AccessError::Encoding)
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

/// Writes a single region
pub struct RegionWriter<M, W> {
    medium: M,
    address: u32,
    data_id: Identifier,
    _length: PhantomData<W>,
}

impl<M: Medium, W: Field> RegionWriter<M, W>
where
    CrcOf<M>: Field,
{
    /// Create a writer for the region at `address` holding `data_id`
    pub fn new(medium: M, address: u32, data_id: Identifier) -> Self {
        Self {
            medium,
            address,
            data_id,
            _length: PhantomData,
        }
    }

    /// Region base address
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Data identity written into the header
    pub fn data_id(&self) -> &Identifier {
        &self.data_id
    }

    /// Write header and payload with a caller-supplied CRC
    ///
    /// Writes, in order: magic, data id, length, CRC, payload. Each is an
    /// independent medium write.
    pub fn set_data(&mut self, data: &[u8], crc: CrcOf<M>) -> Result<(), AccessError> {
        let length = W::from_usize(data.len()).ok_or(AccessError::TooLarge)?;

        self.medium.write(self.address, REGION_MAGIC.as_bytes())?;
        self.medium.write(
            field_address(self.address, Layout::<M, W>::DATA_ID)?,
            self.data_id.as_bytes(),
        )?;
        write_field(&mut self.medium, self.address, Layout::<M, W>::LENGTH, length)?;
        write_field(&mut self.medium, self.address, Layout::<M, W>::CRC, crc)?;
        self.medium.write(
            field_address(self.address, Layout::<M, W>::HEADER_SIZE)?,
            data,
        )?;

        debug!("region {}: wrote {} bytes", self.address, data.len());
        Ok(())
    }

    /// Write header and payload, computing the CRC with the medium's checksum
    pub fn commit(&mut self, data: &[u8]) -> Result<(), AccessError> {
        let crc = <M::Checksum as Checksum>::of(data);
        self.set_data(data, crc)
    }

    /// Encode `value` with postcard into `scratch` and commit it
    ///
    /// Returns the payload length.
    #[cfg(feature = "serde")]
    pub fn store<T: serde::Serialize>(
        &mut self,
        value: &T,
        scratch: &mut [u8],
    ) -> Result<usize, AccessError> {
        let encoded = postcard::to_slice(value, scratch).map_err(|_| AccessError::Encoding)?;
        self.commit(encoded)?;
        Ok(encoded.len())
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
