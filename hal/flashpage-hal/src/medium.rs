//! Backing medium abstraction
//!
//! A medium is a flat, byte-addressed non-volatile store (flash, EEPROM,
//! a RAM image for tests). All primitives are blocking and run to
//! completion; retry policy belongs to the implementation.

use crate::checksum::Checksum;

/// Chunk size used by the default `compare` / `calculate_crc` implementations
pub const STREAM_CHUNK: usize = 64;

/// Checksum value produced by a medium
pub type CrcOf<M> = <<M as Medium>::Checksum as Checksum>::Output;

/// Errors from medium primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MediumError {
    /// Read operation failed
    Read,
    /// Write (program) operation failed
    Write,
    /// Erase operation failed
    Erase,
    /// Access outside the medium
    OutOfRange,
    /// Address or length violates the medium's alignment rules
    Misaligned,
}

/// Backing medium trait
///
/// Implementations should handle:
/// - Bounds checking against their own capacity
/// - Any erase-before-write requirement of the hardware
pub trait Medium {
    /// Checksum algorithm used for stored payloads
    type Checksum: Checksum;

    /// Read `buf.len()` bytes starting at `address`
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), MediumError>;

    /// Write `data` starting at `address`
    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MediumError>;

    /// Number of addressable bytes; valid addresses are `0..capacity()`
    fn capacity(&self) -> u32;

    /// Compare stored bytes at `address` with `pattern`
    ///
    /// Returns `Ok(false)` on mismatch; `Err` only if the medium failed.
    fn compare(&mut self, address: u32, pattern: &[u8]) -> Result<bool, MediumError> {
        let mut chunk = [0u8; STREAM_CHUNK];
        let mut address = address;
        for expected in pattern.chunks(STREAM_CHUNK) {
            let got = &mut chunk[..expected.len()];
            self.read(address, got)?;
            if got != expected {
                return Ok(false);
            }
            address = advance(address, expected.len())?;
        }
        Ok(true)
    }

    /// Calculate the checksum of `len` stored bytes at `address`
    fn calculate_crc(&mut self, address: u32, len: u32) -> Result<CrcOf<Self>, MediumError> {
        let mut state = Self::Checksum::default();
        let mut chunk = [0u8; STREAM_CHUNK];
        let mut address = address;
        let mut remaining = len as usize;
        while remaining > 0 {
            let n = remaining.min(STREAM_CHUNK);
            self.read(address, &mut chunk[..n])?;
            state.update(&chunk[..n]);
            address = advance(address, n)?;
            remaining -= n;
        }
        Ok(state.finish())
    }
}

impl<M: Medium + ?Sized> Medium for &mut M {
    type Checksum = M::Checksum;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), MediumError> {
        (**self).read(address, buf)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MediumError> {
        (**self).write(address, data)
    }

    fn capacity(&self) -> u32 {
        (**self).capacity()
    }

    fn compare(&mut self, address: u32, pattern: &[u8]) -> Result<bool, MediumError> {
        (**self).compare(address, pattern)
    }

    fn calculate_crc(&mut self, address: u32, len: u32) -> Result<CrcOf<Self>, MediumError> {
        (**self).calculate_crc(address, len)
    }
}

/// Advance an address by `len` bytes, failing on address-space overflow
pub fn advance(address: u32, len: usize) -> Result<u32, MediumError> {
    u32::try_from(len)
        .ok()
        .and_then(|len| address.checked_add(len))
        .ok_or(MediumError::OutOfRange)
}
