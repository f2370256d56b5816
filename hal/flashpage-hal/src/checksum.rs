//! Payload checksums
//!
//! The medium computes checksums over stored bytes, writers compute them
//! over host buffers. Both sides go through the same [`Checksum`]
//! implementation so the values agree.

/// Streaming checksum algorithm
pub trait Checksum: Default {
    /// Checksum value as stored in headers
    type Output: Copy + Eq + core::fmt::Debug;

    /// Feed more bytes
    fn update(&mut self, data: &[u8]);

    /// Consume the state and return the checksum
    fn finish(self) -> Self::Output;

    /// Checksum of a single contiguous buffer
    fn of(data: &[u8]) -> Self::Output {
        let mut state = Self::default();
        state.update(data);
        state.finish()
    }
}

/// CRC-32 (IEEE 802.3 polynomial)
#[derive(Clone, Default)]
pub struct Crc32(crc32fast::Hasher);

impl Checksum for Crc32 {
    type Output = u32;

    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finish(self) -> u32 {
        self.0.finalize()
    }
}
