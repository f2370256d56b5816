//! NOR flash medium
//!
//! Adapts any `embedded-storage` NOR flash driver to [`Medium`] inside a
//! fixed partition window. Writes must cover whole erase blocks: each
//! write erases the blocks it touches and programs them. Put a page cache
//! with a page size equal to the erase size in front of this medium to
//! get byte-granular writes.

use embedded_storage::nor_flash::NorFlash;

use crate::checksum::Crc32;
use crate::medium::{Medium, MediumError};

/// NOR flash partition exposed as a medium
pub struct NorFlashMedium<F> {
    flash: F,
    /// Absolute flash offset of medium address 0
    base: u32,
    /// Partition size in bytes
    size: u32,
}

impl<F: NorFlash> NorFlashMedium<F> {
    /// Create a medium over `size` bytes of flash starting at `base`
    pub fn new(flash: F, base: u32, size: u32) -> Self {
        Self { flash, base, size }
    }

    /// Get the raw flash driver for low-level access
    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Release the flash driver
    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Partition size in bytes
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Translate a medium range into an absolute flash offset
    fn window(&self, address: u32, len: usize) -> Result<u32, MediumError> {
        let len = u32::try_from(len).map_err(|_| MediumError::OutOfRange)?;
        let end = address.checked_add(len).ok_or(MediumError::OutOfRange)?;
        if end > self.size {
            return Err(MediumError::OutOfRange);
        }
        self.base
            .checked_add(address)
            .ok_or(MediumError::OutOfRange)
    }
}

impl<F: NorFlash> Medium for NorFlashMedium<F> {
    type Checksum = Crc32;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), MediumError> {
        let offset = self.window(address, buf.len())?;
        if offset as usize % F::READ_SIZE != 0 || buf.len() % F::READ_SIZE != 0 {
            return Err(MediumError::Misaligned);
        }
        self.flash.read(offset, buf).map_err(|_| MediumError::Read)
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MediumError> {
        let offset = self.window(address, data.len())?;
        if offset as usize % F::ERASE_SIZE != 0 || data.len() % F::ERASE_SIZE != 0 {
            return Err(MediumError::Misaligned);
        }
        let end = offset + data.len() as u32;
        self.flash
            .erase(offset, end)
            .map_err(|_| MediumError::Erase)?;
        self.flash.write(offset, data).map_err(|_| MediumError::Write)
    }

    fn capacity(&self) -> u32 {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};

    const ERASE: usize = 64;

    /// Flash model that only clears bits on program, like real NOR
    struct MockFlash {
        data: [u8; 512],
        erases: usize,
    }

    impl ErrorType for MockFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MockFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.data.len()
        }
    }

    impl NorFlash for MockFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = ERASE;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.data[from as usize..to as usize].fill(0xFF);
            self.erases += 1;
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
                *cell &= *byte;
            }
            Ok(())
        }
    }

    fn medium() -> NorFlashMedium<MockFlash> {
        let flash = MockFlash {
            data: [0xFF; 512],
            erases: 0,
        };
        NorFlashMedium::new(flash, 128, 256)
    }

    #[test]
    fn test_write_erases_then_programs() {
        let mut medium = medium();
        medium.write(0, &[0x00; ERASE]).unwrap();
        // Second write only succeeds in restoring bits because of the erase
        medium.write(0, &[0xA5; ERASE]).unwrap();

        let mut buf = [0u8; ERASE];
        medium.read(0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xA5));
        assert_eq!(medium.flash().erases, 2);
    }

    #[test]
    fn test_partition_offset() {
        let mut medium = medium();
        medium.write(64, &[0x11; ERASE]).unwrap();
        assert_eq!(medium.flash().data[128 + 64], 0x11);
        assert_eq!(medium.flash().data[128 + 63], 0xFF);
    }

    #[test]
    fn test_rejects_partial_block() {
        let mut medium = medium();
        assert_eq!(medium.write(4, &[0; ERASE]), Err(MediumError::Misaligned));
        assert_eq!(medium.write(0, &[0; 8]), Err(MediumError::Misaligned));
    }

    #[test]
    fn test_rejects_outside_partition() {
        let mut medium = medium();
        assert_eq!(medium.write(256, &[0; ERASE]), Err(MediumError::OutOfRange));
        let mut buf = [0u8; 2];
        assert_eq!(medium.read(255, &mut buf), Err(MediumError::OutOfRange));
        assert_eq!(medium.capacity(), 256);
    }
}
