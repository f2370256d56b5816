//! In-RAM medium
//!
//! A fixed-size byte image that behaves like an erased flash part. Used
//! for host tests and simulation: it records every physical write and can
//! be told to fail reads or writes on demand.

use heapless::Vec;

use crate::checksum::Crc32;
use crate::medium::{Medium, MediumError};

/// Erased byte value of NOR flash
pub const ERASED: u8 = 0xFF;

/// Number of writes kept in the write log
pub const WRITE_LOG_CAPACITY: usize = 32;

/// One physical write as seen by the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WriteRecord {
    /// Start address
    pub address: u32,
    /// Length in bytes
    pub len: usize,
}

/// RAM-backed medium of `N` bytes
pub struct RamMedium<const N: usize> {
    data: [u8; N],
    /// When set, only whole, aligned pages of this size may be written
    page: Option<u32>,
    log: Vec<WriteRecord, WRITE_LOG_CAPACITY>,
    writes: usize,
    fail_reads: bool,
    fail_writes: bool,
    /// Reads left before reads start failing
    reads_left: Option<usize>,
    /// Writes left before writes start failing
    writes_left: Option<usize>,
}

impl<const N: usize> Default for RamMedium<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamMedium<N> {
    /// Create an erased medium accepting writes of any size
    pub fn new() -> Self {
        Self {
            data: [ERASED; N],
            page: None,
            log: Vec::new(),
            writes: 0,
            fail_reads: false,
            fail_writes: false,
            reads_left: None,
            writes_left: None,
        }
    }

    /// Create an erased medium that rejects anything but whole-page writes
    ///
    /// A page size of zero places no restriction on writes.
    pub fn page_aligned(page: u32) -> Self {
        Self {
            page: (page != 0).then_some(page),
            ..Self::new()
        }
    }

    /// Raw image
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Raw image, mutable (bypasses the write log)
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Total number of successful writes since creation
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Most recent successful writes, oldest first
    pub fn write_log(&self) -> &[WriteRecord] {
        &self.log
    }

    /// Forget recorded writes
    pub fn clear_log(&mut self) {
        self.log.clear();
        self.writes = 0;
    }

    /// Make every read fail
    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
        self.reads_left = None;
    }

    /// Let `count` more reads succeed, then fail the rest
    pub fn fail_reads_after(&mut self, count: usize) {
        self.fail_reads = false;
        self.reads_left = Some(count);
    }

    /// Make every write fail
    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
        self.writes_left = None;
    }

    /// Let `count` more writes succeed, then fail the rest
    pub fn fail_writes_after(&mut self, count: usize) {
        self.fail_writes = false;
        self.writes_left = Some(count);
    }

    fn range(&self, address: u32, len: usize) -> Result<core::ops::Range<usize>, MediumError> {
        let start = address as usize;
        let end = start.checked_add(len).ok_or(MediumError::OutOfRange)?;
        if end > N {
            return Err(MediumError::OutOfRange);
        }
        Ok(start..end)
    }
}

impl<const N: usize> Medium for RamMedium<N> {
    type Checksum = Crc32;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), MediumError> {
        if self.fail_reads {
            return Err(MediumError::Read);
        }
        if let Some(left) = self.reads_left.as_mut() {
            if *left == 0 {
                return Err(MediumError::Read);
            }
            *left -= 1;
        }
        let range = self.range(address, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), MediumError> {
        if let Some(page) = self.page {
            if address % page != 0 || data.len() % page as usize != 0 {
                return Err(MediumError::Misaligned);
            }
        }
        if self.fail_writes {
            return Err(MediumError::Write);
        }
        if let Some(left) = self.writes_left.as_mut() {
            if *left == 0 {
                return Err(MediumError::Write);
            }
            *left -= 1;
        }
        let range = self.range(address, data.len())?;
        self.data[range].copy_from_slice(data);
        self.writes += 1;
        // Log is best-effort once full
        let _ = self.log.push(WriteRecord {
            address,
            len: data.len(),
        });
        Ok(())
    }

    fn capacity(&self) -> u32 {
        u32::try_from(N).unwrap_or(u32::MAX)
    }
}
