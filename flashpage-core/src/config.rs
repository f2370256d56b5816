//! Storage partition configuration
//!
//! Describes where on the medium pages live. Page discovery beyond
//! "these are the candidate addresses" is left to the caller.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::layout::{Field, PageLayout};

/// Default page size in bytes (one RP2040 program page)
pub const DEFAULT_PAGE_SIZE: u32 = 256;

/// Partition configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Page size is zero or not a power of two
    InvalidPageSize,
    /// Base address is not page aligned
    UnalignedBase,
    /// Size is zero or not a whole number of pages
    InvalidSize,
    /// Partition runs past the end of the address space
    Overflow,
}

/// A page-organized window of the medium
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PartitionConfig {
    /// Medium address of the first page
    pub base: u32,
    /// Partition size in bytes
    pub size: u32,
    /// Page size in bytes
    pub page_size: u32,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::new(0, 64 * 1024, DEFAULT_PAGE_SIZE)
    }
}

impl PartitionConfig {
    /// Create a partition description
    pub const fn new(base: u32, size: u32, page_size: u32) -> Self {
        Self {
            base,
            size,
            page_size,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::InvalidPageSize);
        }
        if self.base % self.page_size != 0 {
            return Err(ConfigError::UnalignedBase);
        }
        if self.size == 0 || self.size % self.page_size != 0 {
            return Err(ConfigError::InvalidSize);
        }
        // Last byte must be addressable
        self.base
            .checked_add(self.size - 1)
            .ok_or(ConfigError::Overflow)?;
        Ok(())
    }

    /// Number of whole pages
    pub fn page_count(&self) -> u32 {
        self.size.checked_div(self.page_size).unwrap_or(0)
    }

    /// Address of page `index`
    pub fn page_address(&self, index: u32) -> Option<u32> {
        if index >= self.page_count() {
            return None;
        }
        index
            .checked_mul(self.page_size)
            .and_then(|offset| self.base.checked_add(offset))
    }

    /// Addresses of all pages, in order
    pub fn pages(&self) -> impl Iterator<Item = u32> {
        let config = *self;
        (0..config.page_count()).filter_map(move |i| config.page_address(i))
    }

    /// Whether `address` lies inside the partition
    pub fn contains(&self, address: u32) -> bool {
        address >= self.base && address - self.base < self.size
    }

    /// Payload bytes per page for a chain with field widths `W` and `C`
    pub fn payload_capacity<W: Field, C: Field>(&self) -> usize {
        (self.page_size as usize).saturating_sub(PageLayout::<W, C>::HEADER_SIZE)
    }
}
