//! On-chip flash medium for RP2040
//!
//! Uses the blocking embassy-rp flash driver over the last 64KB of flash.
//! Medium address 0 is the first byte of that partition.

use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use embedded_storage::nor_flash::ReadNorFlash;
use flashpage_core::{PageCache, PartitionConfig};
use flashpage_hal::NorFlashMedium;

/// Flash storage configuration
pub const FLASH_SIZE: usize = 2 * 1024 * 1024; // 2MB flash on SKR Pico
pub const STORAGE_PARTITION_SIZE: usize = 64 * 1024;
pub const STORAGE_PARTITION_START: usize = FLASH_SIZE - STORAGE_PARTITION_SIZE;

/// Page size of the storage formats: one erase sector
pub const STORAGE_PAGE_SIZE: usize = ERASE_SIZE;

const _: () = assert!(STORAGE_PARTITION_START % ERASE_SIZE == 0);
const _: () = assert!(STORAGE_PARTITION_SIZE % STORAGE_PAGE_SIZE == 0);

/// Blocking flash driver for the whole chip
pub type Rp2040Flash<'d> = Flash<'d, FLASH, Blocking, FLASH_SIZE>;

/// Storage partition as a medium
pub type Rp2040Medium<'d> = NorFlashMedium<Rp2040Flash<'d>>;

/// Erase-sector page cache in front of the storage partition
pub type Rp2040PageCache<'d> = PageCache<Rp2040Medium<'d>, STORAGE_PAGE_SIZE>;

/// Open the storage partition
pub fn medium(flash: Peri<'_, FLASH>) -> Rp2040Medium<'_> {
    let flash = Flash::new_blocking(flash);
    debug_assert_eq!(flash.capacity(), FLASH_SIZE);
    NorFlashMedium::new(
        flash,
        STORAGE_PARTITION_START as u32,
        STORAGE_PARTITION_SIZE as u32,
    )
}

/// Open the storage partition behind a page cache
pub fn page_cache(flash: Peri<'_, FLASH>) -> Rp2040PageCache<'_> {
    PageCache::new(medium(flash))
}

/// Partition layout in medium addresses
pub const fn partition() -> PartitionConfig {
    PartitionConfig::new(0, STORAGE_PARTITION_SIZE as u32, STORAGE_PAGE_SIZE as u32)
}
