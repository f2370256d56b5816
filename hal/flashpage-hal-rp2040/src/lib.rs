//! RP2040 backend for flashpage storage
//!
//! Exposes the storage partition at the top of the on-chip QSPI flash as a
//! [`Medium`](flashpage_hal::Medium), plus a page cache sized to the
//! flash erase block so storage writers get byte-granular writes.

#![no_std]

pub mod flash;

pub use flash::{medium, page_cache, partition, Rp2040Medium, Rp2040PageCache};
