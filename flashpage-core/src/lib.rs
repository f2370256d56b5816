//! Integrity-checked page storage for flash
//!
//! This crate contains the board-agnostic storage logic that sits on top
//! of a [`Medium`](flashpage_hal::Medium):
//!
//! - 128-bit identifiers and the format magics
//! - Fixed-offset header codecs
//! - Single-region storage (one header, one payload, one CRC)
//! - Paged chain storage (a header and CRC per page)
//! - A one-page write-coalescing cache with a pre-flush hook
//! - Partition configuration
//!
//! # Layering
//!
//! ```text
//! RegionWriter / PageChain ──▶ PageCache<M, PAGE> ──▶ M: Medium (flash)
//!      sub-page field writes     whole-page writes
//! ```
//!
//! The cache is itself a medium, so writers placed on top of it have
//! their header and payload writes merged into whole-page writes.
//!
//! Nothing here is thread-safe or atomic across power loss; callers that
//! share an instance between contexts must serialize access.

#![no_std]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module
mod fmt;

pub mod cache;
pub mod chain;
pub mod config;
pub mod error;
pub mod id;
pub mod layout;
pub mod region;

pub use cache::{CacheStatus, NoHook, PageCache, PreFlush};
pub use chain::{stamp_page_crc, CheckOptions, CrcStamp, PageChain};
pub use config::{ConfigError, PartitionConfig};
pub use error::{AccessError, CheckError, Corruption};
pub use id::{Identifier, PAGE_MAGIC, REGION_MAGIC};
pub use layout::{Field, PageMetrics};
pub use region::{RegionReader, RegionWriter};

// Re-export the medium boundary so users need a single dependency
pub use flashpage_hal::{Checksum, Crc32, CrcOf, Medium, MediumError, RamMedium};
