//! Flashpage Hardware Abstraction Layer
//!
//! This crate defines the boundary between the storage core and the
//! non-volatile medium it lives on. Chip-specific crates implement
//! [`Medium`] for their flash; the core only ever talks to the trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  flashpage-core (regions, chains, cache)│
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  flashpage-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │  RamMedium /  │       │ flashpage-hal-│
//! │ NorFlashMedium│       │    rp2040     │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`medium::Medium`] - Read / write / compare / CRC over medium addresses
//! - [`checksum::Checksum`] - Streaming checksum used for payload integrity

#![no_std]
#![deny(unsafe_code)]

pub mod checksum;
pub mod medium;
#[cfg(feature = "embedded-storage")]
pub mod nor;
pub mod ram;

// Re-export key types at crate root for convenience
pub use checksum::{Checksum, Crc32};
pub use medium::{CrcOf, Medium, MediumError};
#[cfg(feature = "embedded-storage")]
pub use nor::NorFlashMedium;
pub use ram::{RamMedium, WriteRecord};
