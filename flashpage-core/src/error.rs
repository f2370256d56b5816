//! Storage error kinds
//!
//! Validators report *why* a location cannot be trusted, accessors report
//! why a read or write could not be carried out.

use flashpage_hal::MediumError;

/// Kind of inconsistency found behind a matching magic and data identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Corruption {
    /// Stored checksum does not match the payload
    Crc,
    /// Size fields violate the page size invariants
    Metrics,
}

/// Result of validating a region or page that is not `Ok`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CheckError {
    /// Magic does not match this format
    NoStorage,
    /// Format matches but a different data set lives here
    AnotherStorage,
    /// Medium primitive failed
    Device(MediumError),
    /// Format and identity match but the content is inconsistent
    Corrupted(Corruption),
}

impl From<MediumError> for CheckError {
    fn from(e: MediumError) -> Self {
        CheckError::Device(e)
    }
}

/// Errors from reading or writing stored payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessError {
    /// Medium primitive failed
    Device(MediumError),
    /// Requested span lies outside the stored payload
    OutOfBounds,
    /// Payload does not fit the length field or the caller's buffer
    TooLarge,
    /// Value could not be encoded or decoded
    Encoding,
}

impl From<MediumError> for AccessError {
    fn from(e: MediumError) -> Self {
        AccessError::Device(e)
    }
}
