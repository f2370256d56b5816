//! 128-bit identifiers
//!
//! Used both as the fixed "magic" that marks a storage format and as the
//! caller-chosen identity of a data set. The bytes are opaque: nothing
//! here interprets version or variant bits even though the values look
//! like UUIDs.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier size in bytes
pub const ID_SIZE: usize = 16;

/// Magic of the single-region format
pub const REGION_MAGIC: Identifier = Identifier([
    0xB0, 0x24, 0xF2, 0xDC, 0x72, 0xEA, 0x11, 0xE8, 0x85, 0x8E, 0x2C, 0xFD, 0xA1, 0xE1, 0xCE, 0xF5,
]);

/// Magic of the paged chain format
pub const PAGE_MAGIC: Identifier = Identifier([
    0xD2, 0x3C, 0x3B, 0x7A, 0x75, 0xF9, 0x11, 0xE8, 0x81, 0x90, 0x2C, 0xFD, 0xA1, 0xE1, 0xCE, 0xF5,
]);

/// Opaque 16-byte identifier, compared byte for byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Identifier([u8; ID_SIZE]);

/// Errors from parsing the text form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseIdError {
    /// A character other than a hex digit or `-`
    InvalidDigit,
    /// Not exactly 32 hex digits
    InvalidLength,
}

impl Identifier {
    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }

    /// Compare two possibly absent identifiers
    ///
    /// Absent on either side never compares equal.
    pub fn equal(a: Option<&Identifier>, b: Option<&Identifier>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Canonical `8-4-4-4-12` lowercase text form
    pub fn hyphenated(&self) -> heapless::String<36> {
        use core::fmt::Write;

        let mut out = heapless::String::new();
        // 36 characters always fit
        let _ = write!(out, "{}", self);
        out
    }
}

impl From<[u8; ID_SIZE]> for Identifier {
    fn from(bytes: [u8; ID_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Identifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self)
    }
}

impl FromStr for Identifier {
    type Err = ParseIdError;

    /// Parse 32 hex digits; `-` separators are ignored wherever they appear
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; ID_SIZE];
        let mut digits = 0usize;

        for c in s.chars() {
            if c == '-' {
                continue;
            }
            let nibble = c.to_digit(16).ok_or(ParseIdError::InvalidDigit)? as u8;
            if digits >= ID_SIZE * 2 {
                return Err(ParseIdError::InvalidLength);
            }
            bytes[digits / 2] |= if digits % 2 == 0 { nibble << 4 } else { nibble };
            digits += 1;
        }

        if digits != ID_SIZE * 2 {
            return Err(ParseIdError::InvalidLength);
        }
        Ok(Self(bytes))
    }
}
