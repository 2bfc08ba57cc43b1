//! Memory size parsing and formatting utilities.
//!
//! Provides human-readable memory size parsing (e.g., "512K", "1.5G") for the
//! CLI and compact formatting for log lines and refusal messages.

use std::fmt;
use std::str::FromStr;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

/// Memory size in bytes with parsing and formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MemorySize(u64);

impl MemorySize {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from kibibytes (KiB).
    pub const fn from_kib(kib: u64) -> Self {
        Self(kib * KIB)
    }

    /// Create from mebibytes (MiB).
    pub const fn from_mib(mib: u64) -> Self {
        Self(mib * MIB)
    }

    /// Create from gibibytes (GiB).
    pub const fn from_gib(gib: u64) -> Self {
        Self(gib * GIB)
    }

    /// Get the raw byte count.
    pub const fn as_bytes(&self) -> u64 {
        self.0
    }

    /// Get the size in mebibytes (MiB), truncated.
    pub const fn as_mib(&self) -> u64 {
        self.0 / MIB
    }

    /// Get the size in gibibytes (GiB), truncated.
    pub const fn as_gib(&self) -> u64 {
        self.0 / GIB
    }

    /// Multiply by a non-negative factor, truncating toward zero.
    ///
    /// Saturates at `u64::MAX`; negative or NaN factors yield zero.
    pub fn scale(&self, factor: f64) -> Self {
        Self((self.0 as f64 * factor) as u64)
    }
}

impl From<u64> for MemorySize {
    fn from(bytes: u64) -> Self {
        Self(bytes)
    }
}

impl From<MemorySize> for u64 {
    fn from(size: MemorySize) -> Self {
        size.0
    }
}

/// Error returned when a memory size string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid memory size: {0}")]
pub struct ParseSizeError(String);

impl FromStr for MemorySize {
    type Err = ParseSizeError;

    /// Parse a human-readable memory size string.
    ///
    /// Supported formats:
    /// - Plain number: treated as MiB (e.g., "512" = 512 MiB)
    /// - With suffix: "64K", "1024M", "1.5G", "2GiB", "100B"
    /// - Case insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseSizeError("empty string".into()));
        }

        let num_end = s
            .chars()
            .position(|c| !c.is_ascii_digit() && c != '.')
            .unwrap_or(s.len());

        if num_end == 0 {
            return Err(ParseSizeError(format!("no numeric value in '{}'", s)));
        }

        let num_str = &s[..num_end];
        let suffix = s[num_end..].trim().to_lowercase();

        let value: f64 = num_str
            .parse()
            .map_err(|_| ParseSizeError(format!("invalid number: '{}'", num_str)))?;

        let multiplier = match suffix.as_str() {
            "" => MIB,
            "b" => 1,
            "k" | "kb" | "kib" => KIB,
            "m" | "mb" | "mib" => MIB,
            "g" | "gb" | "gib" => GIB,
            "t" | "tb" | "tib" => TIB,
            _ => {
                return Err(ParseSizeError(format!("unknown suffix: '{}'", suffix)));
            }
        };

        Ok(MemorySize((value * multiplier as f64) as u64))
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (unit, name) = match self.0 {
            n if n >= GIB => (GIB, "GiB"),
            n if n >= MIB => (MIB, "MiB"),
            n if n >= KIB => (KIB, "KiB"),
            n => return write!(f, "{} bytes", n),
        };

        let value = self.0 as f64 / unit as f64;
        if value.fract() < 0.01 {
            write!(f, "{} {}", self.0 / unit, name)
        } else {
            write!(f, "{:.1} {}", value, name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_number_as_mib() {
        assert_eq!(MemorySize::from_str("512").unwrap().as_mib(), 512);
        assert_eq!(MemorySize::from_str("1024").unwrap().as_gib(), 1);
    }

    #[test]
    fn test_parse_with_suffix() {
        assert_eq!(MemorySize::from_str("32G").unwrap().as_gib(), 32);
        assert_eq!(MemorySize::from_str("32GiB").unwrap().as_gib(), 32);
        assert_eq!(MemorySize::from_str("1024M").unwrap().as_mib(), 1024);
        assert_eq!(MemorySize::from_str("512k").unwrap().as_bytes(), 512 * 1024);
        assert_eq!(MemorySize::from_str("100B").unwrap().as_bytes(), 100);
        assert_eq!(MemorySize::from_str("1T").unwrap().as_gib(), 1024);
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(MemorySize::from_str("1.5G").unwrap().as_mib(), 1536);
        assert_eq!(MemorySize::from_str("0.5M").unwrap().as_bytes(), 512 * 1024);
    }

    #[test]
    fn test_parse_errors() {
        assert!(MemorySize::from_str("").is_err());
        assert!(MemorySize::from_str("abc").is_err());
        assert!(MemorySize::from_str("32X").is_err());
        assert!(MemorySize::from_str("-5G").is_err());
        assert!(MemorySize::from_str("1.2.3M").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(MemorySize::from_gib(8).to_string(), "8 GiB");
        assert_eq!(MemorySize::from_mib(512).to_string(), "512 MiB");
        assert_eq!(MemorySize::from_mib(1536).to_string(), "1.5 GiB");
        assert_eq!(MemorySize::from_kib(512).to_string(), "512 KiB");
        assert_eq!(MemorySize::from_bytes(100).to_string(), "100 bytes");
    }

    #[test]
    fn test_scale_truncates() {
        assert_eq!(MemorySize::from_bytes(10).scale(1.5).as_bytes(), 15);
        assert_eq!(MemorySize::from_bytes(11).scale(1.5).as_bytes(), 16);
        assert_eq!(MemorySize::from_bytes(3).scale(0.5).as_bytes(), 1);
        assert_eq!(MemorySize::from_bytes(3).scale(-1.0).as_bytes(), 0);
        assert_eq!(MemorySize::from_bytes(u64::MAX).scale(2.0).as_bytes(), u64::MAX);
    }
}
