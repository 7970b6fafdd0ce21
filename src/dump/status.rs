//! Decoding and classification of the per-page status trailer.
//!
//! Every record ends with two 4-byte words copied straight out of the flash
//! controller's page-read response. A clean read leaves both words zero; the
//! known failure codes only ever appear in the first word, with the second
//! still zero. The words are stored in the capture device's native byte
//! order, so a host of the other endianness has to say so explicitly.

use std::fmt;
use std::str::FromStr;

use bytes::Buf;

use super::STATUS_TRAILER_BYTES;

/// Controller status for an uncorrectable ECC failure.
pub const ECC_ERROR_CODE: u32 = 0xE00002D1;

/// Controller status for erased/unformatted media.
pub const BLANK_CODE: u32 = 0xE00002E5;

/// Marker for a page the capture deliberately skipped (a "spot" dump).
pub const SKIPPED_MARKER: u32 = 0x32489122;

/// Byte order of the status words.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StatusEndian {
    Little,
    Big,
}

impl StatusEndian {
    /// The host's byte order, the right choice when the capture ran on
    /// hardware of the same endianness.
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::Big
        } else {
            Self::Little
        }
    }
}

impl Default for StatusEndian {
    fn default() -> Self {
        Self::native()
    }
}

impl FromStr for StatusEndian {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "little" => Ok(Self::Little),
            "big" => Ok(Self::Big),
            "native" => Ok(Self::native()),
            _ => anyhow::bail!("expected \"little\", \"big\" or \"native\""),
        }
    }
}

/// The two status words at the tail of one page record.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct StatusPair {
    pub ret1: u32,
    pub ret2: u32,
}

impl StatusPair {
    /// Split the trailing status words off a full page record.
    pub fn from_record(record: &[u8], endian: StatusEndian) -> Self {
        let mut trailer = &record[record.len() - STATUS_TRAILER_BYTES as usize..];
        let (ret1, ret2) = match endian {
            StatusEndian::Little => (trailer.get_u32_le(), trailer.get_u32_le()),
            StatusEndian::Big => (trailer.get_u32(), trailer.get_u32()),
        };

        Self { ret1, ret2 }
    }

    /// Did the controller report a fully clean read?
    pub fn is_clean(self) -> bool {
        self.ret1 == 0 && self.ret2 == 0
    }

    pub fn classify(self) -> PageStatus {
        PageStatus::classify(self.ret1, self.ret2)
    }
}

/// What the controller reported for one page.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageStatus {
    /// Both status words zero: the page read back cleanly.
    Correct,

    /// The capture skipped this page on purpose; not a hardware failure.
    SkippedSpot,

    /// Uncorrectable ECC failure. The payload still holds the raw,
    /// possibly bit-flipped data.
    EccError,

    /// Erased/unformatted media; nothing was ever programmed here.
    Blank,

    /// A status pair this tool does not recognize.
    Unknown(u32, u32),
}

impl PageStatus {
    /// Map a raw status pair to its classification.
    pub fn classify(ret1: u32, ret2: u32) -> Self {
        match (ret1, ret2) {
            (0, 0) => Self::Correct,
            (SKIPPED_MARKER, 0) => Self::SkippedSpot,
            (ECC_ERROR_CODE, 0) => Self::EccError,
            (BLANK_CODE, 0) => Self::Blank,
            _ => Self::Unknown(ret1, ret2),
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correct => f.write_str("correctly read page"),
            Self::SkippedSpot => f.write_str("skipped by the capture (spot page)"),
            Self::EccError => f.write_str("reported ECC error"),
            Self::Blank => f.write_str("reported unformatted media (erased page?)"),
            Self::Unknown(ret1, ret2) => write!(f, "unknown values {ret1:04x}:{ret2:04x}"),
        }
    }
}

#[test]
fn test_classify() {
    assert_eq!(PageStatus::classify(0, 0), PageStatus::Correct);
    assert_eq!(
        PageStatus::classify(SKIPPED_MARKER, 0),
        PageStatus::SkippedSpot
    );
    assert_eq!(PageStatus::classify(ECC_ERROR_CODE, 0), PageStatus::EccError);
    assert_eq!(PageStatus::classify(BLANK_CODE, 0), PageStatus::Blank);

    // Any nonzero second word disqualifies the known codes.
    assert_eq!(
        PageStatus::classify(ECC_ERROR_CODE, 1),
        PageStatus::Unknown(ECC_ERROR_CODE, 1)
    );
    assert_eq!(
        PageStatus::classify(0xDEAD, 0xBEEF),
        PageStatus::Unknown(0xDEAD, 0xBEEF)
    );
}

#[test]
fn test_from_record() {
    let mut record = vec![0x55u8; 24];
    record[16..20].copy_from_slice(&ECC_ERROR_CODE.to_le_bytes());
    record[20..24].copy_from_slice(&7u32.to_le_bytes());

    let pair = StatusPair::from_record(&record, StatusEndian::Little);
    assert_eq!(
        pair,
        StatusPair {
            ret1: ECC_ERROR_CODE,
            ret2: 7,
        }
    );
    assert!(!pair.is_clean());

    let swapped = StatusPair::from_record(&record, StatusEndian::Big);
    assert_eq!(swapped.ret1, ECC_ERROR_CODE.swap_bytes());
    assert_eq!(swapped.ret2, 7u32.swap_bytes());
}

#[test]
fn test_native_endian() {
    let expected = if cfg!(target_endian = "big") {
        StatusEndian::Big
    } else {
        StatusEndian::Little
    };
    assert_eq!(StatusEndian::native(), expected);
    assert_eq!(StatusEndian::default(), expected);
    assert_eq!("native".parse::<StatusEndian>().unwrap(), expected);
    assert!("middle".parse::<StatusEndian>().is_err());
}
