//! The shape and addressing of a raw NAND dump.
//!
//! A dump is the concatenation of `page_count()` fixed-size records, one per
//! physical page, in the order the capture read them. Each record is the page
//! payload plus per-page metadata, followed by an 8-byte status trailer (see
//! [`status`]).

pub mod plist;
pub mod status;

use std::fmt;
use std::io::{Read, Seek, SeekFrom};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Bytes appended to every record: two 4-byte controller status words.
pub const STATUS_TRAILER_BYTES: u64 = 8;

/// A pub-fields struct describing the geometry of a NAND dump, as recorded
/// by the capture tooling's property list.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DumpGeometry {
    pub page_bytes: u64,
    pub meta_per_logical_page: u64,
    pub block_pages: u64,
    pub ce_blocks: u64,
    pub ce: u64,
}

impl DumpGeometry {
    /// Bytes per record in the dump file: payload, metadata, status trailer.
    pub fn dump_page_size(&self) -> u64 {
        self.page_bytes + self.meta_per_logical_page + STATUS_TRAILER_BYTES
    }

    /// Total number of page records in the dump.
    pub fn page_count(&self) -> u64 {
        self.block_pages * self.ce_blocks * self.ce
    }

    /// The exact byte length a dump of this geometry must have.
    pub fn expected_file_size(&self) -> u64 {
        self.dump_page_size() * self.page_count()
    }
}

/// Parse strings like "PAGExMETAxBLOCKPAGESxCEBLOCKSxCE"
impl FromStr for DumpGeometry {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let [page_bytes, meta_per_logical_page, block_pages, ce_blocks, ce]: [&str; 5] = s
            .split('x')
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| anyhow::anyhow!("expected #x#x#x#x#"))?;
        let page_bytes = page_bytes.parse()?;
        let meta_per_logical_page = meta_per_logical_page.parse()?;
        let block_pages = block_pages.parse()?;
        let ce_blocks = ce_blocks.parse()?;
        let ce = ce.parse()?;

        Ok(DumpGeometry {
            page_bytes,
            meta_per_logical_page,
            block_pages,
            ce_blocks,
            ce,
        })
    }
}

/// Physical identity of a page record, for reporting and logging only; the
/// classification and reconciliation policies never look at it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PageId {
    /// Which chip enable the page belongs to, 0 or 1.
    pub ce: u32,

    /// The page within that chip enable.
    pub page: u32,
}

impl PageId {
    /// The capture interleaves the chip enables, so record-index parity
    /// picks the CE and the rest is the page number.
    pub fn from_index(index: u64) -> Self {
        Self {
            ce: (index % 2) as u32,
            page: (index / 2) as u32,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CE:{} Page:0x{:04x}", self.ce, self.page)
    }
}

/// Measure a seekable stream and confirm it holds exactly one dump of this
/// geometry. Leaves the stream rewound to the start.
pub fn check_stream_size<S: Seek>(geometry: &DumpGeometry, stream: &mut S) -> Result<()> {
    let actual = stream.seek(SeekFrom::End(0))?;
    stream.seek(SeekFrom::Start(0))?;

    let expected = geometry.expected_file_size();
    if actual != expected {
        return Err(Error::SizeMismatch { expected, actual });
    }

    Ok(())
}

/// Fill `record` from the dump, turning an early EOF into the page-level
/// truncation error.
pub fn read_record<R: Read>(dump: &mut R, record: &mut [u8], page: u64) -> Result<()> {
    dump.read_exact(record).map_err(|e| match e.kind() {
        std::io::ErrorKind::UnexpectedEof => Error::TruncatedRead { page },
        _ => Error::Io(e),
    })
}

#[test]
fn test_derived_sizes() {
    let geometry = DumpGeometry {
        page_bytes: 8192,
        meta_per_logical_page: 12,
        block_pages: 2,
        ce_blocks: 1,
        ce: 2,
    };

    assert_eq!(geometry.dump_page_size(), 8212);
    assert_eq!(geometry.page_count(), 4);
    assert_eq!(geometry.expected_file_size(), 32848);
}

#[test]
fn test_geometry_from_str() {
    let geometry: DumpGeometry = "8192x12x2x1x2".parse().unwrap();
    assert_eq!(
        geometry,
        DumpGeometry {
            page_bytes: 8192,
            meta_per_logical_page: 12,
            block_pages: 2,
            ce_blocks: 1,
            ce: 2,
        }
    );

    assert!("8192x12x2x1".parse::<DumpGeometry>().is_err());
    assert!("8192x12x2x1x2x9".parse::<DumpGeometry>().is_err());
    assert!("8192x12xtwox1x2".parse::<DumpGeometry>().is_err());
}

#[test]
fn test_page_id() {
    assert_eq!(PageId::from_index(0), PageId { ce: 0, page: 0 });
    assert_eq!(PageId::from_index(1), PageId { ce: 1, page: 0 });
    assert_eq!(PageId::from_index(5), PageId { ce: 1, page: 2 });
    assert_eq!(PageId::from_index(5).to_string(), "CE:1 Page:0x0002");
}

#[test]
fn test_check_stream_size() {
    use std::io::Cursor;

    let geometry = DumpGeometry {
        page_bytes: 8,
        meta_per_logical_page: 4,
        block_pages: 2,
        ce_blocks: 1,
        ce: 2,
    };
    assert_eq!(geometry.expected_file_size(), 80);

    let mut exact = Cursor::new(vec![0u8; 80]);
    check_stream_size(&geometry, &mut exact).unwrap();
    assert_eq!(exact.position(), 0);

    let mut short = Cursor::new(vec![0u8; 79]);
    assert!(matches!(
        check_stream_size(&geometry, &mut short),
        Err(Error::SizeMismatch {
            expected: 80,
            actual: 79,
        })
    ));
}
