//! Single-dump inspection: walk every page record in order, classify its
//! status trailer, and tally the results.

use std::io::{Read, Seek};

use crate::dump::status::{PageStatus, StatusEndian, StatusPair};
use crate::dump::{check_stream_size, read_record, DumpGeometry, PageId};
use crate::error::Result;

/// Classification tallies for one dump. Handed out only after a fully
/// successful walk; a pass that fails partway returns nothing.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct ScanStats {
    /// Cleanly read pages. Deliberately skipped pages count here too.
    pub correct: u64,
    pub ecc_errors: u64,
    pub blank: u64,
    pub unknown: u64,
    pub total_pages: u64,

    /// Whether any page carried the skip marker (a "spot" capture).
    pub spot_file: bool,
}

/// Settings for a scan pass.
#[derive(Debug, Default, Copy, Clone)]
pub struct ScanOptions {
    pub endian: StatusEndian,

    /// Print one classification line per page.
    pub verbose: bool,
}

/// Classify all `geometry.page_count()` records of `dump`.
///
/// The stream must hold exactly one dump of this geometry; anything else is
/// a size mismatch before the walk even starts.
pub fn scan_dump<R: Read + Seek>(
    geometry: &DumpGeometry,
    dump: &mut R,
    options: ScanOptions,
) -> Result<ScanStats> {
    check_stream_size(geometry, dump)?;

    let page_count = geometry.page_count();
    let rpt = howudoin::new()
        .label("Classifying pages")
        .set_len(page_count);

    let mut stats = ScanStats::default();
    let mut record = vec![0u8; geometry.dump_page_size() as usize];

    for index in 0..page_count {
        read_record(dump, &mut record, index)?;
        let status = StatusPair::from_record(&record, options.endian).classify();

        // Unrecognized status words are worth a line even without -V.
        if options.verbose || matches!(status, PageStatus::Unknown(..)) {
            println!("{} {}", PageId::from_index(index), status);
        }

        match status {
            PageStatus::Correct => stats.correct += 1,
            PageStatus::SkippedSpot => {
                if !stats.spot_file {
                    stats.spot_file = true;
                    rpt.add_info("Spot file detected: skipped pages count as correctly read");
                }
                stats.correct += 1;
            }
            PageStatus::EccError => stats.ecc_errors += 1,
            PageStatus::Blank => stats.blank += 1,
            PageStatus::Unknown(..) => stats.unknown += 1,
        }

        stats.total_pages += 1;
        rpt.inc();
    }

    rpt.close();

    Ok(stats)
}

#[cfg(test)]
const TEST_GEOMETRY: DumpGeometry = DumpGeometry {
    page_bytes: 8,
    meta_per_logical_page: 4,
    block_pages: 2,
    ce_blocks: 1,
    ce: 2,
};

/// Build one 20-byte test record with the given payload fill and trailer.
#[cfg(test)]
pub(crate) fn test_record(geometry: &DumpGeometry, fill: u8, ret1: u32, ret2: u32) -> Vec<u8> {
    let mut record = vec![fill; geometry.dump_page_size() as usize];
    let trailer_at = record.len() - 8;
    record[trailer_at..trailer_at + 4].copy_from_slice(&ret1.to_le_bytes());
    record[trailer_at + 4..].copy_from_slice(&ret2.to_le_bytes());
    record
}

#[cfg(test)]
fn test_options() -> ScanOptions {
    ScanOptions {
        endian: StatusEndian::Little,
        verbose: false,
    }
}

#[test]
fn test_scan_mixed_statuses() -> Result<()> {
    use crate::dump::status::{BLANK_CODE, ECC_ERROR_CODE};
    use std::io::Cursor;

    let mut dump = Vec::new();
    dump.extend(test_record(&TEST_GEOMETRY, 0xAA, 0, 0));
    dump.extend(test_record(&TEST_GEOMETRY, 0xBB, ECC_ERROR_CODE, 0));
    dump.extend(test_record(&TEST_GEOMETRY, 0xCC, BLANK_CODE, 0));
    dump.extend(test_record(&TEST_GEOMETRY, 0xDD, 0x1234, 0x5678));

    let stats = scan_dump(&TEST_GEOMETRY, &mut Cursor::new(dump), test_options())?;
    assert_eq!(stats.correct, 1);
    assert_eq!(stats.ecc_errors, 1);
    assert_eq!(stats.blank, 1);
    assert_eq!(stats.unknown, 1);
    assert_eq!(stats.total_pages, TEST_GEOMETRY.page_count());
    assert!(!stats.spot_file);

    // Every page lands in exactly one bucket.
    assert_eq!(
        stats.correct + stats.ecc_errors + stats.blank + stats.unknown,
        stats.total_pages
    );

    Ok(())
}

#[test]
fn test_scan_spot_file() -> Result<()> {
    use crate::dump::status::SKIPPED_MARKER;
    use std::io::Cursor;

    let mut dump = Vec::new();
    dump.extend(test_record(&TEST_GEOMETRY, 0x00, 0, 0));
    dump.extend(test_record(&TEST_GEOMETRY, 0xFF, SKIPPED_MARKER, 0));
    dump.extend(test_record(&TEST_GEOMETRY, 0xFF, SKIPPED_MARKER, 0));
    dump.extend(test_record(&TEST_GEOMETRY, 0x00, 0, 0));

    let stats = scan_dump(&TEST_GEOMETRY, &mut Cursor::new(dump), test_options())?;
    assert_eq!(stats.correct, 4);
    assert_eq!(stats.total_pages, 4);
    assert!(stats.spot_file);

    Ok(())
}

#[test]
fn test_scan_size_mismatch() {
    use crate::error::Error;
    use std::io::Cursor;

    // One byte short of a full dump.
    let len = TEST_GEOMETRY.expected_file_size() as usize - 1;
    let result = scan_dump(
        &TEST_GEOMETRY,
        &mut Cursor::new(vec![0u8; len]),
        test_options(),
    );

    assert!(matches!(result, Err(Error::SizeMismatch { .. })));
}

#[test]
fn test_scan_all_zero_trailers() -> Result<()> {
    use std::io::Cursor;

    // The reference capture geometry: 8212-byte records, 4 pages, 32848 bytes.
    let geometry = DumpGeometry {
        page_bytes: 8192,
        meta_per_logical_page: 12,
        block_pages: 2,
        ce_blocks: 1,
        ce: 2,
    };

    let dump = vec![0u8; geometry.expected_file_size() as usize];
    let stats = scan_dump(&geometry, &mut Cursor::new(dump), test_options())?;

    assert_eq!(stats.correct, 4);
    assert_eq!(stats.ecc_errors, 0);
    assert_eq!(stats.blank, 0);
    assert_eq!(stats.unknown, 0);

    Ok(())
}
