//! Human-readable reporting, keeping the aligned key/value layout of the
//! capture tooling this replaces.

use crate::dump::DumpGeometry;
use crate::merge::MergeStats;
use crate::scan::ScanStats;

const GEOMETRY_TAB: usize = 35;
const STATS_TAB: usize = 27;

/// Print one `name value` line with the value starting at column `width`.
fn print_value(name: &str, value: u64, width: usize) {
    println!("{name:<width$}{value}");
}

/// Echo the geometry, derived values included.
pub fn print_geometry(geometry: &DumpGeometry) {
    println!("## Data from the plist:");
    print_value("Bytes per page:", geometry.page_bytes, GEOMETRY_TAB);
    print_value(
        "Metadata bytes per logical page:",
        geometry.meta_per_logical_page,
        GEOMETRY_TAB,
    );
    print_value(
        "(calculated) dump page size:",
        geometry.dump_page_size(),
        GEOMETRY_TAB,
    );
    print_value("Block pages:", geometry.block_pages, GEOMETRY_TAB);
    print_value("CE blocks:", geometry.ce_blocks, GEOMETRY_TAB);
    print_value("CEs:", geometry.ce, GEOMETRY_TAB);
}

pub fn print_scan_stats(stats: &ScanStats) {
    print_value("ECC error pages:", stats.ecc_errors, STATS_TAB);
    print_value("Blank pages:", stats.blank, STATS_TAB);
    print_value("Correct pages:", stats.correct, STATS_TAB);
    print_value("Other pages:", stats.unknown, STATS_TAB);
    print_value("Total pages:", stats.total_pages, STATS_TAB);
}

pub fn print_merge_stats(stats: &MergeStats) {
    print_value(
        "Mismatching correct pages:",
        stats.correct_mismatching,
        STATS_TAB,
    );
    print_value("ECC error on one dump:", stats.ecc_on_one, STATS_TAB);
    print_value("Blank page on one dump:", stats.blank_on_one, STATS_TAB);
    print_value("ECC error on both dumps:", stats.ecc_on_both, STATS_TAB);
    print_value("Blank page on both dumps:", stats.blank_on_both, STATS_TAB);
    print_value("Unknown on both dumps:", stats.unknown_on_both, STATS_TAB);
    print_value("Total pages:", stats.total_pages, STATS_TAB);
}
