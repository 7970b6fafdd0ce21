//! Dual-dump reconciliation: walk two captures of the same media in
//! lockstep and keep, for every page, the record from whichever side read
//! it successfully.
//!
//! The first dump is the primary. Whenever neither side is clearly better
//! off, its record is the one written out; the second dump only wins a page
//! when it read cleanly and the primary did not, or when the primary's
//! failure says it holds no data at all (a skip marker, or a blank/unknown
//! status opposite an ECC failure, which at least still carries the raw
//! bits).

use std::io::{Read, Seek, Write};

use crate::dump::status::{PageStatus, StatusEndian, StatusPair};
use crate::dump::{check_stream_size, read_record, DumpGeometry, PageId};
use crate::error::Result;
use crate::spotlist::SpotList;

/// Which dump supplies the output record for a page.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Side {
    First,
    Second,
}

/// Why a page's record was chosen the way it was.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MergeOutcome {
    /// Both sides read clean and agree byte for byte.
    BothCorrectMatching,

    /// Both sides read clean but their bytes differ. The primary's record
    /// is kept; there is no signal to prefer the other side.
    BothCorrectMismatching,

    /// Exactly one side read clean; the other reported an ECC failure.
    CorrectedFromEcc,

    /// Exactly one side read clean; the other reported blank media, a skip
    /// marker, or something unrecognized.
    CorrectedFromBlank,

    /// Both captures skipped this page.
    BothSkipped,

    /// One capture skipped the page, the other failed to read it.
    SkippedVsFailed,

    /// Both sides failed and at least one failure was an ECC error.
    BothEcc,

    /// Both sides report erased media.
    BothBlank,

    /// Both sides failed with statuses this tool does not recognize.
    BothUnknown,

    /// A secondary status word was nonzero, but one side was fully clean
    /// and covers for it.
    AnomalousSecondaryRecovered,

    /// A secondary status word was nonzero and neither side read clean.
    AnomalousBothBad,
}

/// Per-page decision: which record to keep, and why.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Decision {
    pub side: Side,
    pub outcome: MergeOutcome,
}

/// Apply the reconciliation policy to one page's status pairs.
///
/// `same_bytes` compares the two full records; it is only consulted when
/// both sides claim a clean read.
pub fn decide(
    first: StatusPair,
    second: StatusPair,
    same_bytes: impl FnOnce() -> bool,
) -> Decision {
    use MergeOutcome::*;

    // The controller's protocol never sets the second word on its own; a
    // nonzero value there means the capture itself misbehaved, so the usual
    // per-code rules cannot be trusted for this page.
    if first.ret2 != 0 || second.ret2 != 0 {
        return if second.is_clean() {
            Decision {
                side: Side::Second,
                outcome: AnomalousSecondaryRecovered,
            }
        } else if !first.is_clean() {
            Decision {
                side: Side::First,
                outcome: AnomalousBothBad,
            }
        } else {
            Decision {
                side: Side::First,
                outcome: AnomalousSecondaryRecovered,
            }
        };
    }

    match (first.ret1 == 0, second.ret1 == 0) {
        (true, true) => {
            let outcome = if same_bytes() {
                BothCorrectMatching
            } else {
                BothCorrectMismatching
            };
            Decision {
                side: Side::First,
                outcome,
            }
        }
        (true, false) => Decision {
            side: Side::First,
            outcome: corrected_from(second),
        },
        (false, true) => Decision {
            side: Side::Second,
            outcome: corrected_from(first),
        },
        (false, false) => decide_both_failed(first, second),
    }
}

/// One side read clean; name the rescue after the other side's failure.
fn corrected_from(failed: StatusPair) -> MergeOutcome {
    match failed.classify() {
        PageStatus::EccError => MergeOutcome::CorrectedFromEcc,
        _ => MergeOutcome::CorrectedFromBlank,
    }
}

fn decide_both_failed(first: StatusPair, second: StatusPair) -> Decision {
    use MergeOutcome::*;

    let (a, b) = (first.classify(), second.classify());

    // A skipped page was never captured, so the other side's record is the
    // one worth keeping even though it reports a failure.
    if a == PageStatus::SkippedSpot || b == PageStatus::SkippedSpot {
        let side = if a == PageStatus::SkippedSpot {
            Side::Second
        } else {
            Side::First
        };
        let outcome = if a == b { BothSkipped } else { SkippedVsFailed };
        return Decision { side, outcome };
    }

    // An ECC failure still returns the page's raw bits, so it beats blank
    // or unrecognized statuses. A double ECC failure keeps the primary.
    if a == PageStatus::EccError || b == PageStatus::EccError {
        let side = if b == PageStatus::EccError && a != PageStatus::EccError {
            Side::Second
        } else {
            Side::First
        };
        return Decision {
            side,
            outcome: BothEcc,
        };
    }

    if a == PageStatus::Blank && b == PageStatus::Blank {
        return Decision {
            side: Side::First,
            outcome: BothBlank,
        };
    }

    Decision {
        side: Side::First,
        outcome: BothUnknown,
    }
}

/// Counter block for one reconciliation pass.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct MergeStats {
    /// Pages where both sides read clean but their bytes disagree.
    pub correct_mismatching: u64,

    /// Pages rescued where exactly one side failed with an ECC error.
    pub ecc_on_one: u64,

    /// Pages rescued where exactly one side failed some other way.
    pub blank_on_one: u64,

    /// Pages lost to read failures on both sides (ECC involved, or one
    /// side skipped while the other failed).
    pub ecc_on_both: u64,

    /// Pages erased on both sides.
    pub blank_on_both: u64,

    /// Pages with unrecognized failures on both sides.
    pub unknown_on_both: u64,

    pub total_pages: u64,
}

/// Settings for a merge pass.
#[derive(Debug, Default, Copy, Clone)]
pub struct MergeOptions {
    pub endian: StatusEndian,

    /// Print one outcome line per page.
    pub verbose: bool,
}

/// Reconcile two dumps of the same media, appending the chosen record for
/// every page to `output` in page order.
///
/// Both inputs must hold exactly one dump of this geometry. On success the
/// output has received exactly `geometry.expected_file_size()` bytes; on
/// error the output is abandoned mid-write and must not be treated as a
/// valid dump (see [`crate::output::PendingFile`]).
pub fn merge_dumps<P, S, W, L>(
    geometry: &DumpGeometry,
    primary: &mut P,
    secondary: &mut S,
    output: &mut W,
    mut spot_list: Option<&mut SpotList<L>>,
    options: MergeOptions,
) -> Result<MergeStats>
where
    P: Read + Seek,
    S: Read + Seek,
    W: Write,
    L: Write,
{
    check_stream_size(geometry, primary)?;
    check_stream_size(geometry, secondary)?;

    let page_count = geometry.page_count();
    let rpt = howudoin::new()
        .label("Reconciling dumps")
        .set_len(page_count);

    let record_size = geometry.dump_page_size() as usize;
    let mut first = vec![0u8; record_size];
    let mut second = vec![0u8; record_size];

    let mut stats = MergeStats::default();
    let mut both_skipped_warned = false;

    for index in 0..page_count {
        read_record(primary, &mut first, index)?;
        read_record(secondary, &mut second, index)?;

        let a = StatusPair::from_record(&first, options.endian);
        let b = StatusPair::from_record(&second, options.endian);
        let decision = decide(a, b, || first == second);
        let id = PageId::from_index(index);

        match decision.outcome {
            MergeOutcome::BothCorrectMatching | MergeOutcome::AnomalousSecondaryRecovered => (),
            MergeOutcome::BothCorrectMismatching => stats.correct_mismatching += 1,
            MergeOutcome::CorrectedFromEcc => stats.ecc_on_one += 1,
            MergeOutcome::CorrectedFromBlank => stats.blank_on_one += 1,
            MergeOutcome::BothSkipped => {
                if !both_skipped_warned {
                    both_skipped_warned = true;
                    rpt.add_info("Pages skipped on both sides; the captures' spot lists overlap");
                }
            }
            MergeOutcome::SkippedVsFailed | MergeOutcome::BothEcc => {
                if let Some(list) = &mut spot_list {
                    list.push(id)?;
                }
                stats.ecc_on_both += 1;
            }
            MergeOutcome::BothBlank => {
                if let Some(list) = &mut spot_list {
                    list.push(id)?;
                }
                stats.blank_on_both += 1;
            }
            MergeOutcome::BothUnknown => {
                if let Some(list) = &mut spot_list {
                    list.push(id)?;
                }
                stats.unknown_on_both += 1;
            }
            MergeOutcome::AnomalousBothBad => {
                eprintln!(
                    "{id} has unexpected secondary status words on both dumps \
                     ({:#010x}/{:#010x})",
                    a.ret2, b.ret2
                );
            }
        }

        if options.verbose {
            let kept = match decision.side {
                Side::First => 1,
                Side::Second => 2,
            };
            println!("{id} {:?} (keeping dump {kept})", decision.outcome);
        }

        let chosen = match decision.side {
            Side::First => &first,
            Side::Second => &second,
        };
        output.write_all(chosen)?;

        stats.total_pages += 1;
        rpt.inc();
    }

    rpt.close();

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dump::status::{BLANK_CODE, ECC_ERROR_CODE, SKIPPED_MARKER};
    use crate::scan::test_record;
    use std::io::Cursor;

    const TEST_GEOMETRY: DumpGeometry = DumpGeometry {
        page_bytes: 8,
        meta_per_logical_page: 4,
        block_pages: 3,
        ce_blocks: 1,
        ce: 2,
    };

    fn pair(ret1: u32, ret2: u32) -> StatusPair {
        StatusPair { ret1, ret2 }
    }

    fn options() -> MergeOptions {
        MergeOptions {
            endian: StatusEndian::Little,
            verbose: false,
        }
    }

    /// Run a merge over in-memory dumps, returning stats, output, spot list.
    fn run_merge(dump1: Vec<u8>, dump2: Vec<u8>) -> Result<(MergeStats, Vec<u8>, String)> {
        let mut output = Vec::new();
        let mut spot_list = SpotList::new(Vec::new());

        let stats = merge_dumps(
            &TEST_GEOMETRY,
            &mut Cursor::new(dump1),
            &mut Cursor::new(dump2),
            &mut output,
            Some(&mut spot_list),
            options(),
        )?;

        let text = String::from_utf8(spot_list.into_inner()).unwrap();
        Ok((stats, output, text))
    }

    #[test]
    fn test_decide_both_correct() {
        let d = decide(pair(0, 0), pair(0, 0), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::BothCorrectMatching);

        let d = decide(pair(0, 0), pair(0, 0), || false);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::BothCorrectMismatching);
    }

    #[test]
    fn test_decide_one_correct() {
        // The clean side wins regardless of which one it is.
        let d = decide(pair(ECC_ERROR_CODE, 0), pair(0, 0), || unreachable!());
        assert_eq!(d.side, Side::Second);
        assert_eq!(d.outcome, MergeOutcome::CorrectedFromEcc);

        let d = decide(pair(0, 0), pair(BLANK_CODE, 0), || unreachable!());
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::CorrectedFromBlank);

        // An unrecognized failure folds into the blank bucket.
        let d = decide(pair(0xDEAD, 0), pair(0, 0), || unreachable!());
        assert_eq!(d.side, Side::Second);
        assert_eq!(d.outcome, MergeOutcome::CorrectedFromBlank);
    }

    #[test]
    fn test_decide_skip_marker() {
        // Skipped on the primary: the other side's record is the real one.
        let d = decide(pair(SKIPPED_MARKER, 0), pair(ECC_ERROR_CODE, 0), || true);
        assert_eq!(d.side, Side::Second);
        assert_eq!(d.outcome, MergeOutcome::SkippedVsFailed);

        let d = decide(pair(BLANK_CODE, 0), pair(SKIPPED_MARKER, 0), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::SkippedVsFailed);

        let d = decide(pair(SKIPPED_MARKER, 0), pair(SKIPPED_MARKER, 0), || true);
        assert_eq!(d.side, Side::Second);
        assert_eq!(d.outcome, MergeOutcome::BothSkipped);
    }

    #[test]
    fn test_decide_both_failed() {
        // ECC beats blank: that side still holds the raw bits.
        let d = decide(pair(ECC_ERROR_CODE, 0), pair(BLANK_CODE, 0), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::BothEcc);

        let d = decide(pair(BLANK_CODE, 0), pair(ECC_ERROR_CODE, 0), || true);
        assert_eq!(d.side, Side::Second);
        assert_eq!(d.outcome, MergeOutcome::BothEcc);

        // Double ECC keeps the primary.
        let d = decide(pair(ECC_ERROR_CODE, 0), pair(ECC_ERROR_CODE, 0), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::BothEcc);

        let d = decide(pair(BLANK_CODE, 0), pair(BLANK_CODE, 0), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::BothBlank);

        let d = decide(pair(0xDEAD, 0), pair(BLANK_CODE, 0), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::BothUnknown);
    }

    #[test]
    fn test_decide_anomalous_secondary() {
        // Fully clean second dump recovers the page.
        let d = decide(pair(0, 7), pair(0, 0), || true);
        assert_eq!(d.side, Side::Second);
        assert_eq!(d.outcome, MergeOutcome::AnomalousSecondaryRecovered);

        // Fully clean first dump covers for the anomalous second.
        let d = decide(pair(0, 0), pair(0, 7), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::AnomalousSecondaryRecovered);

        // Neither clean: keep the primary, flag the page.
        let d = decide(pair(ECC_ERROR_CODE, 7), pair(0, 9), || true);
        assert_eq!(d.side, Side::First);
        assert_eq!(d.outcome, MergeOutcome::AnomalousBothBad);
    }

    #[test]
    fn test_merge_with_itself_is_identity() -> Result<()> {
        let mut dump = Vec::new();
        for (i, &(ret1, ret2)) in [
            (0, 0),
            (0, 0),
            (BLANK_CODE, 0),
            (0, 0),
            (ECC_ERROR_CODE, 0),
            (0, 0),
        ]
        .iter()
        .enumerate()
        {
            dump.extend(test_record(&TEST_GEOMETRY, i as u8, ret1, ret2));
        }

        let (stats, output, _) = run_merge(dump.clone(), dump.clone())?;
        assert_eq!(stats.correct_mismatching, 0);
        assert_eq!(output, dump);
        assert_eq!(output.len() as u64, TEST_GEOMETRY.expected_file_size());

        Ok(())
    }

    #[test]
    fn test_merge_rescues_ecc_page() -> Result<()> {
        let mut dump1 = Vec::new();
        let mut dump2 = Vec::new();
        for i in 0..TEST_GEOMETRY.page_count() as u8 {
            if i == 2 {
                dump1.extend(test_record(&TEST_GEOMETRY, 0xEE, ECC_ERROR_CODE, 0));
                dump2.extend(test_record(&TEST_GEOMETRY, 0x22, 0, 0));
            } else {
                dump1.extend(test_record(&TEST_GEOMETRY, i, 0, 0));
                dump2.extend(test_record(&TEST_GEOMETRY, i, 0, 0));
            }
        }

        let (stats, output, text) = run_merge(dump1, dump2)?;
        assert_eq!(stats.ecc_on_one, 1);
        assert_eq!(stats.blank_on_one, 0);
        assert_eq!(stats.ecc_on_both, 0);
        assert_eq!(stats.correct_mismatching, 0);
        assert_eq!(stats.total_pages, 6);
        assert!(text.is_empty());

        // The output's page 2 is dump2's record.
        let record_size = TEST_GEOMETRY.dump_page_size() as usize;
        let rescued = &output[2 * record_size..3 * record_size];
        assert_eq!(rescued, test_record(&TEST_GEOMETRY, 0x22, 0, 0));

        Ok(())
    }

    #[test]
    fn test_merge_double_ecc_logs_spot() -> Result<()> {
        let mut dump1 = Vec::new();
        let mut dump2 = Vec::new();
        for i in 0..TEST_GEOMETRY.page_count() as u8 {
            if i == 5 {
                dump1.extend(test_record(&TEST_GEOMETRY, 0x11, ECC_ERROR_CODE, 0));
                dump2.extend(test_record(&TEST_GEOMETRY, 0x22, ECC_ERROR_CODE, 0));
            } else {
                dump1.extend(test_record(&TEST_GEOMETRY, i, 0, 0));
                dump2.extend(test_record(&TEST_GEOMETRY, i, 0, 0));
            }
        }

        let (stats, output, text) = run_merge(dump1, dump2)?;
        assert_eq!(stats.ecc_on_both, 1);

        // Page index 5 is CE 1, logical page 2; the tie keeps dump1's bytes.
        let record_size = TEST_GEOMETRY.dump_page_size() as usize;
        let kept = &output[5 * record_size..6 * record_size];
        assert_eq!(kept, test_record(&TEST_GEOMETRY, 0x11, ECC_ERROR_CODE, 0));
        assert_eq!(text, "spot_list[0].ce=1;\nspot_list[0].page=0x0002;\n");

        Ok(())
    }

    #[test]
    fn test_merge_spot_indices_stay_monotonic() -> Result<()> {
        // Page 1: skipped vs ECC (rule 4); page 4: blank on both (rule 5).
        let mut dump1 = Vec::new();
        let mut dump2 = Vec::new();
        for i in 0..TEST_GEOMETRY.page_count() as u8 {
            let (s1, s2) = match i {
                1 => (SKIPPED_MARKER, ECC_ERROR_CODE),
                4 => (BLANK_CODE, BLANK_CODE),
                _ => (0, 0),
            };
            dump1.extend(test_record(&TEST_GEOMETRY, i, s1, 0));
            dump2.extend(test_record(&TEST_GEOMETRY, i, s2, 0));
        }

        let (stats, _, text) = run_merge(dump1, dump2)?;
        assert_eq!(stats.ecc_on_both, 1);
        assert_eq!(stats.blank_on_both, 1);
        assert_eq!(
            text,
            "spot_list[0].ce=1;\n\
             spot_list[0].page=0x0000;\n\
             spot_list[1].ce=0;\n\
             spot_list[1].page=0x0002;\n"
        );

        Ok(())
    }

    #[test]
    fn test_merge_both_skipped_counts_nothing() -> Result<()> {
        let mut dump1 = Vec::new();
        let mut dump2 = Vec::new();
        for i in 0..TEST_GEOMETRY.page_count() as u8 {
            let status = if i == 3 { SKIPPED_MARKER } else { 0 };
            dump1.extend(test_record(&TEST_GEOMETRY, i, status, 0));
            dump2.extend(test_record(&TEST_GEOMETRY, i, status, 0));
        }

        let (stats, _, text) = run_merge(dump1, dump2)?;
        assert_eq!(stats, MergeStats {
            total_pages: 6,
            ..Default::default()
        });
        assert!(text.is_empty());

        Ok(())
    }

    #[test]
    fn test_merge_size_mismatch_on_either_side() {
        use crate::error::Error;

        let good = vec![0u8; TEST_GEOMETRY.expected_file_size() as usize];
        let short = vec![0u8; TEST_GEOMETRY.expected_file_size() as usize - 1];

        for (dump1, dump2) in [(good.clone(), short.clone()), (short, good)] {
            let mut output = Vec::new();
            let result = merge_dumps(
                &TEST_GEOMETRY,
                &mut Cursor::new(dump1),
                &mut Cursor::new(dump2),
                &mut output,
                None::<&mut SpotList<Vec<u8>>>,
                options(),
            );

            assert!(matches!(result, Err(Error::SizeMismatch { .. })));
            assert!(output.is_empty());
        }
    }
}
