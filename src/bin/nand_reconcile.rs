//! Command-line front end: classify a single NAND dump, or reconcile two
//! dumps of the same media into one repaired image.

use anyhow::Context;
use clap::{Args, Parser};

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use nand_reconcile::dump::plist::load_geometry;
use nand_reconcile::dump::status::StatusEndian;
use nand_reconcile::dump::DumpGeometry;
use nand_reconcile::merge::{merge_dumps, MergeOptions};
use nand_reconcile::output::PendingFile;
use nand_reconcile::report;
use nand_reconcile::scan::{scan_dump, ScanOptions};
use nand_reconcile::spotlist::SpotList;

#[derive(Args, Debug)]
#[group(required = true)]
struct GeometrySource {
    /// Property list describing the dump geometry
    #[clap(short, long, group = "geometry-source")]
    plist: Option<PathBuf>,

    /// Inline geometry, formatted PAGExMETAxBLOCKPAGESxCEBLOCKSxCE
    #[clap(short, long, group = "geometry-source")]
    geometry: Option<DumpGeometry>,
}

impl GeometrySource {
    fn resolve(&self) -> anyhow::Result<DumpGeometry> {
        match (&self.plist, self.geometry) {
            (Some(path), _) => load_geometry(path)
                .with_context(|| format!("reading geometry from {}", path.display())),
            (None, Some(geometry)) => Ok(geometry),
            (None, None) => unreachable!(),
        }
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    /// Where the dump geometry comes from
    #[clap(flatten)]
    geometry: GeometrySource,

    /// The first (primary) dump
    #[clap(short = 'i', long = "image")]
    image: PathBuf,

    /// A second dump of the same media; reconciles the two into --output
    #[clap(short = 'm', long = "merge", requires = "output")]
    merge: Option<PathBuf>,

    /// Where to write the reconciled dump
    #[clap(short = 'o', long = "output", requires = "merge")]
    output: Option<PathBuf>,

    /// Write pages that failed on both sides as a C-style spot list
    #[clap(short = 's', long = "spot-list", requires = "merge")]
    spot_list: Option<PathBuf>,

    /// Byte order of the status words (little, big or native)
    #[clap(long, default_value = "native")]
    status_endian: StatusEndian,

    /// Print every page's classification
    #[clap(short = 'v', long)]
    verbose: bool,
}

fn open_dump(path: &Path) -> anyhow::Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    Ok(BufReader::new(file))
}

fn run(args: &Cli) -> anyhow::Result<()> {
    let geometry = args.geometry.resolve()?;
    if args.verbose {
        report::print_geometry(&geometry);
    }

    let mut image = open_dump(&args.image)?;

    if let (Some(merge_path), Some(output_path)) = (&args.merge, &args.output) {
        let mut second = open_dump(merge_path)?;

        let mut spot_list = match &args.spot_list {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("creating {}", path.display()))?;
                Some(SpotList::new(file))
            }
            None => None,
        };

        let mut output = PendingFile::create(output_path)
            .with_context(|| format!("creating {}", output_path.display()))?;

        let options = MergeOptions {
            endian: args.status_endian,
            verbose: args.verbose,
        };
        let stats = merge_dumps(
            &geometry,
            &mut image,
            &mut second,
            &mut output,
            spot_list.as_mut(),
            options,
        )?;
        output
            .commit()
            .with_context(|| format!("committing {}", output_path.display()))?;

        report::print_merge_stats(&stats);
    } else {
        let options = ScanOptions {
            endian: args.status_endian,
            verbose: args.verbose,
        };
        let stats = scan_dump(&geometry, &mut image, options)?;
        report::print_scan_stats(&stats);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    howudoin::init(howudoin::consumers::TermLine::default());

    let result = run(&args);

    howudoin::disable();
    std::thread::sleep(std::time::Duration::from_millis(10)); // Give howudoin time to shut down
    result
}
