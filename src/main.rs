// ========================================================================================
//
//                          The strategic orchestrator: Polyscore
//
// ========================================================================================
//
// The CLI owns the application lifecycle: argument parsing, pre-flight path checks,
// one pipeline run, and the fan-out to the requested report sinks. All policy knobs
// are explicit flags; nothing is decided by process-global state.

#![deny(dead_code)]
#![deny(unused_imports)]

use clap::Parser;
use polyscore::pipeline::{self, RunConfig};
use polyscore::report;
use polyscore::types::{
    DuplicatePolicy, MissingGenotypePolicy, Normalization, ScoringPolicy,
};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::process;
use std::time::Instant;

// ========================================================================================
//                              Command-line interface definition
// ========================================================================================

#[derive(Parser, Debug)]
#[clap(
    name = "polyscore",
    version,
    about = "A streaming engine for single-sample polygenic score calculation."
)]
struct Args {
    /// Path to a scoring file: PGS Catalog format or a headerless GWAS table,
    /// optionally gzip-compressed.
    #[clap(value_name = "SCORE_PATH")]
    score: PathBuf,

    /// Path to a single-sample VCF (optionally gzip-compressed). Only the first
    /// sample column is read.
    #[clap(value_name = "VCF_PATH")]
    vcf: PathBuf,

    /// Write the summary metrics as a Metric/Value TSV to this path.
    #[clap(long)]
    out: Option<PathBuf>,

    /// Write the full per-variant contribution table (CSV) to this path.
    #[clap(long)]
    details: Option<PathBuf>,

    /// Also report the score normalized by the number of matched variants.
    #[clap(long)]
    average: bool,

    /// Treat duplicate loci in the scoring file as a fatal error instead of
    /// last-write-wins.
    #[clap(long)]
    strict_duplicates: bool,

    /// Count loci with a missing genotype (./.) as matched, the way some legacy
    /// callers did.
    #[clap(long)]
    count_missing_as_matched: bool,

    /// Number of top contributing variants to show in the report.
    #[clap(long, default_value = "10", value_name = "N")]
    top: usize,
}

// ========================================================================================
//                              The main orchestration logic
// ========================================================================================

fn main() {
    env_logger::init();
    if let Err(e) = run(Args::parse()) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let overall_start_time = Instant::now();

    // Pre-flight path validation, before the core is invoked.
    if !args.score.exists() {
        return Err(format!("Scoring file '{}' not found.", args.score.display()).into());
    }
    if !args.vcf.exists() {
        return Err(format!("VCF file '{}' not found.", args.vcf.display()).into());
    }

    let policy = ScoringPolicy {
        duplicate_loci: if args.strict_duplicates {
            DuplicatePolicy::Reject
        } else {
            DuplicatePolicy::LastWins
        },
        missing_genotype: if args.count_missing_as_matched {
            MissingGenotypePolicy::Matched
        } else {
            MissingGenotypePolicy::Unmatched
        },
        normalization: if args.average {
            Normalization::PerVariantAverage
        } else {
            Normalization::Raw
        },
    };

    let config = RunConfig {
        score_path: args.score.clone(),
        vcf_path: args.vcf.clone(),
        policy,
    };

    eprintln!("> Loading scoring model from '{}'...", args.score.display());
    eprintln!("> Scoring genotypes from '{}'...", args.vcf.display());
    let run_report = pipeline::run(&config)?;

    report::write_summary(io::stdout().lock(), &run_report, args.top)?;

    if let Some(out_path) = &args.out {
        let writer = BufWriter::new(File::create(out_path)?);
        report::write_metrics_tsv(writer, &run_report)?;
        eprintln!("> Metrics written to '{}'", out_path.display());
    }

    if let Some(details_path) = &args.details {
        let writer = BufWriter::new(File::create(details_path)?);
        report::write_details_csv(writer, &run_report)?;
        eprintln!("> Variant details written to '{}'", details_path.display());
    }

    eprintln!("> Completed in {:.2?}", overall_start_time.elapsed());
    Ok(())
}
