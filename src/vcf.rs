// ========================================================================================
//
//                         Streaming VCF genotype extraction
//
// ========================================================================================
//
// A single forward pass over a single-sample VCF. The scanner holds one line in memory
// at a time, so genome-scale files never need to fit in RAM. For each data line it
// decides, in order: enough columns, biallelic, parseable coordinates, locus present in
// the model. Lines that survive all four yield a `GenotypeCall`; everything else is
// skipped and counted. Per-line malformation is never fatal; I/O failures are.

use crate::scorefile::ScoreModel;
use crate::types::{GenotypeCall, VariantKey};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VcfError {
    #[error("VCF file '{}' was not found.", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error reading VCF '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Counters describing one scan. Exposed for diagnostics; none of these are errors.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanStats {
    /// Data (non-header) lines seen.
    pub records_seen: u64,
    /// Lines dropped for having fewer than 10 tab-separated fields or an
    /// unparseable position.
    pub skipped_malformed: u64,
    /// Records dropped because ALT listed more than one allele.
    pub skipped_multiallelic: u64,
    /// Records dropped because their chromosome label is not one this crate scores.
    pub skipped_other_contig: u64,
    /// Calls yielded to the accumulator.
    pub yielded: u64,
}

/// A restartable, finite, single-pass producer of genotype calls.
///
/// `VcfScanner` is a pure function of the file contents and the model's key set:
/// opening the same path twice yields the same calls in the same order.
pub struct VcfScanner<'m> {
    reader: BufReader<Box<dyn Read>>,
    model: &'m ScoreModel,
    path: PathBuf,
    line: String,
    lines_read: u64,
    stats: ScanStats,
    done: bool,
}

/// Heartbeat cadence for the debug log during long scans.
const PROGRESS_LOG_INTERVAL: u64 = 1_000_000;

impl<'m> VcfScanner<'m> {
    /// Opens a VCF (plain or `.gz`) for a fresh pass against `model`.
    pub fn open(path: &Path, model: &'m ScoreModel) -> Result<Self, VcfError> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                VcfError::NotFound { path: path.to_path_buf() }
            } else {
                VcfError::Io { path: path.to_path_buf(), source: e }
            }
        })?;

        let raw: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };

        Ok(Self {
            reader: BufReader::with_capacity(1 << 20, raw),
            model,
            path: path.to_path_buf(),
            line: String::new(),
            lines_read: 0,
            stats: ScanStats::default(),
            done: false,
        })
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Parses one data line into a call, or records why it was dropped.
    fn scan_line(&mut self) -> Option<GenotypeCall> {
        let line = self.line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        self.stats.records_seen += 1;

        let fields: Vec<&str> = line.split('\t').collect();
        // 8 mandatory VCF columns + FORMAT + at least one sample.
        if fields.len() < 10 {
            self.stats.skipped_malformed += 1;
            return None;
        }

        let alt = fields[4];
        if alt.contains(',') {
            // Biallelic is a hard precondition of the dosage algorithm.
            self.stats.skipped_multiallelic += 1;
            return None;
        }

        let key = match VariantKey::parse(fields[0], fields[1]) {
            Ok(key) => key,
            Err(_) => {
                if fields[1].trim().parse::<u64>().is_ok() && fields[1].trim() != "0" {
                    self.stats.skipped_other_contig += 1;
                } else {
                    self.stats.skipped_malformed += 1;
                }
                return None;
            }
        };

        self.model.get(&key)?;

        let genotype = genotype_field(fields[8], fields[9]);
        self.stats.yielded += 1;

        Some(GenotypeCall {
            key,
            ref_allele: fields[3].to_string(),
            alt_allele: alt.to_string(),
            genotype: genotype.to_string(),
        })
    }
}

impl Iterator for VcfScanner<'_> {
    type Item = Result<GenotypeCall, VcfError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => {
                    self.done = true;
                    log::debug!(
                        "VCF pass over '{}' complete: {} records, {} yielded",
                        self.path.display(),
                        self.stats.records_seen,
                        self.stats.yielded
                    );
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(VcfError::Io {
                        path: self.path.clone(),
                        source: e,
                    }));
                }
            }

            self.lines_read += 1;
            if self.lines_read.is_multiple_of(PROGRESS_LOG_INTERVAL) {
                log::debug!(
                    "scanned {} lines of '{}' ({} calls so far)",
                    self.lines_read,
                    self.path.display(),
                    self.stats.yielded
                );
            }

            if let Some(call) = self.scan_line() {
                return Some(Ok(call));
            }
        }
    }
}

/// Locates the `GT` value for the first sample. A FORMAT without `GT`, or a sample
/// column shorter than FORMAT promises, is a missing call.
fn genotype_field<'a>(format: &str, sample: &'a str) -> &'a str {
    match format.split(':').position(|tag| tag == "GT") {
        Some(idx) => sample.split(':').nth(idx).unwrap_or("./."),
        None => "./.",
    }
}
