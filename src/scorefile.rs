// ========================================================================================
//
//                               PGS scoring file loader
//
// ========================================================================================
//
// Parses a tab-delimited scoring file into the locus-keyed variant index that drives
// the VCF pass. Two file shapes are accepted: the PGS Catalog convention (`#` metadata
// lines, then a header row naming `chr_name`, `chr_position`, `effect_allele`,
// `other_allele`, `effect_weight`) and the headerless eight-column GWAS-summary table
// (`SNP, CHR, POS, REF, ALT, ALT_FREQ, BETA, SE[, PVAL]`). The shape is decided by
// inspecting the first data token: an `rs`-prefixed variant ID means headerless.

use crate::types::{DuplicatePolicy, ScoreModelEntry, ScoringPolicy, VariantKey};
use ahash::AHashMap;
use flate2::read::MultiGzDecoder;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A comprehensive error type for all model loading failures.
///
/// Failures are assumed to be user-input errors, so every variant names the file and,
/// where it exists, the offending line.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Scoring file '{}' was not found.", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error reading scoring file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(
        "Scoring file '{}' is missing the required column '{column}'. \
         Please check spelling and case.",
        path.display()
    )]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("Scoring file '{}', line {line_number}: {details}", path.display())]
    Parse {
        path: PathBuf,
        line_number: usize,
        details: String,
    },
    #[error(
        "Scoring file '{}', line {line_number}: duplicate entry for locus {key} \
         (duplicates are fatal under the strict duplicate policy).",
        path.display()
    )]
    DuplicateLocus {
        path: PathBuf,
        line_number: usize,
        key: VariantKey,
    },
    #[error("Scoring file '{}' contains no data rows.", path.display())]
    Empty { path: PathBuf },
}

/// Metadata captured from `#key=value` header lines of a PGS Catalog file.
#[derive(Debug, Clone, Default)]
pub struct ModelMetadata {
    pub pgs_id: Option<String>,
    pub pgs_name: Option<String>,
    pub trait_reported: Option<String>,
    pub genome_build: Option<String>,
    pub variants_number: Option<usize>,
}

/// The loader's product: the locus index plus file metadata.
#[derive(Debug)]
pub struct ScoreModel {
    pub variants: AHashMap<VariantKey, ScoreModelEntry>,
    pub metadata: ModelMetadata,
    /// Data rows dropped because their chromosome label could not be normalized.
    pub skipped_rows: usize,
}

impl ScoreModel {
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn get(&self, key: &VariantKey) -> Option<&ScoreModelEntry> {
        self.variants.get(key)
    }
}

/// Loads a scoring file into a `ScoreModel`.
///
/// Exactly one entry is kept per distinct locus. Under the default
/// `DuplicatePolicy::LastWins` a repeated locus silently replaces the earlier row;
/// under `Reject` it is fatal.
pub fn load(path: &Path, policy: &ScoringPolicy) -> Result<ScoreModel, ModelError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            ModelError::NotFound { path: path.to_path_buf() }
        } else {
            ModelError::Io { path: path.to_path_buf(), source: e }
        }
    })?;

    let raw: Box<dyn Read> = if path.extension().is_some_and(|ext| ext == "gz") {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut reader = BufReader::new(raw);

    let io_err = |e: io::Error| ModelError::Io { path: path.to_path_buf(), source: e };

    // --- Metadata headers, then the first data-bearing line ---
    let mut metadata = ModelMetadata::default();
    let mut line_buffer = String::new();
    let mut line_number = 0usize;

    let first_content = loop {
        line_buffer.clear();
        if reader.read_line(&mut line_buffer).map_err(io_err)? == 0 {
            return Err(ModelError::Empty { path: path.to_path_buf() });
        }
        line_number += 1;
        if let Some(meta) = line_buffer.strip_prefix('#') {
            record_metadata(meta, &mut metadata);
            continue;
        }
        let trimmed = line_buffer.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        break trimmed.to_string();
    };

    // Shape detection: a recognized variant-ID pattern in the first token means the
    // headerless GWAS table; anything else is treated as a header row. The pattern is
    // `rs` plus digits, so a header that happens to lead with an `rsID` column still
    // reads as a header.
    let first_token = first_content.split('\t').next().unwrap_or("");
    let shape = if is_variant_id(first_token) {
        Shape::HeaderlessGwas
    } else {
        Shape::Fielded(FieldedColumns::from_header(path, &first_content)?)
    };

    let mut variants: AHashMap<VariantKey, ScoreModelEntry> = AHashMap::new();
    let mut skipped_rows = 0usize;
    let mut data_rows_seen = 0usize;

    let mut ingest = |line: &str, line_number: usize| -> Result<(), ModelError> {
        data_rows_seen += 1;
        let entry = match &shape {
            Shape::Fielded(columns) => columns.parse_row(path, line, line_number)?,
            Shape::HeaderlessGwas => parse_gwas_row(path, line, line_number)?,
        };
        let Some(entry) = entry else {
            skipped_rows += 1;
            return Ok(());
        };
        let key = entry.key;
        if variants.insert(key, entry).is_some() {
            match policy.duplicate_loci {
                DuplicatePolicy::LastWins => {
                    log::debug!("duplicate locus {key} at line {line_number}: later row wins");
                }
                DuplicatePolicy::Reject => {
                    return Err(ModelError::DuplicateLocus {
                        path: path.to_path_buf(),
                        line_number,
                        key,
                    });
                }
            }
        }
        Ok(())
    };

    // The first content line of a headerless file is itself a data row.
    if matches!(shape, Shape::HeaderlessGwas) {
        ingest(&first_content, line_number)?;
    }

    loop {
        line_buffer.clear();
        if reader.read_line(&mut line_buffer).map_err(io_err)? == 0 {
            break;
        }
        line_number += 1;
        let line = line_buffer.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        ingest(line, line_number)?;
    }

    if data_rows_seen == 0 {
        return Err(ModelError::Empty { path: path.to_path_buf() });
    }

    if skipped_rows > 0 {
        log::warn!(
            "skipped {skipped_rows} row(s) with unrecognized chromosome labels in '{}'",
            path.display()
        );
    }
    log::info!("loaded {} model variants from '{}'", variants.len(), path.display());

    Ok(ScoreModel { variants, metadata, skipped_rows })
}

// ========================================================================================
//                        Private types and helpers
// ========================================================================================

enum Shape {
    Fielded(FieldedColumns),
    HeaderlessGwas,
}

/// Header-resolved column indices for the fielded (PGS Catalog) shape.
struct FieldedColumns {
    chr: usize,
    pos: usize,
    ea: usize,
    oa: usize,
    ew: usize,
    rsid: Option<usize>,
}

impl FieldedColumns {
    fn from_header(path: &Path, header_line: &str) -> Result<Self, ModelError> {
        let header_map: HashMap<&str, usize> = header_line
            .split('\t')
            .enumerate()
            .map(|(i, name)| (name.trim(), i))
            .collect();

        let require = |column: &'static str| -> Result<usize, ModelError> {
            header_map.get(column).copied().ok_or_else(|| ModelError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
        };

        Ok(Self {
            chr: require("chr_name")?,
            pos: require("chr_position")?,
            ea: require("effect_allele")?,
            oa: require("other_allele")?,
            ew: require("effect_weight")?,
            rsid: header_map.get("rsID").copied(),
        })
    }

    /// Parses one data row. `Ok(None)` means the row was dropped because its
    /// chromosome label is not one this crate scores; that is a warning-level
    /// skip, never fatal.
    fn parse_row(
        &self,
        path: &Path,
        line: &str,
        line_number: usize,
    ) -> Result<Option<ScoreModelEntry>, ModelError> {
        let fields: Vec<&str> = line.split('\t').collect();

        let cell = |idx: usize, column: &str| -> Result<&str, ModelError> {
            match fields.get(idx).map(|s| s.trim()) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(ModelError::Parse {
                    path: path.to_path_buf(),
                    line_number,
                    details: format!("row is missing a value for column '{column}'"),
                }),
            }
        };

        let chr_raw = cell(self.chr, "chr_name")?;
        let pos_raw = cell(self.pos, "chr_position")?;
        let effect_allele = cell(self.ea, "effect_allele")?;
        let other_allele = cell(self.oa, "other_allele")?;
        let weight_raw = cell(self.ew, "effect_weight")?;

        let key = match VariantKey::parse(chr_raw, pos_raw) {
            Ok(key) => key,
            Err(details) => {
                // An unparseable position is malformed data; an unknown contig is not.
                if pos_raw.trim().parse::<u64>().is_err() || pos_raw.trim() == "0" {
                    return Err(ModelError::Parse {
                        path: path.to_path_buf(),
                        line_number,
                        details,
                    });
                }
                log::warn!("line {line_number}: {details}; row skipped");
                return Ok(None);
            }
        };

        let effect_weight: f64 = weight_raw.parse().map_err(|e| ModelError::Parse {
            path: path.to_path_buf(),
            line_number,
            details: format!("invalid effect_weight '{weight_raw}': {e}"),
        })?;

        let rsid = self
            .rsid
            .and_then(|i| fields.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty() && *s != ".")
            .map(str::to_string);

        Ok(Some(ScoreModelEntry {
            key,
            rsid,
            effect_allele: effect_allele.to_string(),
            other_allele: other_allele.to_string(),
            effect_weight,
        }))
    }
}

/// Parses one row of the headerless GWAS-summary shape.
///
/// Column order is fixed: `SNP, CHR, POS, REF, ALT, ALT_FREQ, BETA, SE[, PVAL]`.
/// The effect allele is ALT and the weight is BETA, matching how the GWAS-derived
/// files this shape comes from were authored.
fn parse_gwas_row(
    path: &Path,
    line: &str,
    line_number: usize,
) -> Result<Option<ScoreModelEntry>, ModelError> {
    let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
    if fields.len() < 8 {
        return Err(ModelError::Parse {
            path: path.to_path_buf(),
            line_number,
            details: format!(
                "headerless GWAS rows need 8 columns (SNP, CHR, POS, REF, ALT, ALT_FREQ, \
                 BETA, SE), found {}",
                fields.len()
            ),
        });
    }

    let key = match VariantKey::parse(fields[1], fields[2]) {
        Ok(key) => key,
        Err(details) => {
            if fields[2].parse::<u64>().is_err() || fields[2] == "0" {
                return Err(ModelError::Parse {
                    path: path.to_path_buf(),
                    line_number,
                    details,
                });
            }
            log::warn!("line {line_number}: {details}; row skipped");
            return Ok(None);
        }
    };

    let effect_weight: f64 = fields[6].parse().map_err(|e| ModelError::Parse {
        path: path.to_path_buf(),
        line_number,
        details: format!("invalid BETA '{}': {e}", fields[6]),
    })?;

    Ok(Some(ScoreModelEntry {
        key,
        rsid: Some(fields[0].to_string()),
        effect_allele: fields[4].to_string(),
        other_allele: fields[3].to_string(),
        effect_weight,
    }))
}

fn is_variant_id(token: &str) -> bool {
    token
        .strip_prefix("rs")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

fn record_metadata(meta_line: &str, metadata: &mut ModelMetadata) {
    let meta = meta_line.trim_start_matches('#').trim();
    let Some((raw_key, value)) = meta.split_once('=') else {
        return;
    };
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    match raw_key.trim() {
        "pgs_id" => metadata.pgs_id = Some(value.to_string()),
        "pgs_name" => metadata.pgs_name = Some(value.to_string()),
        "trait_reported" => metadata.trait_reported = Some(value.to_string()),
        "genome_build" => metadata.genome_build = Some(value.to_string()),
        "variants_number" => metadata.variants_number = value.parse().ok(),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_model(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn fielded_header_is_order_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "effect_weight\tchr_name\tchr_position\tother_allele\teffect_allele\n\
             0.25\t1\t100\tC\tT\n",
        );
        let model = load(&path, &ScoringPolicy::default()).unwrap();
        assert_eq!(model.len(), 1);
        let key = VariantKey { chromosome: 1, position: 100 };
        let entry = model.get(&key).unwrap();
        assert_eq!(entry.effect_allele, "T");
        assert_eq!(entry.other_allele, "C");
        assert_eq!(entry.effect_weight, 0.25);
    }

    #[test]
    fn rs_prefixed_first_token_selects_headerless_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "gwas.txt",
            "rs123\t2\t200\tA\tG\t0.41\t-0.7\t0.02\n\
             rs456\t3\t300\tC\tT\t0.10\t0.3\t0.05\t1e-9\n",
        );
        let model = load(&path, &ScoringPolicy::default()).unwrap();
        assert_eq!(model.len(), 2);
        let entry = model.get(&VariantKey { chromosome: 2, position: 200 }).unwrap();
        assert_eq!(entry.rsid.as_deref(), Some("rs123"));
        assert_eq!(entry.effect_allele, "G");
        assert_eq!(entry.other_allele, "A");
        assert_eq!(entry.effect_weight, -0.7);
    }

    #[test]
    fn rsid_led_header_still_reads_as_a_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "rsID\tchr_name\tchr_position\teffect_allele\tother_allele\teffect_weight\n\
             rs789\t4\t400\tT\tC\t0.15\n",
        );
        let model = load(&path, &ScoringPolicy::default()).unwrap();
        assert_eq!(model.len(), 1);
        let entry = model.get(&VariantKey { chromosome: 4, position: 400 }).unwrap();
        assert_eq!(entry.rsid.as_deref(), Some("rs789"));
        assert_eq!(entry.effect_weight, 0.15);
    }

    #[test]
    fn metadata_lines_are_captured() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "###PGS CATALOG SCORING FILE - see www.pgscatalog.org\n\
             #pgs_id=PGS000906\n\
             #trait_reported=Longevity\n\
             #genome_build=GRCh38\n\
             #variants_number=1\n\
             chr_name\tchr_position\teffect_allele\tother_allele\teffect_weight\n\
             1\t100\tT\tC\t0.5\n",
        );
        let model = load(&path, &ScoringPolicy::default()).unwrap();
        assert_eq!(model.metadata.pgs_id.as_deref(), Some("PGS000906"));
        assert_eq!(model.metadata.trait_reported.as_deref(), Some("Longevity"));
        assert_eq!(model.metadata.genome_build.as_deref(), Some("GRCh38"));
        assert_eq!(model.metadata.variants_number, Some(1));
    }

    #[test]
    fn gzip_suffix_is_transparently_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.txt.gz");
        let body = "chr_name\tchr_position\teffect_allele\tother_allele\teffect_weight\n\
                    1\t100\tT\tC\t0.5\n";
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&path).unwrap(), flate2::Compression::default());
        encoder.write_all(body.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let model = load(&path, &ScoringPolicy::default()).unwrap();
        assert_eq!(model.len(), 1);
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "chr_name\tchr_position\teffect_allele\teffect_weight\n1\t100\tT\t0.5\n",
        );
        match load(&path, &ScoringPolicy::default()) {
            Err(ModelError::MissingColumn { column, .. }) => assert_eq!(column, "other_allele"),
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn bad_weight_names_the_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "chr_name\tchr_position\teffect_allele\tother_allele\teffect_weight\n\
             1\t100\tT\tC\t0.5\n\
             2\t200\tA\tG\tnot-a-number\n",
        );
        match load(&path, &ScoringPolicy::default()) {
            Err(ModelError::Parse { line_number, .. }) => assert_eq!(line_number, 3),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_locus_last_row_wins_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "chr_name\tchr_position\teffect_allele\tother_allele\teffect_weight\n\
             1\t100\tT\tC\t0.5\n\
             1\t100\tT\tC\t0.9\n",
        );
        let model = load(&path, &ScoringPolicy::default()).unwrap();
        assert_eq!(model.len(), 1);
        let entry = model.get(&VariantKey { chromosome: 1, position: 100 }).unwrap();
        assert_eq!(entry.effect_weight, 0.9);
    }

    #[test]
    fn duplicate_locus_is_fatal_under_reject() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "chr_name\tchr_position\teffect_allele\tother_allele\teffect_weight\n\
             1\t100\tT\tC\t0.5\n\
             1\t100\tT\tC\t0.9\n",
        );
        let policy = ScoringPolicy {
            duplicate_loci: DuplicatePolicy::Reject,
            ..ScoringPolicy::default()
        };
        assert!(matches!(load(&path, &policy), Err(ModelError::DuplicateLocus { .. })));
    }

    #[test]
    fn unknown_contig_rows_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(
            &dir,
            "scores.txt",
            "chr_name\tchr_position\teffect_allele\tother_allele\teffect_weight\n\
             GL000220.1\t100\tT\tC\t0.5\n\
             1\t100\tT\tC\t0.5\n",
        );
        let model = load(&path, &ScoringPolicy::default()).unwrap();
        assert_eq!(model.len(), 1);
        assert_eq!(model.skipped_rows, 1);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist.txt");
        assert!(matches!(
            load(&path, &ScoringPolicy::default()),
            Err(ModelError::NotFound { .. })
        ));
    }
}
