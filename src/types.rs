// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used
// in one file.

use std::fmt;

/// Parses a chromosome label into the crate's compact numeric code.
///
/// A leading `"chr"` prefix is stripped; the prefix itself must be lowercase. `X`, `Y`,
/// and `MT` map to 23, 24, and 25, so PGS files authored with the Catalog numeric
/// convention (`23` for X) and VCFs using letter names land on the same key.
pub fn parse_chromosome_label(chr_str: &str) -> Result<u8, String> {
    let mut trimmed = chr_str.trim();

    if let Some(rest) = trimmed.strip_prefix("chr") {
        trimmed = rest;
    }

    if trimmed.eq_ignore_ascii_case("X") {
        return Ok(23);
    }
    if trimmed.eq_ignore_ascii_case("Y") {
        return Ok(24);
    }
    if trimmed.eq_ignore_ascii_case("MT") {
        return Ok(25);
    }

    match trimmed.parse::<u8>() {
        Ok(n) if (1..=25).contains(&n) => Ok(n),
        _ => Err(format!(
            "Invalid chromosome format '{}'. Expected 1-25, 'X', 'Y', 'MT', or a 'chr' prefix.",
            chr_str.trim()
        )),
    }
}

/// The join key between the score model and the VCF: normalized chromosome code
/// plus 1-based position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariantKey {
    pub chromosome: u8,
    pub position: u32,
}

impl VariantKey {
    /// Builds a key from raw chromosome and position strings, normalizing the
    /// chromosome label. Both the model loader and the VCF scanner go through
    /// this function, so the two sides always agree on the key encoding.
    pub fn parse(chr_str: &str, pos_str: &str) -> Result<Self, String> {
        let chromosome = parse_chromosome_label(chr_str)?;
        let position: u32 = pos_str
            .trim()
            .parse()
            .map_err(|e| format!("Invalid position '{pos_str}': {e}"))?;
        if position == 0 {
            return Err(format!("Invalid position '{pos_str}': positions are 1-based"));
        }
        Ok(Self { chromosome, position })
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chr_label = match self.chromosome {
            23 => "X".to_string(),
            24 => "Y".to_string(),
            25 => "MT".to_string(),
            n => format!("{n}"),
        };
        write!(f, "{chr_label}:{}", self.position)
    }
}

/// One row of a loaded scoring model. Created once at load time, immutable thereafter.
#[derive(Debug, Clone)]
pub struct ScoreModelEntry {
    pub key: VariantKey,
    /// Variant identifier (e.g. an rsID) when the source file carries one.
    pub rsid: Option<String>,
    /// The allele whose presence carries the scored weight.
    pub effect_allele: String,
    /// The non-effect allele, used for orientation disambiguation.
    pub other_allele: String,
    /// Signed per-copy effect weight.
    pub effect_weight: f64,
}

/// A genotype call extracted from one matching VCF record. Consumed immediately by
/// the accumulator, never retained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenotypeCall {
    pub key: VariantKey,
    pub ref_allele: String,
    /// The single alternate allele. Multi-allelic records are filtered upstream.
    pub alt_allele: String,
    /// The raw GT value, e.g. `"0/1"`, `"1|1"`, `"./."`.
    pub genotype: String,
}

/// A `#[repr(transparent)]` wrapper for an effect-allele dosage.
///
/// Valid values for a diploid call are 0, 1, and 2.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EffectAlleleDosage(pub u8);

impl EffectAlleleDosage {
    /// Creates a new dosage, asserting the value is valid in debug builds.
    #[inline(always)]
    pub fn new(value: u8) -> Self {
        debug_assert!(value <= 2, "Invalid dosage value created: {value}");
        Self(value)
    }
}

// ========================================================================================
//                                  Scoring policy
// ========================================================================================

/// What to do when the scoring file contains two rows for one locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The later row silently replaces the earlier one.
    #[default]
    LastWins,
    /// Duplicate loci are a fatal model error.
    Reject,
}

/// How a modeled locus whose genotype is missing (`./.`) counts in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingGenotypePolicy {
    /// The locus is not matched; it contributes nothing and lands in `missing_count`.
    #[default]
    Unmatched,
    /// The locus counts as matched with dosage 0 (the behavior of some legacy callers).
    Matched,
}

/// Whether the reported score is the raw weighted sum or a per-variant average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// The raw weighted sum. Always retained regardless of this setting.
    #[default]
    Raw,
    /// Divide by `matched_count`. An explicit reporting choice, never implicit.
    PerVariantAverage,
}

/// The single explicit context object threaded through all three stages.
///
/// Each knob defaults to the most conservative choice; callers override explicitly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringPolicy {
    pub duplicate_loci: DuplicatePolicy,
    pub missing_genotype: MissingGenotypePolicy,
    pub normalization: Normalization,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_chromosome_label_supports_common_variants() {
        assert_eq!(parse_chromosome_label("1").unwrap(), 1);
        assert_eq!(parse_chromosome_label("chr2").unwrap(), 2);
        assert_eq!(parse_chromosome_label("chrX").unwrap(), 23);
        assert_eq!(parse_chromosome_label("X").unwrap(), 23);
        assert_eq!(parse_chromosome_label("23").unwrap(), 23);
        assert_eq!(parse_chromosome_label("24").unwrap(), 24);
        assert_eq!(parse_chromosome_label("MT").unwrap(), 25);
    }

    #[test]
    fn parse_chromosome_label_rejects_garbage() {
        assert!(parse_chromosome_label("").is_err());
        assert!(parse_chromosome_label("0").is_err());
        assert!(parse_chromosome_label("26").is_err());
        assert!(parse_chromosome_label("GL000220.1").is_err());
    }

    #[test]
    fn numeric_and_letter_sex_chromosomes_share_a_key() {
        let from_numeric = VariantKey::parse("23", "5000").unwrap();
        let from_letter = VariantKey::parse("chrX", "5000").unwrap();
        assert_eq!(from_numeric, from_letter);
    }

    #[test]
    fn variant_key_display_uses_letter_names() {
        let key = VariantKey { chromosome: 23, position: 154929412 };
        assert_eq!(key.to_string(), "X:154929412");
        let key = VariantKey { chromosome: 7, position: 100 };
        assert_eq!(key.to_string(), "7:100");
    }

    #[test]
    fn variant_key_rejects_zero_position() {
        assert!(VariantKey::parse("1", "0").is_err());
    }
}
