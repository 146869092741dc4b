// ========================================================================================
//
//                        Dosage resolution and score accumulation
//
// ========================================================================================
//
// The arithmetic heart of the crate. For each genotype call the accumulator decides
// which VCF allele carries the model's effect weight (trying both orientations),
// converts the diploid call into an effect-allele dosage, and folds
// `dosage * weight` into the running total. A single forward pass, skip-and-continue
// only; no error is ever used for control flow inside the loop.

use crate::scorefile::ScoreModel;
use crate::types::{
    EffectAlleleDosage, GenotypeCall, MissingGenotypePolicy, ScoreModelEntry, ScoringPolicy,
    VariantKey,
};
use crate::vcf::VcfError;
use ahash::AHashSet;

/// Which VCF allele carries the model's effect weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    EffectIsRef,
    EffectIsAlt,
}

/// Matches the model's allele pair against the call's REF/ALT in both orientations.
///
/// `None` means the alleles do not correspond either way (a strand or annotation
/// mismatch); the variant is then reported but never scored.
pub fn resolve_orientation(entry: &ScoreModelEntry, call: &GenotypeCall) -> Option<Orientation> {
    if entry.effect_allele == call.ref_allele && entry.other_allele == call.alt_allele {
        Some(Orientation::EffectIsRef)
    } else if entry.effect_allele == call.alt_allele && entry.other_allele == call.ref_allele {
        Some(Orientation::EffectIsAlt)
    } else {
        None
    }
}

/// Converts a raw diploid GT string into an effect-allele dosage.
///
/// Phasing is irrelevant to dosage, so `|` is treated as `/`. Exactly two allele
/// indices are required; `None` means the call is missing (any `.` index) or not
/// diploid. Allele index `0` is REF and `1` is ALT; anything else is a non-effect
/// allele and contributes 0 (the biallelic filter upstream makes indices > 1 rare,
/// but half-calls like `1/2` still dose correctly).
pub fn effect_dosage(genotype: &str, orientation: Orientation) -> Option<EffectAlleleDosage> {
    let effect_index = match orientation {
        Orientation::EffectIsRef => "0",
        Orientation::EffectIsAlt => "1",
    };

    let normalized = genotype.replace('|', "/");
    let mut alleles = normalized.split('/');
    let (first, second) = (alleles.next()?, alleles.next()?);
    if alleles.next().is_some() {
        return None;
    }
    if first == "." || second == "." {
        return None;
    }

    let dosage = [first, second]
        .iter()
        .filter(|allele| **allele == effect_index)
        .count() as u8;
    Some(EffectAlleleDosage::new(dosage))
}

/// One scored (or matched-with-missing-call) variant, retained for reporting.
#[derive(Debug, Clone)]
pub struct VariantContribution {
    pub key: VariantKey,
    pub rsid: Option<String>,
    pub ref_allele: String,
    pub alt_allele: String,
    pub genotype: String,
    pub dosage: u8,
    pub weight: f64,
    pub contribution: f64,
}

/// The finalized result of one scoring pass. Read-only after `accumulate` returns.
#[derive(Debug, Clone)]
pub struct ScoreSummary {
    /// Raw weighted sum of effect-allele dosages.
    pub total_score: f64,
    /// Model loci successfully scored.
    pub matched_count: usize,
    /// Model loci never matched and scored: `model_variant_count - matched_count`.
    pub missing_count: usize,
    /// Total loci in the loaded model.
    pub model_variant_count: usize,
    /// Calls whose alleles corresponded to the model in neither orientation.
    pub unresolved_allele_count: usize,
    /// Calls at modeled loci with a missing or non-diploid genotype.
    pub missing_genotype_count: usize,
    /// Per-variant contributions, in VCF order.
    pub contributions: Vec<VariantContribution>,
}

impl ScoreSummary {
    /// Matched loci as a fraction of the model, in [0, 1].
    pub fn match_rate(&self) -> f64 {
        if self.model_variant_count == 0 {
            return 0.0;
        }
        self.matched_count as f64 / self.model_variant_count as f64
    }

    /// The per-SNP-average score, when at least one variant matched.
    pub fn normalized_score(&self) -> Option<f64> {
        if self.matched_count == 0 {
            None
        } else {
            Some(self.total_score / self.matched_count as f64)
        }
    }

    /// The `n` contributions with the largest absolute effect on the total.
    pub fn top_contributions(&self, n: usize) -> Vec<&VariantContribution> {
        let mut ranked: Vec<&VariantContribution> = self.contributions.iter().collect();
        ranked.sort_by(|a, b| {
            b.contribution
                .abs()
                .partial_cmp(&a.contribution.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(n);
        ranked
    }
}

/// Folds a stream of genotype calls into a `ScoreSummary`.
///
/// Each model locus is scored at most once per pass; if the VCF repeats a locus,
/// the first scoreable record wins. A missing genotype contributes zero dosage and,
/// under the default policy, does not count as matched.
pub fn accumulate(
    model: &ScoreModel,
    calls: impl Iterator<Item = Result<GenotypeCall, VcfError>>,
    policy: &ScoringPolicy,
) -> Result<ScoreSummary, VcfError> {
    let mut total_score = 0.0f64;
    let mut matched_count = 0usize;
    let mut unresolved_allele_count = 0usize;
    let mut missing_genotype_count = 0usize;
    let mut contributions = Vec::new();
    let mut scored: AHashSet<VariantKey> = AHashSet::new();

    for call in calls {
        let call = call?;
        if scored.contains(&call.key) {
            continue;
        }
        let Some(entry) = model.get(&call.key) else {
            // The scanner only yields modeled loci, but the contract tolerates any
            // call stream.
            continue;
        };

        let Some(orientation) = resolve_orientation(entry, &call) else {
            unresolved_allele_count += 1;
            log::debug!(
                "allele mismatch at {}: model {}/{} vs VCF {}/{}",
                call.key,
                entry.effect_allele,
                entry.other_allele,
                call.ref_allele,
                call.alt_allele
            );
            continue;
        };

        let Some(dosage) = effect_dosage(&call.genotype, orientation) else {
            missing_genotype_count += 1;
            if policy.missing_genotype == MissingGenotypePolicy::Matched {
                matched_count += 1;
                scored.insert(call.key);
                contributions.push(VariantContribution {
                    key: call.key,
                    rsid: entry.rsid.clone(),
                    ref_allele: call.ref_allele,
                    alt_allele: call.alt_allele,
                    genotype: call.genotype,
                    dosage: 0,
                    weight: entry.effect_weight,
                    contribution: 0.0,
                });
            }
            continue;
        };

        let contribution = f64::from(dosage.0) * entry.effect_weight;
        total_score += contribution;
        matched_count += 1;
        scored.insert(call.key);
        contributions.push(VariantContribution {
            key: call.key,
            rsid: entry.rsid.clone(),
            ref_allele: call.ref_allele,
            alt_allele: call.alt_allele,
            genotype: call.genotype,
            dosage: dosage.0,
            weight: entry.effect_weight,
            contribution,
        });
    }

    let model_variant_count = model.len();
    Ok(ScoreSummary {
        total_score,
        matched_count,
        missing_count: model_variant_count.saturating_sub(matched_count),
        model_variant_count,
        unresolved_allele_count,
        missing_genotype_count,
        contributions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(effect: &str, other: &str, weight: f64) -> ScoreModelEntry {
        ScoreModelEntry {
            key: VariantKey { chromosome: 1, position: 100 },
            rsid: None,
            effect_allele: effect.to_string(),
            other_allele: other.to_string(),
            effect_weight: weight,
        }
    }

    fn call(ref_allele: &str, alt_allele: &str, genotype: &str) -> GenotypeCall {
        GenotypeCall {
            key: VariantKey { chromosome: 1, position: 100 },
            ref_allele: ref_allele.to_string(),
            alt_allele: alt_allele.to_string(),
            genotype: genotype.to_string(),
        }
    }

    #[test]
    fn orientation_resolves_both_ways() {
        let direct = entry("C", "T", 0.5);
        assert_eq!(
            resolve_orientation(&direct, &call("C", "T", "0/0")),
            Some(Orientation::EffectIsRef)
        );
        let swapped = entry("T", "C", 0.5);
        assert_eq!(
            resolve_orientation(&swapped, &call("C", "T", "0/0")),
            Some(Orientation::EffectIsAlt)
        );
        let mismatched = entry("A", "G", 0.5);
        assert_eq!(resolve_orientation(&mismatched, &call("C", "T", "0/0")), None);
    }

    #[test]
    fn dosage_counts_effect_allele_copies() {
        assert_eq!(effect_dosage("0/0", Orientation::EffectIsAlt), Some(EffectAlleleDosage(0)));
        assert_eq!(effect_dosage("0/1", Orientation::EffectIsAlt), Some(EffectAlleleDosage(1)));
        assert_eq!(effect_dosage("1/0", Orientation::EffectIsAlt), Some(EffectAlleleDosage(1)));
        assert_eq!(effect_dosage("1/1", Orientation::EffectIsAlt), Some(EffectAlleleDosage(2)));
        assert_eq!(effect_dosage("0/0", Orientation::EffectIsRef), Some(EffectAlleleDosage(2)));
        assert_eq!(effect_dosage("1/1", Orientation::EffectIsRef), Some(EffectAlleleDosage(0)));
    }

    #[test]
    fn phased_separator_is_equivalent() {
        assert_eq!(effect_dosage("1|1", Orientation::EffectIsAlt), Some(EffectAlleleDosage(2)));
        assert_eq!(effect_dosage("0|1", Orientation::EffectIsAlt), Some(EffectAlleleDosage(1)));
    }

    #[test]
    fn missing_and_nondiploid_calls_have_no_dosage() {
        assert_eq!(effect_dosage("./.", Orientation::EffectIsAlt), None);
        assert_eq!(effect_dosage(".|.", Orientation::EffectIsAlt), None);
        assert_eq!(effect_dosage("./1", Orientation::EffectIsAlt), None);
        assert_eq!(effect_dosage("1", Orientation::EffectIsAlt), None);
        assert_eq!(effect_dosage("0/1/1", Orientation::EffectIsAlt), None);
    }

    #[test]
    fn indices_beyond_one_are_non_effect() {
        // The upstream biallelic filter makes these rare, but a stray half-call
        // still doses correctly.
        assert_eq!(effect_dosage("1/2", Orientation::EffectIsAlt), Some(EffectAlleleDosage(1)));
        assert_eq!(effect_dosage("2/2", Orientation::EffectIsAlt), Some(EffectAlleleDosage(0)));
    }
}
