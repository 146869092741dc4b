// ========================================================================================
//
//                               Result report writers
//
// ========================================================================================
//
// Three sinks for a finished run: a human-readable summary, a `Metric\tValue` TSV,
// and the full per-variant contribution table as CSV. The four-value contract
// (score, matched count, model size, match rate) always leads the TSV; diagnostics
// follow it.

use crate::accumulate::VariantContribution;
use crate::pipeline::RunReport;
use crate::types::Normalization;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error writing report: {0}")]
    Io(#[from] io::Error),
    #[error("error writing contribution table: {0}")]
    Csv(#[from] csv::Error),
}

const RULE: &str = "==================================================";

/// Writes the human-readable report.
pub fn write_summary<W: Write>(
    mut out: W,
    report: &RunReport,
    top_n: usize,
) -> Result<(), ReportError> {
    let summary = &report.summary;
    let meta = &report.metadata;

    writeln!(out, "{RULE}")?;
    writeln!(out, "POLYGENIC SCORE REPORT")?;
    writeln!(out, "{RULE}")?;
    writeln!(out)?;

    writeln!(out, "MODEL:")?;
    if let Some(id) = &meta.pgs_id {
        writeln!(out, "  PGS ID: {id}")?;
    }
    if let Some(name) = &meta.pgs_name {
        writeln!(out, "  Name: {name}")?;
    }
    if let Some(trait_reported) = &meta.trait_reported {
        writeln!(out, "  Trait: {trait_reported}")?;
    }
    if let Some(build) = &meta.genome_build {
        writeln!(out, "  Genome build: {build}")?;
    }
    writeln!(out, "  Model variants: {}", summary.model_variant_count)?;
    writeln!(out)?;

    writeln!(out, "SCORE:")?;
    writeln!(out, "  Raw score: {:.6}", summary.total_score)?;
    if report.policy.normalization == Normalization::PerVariantAverage {
        match summary.normalized_score() {
            Some(avg) => writeln!(out, "  Per-variant average: {avg:.6}")?,
            None => writeln!(out, "  Per-variant average: n/a (no variants matched)")?,
        }
    }
    writeln!(
        out,
        "  Matched variants: {} of {} ({:.2}%)",
        summary.matched_count,
        summary.model_variant_count,
        summary.match_rate() * 100.0
    )?;
    writeln!(out, "  Missing model variants: {}", summary.missing_count)?;
    if summary.unresolved_allele_count > 0 {
        writeln!(out, "  Unresolved alleles: {}", summary.unresolved_allele_count)?;
    }
    if summary.missing_genotype_count > 0 {
        writeln!(out, "  Missing genotypes: {}", summary.missing_genotype_count)?;
    }

    let top = summary.top_contributions(top_n);
    if !top.is_empty() {
        writeln!(out)?;
        writeln!(out, "TOP CONTRIBUTING VARIANTS:")?;
        for vc in top {
            let id = vc.rsid.as_deref().unwrap_or("-");
            writeln!(
                out,
                "  {} {} {}>{} [{}] weight {:.4}, contribution {:.4}",
                vc.key, id, vc.ref_allele, vc.alt_allele, vc.genotype, vc.weight, vc.contribution
            )?;
        }
    }
    writeln!(out, "{RULE}")?;

    Ok(())
}

/// Writes the machine-readable `Metric\tValue` summary.
pub fn write_metrics_tsv<W: Write>(mut out: W, report: &RunReport) -> Result<(), ReportError> {
    let summary = &report.summary;

    writeln!(out, "Metric\tValue")?;
    writeln!(out, "PGS_Score\t{:.6}", summary.total_score)?;
    writeln!(out, "Matched_Variants\t{}", summary.matched_count)?;
    writeln!(out, "Total_Model_Variants\t{}", summary.model_variant_count)?;
    writeln!(out, "Match_Rate\t{:.2}%", summary.match_rate() * 100.0)?;
    if report.policy.normalization == Normalization::PerVariantAverage {
        if let Some(avg) = summary.normalized_score() {
            writeln!(out, "Per_Variant_Average\t{avg:.6}")?;
        }
    }
    writeln!(out, "Unresolved_Alleles\t{}", summary.unresolved_allele_count)?;
    writeln!(out, "Missing_Genotypes\t{}", summary.missing_genotype_count)?;
    writeln!(out, "Skipped_Vcf_Records\t{}", report.scan.skipped_malformed)?;
    writeln!(out, "Skipped_Multiallelic\t{}", report.scan.skipped_multiallelic)?;

    Ok(())
}

/// Writes the full contribution table, largest absolute contribution first.
pub fn write_details_csv<W: Write>(out: W, report: &RunReport) -> Result<(), ReportError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "Variant",
        "RsID",
        "Ref",
        "Alt",
        "Genotype",
        "Dosage",
        "Weight",
        "Contribution",
    ])?;

    let ranked: Vec<&VariantContribution> = report
        .summary
        .top_contributions(report.summary.contributions.len());
    for vc in ranked {
        writer.write_record([
            vc.key.to_string(),
            vc.rsid.clone().unwrap_or_else(|| ".".to_string()),
            vc.ref_allele.clone(),
            vc.alt_allele.clone(),
            vc.genotype.clone(),
            vc.dosage.to_string(),
            format!("{:.6}", vc.weight),
            format!("{:.6}", vc.contribution),
        ])?;
    }
    writer.flush()?;

    Ok(())
}
