// ========================================================================================
//
//                              The scoring pipeline
//
// ========================================================================================
//
// Wires the three stages end to end: load the model, stream the VCF through the
// scanner, fold the calls into a summary. One `RunConfig` in, one `RunReport` out;
// no state survives a run and no two stages share anything mutable.

use crate::accumulate::{self, ScoreSummary};
use crate::scorefile::{self, ModelError, ModelMetadata};
use crate::types::ScoringPolicy;
use crate::vcf::{ScanStats, VcfError, VcfScanner};
use std::path::PathBuf;
use thiserror::Error;

/// Everything a single scoring run needs, passed explicitly. There is no
/// process-global configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub score_path: PathBuf,
    pub vcf_path: PathBuf,
    pub policy: ScoringPolicy,
}

/// The umbrella error for a scoring run.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Vcf(#[from] VcfError),
}

/// The complete, read-only product of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub metadata: ModelMetadata,
    pub summary: ScoreSummary,
    pub scan: ScanStats,
    pub policy: ScoringPolicy,
}

/// Runs the full pipeline: model load, streaming VCF pass, accumulation.
pub fn run(config: &RunConfig) -> Result<RunReport, ScoreError> {
    let model = scorefile::load(&config.score_path, &config.policy)?;

    let (summary, scan) = {
        let mut scanner = VcfScanner::open(&config.vcf_path, &model)?;
        let summary = accumulate::accumulate(&model, &mut scanner, &config.policy)?;
        (summary, scanner.stats())
    };

    log::info!(
        "scored {} of {} model variants (total {:.6})",
        summary.matched_count,
        summary.model_variant_count,
        summary.total_score
    );

    Ok(RunReport {
        metadata: model.metadata,
        summary,
        scan,
        policy: config.policy,
    })
}
