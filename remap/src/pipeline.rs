use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::RemapConfig;
use crate::error::{RemapError, Result};
use crate::groundtruth::GroundTruth;
use crate::resolver::{Coverage, MatchIndex};
use crate::source;
use crate::translate::{TranslationReport, translate};
use crate::vector::VectorSet;

/// Neighbors shown in [`Sample`].
const SAMPLE_LEN: usize = 5;

/// First neighbors of the first query, before and after translation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub original: Vec<i32>,
    pub corrected: Vec<i32>,
}

/// Outcome of a remap run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Train vectors (reference ordering).
    pub train: usize,
    pub dim: usize,
    /// Vectors read from the vector file (index ordering).
    pub index: usize,
    pub queries: usize,
    pub k: usize,
    pub coverage: Coverage,
    /// Distinct index positions used by the mapping.
    pub distinct_targets: usize,
    /// The two orderings already agreed.
    pub identity: bool,
    pub translation: TranslationReport,
    pub sample: Sample,
}

/// Re-labels `gt.neighbors` from train positions to `index` positions.
///
/// `train`, `test` and `distances` are returned unchanged.
pub fn remap(gt: GroundTruth, index: &VectorSet, cfg: &RemapConfig) -> Result<(GroundTruth, RunSummary)> {
    cfg.validate()?;
    if gt.train.dim() != index.dim() {
        return Err(RemapError::DimensionMismatch {
            got: index.dim(),
            want: gt.train.dim(),
        });
    }

    let match_index = MatchIndex::build(index, cfg.resolve_options())?;
    let mapping = match_index.resolve_with_progress(&gt.train, |done, total| {
        info!(done, total, "resolving train vectors");
    })?;

    let coverage = mapping.coverage();
    let distinct_targets = mapping.distinct_targets();
    let identity = mapping.is_identity();
    info!(
        mapped = coverage.mapped,
        total = coverage.total,
        "mapped {:.1}% of train vectors",
        coverage.ratio() * 100.0
    );
    if coverage.unmapped() > 0 {
        warn!(unmapped = coverage.unmapped(), "train vectors without a match in the vector file");
    }
    if distinct_targets < coverage.mapped {
        warn!(
            mapped = coverage.mapped,
            distinct_targets,
            "several train vectors share one index vector"
        );
    }
    if identity {
        info!("vector file order matches train order");
    }

    let translation = translate(&gt.neighbors, &mapping, cfg.unmapped)?;

    let sample = Sample {
        original: first_row(gt.neighbors.row(0)),
        corrected: first_row(translation.neighbors.row(0)),
    };
    let summary = RunSummary {
        train: gt.train.len(),
        dim: gt.train.dim(),
        index: index.len(),
        queries: gt.neighbors.rows(),
        k: gt.neighbors.k(),
        coverage,
        distinct_targets,
        identity,
        translation: translation.report,
        sample,
    };

    let corrected = GroundTruth {
        neighbors: translation.neighbors,
        ..gt
    };
    Ok((corrected, summary))
}

/// Loads the ground truth and vector file, re-labels the neighbors and
/// writes the corrected container to `output`.
///
/// Nothing is written unless every step succeeds.
pub fn run(
    cfg: &RemapConfig,
    ground_truth: &Path,
    vec_file: &Path,
    output: &Path,
) -> Result<RunSummary> {
    cfg.validate()?;

    info!(path = %ground_truth.display(), "loading ground truth");
    let gt = GroundTruth::load(ground_truth)?;

    let dim = cfg.dim.unwrap_or(gt.train.dim());
    if dim != gt.train.dim() {
        return Err(RemapError::DimensionMismatch {
            got: dim,
            want: gt.train.dim(),
        });
    }

    info!(path = %vec_file.display(), dim, offset = cfg.header_offset, "loading vector file");
    let index = source::load(vec_file, cfg.source_options(dim))?;
    info!(vectors = index.len(), "loaded vector file");

    let (corrected, summary) = remap(gt, &index, cfg)?;

    info!(path = %output.display(), "writing corrected ground truth");
    corrected.save(output, cfg.overwrite)?;
    Ok(summary)
}

fn first_row(row: Option<&[i32]>) -> Vec<i32> {
    row.map(|r| r.iter().take(SAMPLE_LEN).copied().collect())
        .unwrap_or_default()
}
