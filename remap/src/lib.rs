//! Re-label nearest-neighbor ground truth for a re-ordered vector index.
//!
//! A benchmark's ground truth names neighbors by their position in the
//! `train` array, while an index may store the same vectors in another order
//! and hand out its own ids. This crate recovers the train → index mapping
//! by content and rewrites the neighbor lists so recall can be measured
//! against the index.
//!
//! # Usage
//!
//! ```no_run
//! use std::path::Path;
//! use giztoy_remap::{RemapConfig, pipeline};
//!
//! let summary = pipeline::run(
//!     &RemapConfig::default(),
//!     Path::new("sift-128-euclidean.hdf5"),
//!     Path::new("_0_NativeEngines990KnnVectorsFormat_0.vec"),
//!     Path::new("sift-128-euclidean-corrected.hdf5"),
//! )?;
//! println!("mapped {}/{}", summary.coverage.mapped, summary.coverage.total);
//! # Ok::<(), giztoy_remap::RemapError>(())
//! ```
//!
//! # Design
//!
//! Matching is two-phase. Index vectors are bucketed by the bit pattern of
//! their first few components ([`MatchKey`]); each train vector is then
//! compared, component by component within a tolerance, only against its
//! bucket. The first equivalent candidate wins, so duplicate index vectors
//! resolve to the lowest position.

pub mod config;
pub mod error;
pub mod groundtruth;
mod h5;
pub mod pipeline;
pub mod resolver;
pub mod source;
pub mod translate;
pub mod vecs;
pub mod vector;

pub use config::RemapConfig;
pub use error::{RemapError, Result};
pub use groundtruth::{Format, GroundTruth};
pub use pipeline::{RunSummary, Sample, remap};
pub use resolver::{Coverage, Mapping, MatchIndex, ResolveOptions, UNMAPPED, resolve};
pub use source::{DEFAULT_HEADER_OFFSET, SourceOptions};
pub use translate::{NeighborMatrix, Translation, TranslationReport, UnmappedPolicy, translate};
pub use vector::{MatchKey, VectorSet, equivalent};
