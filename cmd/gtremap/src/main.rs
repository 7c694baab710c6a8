//! gtremap - Rewrite ground-truth neighbors to the ids of a re-ordered vector file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use giztoy_remap::{RemapConfig, RunSummary, UnmappedPolicy, pipeline};
use tracing_subscriber::EnvFilter;

/// Rewrite ground-truth neighbor ids to match a re-ordered vector file.
///
/// The ground truth is either an HDF5 file (.hdf5 / .h5) with train, test,
/// neighbors and distances datasets, or a directory with train.fvecs,
/// test.fvecs, neighbors.ivecs and distances.fvecs. The output uses the
/// layout its own path selects. Each train vector is located in the
/// vector file by content, and every neighbor id is replaced by the position
/// of that vector in the vector file. Neighbors whose vector cannot be found
/// are written as -1 unless --strict is given.
#[derive(Parser, Debug)]
#[command(name = "gtremap")]
#[command(version)]
struct Args {
    /// Ground truth to read (.hdf5 file or vecs directory)
    ground_truth: PathBuf,

    /// Vector file holding the index ordering
    vec_file: PathBuf,

    /// Where to write the corrected ground truth (.hdf5 file or directory)
    output: PathBuf,

    /// YAML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Vector dimension (default: train dimension)
    #[arg(long)]
    dim: Option<usize>,

    /// Header bytes before the first vector (default: 92)
    #[arg(long)]
    offset: Option<u64>,

    /// Per-component match tolerance (default: 0.01)
    #[arg(long)]
    tolerance: Option<f32>,

    /// Leading components used as the bucket key (default: 4)
    #[arg(long)]
    key_len: Option<usize>,

    /// Read at most this many vectors from the vector file
    #[arg(long)]
    limit: Option<usize>,

    /// Fail instead of writing -1 for unmatched neighbors
    #[arg(long)]
    strict: bool,

    /// Log progress every N train vectors
    #[arg(long, value_name = "N")]
    progress: Option<usize>,

    /// Replace the output if it exists
    #[arg(short = 'f', long)]
    force: bool,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Args {
    fn remap_config(&self) -> Result<RemapConfig> {
        let mut cfg = match &self.config {
            Some(path) => RemapConfig::load(path)
                .with_context(|| format!("load config {}", path.display()))?,
            None => RemapConfig::default(),
        };

        if let Some(dim) = self.dim {
            cfg.dim = Some(dim);
        }
        if let Some(offset) = self.offset {
            cfg.header_offset = offset;
        }
        if let Some(tolerance) = self.tolerance {
            cfg.tolerance = tolerance;
        }
        if let Some(key_len) = self.key_len {
            cfg.key_len = key_len;
        }
        if let Some(limit) = self.limit {
            cfg.limit = Some(limit);
        }
        if self.strict {
            cfg.unmapped = UnmappedPolicy::Reject;
        }
        if let Some(n) = self.progress {
            cfg.progress_interval = n;
        }
        if self.force {
            cfg.overwrite = true;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = args.remap_config()?;
    let summary = pipeline::run(&cfg, &args.ground_truth, &args.vec_file, &args.output)
        .with_context(|| {
            format!(
                "remap {} with {}",
                args.ground_truth.display(),
                args.vec_file.display()
            )
        })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn print_summary(s: &RunSummary) {
    println!(
        "Mapped {}/{} train vectors ({:.1}%) against {} index vectors",
        s.coverage.mapped,
        s.coverage.total,
        s.coverage.ratio() * 100.0,
        s.index
    );
    if s.distinct_targets < s.coverage.mapped {
        println!(
            "  {} train vectors share an index vector",
            s.coverage.mapped - s.distinct_targets
        );
    }
    println!(
        "Translated {}/{} neighbor ids ({} unmapped in {} rows, {} padding)",
        s.translation.translated,
        s.translation.entries,
        s.translation.unmapped,
        s.translation.affected_rows,
        s.translation.padding
    );
    println!("Original neighbors[0][..5]:  {:?}", s.sample.original);
    println!("Corrected neighbors[0][..5]: {:?}", s.sample.corrected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_three_positionals() {
        assert!(Args::try_parse_from(["gtremap", "gt", "index.vec"]).is_err());
        assert!(Args::try_parse_from(["gtremap", "gt", "index.vec", "out"]).is_ok());
    }

    #[test]
    fn flags_override_defaults() {
        let args = Args::try_parse_from([
            "gtremap",
            "gt",
            "index.vec",
            "out",
            "--offset",
            "0",
            "--tolerance",
            "0.05",
            "--strict",
            "--force",
        ])
        .unwrap();
        let cfg = args.remap_config().unwrap();
        assert_eq!(cfg.header_offset, 0);
        assert_eq!(cfg.tolerance, 0.05);
        assert_eq!(cfg.unmapped, UnmappedPolicy::Reject);
        assert!(cfg.overwrite);
        assert_eq!(cfg.key_len, 4);
    }

    #[test]
    fn invalid_flag_values_rejected() {
        let args = Args::try_parse_from(["gtremap", "gt", "index.vec", "out", "--key-len", "0"])
            .unwrap();
        assert!(args.remap_config().is_err());
    }
}
