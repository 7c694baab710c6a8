//! Run configuration.
//!
//! Every field is optional in YAML; missing fields take the defaults below.
//!
//! ```yaml
//! dim: 128              # default: train dimension
//! header_offset: 92
//! tolerance: 0.01
//! key_len: 4
//! limit: 1000000        # default: read every record
//! unmapped: sentinel    # or: reject
//! progress_interval: 100000
//! overwrite: false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RemapError, Result};
use crate::resolver::ResolveOptions;
use crate::source::{DEFAULT_HEADER_OFFSET, SourceOptions};
use crate::translate::UnmappedPolicy;
use crate::vector::{DEFAULT_KEY_LEN, DEFAULT_TOLERANCE};

/// Tunables for one remap run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RemapConfig {
    /// Floats per vector-file record. Must equal the train dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dim: Option<usize>,

    /// Bytes of header before the first vector-file record.
    pub header_offset: u64,

    /// Per-component absolute tolerance for vector equivalence.
    pub tolerance: f32,

    /// Leading components used as the bucket key.
    pub key_len: usize,

    /// Maximum number of vector-file records to read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// Handling of neighbors whose train vector has no match.
    pub unmapped: UnmappedPolicy,

    /// Log progress every this many train vectors. 0 disables.
    pub progress_interval: usize,

    /// Replace an existing output.
    pub overwrite: bool,
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self {
            dim: None,
            header_offset: DEFAULT_HEADER_OFFSET,
            tolerance: DEFAULT_TOLERANCE,
            key_len: DEFAULT_KEY_LEN,
            limit: None,
            unmapped: UnmappedPolicy::Sentinel,
            progress_interval: 0,
            overwrite: false,
        }
    }
}

impl RemapConfig {
    /// Parses YAML. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self =
            serde_yaml::from_str(content).map_err(|e| RemapError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dim == Some(0) {
            return Err(RemapError::InvalidDimension(0));
        }
        self.resolve_options().validate()
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            tolerance: self.tolerance,
            key_len: self.key_len,
            progress_interval: self.progress_interval,
        }
    }

    pub fn source_options(&self, dim: usize) -> SourceOptions {
        SourceOptions {
            dim,
            offset: self.header_offset,
            limit: self.limit,
        }
    }
}
