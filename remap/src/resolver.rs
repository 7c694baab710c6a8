use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::error::{RemapError, Result};
use crate::vector::{
    DEFAULT_KEY_LEN, DEFAULT_TOLERANCE, MAX_KEY_LEN, MatchKey, VectorSet, equivalent,
};

/// Integer written for a position with no counterpart.
pub const UNMAPPED: i32 = -1;

/// Controls candidate bucketing and verification.
#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    /// Per-component absolute tolerance for accepting a candidate.
    /// Default: 0.01.
    pub tolerance: f32,
    /// Leading components that form the bucket key.
    /// Default: 4.
    pub key_len: usize,
    /// Report progress every this many reference positions. 0 disables.
    pub progress_interval: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            key_len: DEFAULT_KEY_LEN,
            progress_interval: 0,
        }
    }
}

impl ResolveOptions {
    pub(crate) fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(RemapError::InvalidConfig(format!(
                "tolerance must be a finite non-negative number, got {}",
                self.tolerance
            )));
        }
        if self.key_len == 0 || self.key_len > MAX_KEY_LEN {
            return Err(RemapError::InvalidConfig(format!(
                "key_len must be in 1..={MAX_KEY_LEN}, got {}",
                self.key_len
            )));
        }
        Ok(())
    }
}

/// Coverage counts how many reference positions were resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Coverage {
    pub total: usize,
    pub mapped: usize,
}

impl Coverage {
    pub fn unmapped(&self) -> usize {
        self.total - self.mapped
    }

    /// Fraction mapped, in `[0, 1]`. An empty reference counts as fully
    /// covered.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.mapped as f64 / self.total as f64
    }
}

/// Mapping is a partial function from reference position to index position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    targets: Vec<Option<usize>>,
}

impl Mapping {
    pub fn from_targets(targets: Vec<Option<usize>>) -> Self {
        Self { targets }
    }

    /// Number of reference positions, mapped or not.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Index position for reference position `pos`, or `None` if unmapped
    /// or out of range.
    pub fn get(&self, pos: usize) -> Option<usize> {
        self.targets.get(pos).copied().flatten()
    }

    pub fn targets(&self) -> &[Option<usize>] {
        &self.targets
    }

    pub fn coverage(&self) -> Coverage {
        Coverage {
            total: self.targets.len(),
            mapped: self.targets.iter().filter(|t| t.is_some()).count(),
        }
    }

    /// Number of distinct index positions in use. Less than
    /// `coverage().mapped` when several reference vectors resolved to the
    /// same index vector.
    pub fn distinct_targets(&self) -> usize {
        self.targets.iter().flatten().collect::<HashSet<_>>().len()
    }

    /// Reports whether every reference position maps to itself.
    pub fn is_identity(&self) -> bool {
        self.targets
            .iter()
            .enumerate()
            .all(|(i, t)| *t == Some(i))
    }
}

/// MatchIndex buckets the index-ordering vectors by [`MatchKey`].
///
/// Each bucket lists positions in ascending order, so scans visit the
/// earliest position first.
pub struct MatchIndex<'a> {
    vectors: &'a VectorSet,
    buckets: HashMap<MatchKey, Vec<usize>>,
    opts: ResolveOptions,
}

impl<'a> MatchIndex<'a> {
    /// Buckets every vector of `vectors`. Vectors whose key prefix holds a
    /// NaN are left out since nothing can match them.
    pub fn build(vectors: &'a VectorSet, opts: ResolveOptions) -> Result<Self> {
        opts.validate()?;

        let mut buckets: HashMap<MatchKey, Vec<usize>> = HashMap::new();
        let mut skipped = 0usize;
        for (pos, v) in vectors.iter().enumerate() {
            match MatchKey::of(v, opts.key_len) {
                Some(key) => buckets.entry(key).or_default().push(pos),
                None => skipped += 1,
            }
        }

        debug!(
            vectors = vectors.len(),
            buckets = buckets.len(),
            largest_bucket = buckets.values().map(Vec::len).max().unwrap_or(0),
            skipped,
            "built match index"
        );

        Ok(Self {
            vectors,
            buckets,
            opts,
        })
    }

    pub fn dim(&self) -> usize {
        self.vectors.dim()
    }

    /// Number of distinct keys.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Candidate positions sharing `key`, in ascending order.
    pub fn candidates(&self, key: &MatchKey) -> &[usize] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the first candidate equivalent to `query`, if any.
    ///
    /// First fit, not best fit: when several candidates are within
    /// tolerance the lowest position wins.
    pub fn find(&self, query: &[f32]) -> Option<usize> {
        let key = MatchKey::of(query, self.opts.key_len)?;
        self.candidates(&key).iter().copied().find(|&pos| {
            self.vectors
                .get(pos)
                .is_some_and(|v| equivalent(query, v, self.opts.tolerance))
        })
    }

    /// Resolves every vector of `reference` against this index.
    pub fn resolve(&self, reference: &VectorSet) -> Result<Mapping> {
        self.resolve_with_progress(reference, |_, _| {})
    }

    /// Like [`resolve`](Self::resolve), calling `progress(done, total)`
    /// every `progress_interval` positions and after the last one.
    pub fn resolve_with_progress<F>(&self, reference: &VectorSet, mut progress: F) -> Result<Mapping>
    where
        F: FnMut(usize, usize),
    {
        if reference.dim() != self.dim() {
            return Err(RemapError::DimensionMismatch {
                got: self.dim(),
                want: reference.dim(),
            });
        }

        let total = reference.len();
        let interval = self.opts.progress_interval;
        let mut targets = Vec::with_capacity(total);
        for (pos, v) in reference.iter().enumerate() {
            targets.push(self.find(v));
            if interval > 0 && (pos + 1) % interval == 0 {
                progress(pos + 1, total);
            }
        }
        if interval > 0 && total % interval != 0 {
            progress(total, total);
        }

        Ok(Mapping::from_targets(targets))
    }
}

/// Builds a [`MatchIndex`] over `index` and resolves `reference` against it.
///
/// Dimension mismatch is rejected before any vector is compared.
pub fn resolve(reference: &VectorSet, index: &VectorSet, opts: ResolveOptions) -> Result<Mapping> {
    if reference.dim() != index.dim() {
        return Err(RemapError::DimensionMismatch {
            got: index.dim(),
            want: reference.dim(),
        });
    }
    MatchIndex::build(index, opts)?.resolve(reference)
}
