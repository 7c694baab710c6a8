use std::slice::ChunksExact;

use crate::error::{RemapError, Result};

/// Default per-component absolute tolerance for [`equivalent`].
pub const DEFAULT_TOLERANCE: f32 = 0.01;

/// Default number of leading components that form a [`MatchKey`].
pub const DEFAULT_KEY_LEN: usize = 4;

/// Upper bound on [`MatchKey`] length.
pub const MAX_KEY_LEN: usize = 16;

/// VectorSet is an ordered collection of fixed-dimension float32 vectors,
/// stored row-major in a single contiguous buffer.
///
/// Positions are dense: the vector at position `i` occupies
/// `data[i * dim..(i + 1) * dim]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorSet {
    dim: usize,
    data: Vec<f32>,
}

impl VectorSet {
    /// Creates an empty set of the given dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            data: Vec::new(),
        }
    }

    /// Creates an empty set with room for `n` vectors.
    pub fn with_capacity(dim: usize, n: usize) -> Self {
        Self {
            dim,
            data: Vec::with_capacity(dim.saturating_mul(n)),
        }
    }

    /// Wraps a row-major buffer. `data.len()` must be a multiple of `dim`.
    pub fn from_flat(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            if data.is_empty() {
                return Ok(Self::new(0));
            }
            return Err(RemapError::InvalidDimension(0));
        }
        if data.len() % dim != 0 {
            return Err(RemapError::InvalidFormat(format!(
                "{} floats is not a multiple of dimension {dim}",
                data.len()
            )));
        }
        Ok(Self { dim, data })
    }

    /// Builds a set from rows. All rows must share the first row's length.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let dim = rows.first().map_or(0, |r| r.as_ref().len());
        let mut set = Self::with_capacity(dim, rows.len());
        for row in rows {
            set.push(row.as_ref())?;
        }
        Ok(set)
    }

    /// Appends a vector, which must have the set's dimension.
    pub fn push(&mut self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(RemapError::DimensionMismatch {
                got: vector.len(),
                want: self.dim,
            });
        }
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of vectors.
    pub fn len(&self) -> usize {
        if self.dim == 0 {
            0
        } else {
            self.data.len() / self.dim
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the vector at `pos`, or `None` if out of range.
    pub fn get(&self, pos: usize) -> Option<&[f32]> {
        if pos >= self.len() {
            return None;
        }
        let start = pos * self.dim;
        Some(&self.data[start..start + self.dim])
    }

    /// Iterates vectors in position order.
    pub fn iter(&self) -> ChunksExact<'_, f32> {
        // dim 0 implies an empty buffer; max(1) only avoids the zero chunk size panic.
        self.data.chunks_exact(self.dim.max(1))
    }

    /// The row-major backing buffer.
    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }
}

/// Reports whether every component pair of `a` and `b` differs by at most
/// `tolerance`. Vectors of different length are never equivalent, and a NaN
/// component never compares within tolerance. Equal infinities are
/// equivalent.
///
/// Arithmetic stays in f32 on both sides.
pub fn equivalent(a: &[f32], b: &[f32], tolerance: f32) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(&x, &y)| x == y || (x - y).abs() <= tolerance)
}

/// MatchKey is the coarse fingerprint of a vector: the exact bit patterns of
/// its leading components. Vectors whose prefixes are bit-identical share a
/// key; the full vector is verified separately with [`equivalent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatchKey {
    bits: [u32; MAX_KEY_LEN],
    len: u8,
}

impl MatchKey {
    /// Computes the key from the first `min(key_len, vector.len())`
    /// components.
    ///
    /// Returns `None` if the prefix contains a NaN, since a NaN never
    /// equals anything and such a vector can never be matched.
    pub fn of(vector: &[f32], key_len: usize) -> Option<Self> {
        let n = key_len.min(vector.len()).min(MAX_KEY_LEN);
        let mut bits = [0u32; MAX_KEY_LEN];
        for (slot, &v) in bits.iter_mut().zip(&vector[..n]) {
            if v.is_nan() {
                return None;
            }
            // -0.0 == 0.0, so both zeros must land in one bucket.
            *slot = if v == 0.0 { 0 } else { v.to_bits() };
        }
        Some(Self { bits, len: n as u8 })
    }

    /// Number of components the key covers.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
