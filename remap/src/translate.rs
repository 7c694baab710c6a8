use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RemapError, Result};
use crate::resolver::{Mapping, UNMAPPED};

/// NeighborMatrix holds `rows × k` neighbor ids, row-major.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborMatrix {
    k: usize,
    data: Vec<i32>,
}

impl NeighborMatrix {
    /// Wraps a row-major buffer. `data.len()` must be a multiple of `k`.
    pub fn from_flat(k: usize, data: Vec<i32>) -> Result<Self> {
        if k == 0 && !data.is_empty() {
            return Err(RemapError::InvalidFormat(
                "neighbor rows have zero width".into(),
            ));
        }
        if k > 0 && data.len() % k != 0 {
            return Err(RemapError::InvalidFormat(format!(
                "{} neighbor ids is not a multiple of row width {k}",
                data.len()
            )));
        }
        Ok(Self { k, data })
    }

    /// Builds a matrix from rows, which must all have the first row's length.
    pub fn from_rows<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self> {
        let k = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(k * rows.len());
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != k {
                return Err(RemapError::InvalidFormat(format!(
                    "neighbor row {i} has {} ids, want {k}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::from_flat(k, data)
    }

    /// Ids per row.
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn rows(&self) -> usize {
        if self.k == 0 { 0 } else { self.data.len() / self.k }
    }

    /// `(rows, k)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.k)
    }

    pub fn row(&self, i: usize) -> Option<&[i32]> {
        if i >= self.rows() {
            return None;
        }
        Some(&self.data[i * self.k..(i + 1) * self.k])
    }

    pub fn iter_rows(&self) -> std::slice::ChunksExact<'_, i32> {
        self.data.chunks_exact(self.k.max(1))
    }

    pub fn as_flat(&self) -> &[i32] {
        &self.data
    }
}

/// What to do with a neighbor whose train position has no index match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnmappedPolicy {
    /// Write [`UNMAPPED`] and count it.
    #[default]
    Sentinel,
    /// Fail on the first such neighbor.
    Reject,
}

/// Counts produced by [`translate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TranslationReport {
    /// Total ids in the matrix.
    pub entries: usize,
    /// Ids rewritten to an index position.
    pub translated: usize,
    /// Ids whose train position is unmapped, written as [`UNMAPPED`].
    pub unmapped: usize,
    /// Ids that were already [`UNMAPPED`] in the input.
    pub padding: usize,
    /// Rows holding at least one unmapped id.
    pub affected_rows: usize,
}

/// Output of [`translate`].
#[derive(Debug, Clone)]
pub struct Translation {
    pub neighbors: NeighborMatrix,
    pub report: TranslationReport,
}

/// Rewrites each train position in `neighbors` to its index position.
///
/// The output has the input's shape. Input ids equal to [`UNMAPPED`] pass
/// through as padding; any other id outside the mapping is an error.
pub fn translate(
    neighbors: &NeighborMatrix,
    mapping: &Mapping,
    policy: UnmappedPolicy,
) -> Result<Translation> {
    let mut out = Vec::with_capacity(neighbors.as_flat().len());
    let mut report = TranslationReport {
        entries: neighbors.as_flat().len(),
        ..Default::default()
    };

    for (row, ids) in neighbors.iter_rows().enumerate() {
        let mut row_unmapped = false;
        for (col, &id) in ids.iter().enumerate() {
            if id == UNMAPPED {
                report.padding += 1;
                out.push(UNMAPPED);
                continue;
            }
            let position = usize::try_from(id)
                .ok()
                .filter(|&p| p < mapping.len())
                .ok_or(RemapError::NeighborOutOfRange {
                    row,
                    col,
                    value: id,
                    len: mapping.len(),
                })?;

            match mapping.get(position) {
                Some(target) => {
                    let target = i32::try_from(target).map_err(|_| RemapError::IdOverflow(target))?;
                    report.translated += 1;
                    out.push(target);
                }
                None => match policy {
                    UnmappedPolicy::Sentinel => {
                        report.unmapped += 1;
                        row_unmapped = true;
                        out.push(UNMAPPED);
                    }
                    UnmappedPolicy::Reject => {
                        return Err(RemapError::Unmapped { row, col, position });
                    }
                },
            }
        }
        if row_unmapped {
            report.affected_rows += 1;
        }
    }

    if report.unmapped > 0 {
        warn!(
            unmapped = report.unmapped,
            affected_rows = report.affected_rows,
            "neighbors reference unmapped train vectors"
        );
    }

    Ok(Translation {
        neighbors: NeighborMatrix::from_flat(neighbors.k(), out)?,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[i32]]) -> NeighborMatrix {
        NeighborMatrix::from_rows(rows).unwrap()
    }

    #[test]
    fn swaps_ids() {
        let mapping = Mapping::from_targets(vec![Some(1), Some(0)]);
        let t = translate(&matrix(&[&[0, 1]]), &mapping, UnmappedPolicy::Sentinel).unwrap();
        assert_eq!(t.neighbors, matrix(&[&[1, 0]]));
        assert_eq!(t.report.translated, 2);
        assert_eq!(t.report.unmapped, 0);
    }

    #[test]
    fn unmapped_becomes_sentinel() {
        let mapping = Mapping::from_targets(vec![Some(4), None, Some(2)]);
        let input = matrix(&[&[0, 1, 2], &[2, 0, 0], &[1, 1, 0]]);
        let t = translate(&input, &mapping, UnmappedPolicy::Sentinel).unwrap();

        assert_eq!(t.neighbors.shape(), input.shape());
        assert_eq!(t.neighbors, matrix(&[&[4, -1, 2], &[2, 4, 4], &[-1, -1, 4]]));
        assert_eq!(
            t.report,
            TranslationReport {
                entries: 9,
                translated: 6,
                unmapped: 3,
                padding: 0,
                affected_rows: 2,
            }
        );
    }

    #[test]
    fn every_entry_is_mapped_or_sentinel() {
        let mapping = Mapping::from_targets(vec![Some(7), None, Some(5), Some(6)]);
        let input = matrix(&[&[3, 2, 1, 0], &[0, 0, 1, 3]]);
        let t = translate(&input, &mapping, UnmappedPolicy::Sentinel).unwrap();
        for (a, b) in input.as_flat().iter().zip(t.neighbors.as_flat()) {
            let expected = mapping.get(*a as usize).map_or(UNMAPPED, |p| p as i32);
            assert_eq!(*b, expected);
        }
    }

    #[test]
    fn reject_policy_fails_on_unmapped() {
        let mapping = Mapping::from_targets(vec![Some(0), None]);
        let err = translate(&matrix(&[&[0, 0], &[0, 1]]), &mapping, UnmappedPolicy::Reject)
            .unwrap_err();
        assert!(matches!(
            err,
            RemapError::Unmapped {
                row: 1,
                col: 1,
                position: 1
            }
        ));
    }

    #[test]
    fn padding_passes_through() {
        let mapping = Mapping::from_targets(vec![Some(9)]);
        let t = translate(&matrix(&[&[0, -1]]), &mapping, UnmappedPolicy::Reject).unwrap();
        assert_eq!(t.neighbors.as_flat(), &[9, -1]);
        assert_eq!(t.report.padding, 1);
        assert_eq!(t.report.unmapped, 0);
    }

    #[test]
    fn out_of_range_ids_rejected() {
        let mapping = Mapping::from_targets(vec![Some(0), Some(1)]);
        for bad in [2, -2] {
            let err = translate(&matrix(&[&[0, bad]]), &mapping, UnmappedPolicy::Sentinel)
                .unwrap_err();
            assert!(matches!(
                err,
                RemapError::NeighborOutOfRange { row: 0, col: 1, .. }
            ));
        }
    }

    #[test]
    fn empty_matrix() {
        let t = translate(
            &NeighborMatrix::default(),
            &Mapping::from_targets(vec![]),
            UnmappedPolicy::Sentinel,
        )
        .unwrap();
        assert_eq!(t.neighbors.shape(), (0, 0));
        assert_eq!(t.report, TranslationReport::default());
    }

    #[test]
    fn ragged_rows_rejected() {
        assert!(NeighborMatrix::from_rows(&[vec![1, 2], vec![3]]).is_err());
        assert!(NeighborMatrix::from_flat(3, vec![1, 2]).is_err());
    }
}
