//! HDF5 ground-truth files in the ann-benchmarks layout.
//!
//! One file holds four 2-D datasets: `train`, `test` and `distances` as
//! floats, `neighbors` as integers. Float datasets stored as f64 are
//! narrowed to f32 on read; everything is written back as f32 / i32.

use std::path::Path;

use hdf5::types::{FloatSize, TypeDescriptor};
use hdf5::{Dataset, File, H5Type};

use crate::error::{RemapError, Result};
use crate::groundtruth::GroundTruth;
use crate::translate::NeighborMatrix;
use crate::vector::VectorSet;

pub const TRAIN_DATASET: &str = "train";
pub const TEST_DATASET: &str = "test";
pub const NEIGHBORS_DATASET: &str = "neighbors";
pub const DISTANCES_DATASET: &str = "distances";

pub(crate) fn read(path: &Path) -> Result<GroundTruth> {
    let file = File::open(path)?;
    Ok(GroundTruth {
        train: read_floats(&file, TRAIN_DATASET)?,
        test: read_floats(&file, TEST_DATASET)?,
        neighbors: read_ids(&file, NEIGHBORS_DATASET)?,
        distances: read_floats(&file, DISTANCES_DATASET)?,
    })
}

/// Creates (or truncates) `path` and writes all four datasets.
pub(crate) fn write(path: &Path, gt: &GroundTruth) -> Result<()> {
    let file = File::create(path)?;
    let shape = |s: &VectorSet| (s.len(), s.dim());
    write_dataset(&file, TRAIN_DATASET, shape(&gt.train), gt.train.as_flat())?;
    write_dataset(&file, TEST_DATASET, shape(&gt.test), gt.test.as_flat())?;
    write_dataset(
        &file,
        NEIGHBORS_DATASET,
        gt.neighbors.shape(),
        gt.neighbors.as_flat(),
    )?;
    write_dataset(&file, DISTANCES_DATASET, shape(&gt.distances), gt.distances.as_flat())?;
    Ok(())
}

fn open_dataset(file: &File, name: &str) -> Result<Dataset> {
    file.dataset(name)
        .map_err(|e| RemapError::InvalidFormat(format!("dataset {name}: {e}")))
}

fn matrix_shape(ds: &Dataset, name: &str) -> Result<(usize, usize)> {
    match ds.shape().as_slice() {
        &[rows, cols] => Ok((rows, cols)),
        other => Err(RemapError::InvalidFormat(format!(
            "dataset {name} has shape {other:?}, want rows x cols"
        ))),
    }
}

fn read_floats(file: &File, name: &str) -> Result<VectorSet> {
    let ds = open_dataset(file, name)?;
    let (rows, cols) = matrix_shape(&ds, name)?;
    if rows == 0 || cols == 0 {
        return Ok(VectorSet::new(cols));
    }
    let data = match ds.dtype()?.to_descriptor()? {
        TypeDescriptor::Float(FloatSize::U8) => ds
            .read_raw::<f64>()?
            .into_iter()
            .map(|v| v as f32)
            .collect(),
        TypeDescriptor::Float(_) => ds.read_raw::<f32>()?,
        other => {
            return Err(RemapError::InvalidFormat(format!(
                "dataset {name} holds {other:?}, want float"
            )));
        }
    };
    VectorSet::from_flat(cols, data)
}

fn read_ids(file: &File, name: &str) -> Result<NeighborMatrix> {
    let ds = open_dataset(file, name)?;
    let (rows, cols) = matrix_shape(&ds, name)?;
    if rows == 0 || cols == 0 {
        return NeighborMatrix::from_flat(cols, Vec::new());
    }
    let data = match ds.dtype()?.to_descriptor()? {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => ds.read_raw::<i32>()?,
        other => {
            return Err(RemapError::InvalidFormat(format!(
                "dataset {name} holds {other:?}, want integer"
            )));
        }
    };
    NeighborMatrix::from_flat(cols, data)
}

fn write_dataset<T: H5Type>(
    file: &File,
    name: &str,
    shape: (usize, usize),
    data: &[T],
) -> Result<()> {
    let ds = file.new_dataset::<T>().shape(shape).create(name)?;
    if !data.is_empty() {
        ds.write_raw(data)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_f64_floats_and_i64_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wide.hdf5");
        {
            let file = File::create(&path).unwrap();
            write_dataset(&file, TRAIN_DATASET, (2, 2), &[1.0f64, 2.0, 3.0, 4.5]).unwrap();
            write_dataset(&file, TEST_DATASET, (1, 2), &[0.5f64, 0.25]).unwrap();
            write_dataset(&file, NEIGHBORS_DATASET, (1, 2), &[1i64, 0]).unwrap();
            write_dataset(&file, DISTANCES_DATASET, (1, 2), &[0.1f32, 0.2]).unwrap();
        }

        let gt = read(&path).unwrap();
        assert_eq!(gt.train.dim(), 2);
        assert_eq!(gt.train.as_flat(), &[1.0f32, 2.0, 3.0, 4.5]);
        assert_eq!(gt.test.as_flat(), &[0.5f32, 0.25]);
        assert_eq!(gt.neighbors.as_flat(), &[1, 0]);
        assert_eq!(gt.distances.as_flat(), &[0.1f32, 0.2]);
    }

    #[test]
    fn missing_dataset_named_in_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("partial.hdf5");
        {
            let file = File::create(&path).unwrap();
            write_dataset(&file, TRAIN_DATASET, (1, 2), &[1.0f32, 2.0]).unwrap();
        }

        let err = read(&path).unwrap_err();
        assert!(matches!(err, RemapError::InvalidFormat(_)));
        assert!(err.to_string().contains(TEST_DATASET));
    }

    #[test]
    fn one_dimensional_dataset_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("flat.hdf5");
        {
            let file = File::create(&path).unwrap();
            file.new_dataset::<f32>()
                .shape(3)
                .create(TRAIN_DATASET)
                .unwrap()
                .write_raw(&[1.0f32, 2.0, 3.0][..])
                .unwrap();
        }

        assert!(matches!(read(&path), Err(RemapError::InvalidFormat(_))));
    }
}
