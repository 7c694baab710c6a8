//! Ground-truth container: the four named datasets of a nearest-neighbor
//! benchmark, stored either as an HDF5 file or as a directory of vecs files.
//!
//! ```text
//! <name>.hdf5            datasets train, test, neighbors, distances
//!
//! <dir>/train.fvecs      N x D  reference vectors
//! <dir>/test.fvecs       Q x D  query vectors
//! <dir>/neighbors.ivecs  Q x K  train positions, nearest first
//! <dir>/distances.fvecs  Q x K  distances matching neighbors
//! ```

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{RemapError, Result};
use crate::h5;
use crate::translate::NeighborMatrix;
use crate::vecs::{read_fvecs, read_ivecs, write_fvecs, write_ivecs};
use crate::vector::VectorSet;

pub const TRAIN_FILE: &str = "train.fvecs";
pub const TEST_FILE: &str = "test.fvecs";
pub const NEIGHBORS_FILE: &str = "neighbors.ivecs";
pub const DISTANCES_FILE: &str = "distances.fvecs";

/// On-disk layout of a ground-truth container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Directory of fvecs / ivecs files.
    Vecs,
    /// Single HDF5 file, one dataset per array.
    Hdf5,
}

impl Format {
    /// Paths ending in `.hdf5` or `.h5` are HDF5 files; anything else is a
    /// directory.
    pub fn of(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("hdf5") || ext.eq_ignore_ascii_case("h5") => {
                Self::Hdf5
            }
            _ => Self::Vecs,
        }
    }
}

/// GroundTruth is a nearest-neighbor benchmark dataset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    pub train: VectorSet,
    pub test: VectorSet,
    pub neighbors: NeighborMatrix,
    pub distances: VectorSet,
}

impl GroundTruth {
    /// Checks that `neighbors` and `distances` have the same shape.
    pub fn validate(&self) -> Result<()> {
        let distances = (self.distances.len(), self.distances.dim());
        if self.neighbors.shape() != distances {
            let (rows, k) = self.neighbors.shape();
            return Err(RemapError::InvalidFormat(format!(
                "neighbors is {rows}x{k} but distances is {}x{}",
                distances.0, distances.1
            )));
        }
        Ok(())
    }

    /// Loads and validates the container at `path`, in the layout
    /// [`Format::of`] picks for it.
    pub fn load(path: &Path) -> Result<Self> {
        let format = Format::of(path);
        let gt = match format {
            Format::Vecs => Self::read_dir(path)?,
            Format::Hdf5 => h5::read(path)?,
        };
        gt.validate()?;
        debug!(
            path = %path.display(),
            ?format,
            train = gt.train.len(),
            dim = gt.train.dim(),
            test = gt.test.len(),
            k = gt.neighbors.k(),
            "loaded ground truth"
        );
        Ok(gt)
    }

    /// Writes the container to `path`, in the layout [`Format::of`] picks
    /// for it.
    ///
    /// Output is written to a staging sibling and renamed into place once
    /// every dataset is complete, so a failed save leaves nothing at `path`.
    /// An existing `path` is an error unless `overwrite` is set; it is then
    /// moved aside for the rename and removed afterwards.
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        self.validate()?;
        if path.exists() && !overwrite {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )
            .into());
        }

        let format = Format::of(path);
        let staging = sibling(path, "partial")?;
        remove_path(&staging)?;

        let written = match format {
            Format::Vecs => self.write_dir(&staging),
            Format::Hdf5 => h5::write(&staging, self),
        };
        if let Err(e) = written.and_then(|()| replace(&staging, path)) {
            let _ = remove_path(&staging);
            return Err(e);
        }
        debug!(path = %path.display(), ?format, "saved ground truth");
        Ok(())
    }

    fn read_dir(dir: &Path) -> Result<Self> {
        Ok(Self {
            train: read_fvecs(&mut open(&dir.join(TRAIN_FILE))?)?,
            test: read_fvecs(&mut open(&dir.join(TEST_FILE))?)?,
            neighbors: read_ivecs(&mut open(&dir.join(NEIGHBORS_FILE))?)?,
            distances: read_fvecs(&mut open(&dir.join(DISTANCES_FILE))?)?,
        })
    }

    fn write_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        write_with(&dir.join(TRAIN_FILE), |w| write_fvecs(w, &self.train))?;
        write_with(&dir.join(TEST_FILE), |w| write_fvecs(w, &self.test))?;
        write_with(&dir.join(NEIGHBORS_FILE), |w| write_ivecs(w, &self.neighbors))?;
        write_with(&dir.join(DISTANCES_FILE), |w| write_fvecs(w, &self.distances))?;
        Ok(())
    }
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("open {}: {e}", path.display()))
    })?;
    Ok(BufReader::new(file))
}

fn write_with<F>(path: &Path, f: F) -> Result<()>
where
    F: FnOnce(&mut dyn Write) -> Result<()>,
{
    let mut bw = BufWriter::new(File::create(path)?);
    f(&mut bw)?;
    bw.flush()?;
    Ok(())
}

/// Moves `staging` to `target`. An existing `target` is renamed aside first
/// and put back if the move fails.
fn replace(staging: &Path, target: &Path) -> Result<()> {
    if fs::symlink_metadata(target).is_err() {
        fs::rename(staging, target)?;
        return Ok(());
    }

    let previous = sibling(target, "old")?;
    remove_path(&previous)?;
    fs::rename(target, &previous)?;
    if let Err(e) = fs::rename(staging, target) {
        if let Err(restore) = fs::rename(&previous, target) {
            warn!(
                path = %previous.display(),
                error = %restore,
                "previous output left aside"
            );
        }
        return Err(e.into());
    }
    if let Err(e) = remove_path(&previous) {
        warn!(path = %previous.display(), error = %e, "remove previous output");
    }
    Ok(())
}

/// Removes a file or directory tree. A missing path is not an error.
fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Sibling of `path` named `.<name>.<tag>-<pid>`.
fn sibling(path: &Path, tag: &str) -> Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| RemapError::InvalidConfig(format!("{} has no file name", path.display())))?;
    let mut staged = OsString::from(".");
    staged.push(name);
    staged.push(format!(".{tag}-{}", std::process::id()));
    Ok(path.with_file_name(staged))
}
