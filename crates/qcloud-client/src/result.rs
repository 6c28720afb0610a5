//! Typed job results.

use std::path::{Path, PathBuf};

use ndarray::ArrayD;
use ndarray_npy::read_npy;

use crate::error::{ClientError, ClientResult};

/// The canonical success artifact of a job: an n-dimensional `f64` array
/// stored as `results.npy`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult {
    path: PathBuf,
    data: ArrayD<f64>,
}

impl JobResult {
    /// Load a `.npy` result file.
    pub fn load(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let data: ArrayD<f64> = read_npy(path).map_err(|e| ClientError::ResultLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            data,
        })
    }

    /// Location of the result file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f64> {
        self.data
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }
}
