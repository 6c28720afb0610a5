//! Result archive download and unpacking.
//!
//! The server ships job outputs as a gzip-compressed tar stream. The stream is
//! first spooled to a temporary file, then extracted into the job's results
//! folder (`<results_base>/<pid>/`). The temporary file is removed on every
//! exit path.
//!
//! Outcome classification:
//!
//! | Situation                            | Result                          |
//! |--------------------------------------|---------------------------------|
//! | archive extracted                    | [`UnpackOutcome::Extracted`]    |
//! | not gzip / not tar / truncated       | [`UnpackOutcome::Corrupt`], logged |
//! | permission denied, disk full, RO fs  | `Err(ClientError::Io)`          |

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::error::ClientResult;
use crate::result::JobResult;

/// Canonical success artifact.
pub const RESULTS_FILE: &str = "results.npy";
/// Captured standard output of a failed job.
pub const STDOUT_LOG: &str = "stdout.log";
/// Captured standard error of a failed job.
pub const STDERR_LOG: &str = "stderr.log";
/// Where an unreadable download is kept for manual inspection.
pub const RAW_DOWNLOAD_FILE: &str = "raw_download.bin";

const CHUNK_SIZE: usize = 8 * 1024;

/// A downloaded archive on disk. The file is deleted when this is dropped.
#[derive(Debug)]
pub struct TempArchive {
    file: NamedTempFile,
    len: u64,
}

impl TempArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of bytes written.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete the file now, reporting any error.
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Spool `reader` into a fresh temporary file in the system temp directory.
pub fn write_stream_to_temp(reader: impl Read) -> io::Result<TempArchive> {
    write_stream_to_temp_in(reader, None)
}

/// Spool `reader` into a fresh temporary file, in `dir` if given.
pub fn write_stream_to_temp_in(mut reader: impl Read, dir: Option<&Path>) -> io::Result<TempArchive> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("qcloud-download-").suffix(".tar.gz");
    let mut file = match dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut len = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        file.write_all(&buf[..n])?;
        len += n as u64;
    }
    file.flush()?;

    Ok(TempArchive { file, len })
}

/// Why an archive could not be extracted.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The bytes are not a readable gzip tar archive.
    #[error("not a valid gzip tar archive: {0}")]
    Format(#[source] io::Error),

    /// The local filesystem refused the write.
    #[error("cannot write archive contents: {0}")]
    Filesystem(#[source] io::Error),
}

impl ExtractError {
    fn classify(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied
            | io::ErrorKind::StorageFull
            | io::ErrorKind::ReadOnlyFilesystem => ExtractError::Filesystem(err),
            _ => ExtractError::Format(err),
        }
    }
}

/// Extract the gzip tar archive at `archive_path` into `destination`.
///
/// `destination` and its parents are created as needed; existing members are
/// overwritten.
pub fn extract_archive(archive_path: &Path, destination: &Path) -> Result<(), ExtractError> {
    fs::create_dir_all(destination).map_err(ExtractError::Filesystem)?;
    let file = File::open(archive_path).map_err(ExtractError::Filesystem)?;

    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.set_overwrite(true);
    archive.unpack(destination).map_err(ExtractError::classify)
}

/// What [`ArchivePipeline::unpack`] did with a download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnpackOutcome {
    /// All members were written to the results folder.
    Extracted,
    /// The download was not a valid archive. `preserved` is where the raw
    /// bytes were saved, if saving succeeded.
    Corrupt { preserved: Option<PathBuf> },
}

/// Unpacks downloads into one job's results folder.
#[derive(Debug, Clone)]
pub struct ArchivePipeline {
    results_folder: PathBuf,
    temp_dir: Option<PathBuf>,
}

impl ArchivePipeline {
    pub fn new(results_folder: impl Into<PathBuf>) -> Self {
        Self {
            results_folder: results_folder.into(),
            temp_dir: None,
        }
    }

    /// Spool downloads in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    pub fn results_folder(&self) -> &Path {
        &self.results_folder
    }

    /// Path of a member inside the results folder.
    pub fn member(&self, name: &str) -> PathBuf {
        self.results_folder.join(name)
    }

    /// Download `stream` and extract it into the results folder.
    pub fn unpack(&self, stream: impl Read) -> ClientResult<UnpackOutcome> {
        fs::create_dir_all(&self.results_folder)?;

        let temp = write_stream_to_temp_in(stream, self.temp_dir.as_deref())?;
        debug!(bytes = temp.len(), "download spooled to {}", temp.path().display());

        let outcome = match extract_archive(temp.path(), &self.results_folder) {
            Ok(()) => UnpackOutcome::Extracted,
            Err(ExtractError::Format(err)) => {
                error!("Caught archive read error: {err}");
                let preserved = self.preserve_raw(temp.path());
                match &preserved {
                    Some(path) => error!(
                        "The received file is not a valid gzip tar archive, the result might have to be inspected manually. Find the file at `{}`",
                        path.display()
                    ),
                    None => error!(
                        "The received file is not a valid gzip tar archive and could not be saved for inspection"
                    ),
                }
                UnpackOutcome::Corrupt { preserved }
            }
            Err(ExtractError::Filesystem(err)) => return Err(err.into()),
        };

        if let Err(e) = temp.close() {
            warn!("failed to remove temporary download: {e}");
        }
        Ok(outcome)
    }

    fn preserve_raw(&self, temp_path: &Path) -> Option<PathBuf> {
        let target = self.member(RAW_DOWNLOAD_FILE);
        match fs::copy(temp_path, &target) {
            Ok(_) => Some(target),
            Err(e) => {
                warn!("failed to preserve raw download: {e}");
                None
            }
        }
    }

    /// Read a log member, or `"-"` if it is missing or unreadable.
    pub fn read_log(&self, name: &str) -> String {
        fs::read_to_string(self.member(name)).unwrap_or_else(|_| "-".to_string())
    }

    /// Log the captured output of a job that ended in ERROR.
    pub fn report_job_error(&self) {
        let stdout = self.read_log(STDOUT_LOG);
        let stderr = self.read_log(STDERR_LOG);
        error!("Job exited with error\n\nStdout:\n{stdout}\n\nStderr:\n{stderr}");
    }

    /// Load the canonical result file.
    pub fn load_result(&self) -> ClientResult<JobResult> {
        JobResult::load(self.member(RESULTS_FILE))
    }
}
