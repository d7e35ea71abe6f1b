// # Log File Sink
//
// Append-only log file that is emptied wholesale once it grows past a size
// threshold. There is no rotation and no archive: the old content is gone.
//
// The sink plugs into `tracing-subscriber` as a `MakeWriter`, and the engine
// calls `enforce_limit()` before each pass.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing_subscriber::fmt::MakeWriter;

use crate::error::{Error, Result};

/// Size-capped, truncate-on-overflow log file
#[derive(Debug, Clone)]
pub struct LogFile {
    path: PathBuf,
    max_bytes: u64,
    file: Arc<File>,
}

impl LogFile {
    /// Open (or create) the log file in append mode
    ///
    /// # Parameters
    ///
    /// - `path`: Log file location
    /// - `max_size_kb`: Truncation threshold in KB
    pub fn open(path: impl AsRef<Path>, max_size_kb: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                Error::config(format!("Cannot open log file {}: {}", path.display(), e))
            })?;

        Ok(Self {
            path,
            max_bytes: max_size_kb.saturating_mul(1024),
            file: Arc::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Threshold in KB
    pub fn max_size_kb(&self) -> u64 {
        self.max_bytes / 1024
    }

    /// Empty the file if it reached the threshold
    ///
    /// Writes keep appending after truncation because the file is opened in
    /// append mode.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: The file was truncated
    /// - `Ok(false)`: The file is below the threshold
    pub fn enforce_limit(&self) -> Result<bool> {
        let size = self.file.metadata()?.len();
        if size < self.max_bytes {
            return Ok(false);
        }

        self.file.set_len(0)?;
        Ok(true)
    }
}

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = &'a File;

    fn make_writer(&'a self) -> Self::Writer {
        &self.file
    }
}
