use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::core::export::{ExportError, ExportTable};

/// Destination for finished export tables
pub trait ExportSink: Send + Sync {
    /// Write `table` and return where it landed
    fn persist(&self, table: &ExportTable, prefix: &str) -> Result<PathBuf, ExportError>;
}

/// Writes export tables as timestamped CSV files under a directory
#[derive(Debug, Clone)]
pub struct FileExportSink {
    directory: PathBuf,
}

impl FileExportSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl ExportSink for FileExportSink {
    /// Persist `table` as `{directory}/{prefix}_{YYYYmmdd_HHMMSS}.csv`
    ///
    /// Creates the directory when missing and returns the written path.
    fn persist(&self, table: &ExportTable, prefix: &str) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.directory)?;

        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.directory.join(format!("{}_{}.csv", prefix, timestamp));

        let file = File::create(&path)?;
        table.write_csv(BufWriter::new(file))?;

        tracing::info!("CSV exported to {} ({} rows)", path.display(), table.len());

        Ok(path)
    }
}
