//! Append-only calibration log.
//!
//! Every line carries a local timestamp. This is the audit trail the user keeps
//! alongside a snapshot; diagnostic output goes through the `log` facade.

use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::error::{CalError, CalResult};

pub struct CalLog {
    out: LineWriter<File>,
    path: PathBuf,
}

impl CalLog {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> CalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| CalError::file(&path, e))?;
        Ok(Self { out: LineWriter::new(file), path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line(&mut self, msg: impl AsRef<str>) -> CalResult<()> {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        writeln!(self.out, "{stamp} {}", msg.as_ref()).map_err(|e| CalError::file(&self.path, e))
    }

    /// Section banner, e.g. `--- DUMP START ---`.
    pub fn banner(&mut self, msg: impl AsRef<str>) -> CalResult<()> {
        self.line(format!("--- {} ---", msg.as_ref()))
    }

    pub fn flush(&mut self) -> CalResult<()> {
        self.out.flush().map_err(|e| CalError::file(&self.path, e))
    }
}
