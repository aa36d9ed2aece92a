//! JSON-lines session recorder

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use super::{Severity, Statistics, TuningLogger};
use crate::types::Sample;

/// Appends one JSON object per record to
/// `<dir>/tuning_session_<timestamp>.jsonl`.
///
/// Write errors are logged once and then the recorder goes quiet, so a full
/// disk never stops tuning.
pub struct JsonlLogger {
    path: PathBuf,
    writer: BufWriter<File>,
    failed: bool,
    records: u64,
}

impl JsonlLogger {
    /// Create the session file inside `dir` (created if missing).
    pub fn create(dir: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let name = format!("tuning_session_{}.jsonl", Utc::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        let file = File::create(&path)?;
        info!(path = %path.display(), "Recording tuning session");
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            failed: false,
            records: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    fn write_record(&mut self, record: serde_json::Value) {
        if self.failed {
            return;
        }
        let result = serde_json::to_writer(&mut self.writer, &record)
            .map_err(io::Error::from)
            .and_then(|()| self.writer.write_all(b"\n"));
        match result {
            Ok(()) => self.records += 1,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Session log write failed; recording stopped");
                self.failed = true;
            }
        }
    }
}

impl TuningLogger for JsonlLogger {
    fn log_sample(&mut self, coefficient: &str, sample: &Sample, value_in_effect: Option<f64>, accepted: bool) {
        self.write_record(json!({
            "type": "sample",
            "at": Utc::now(),
            "coefficient": coefficient,
            "value": value_in_effect,
            "accepted": accepted,
            "sample": sample,
        }));
    }

    fn log_event(&mut self, severity: Severity, message: &str) {
        self.write_record(json!({
            "type": "event",
            "at": Utc::now(),
            "severity": severity,
            "message": message,
        }));
    }

    fn log_statistics(&mut self, statistics: &Statistics) {
        self.write_record(json!({
            "type": "statistics",
            "at": Utc::now(),
            "statistics": statistics,
        }));
    }

    fn flush(&mut self) {
        if self.failed {
            return;
        }
        if let Err(e) = self.writer.flush() {
            warn!(path = %self.path.display(), error = %e, "Session log flush failed");
            self.failed = true;
        }
    }
}

impl Drop for JsonlLogger {
    fn drop(&mut self) {
        self.flush();
    }
}
