//! Job log: one JSON object per line, appended after every job.
//!
//! The file is append-only. Concurrent writers from separate processes rely
//! on the filesystem's atomic append for small writes; no locking is done.

use crate::engine::EngineKind;
use crate::error::Doc2MdError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Outcome of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Ok,
    Error,
}

/// One line of the job log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub timestamp: String,
    pub source: String,
    pub engine: String,
    /// `"on"`, `"off"`, or empty when OCR does not apply (merge, plain text).
    pub ocr: String,
    pub duration_ms: Option<u64>,
    pub output_path: String,
    pub status: JobStatus,
    #[serde(default)]
    pub error: String,
}

impl JobRecord {
    /// Record for a conversion job; `error` is `None` on success.
    pub fn conversion(
        source: &Path,
        engine: EngineKind,
        force_ocr: bool,
        duration_ms: u64,
        output_path: Option<&Path>,
        error: Option<&Doc2MdError>,
    ) -> Self {
        let ocr = if engine.supports_ocr_toggle() {
            if force_ocr { "on" } else { "off" }
        } else {
            ""
        };
        Self {
            timestamp: crate::repair::now_timestamp(),
            source: source.display().to_string(),
            engine: engine.to_string(),
            ocr: ocr.to_string(),
            duration_ms: Some(duration_ms),
            output_path: output_path.map(|p| p.display().to_string()).unwrap_or_default(),
            status: if error.is_some() { JobStatus::Error } else { JobStatus::Ok },
            error: error.map(|e| e.to_string()).unwrap_or_default(),
        }
    }

    /// Record for a multi-document merge.
    pub fn merge(sources: &[PathBuf], output_path: &Path) -> Self {
        Self {
            timestamp: crate::repair::now_timestamp(),
            source: sources
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            engine: "merge-md".to_string(),
            ocr: String::new(),
            duration_ms: None,
            output_path: output_path.display().to_string(),
            status: JobStatus::Ok,
            error: String::new(),
        }
    }
}

/// Append `record` as one JSON line, creating the file and its parent.
pub async fn append(path: &Path, record: &JobRecord) -> Result<(), Doc2MdError> {
    let fail = |e: std::io::Error| Doc2MdError::JobLogFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let mut line = serde_json::to_string(record)
        .map_err(|e| Doc2MdError::Internal(format!("job record serialisation: {e}")))?;
    line.push('\n');

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(fail)?;
    file.write_all(line.as_bytes()).await.map_err(fail)?;
    file.flush().await.map_err(fail)?;
    debug!("Job log: appended {:?} record to {}", record.status, path.display());
    Ok(())
}

/// All records, oldest first. A missing file reads as empty; unparsable
/// lines are skipped.
pub fn read_all(path: &Path) -> Result<Vec<JobRecord>, Doc2MdError> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Doc2MdError::JobLogFailed {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut records = Vec::new();
    for (n, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JobRecord>(line) {
            Ok(r) => records.push(r),
            Err(e) => warn!("Job log {}:{}: skipping unreadable line ({})", path.display(), n + 1, e),
        }
    }
    Ok(records)
}

/// The newest `n` records, newest first.
pub fn read_last(path: &Path, n: usize) -> Result<Vec<JobRecord>, Doc2MdError> {
    let mut records = read_all(path)?;
    records.reverse();
    records.truncate(n);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: &str, status: JobStatus) -> JobRecord {
        JobRecord {
            timestamp: "2024-01-01T00:00:00".into(),
            source: source.into(),
            engine: "Marker".into(),
            ocr: "off".into(),
            duration_ms: Some(12),
            output_path: String::new(),
            status,
            error: String::new(),
        }
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_all(&dir.path().join("none.jsonl")).unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_then_read_last() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/jobs.jsonl");
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            append(&path, &record(name, JobStatus::Ok)).await.unwrap();
        }
        append(&path, &record("d.pdf", JobStatus::Error)).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("\"status\":\"error\""));

        let last = read_last(&path, 2).unwrap();
        let sources: Vec<_> = last.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["d.pdf", "c.pdf"]);
        assert_eq!(read_all(&path).unwrap().len(), 4);
    }

    #[test]
    fn bad_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.jsonl");
        let good = serde_json::to_string(&record("a.pdf", JobStatus::Ok)).unwrap();
        std::fs::write(&path, format!("not json\n{}\n\n", good)).unwrap();
        let all = read_all(&path).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].source, "a.pdf");
    }

    #[test]
    fn conversion_record_fields() {
        let err = Doc2MdError::Internal("boom".into());
        let r = JobRecord::conversion(
            Path::new("in/x.pptx"),
            EngineKind::Pptx2md,
            true,
            5,
            None,
            Some(&err),
        );
        assert_eq!(r.ocr, "");
        assert_eq!(r.status, JobStatus::Error);
        assert!(r.error.contains("boom"));
        assert_eq!(r.engine, "pptx2md");
    }
}
