//! Append-only JSONL record of archive job outcomes.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const JOB_LEDGER_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerArtifact {
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
}

impl LedgerArtifact {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read artifact {}", path.display()))?;
        Ok(Self {
            path: path.display().to_string(),
            bytes: bytes.len() as u64,
            sha256: format!("{:x}", Sha256::digest(&bytes)),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLedgerEntry {
    pub schema_version: u32,
    pub recorded_unix_ms: u64,
    pub channel: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
    pub status: String,
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub records: usize,
    #[serde(default)]
    pub warnings: usize,
    #[serde(default)]
    pub artifacts: Vec<LedgerArtifact>,
}

#[derive(Clone)]
pub struct JobLedger {
    path: PathBuf,
    file: Arc<Mutex<std::fs::File>>,
}

impl JobLedger {
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &JobLedgerEntry) -> Result<()> {
        let line = serde_json::to_string(entry).context("failed to encode job ledger entry")?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow!("job ledger mutex is poisoned"))?;
        writeln!(file, "{line}")
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()
            .with_context(|| format!("failed to flush {}", self.path.display()))?;
        Ok(())
    }
}

pub fn read_job_ledger(path: &Path) -> Result<Vec<JobLedgerEntry>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    raw.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            serde_json::from_str::<JobLedgerEntry>(line).with_context(|| {
                format!("invalid job ledger line {} in {}", index + 1, path.display())
            })
        })
        .collect()
}
