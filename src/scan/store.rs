use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::risk::RiskTier;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCounts {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total: usize,
}

/// Snapshot of one evaluated product, fixed at scan time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub input_product_id: String,
    pub product_name: Option<String>,
    pub manufacturer_name: Option<String>,
    pub epd_url: Option<String>,
    pub epd_issue_date: Option<String>,
    pub risk_level: RiskTier,
    pub reasons: Vec<String>,
    pub advisories: Vec<String>,
}

/// A scan header with its results. Counts are never recomputed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub scan_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub counts: ScanCounts,
    pub results: Vec<ScanResult>,
}

/// Append-only scan log: one JSON document per line, indexed in memory.
pub struct ScanStore {
    path: Option<PathBuf>,
    scans: RwLock<HashMap<Uuid, Scan>>,
}

impl ScanStore {
    /// Memory-only store, used when no data directory is available.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            scans: RwLock::new(HashMap::new()),
        }
    }

    /// Replay the log at `path`. A missing file is an empty log; unreadable
    /// lines are skipped with a warning.
    pub fn open(path: &Path) -> Result<Self> {
        let mut scans = HashMap::new();
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            for (n, line) in data.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Scan>(line) {
                    Ok(scan) => {
                        scans.insert(scan.scan_id, scan);
                    }
                    Err(e) => {
                        tracing::warn!("Skipping scan log line {} in {}: {e}", n + 1, path.display());
                    }
                }
            }
            tracing::info!("Loaded {} scans from {}", scans.len(), path.display());
        }

        Ok(Self {
            path: Some(path.to_path_buf()),
            scans: RwLock::new(scans),
        })
    }

    /// Persist `scan` and make it visible to readers.
    pub fn append(&self, scan: Scan) -> Result<()> {
        let mut scans = self.scans.write();
        if let Some(path) = &self.path {
            let mut line = serde_json::to_string(&scan)?;
            line.push('\n');
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(line.as_bytes())?;
        }
        scans.insert(scan.scan_id, scan);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Scan> {
        let not_found = || Error::NotFound(format!("Scan {}", id.trim()));
        let scan_id = Uuid::parse_str(id.trim()).map_err(|_| not_found())?;
        self.scans.read().get(&scan_id).cloned().ok_or_else(not_found)
    }

    pub fn len(&self) -> usize {
        self.scans.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.read().is_empty()
    }
}
