use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Both result documents, as returned by `GET /api/export_meet_data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetExport {
    pub lifters_csv: String,
    pub lifts_csv: String,
    /// Where the documents were written, when they were.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl MeetExport {
    pub fn new(lifters_csv: String, lifts_csv: String) -> Self {
        Self {
            lifters_csv,
            lifts_csv,
            files: Vec::new(),
        }
    }

    /// Write `lifters-<stamp>.csv` and `lifts-<stamp>.csv` into `dir`.
    pub fn write_to(&mut self, dir: &Path) -> Result<()> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let lifters = dir.join(format!("lifters-{stamp}.csv"));
        let lifts = dir.join(format!("lifts-{stamp}.csv"));

        std::fs::write(&lifters, &self.lifters_csv)
            .with_context(|| format!("Failed to write {:?}", lifters))?;
        std::fs::write(&lifts, &self.lifts_csv)
            .with_context(|| format!("Failed to write {:?}", lifts))?;

        info!("Exported meet data to {}", dir.display());
        self.files = vec![lifters, lifts];
        Ok(())
    }
}
