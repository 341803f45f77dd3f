// Per-Row JSONL Time Series Recorder
// One JSON line per history row for independent analysis

use std::collections::BTreeMap;
use std::io::{BufWriter, Write};
use std::path::Path;

use coinflip_engine::history::{Column, StatsRow, StatsTable};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RowSnapshot {
    pub exchange_count: u64,
    pub total: i64,
    pub max: i64,
    pub min: i64,
    pub mean: f64,
    pub median: f64,
    /// Share of wealth held by each stored bucket, richest first.
    pub bucket_share: BTreeMap<String, f64>,
}

impl RowSnapshot {
    pub fn from_row(row: &StatsRow) -> Self {
        let stats = &row.stats;
        Self {
            exchange_count: row.exchange_count,
            total: stats.total,
            max: stats.max,
            min: stats.min,
            mean: stats.mean,
            median: stats.median,
            bucket_share: stats
                .buckets
                .iter()
                .map(|(index, share)| (Column::Bucket(*index).to_string(), *share))
                .collect(),
        }
    }
}

/// Time series recorder that accumulates snapshots and writes JSONL
pub struct TimeSeriesRecorder {
    snapshots: Vec<RowSnapshot>,
}

impl TimeSeriesRecorder {
    pub fn from_table(table: &StatsTable) -> Self {
        Self { snapshots: table.rows.iter().map(RowSnapshot::from_row).collect() }
    }

    /// Write all snapshots to a JSONL file
    pub fn write_jsonl(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = BufWriter::new(std::fs::File::create(path)?);
        for snapshot in &self.snapshots {
            let line = serde_json::to_string(snapshot)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            writeln!(file, "{}", line)?;
        }
        file.flush()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }
}
