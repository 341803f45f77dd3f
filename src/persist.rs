// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Coin Flip Wealth Simulation Suite - State Files
//
// A state file is only ever replaced whole: the new contents go to
// `<file>.tmp`, are flushed and fsynced, then renamed over the canonical
// path. Readers therefore see either the previous file or the new one.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{FlipError, Result};

const TEMP_SUFFIX: &str = ".tmp";
const HISTORY_SUFFIX: &str = "_history";

/// `<file>.tmp` next to `path`.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(TEMP_SUFFIX);
    path.with_file_name(name)
}

/// `<stem>_history.<ext>` next to `path`; holds the stats table alone.
pub fn history_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.file_stem().map(OsString::from).unwrap_or_default();
    name.push(HISTORY_SUFFIX);
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

// ─── StateWriter ────────────────────────────────────────────────────────────

/// Writes one file through a temporary sibling and renames on finalize.
///
/// Dropping an unfinalized writer removes the temporary file.
pub struct StateWriter {
    temp_path: Option<PathBuf>,
    final_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl StateWriter {
    pub fn new(final_path: &Path) -> Result<Self> {
        let temp_path = temp_path_for(final_path);
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| FlipError::io(&temp_path, e))?;
        Ok(Self {
            temp_path: Some(temp_path),
            final_path: final_path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn write_json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| consumed(&self.final_path))?;
        serde_json::to_writer(writer, value)
            .map_err(|source| FlipError::Encode { path: self.final_path.clone(), source })
    }

    /// Flush, fsync, then rename over the canonical path.
    pub fn finalize(mut self) -> Result<PathBuf> {
        let mut writer = self.writer.take().ok_or_else(|| consumed(&self.final_path))?;
        let temp_path = self.temp_path.take().ok_or_else(|| consumed(&self.final_path))?;

        writer.flush().map_err(|e| FlipError::io(&temp_path, e))?;
        writer.get_ref().sync_all().map_err(|e| FlipError::io(&temp_path, e))?;
        drop(writer);

        if let Err(e) = fs::rename(&temp_path, &self.final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(FlipError::io(&self.final_path, e));
        }
        Ok(self.final_path.clone())
    }
}

impl Drop for StateWriter {
    fn drop(&mut self) {
        self.writer.take();
        if let Some(ref temp_path) = self.temp_path {
            let _ = fs::remove_file(temp_path);
        }
    }
}

fn consumed(path: &Path) -> FlipError {
    FlipError::io(path, io::Error::new(io::ErrorKind::Other, "state writer already consumed"))
}

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Serialize `value` as JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut writer = StateWriter::new(path)?;
    writer.write_json(value)?;
    writer.finalize()?;
    Ok(())
}

/// Remove a file, treating "already gone" as success. Returns whether it existed.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(FlipError::io(path, e)),
    }
}

/// Drop a leftover in-progress file for `path`, if any.
pub fn remove_temp(path: &Path) -> Result<bool> {
    remove_if_exists(&temp_path_for(path))
}

/// Delete the snapshot, its stats table and any leftover temporary files.
pub fn remove_state(path: &Path) -> Result<()> {
    let history = history_path_for(path);
    for file in [path.to_path_buf(), temp_path_for(path), temp_path_for(&history), history] {
        remove_if_exists(&file)?;
    }
    Ok(())
}
