//! Durable receipt record, one file per client identity.
//!
//! The record tracks which indices (plus the checksum slot) have been
//! received and the values themselves, as JSON with the field names `vals`
//! and `received` — the on-disk format predates this implementation and
//! existing state files must keep loading.
//!
//! No inter-process locking: the contract is a single reader/writer per
//! identity at a time.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::StoreError;

/// On-disk shape. Field names are load-bearing for compatibility.
#[derive(Debug, Serialize, Deserialize)]
struct FileContent {
    vals: Vec<u32>,
    received: Vec<bool>,
}

/// Receipt record for one client identity.
#[derive(Debug)]
pub struct ReceiptStore {
    path: PathBuf,
    vals: Vec<u32>,
    /// `n + 1` flags; the last is the checksum slot.
    received: Vec<bool>,
}

impl ReceiptStore {
    /// Open the record for `id`, loading `<dir>/<id>.state` if it exists.
    ///
    /// Absent file means a fresh zero-valued record of length `n`. A present
    /// file wins over `n` entirely — resume trusts what was persisted.
    pub fn open(dir: &Path, id: &str, n: u32) -> Result<Self, StoreError> {
        let path = dir.join(format!("{id}.state"));
        let mut store = Self {
            path,
            vals: vec![0; n as usize],
            received: vec![false; n as usize + 1],
        };
        if store.path.exists() {
            store.load()?;
        }
        Ok(store)
    }

    /// Open the record in the system scratch directory.
    pub fn in_temp_dir(id: &str, n: u32) -> Result<Self, StoreError> {
        Self::open(&std::env::temp_dir(), id, n)
    }

    fn load(&mut self) -> Result<(), StoreError> {
        let raw = fs::read(&self.path)
            .map_err(|source| StoreError::Read { path: self.path.clone(), source })?;
        let content: FileContent = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::Parse { path: self.path.clone(), source })?;
        self.vals = content.vals;
        self.received = content.received;
        info!(path = %self.path.display(), "resumed receipt record");
        Ok(())
    }

    /// Record one received series element. Duplicates overwrite
    /// (last-write-wins); out-of-range sequences are ignored.
    pub fn record_value(&mut self, sequence: u32, value: u32) {
        let index = sequence as usize;
        if let Some(slot) = self.vals.get_mut(index) {
            *slot = value;
        }
        if let Some(flag) = self.received.get_mut(index) {
            *flag = true;
        }
    }

    /// Record receipt of the checksum frame.
    pub fn record_checksum(&mut self, sequence: u32) {
        if let Some(flag) = self.received.get_mut(sequence as usize) {
            *flag = true;
        }
    }

    /// True once every index and the checksum slot have been received.
    pub fn all_received(&self) -> bool {
        self.received.iter().all(|&flag| flag)
    }

    /// The stored series values, in index order.
    pub fn values(&self) -> &[u32] {
        &self.vals
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the record, overwriting the backing file.
    pub fn flush(&self) -> Result<(), StoreError> {
        let content = FileContent { vals: self.vals.clone(), received: self.received.clone() };
        let raw = serde_json::to_vec(&content)
            .map_err(|source| StoreError::Parse { path: self.path.clone(), source })?;
        fs::write(&self.path, raw)
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })
    }
}
