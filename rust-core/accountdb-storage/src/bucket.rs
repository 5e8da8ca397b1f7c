// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bucket management.
//
// A bucket is a single redb table mapping decimal-string keys to encoded
// records. It is set up once when the store opens; under
// `StartupPolicy::Reset` any previous contents are dropped first.

use std::sync::Arc;

use redb::{Database, TableDefinition};
use tracing::info;

use crate::config::StartupPolicy;
use crate::error::StoreError;

/// redb table layout of a bucket: canonical key -> codec bytes.
pub type BucketTable<'a> = TableDefinition<'a, &'static str, &'static [u8]>;

/// Handle to an initialized bucket. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    name: Arc<str>,
}

impl Bucket {
    /// Bucket name as stored in the database file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// redb table definition for this bucket.
    pub fn definition(&self) -> BucketTable<'_> {
        TableDefinition::new(&self.name)
    }
}

/// Prepare bucket `name` in `db` according to `policy`.
///
/// `Reset` drops the table (a missing table is fine) and creates it empty;
/// `Preserve` creates it only if absent. Both run in one write transaction.
/// Any failure comes back as [`StoreError::BucketInit`]; the store cannot
/// run without its bucket.
pub fn initialize(db: &Database, name: &str, policy: StartupPolicy) -> Result<Bucket, StoreError> {
    let bucket = Bucket { name: Arc::from(name) };
    let init_err = |stage: &str, err: &dyn std::fmt::Display| {
        StoreError::BucketInit(format!("{stage} '{name}': {err}"))
    };

    let txn = db.begin_write().map_err(|e| init_err("write txn for", &e))?;
    let dropped = match policy {
        StartupPolicy::Reset => txn
            .delete_table(bucket.definition())
            .map_err(|e| init_err("drop", &e))?,
        StartupPolicy::Preserve => false,
    };
    // Opening a table in a write transaction creates it if missing.
    txn.open_table(bucket.definition())
        .map_err(|e| init_err("create", &e))?;
    txn.commit().map_err(|e| init_err("commit", &e))?;

    info!(bucket = %name, ?policy, dropped, "bucket initialized");
    Ok(bucket)
}
