// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage error types for AccountDB.
//
// One enum covers every way a store call can fail: a missing record, bytes
// that do not decode, engine failures from redb, a missing bucket, a write
// lock that could not be acquired in time, and startup bucket creation.

use std::time::Duration;

use thiserror::Error;

use crate::record::UserId;

/// Errors raised by the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record is stored under the requested identifier.
    #[error("no user with id {id}")]
    NotFound {
        /// The identifier that was looked up.
        id: UserId,
    },

    /// Stored bytes could not be decoded into a record, or a record could
    /// not be encoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The underlying redb engine failed (I/O, transaction, commit, table).
    #[error("engine error: {0}")]
    Engine(#[from] redb::Error),

    /// The configured bucket does not exist in the database file.
    #[error("bucket not found: {0}")]
    BucketMissing(String),

    /// The write lock was not acquired within the configured timeout.
    #[error("timed out after {timeout:?} waiting for the write lock")]
    LockTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The bucket could not be (re)created at startup. Fatal.
    #[error("bucket initialization failed: {0}")]
    BucketInit(String),
}

impl StoreError {
    /// True for the single-record "absent key" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        StoreError::Engine(err.into())
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Engine(err.into())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Engine(err.into())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Engine(err.into())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Engine(err.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = StoreError::NotFound { id: UserId(42) };
        assert_eq!(err.to_string(), "no user with id 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_codec_error_display() {
        let err = StoreError::Codec("expected value".to_string());
        assert!(err.to_string().contains("codec error"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_lock_timeout_display() {
        let err = StoreError::LockTimeout {
            timeout: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("write lock"));
        assert!(err.to_string().contains("250ms"));
    }

    #[test]
    fn test_bucket_errors_display() {
        let missing = StoreError::BucketMissing("accountbucket".to_string());
        assert_eq!(missing.to_string(), "bucket not found: accountbucket");

        let init = StoreError::BucketInit("disk full".to_string());
        assert!(init.to_string().contains("bucket initialization failed"));
    }

    #[test]
    fn test_json_error_converts_to_codec() {
        let json_err = serde_json::from_slice::<serde_json::Value>(b"{not json").unwrap_err();
        let err: StoreError = json_err.into();
        assert!(matches!(err, StoreError::Codec(_)));
    }
}
