// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Record codec: `User` <-> stored bytes.
//
// Records are stored as JSON objects. Fields are tagged by name, so a reader
// ignores fields it does not know and field order carries no meaning.

use crate::error::StoreError;
use crate::record::User;

/// Serialize a record to the bytes stored in the bucket.
///
/// Every field is a plain scalar, so this only fails if serde_json itself
/// does; the error is still propagated rather than assumed away.
pub fn encode(user: &User) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(user).map_err(|err| {
        StoreError::Codec(format!("failed to encode user {}: {}", user.id, err))
    })
}

/// Deserialize stored bytes back into a record.
///
/// Malformed or incomplete input is a [`StoreError::Codec`]; a default
/// record is never substituted.
pub fn decode(bytes: &[u8]) -> Result<User, StoreError> {
    serde_json::from_slice(bytes)
        .map_err(|err| StoreError::Codec(format!("failed to decode user: {err}")))
}
