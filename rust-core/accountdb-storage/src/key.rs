// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key scheme: identifier -> bucket key.
//
// Keys are the plain decimal rendering of the identifier. No padding, so a
// bucket scan returns keys in byte order ("10" before "2"), not numeric
// order.

use crate::record::UserId;

/// Canonical storage key for `id`.
pub fn key_of(id: UserId) -> String {
    id.0.to_string()
}
