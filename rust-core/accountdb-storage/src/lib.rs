// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// AccountDB Storage
//
// This crate is the storage layer of AccountDB: it maps `User` records to
// key-value pairs in a single redb bucket, one ACID transaction per call.
//
// # Modules
//
// - [`record`] -- The `User` record and its `UserId` primary key.
// - [`codec`] -- JSON encoding of records to stored bytes.
// - [`key`] -- Derivation of the bucket key from a `UserId`.
// - [`bucket`] -- Bucket (redb table) setup at open, reset or preserve.
// - [`store`] -- `RecordStore`, the transactional put/get/delete surface.
// - [`config`] -- `StoreConfig` and its environment overrides.
// - [`error`] -- The `StoreError` enum.
//
// # Example
//
// ```rust,no_run
// use accountdb_storage::{RecordStore, StoreConfig, User, UserId};
//
// # tokio_test::block_on(async {
// let store = RecordStore::open(StoreConfig::from_env()).unwrap();
//
// store.put(&User::new(1, "Ann", "Lee", "ann@example.com")).await.unwrap();
// store.put(&User::new(3, "Cy", "Diaz", "cy@example.com")).await.unwrap();
//
// // Missing ids are left out of batch reads rather than failing them.
// let found = store.get_many_by_ids(&[UserId(1), UserId(2), UserId(3)]).await.unwrap();
// assert_eq!(found.len(), 2);
// # });
// ```

pub mod bucket;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod record;
pub mod store;

pub use bucket::Bucket;
pub use config::{StartupPolicy, StoreConfig};
pub use error::StoreError;
pub use record::{User, UserId};
pub use store::RecordStore;
