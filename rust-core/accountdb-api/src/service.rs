// SPDX-License-Identifier: PMPL-1.0-or-later
//! User service
//!
//! Thin layer between the HTTP handlers and [`RecordStore`]. Add, update and
//! replace are all upserts: the store does not tell an insert from an
//! overwrite, and neither does this service.

use accountdb_storage::{RecordStore, StoreError, User, UserId};

/// User operations exposed to the HTTP layer.
#[derive(Debug, Clone)]
pub struct UserService {
    store: RecordStore,
}

impl UserService {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Store a new user. An existing user with the same id is replaced.
    pub async fn add_user(&self, user: &User) -> Result<(), StoreError> {
        self.store.put(user).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, StoreError> {
        self.store.get_by_id(id).await
    }

    /// Users for the ids that exist, in request order.
    pub async fn get_users_by_ids(&self, ids: &[UserId]) -> Result<Vec<User>, StoreError> {
        self.store.get_many_by_ids(ids).await
    }

    pub async fn get_all_users(&self) -> Result<Vec<User>, StoreError> {
        self.store.get_all().await
    }

    /// Overwrite a user. There is no field-level merge.
    pub async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        self.replace_user(user).await
    }

    /// Overwrite a user, creating it if absent.
    pub async fn replace_user(&self, user: &User) -> Result<(), StoreError> {
        self.store.put(user).await
    }

    /// Delete a user. Deleting an unknown id succeeds.
    pub async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        self.store.delete_by_id(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accountdb_storage::StoreConfig;
    use tempfile::tempdir;

    fn service() -> (UserService, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RecordStore::open(StoreConfig::at(dir.path().join("svc.redb"))).unwrap();
        (UserService::new(store), dir)
    }

    #[tokio::test]
    async fn test_add_then_update_is_upsert() {
        let (svc, _dir) = service();
        let user = User::new(1, "Ann", "Lee", "ann@example.com");
        svc.add_user(&user).await.unwrap();
        svc.add_user(&user).await.unwrap();

        let changed = user.clone().with_active(false);
        svc.update_user(&changed).await.unwrap();
        assert_eq!(svc.get_user(UserId(1)).await.unwrap(), changed);

        // Updating an id that was never added creates it.
        let fresh = User::new(2, "Bo", "Chen", "bo@example.com");
        svc.replace_user(&fresh).await.unwrap();
        assert_eq!(svc.get_all_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_and_batch() {
        let (svc, _dir) = service();
        let user = User::new(5, "Cy", "Diaz", "cy@example.com");
        svc.add_user(&user).await.unwrap();

        let found = svc.get_users_by_ids(&[UserId(4), UserId(5)]).await.unwrap();
        assert_eq!(found, vec![user]);

        svc.delete_user(UserId(5)).await.unwrap();
        svc.delete_user(UserId(5)).await.unwrap();
        assert!(svc.get_user(UserId(5)).await.unwrap_err().is_not_found());
    }
}
