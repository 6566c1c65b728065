use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Principal, UserId, UserStore};
use crate::errors::StoreError;

#[derive(Default)]
struct Inner {
    users: RwLock<HashMap<UserId, Principal>>,
    lookups: AtomicUsize,
}

/// User records held in memory, seeded from configuration.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    inner: Arc<Inner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: Principal) {
        self.inner.users.write().insert(user.id.clone(), user);
    }

    pub fn remove(&self, id: &str) -> Option<Principal> {
        self.inner.users.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.inner.users.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.users.read().is_empty()
    }

    /// Number of `find_user_by_id` calls served so far.
    pub fn lookups(&self) -> usize {
        self.inner.lookups.load(Ordering::Relaxed)
    }
}

impl FromIterator<Principal> for InMemoryUserStore {
    fn from_iter<I: IntoIterator<Item = Principal>>(users: I) -> Self {
        let store = Self::new();
        for user in users {
            store.insert(user);
        }
        store
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_user_by_id(&self, id: &str) -> Result<Option<Principal>, StoreError> {
        self.inner.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.inner.users.read().get(id).cloned())
    }

    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Principal>, StoreError> {
        self.inner.lookups.fetch_add(1, Ordering::Relaxed);
        let users = self.inner.users.read();
        Ok(users.values().find(|user| user.username == username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::principal;

    #[tokio::test]
    async fn test_find_user() {
        let store: InMemoryUserStore = [principal("u1", "kody"), principal("u2", "hannah")]
            .into_iter()
            .collect();
        assert_eq!(store.len(), 2);

        let found = store.find_user_by_id("u2").await.unwrap().unwrap();
        assert_eq!(found.username, "hannah");
        assert!(store.find_user_by_id("u3").await.unwrap().is_none());
        assert_eq!(
            store.find_user_by_username("kody").await.unwrap().unwrap().id,
            "u1"
        );
        assert_eq!(store.lookups(), 3);

        // clones share the same records
        let handle = store.clone();
        handle.remove("u1");
        assert!(store.find_user_by_id("u1").await.unwrap().is_none());
    }
}
