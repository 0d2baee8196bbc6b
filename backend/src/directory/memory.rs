//! In-memory user directory.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{DirectoryError, UserDirectory};
use crate::models::user::User;

/// Both indexes live behind one lock so they can never be observed out of sync.
#[derive(Debug, Default)]
struct Indexes {
    /// id -> user
    users: HashMap<String, User>,
    /// email -> id
    by_email: HashMap<String, String>,
}

/// Default directory backend: process-local, lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    inner: RwLock<Indexes>,
}

impl InMemoryUserDirectory {
    /// Create a new empty directory.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Indexes::default()),
        }
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_id(&self, id: &str) -> Result<User, DirectoryError> {
        self.inner
            .read()
            .await
            .users
            .get(id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<User, DirectoryError> {
        let inner = self.inner.read().await;
        inner
            .by_email
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn create(&self, mut user: User) -> Result<User, DirectoryError> {
        user.email = user.email.filter(|e| !e.is_empty());
        let mut inner = self.inner.write().await;

        if inner.users.contains_key(&user.id) {
            return Err(DirectoryError::IdConflict(user.id));
        }
        if let Some(ref email) = user.email {
            if inner.by_email.contains_key(email) {
                return Err(DirectoryError::EmailConflict(email.clone()));
            }
            inner.by_email.insert(email.clone(), user.id.clone());
        }
        inner.users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn update(&self, mut user: User) -> Result<User, DirectoryError> {
        user.email = user.email.filter(|e| !e.is_empty());
        let mut inner = self.inner.write().await;

        let existing = inner.users.get(&user.id).ok_or(DirectoryError::NotFound)?;
        let old_email = existing.email.clone();
        user.created_at = existing.created_at;
        user.updated_at = Utc::now().max(existing.created_at);

        if old_email != user.email {
            if let Some(ref new_email) = user.email {
                match inner.by_email.get(new_email) {
                    Some(owner) if *owner != user.id => {
                        return Err(DirectoryError::EmailConflict(new_email.clone()));
                    }
                    _ => {}
                }
            }
            // Checks done; from here on the write cannot fail.
            if let Some(ref old) = old_email {
                inner.by_email.remove(old);
            }
            if let Some(ref new_email) = user.email {
                inner.by_email.insert(new_email.clone(), user.id.clone());
            }
        }
        inner.users.insert(user.id.clone(), user.clone());

        Ok(user)
    }

    async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn user(id: &str, email: &str) -> User {
        User::new(id, Some(email.to_string()))
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let directory = InMemoryUserDirectory::new();
        let created = directory.create(user("u1", "a@x.com")).await.unwrap();

        let by_id = directory.find_by_id("u1").await.unwrap();
        let by_email = directory.find_by_email("a@x.com").await.unwrap();
        assert_eq!(by_id, created);
        assert_eq!(by_email, by_id);
    }

    #[tokio::test]
    async fn test_find_missing() {
        let directory = InMemoryUserDirectory::new();
        assert_eq!(directory.find_by_id("nobody").await, Err(DirectoryError::NotFound));
        assert_eq!(
            directory.find_by_email("nobody@x.com").await,
            Err(DirectoryError::NotFound)
        );
    }

    #[tokio::test]
    async fn test_create_duplicate_id() {
        let directory = InMemoryUserDirectory::new();
        directory.create(user("u1", "a@x.com")).await.unwrap();

        let err = directory.create(user("u1", "b@x.com")).await.unwrap_err();
        assert_eq!(err, DirectoryError::IdConflict("u1".to_string()));
        // The second email must not have leaked into the index
        assert_eq!(directory.find_by_email("b@x.com").await, Err(DirectoryError::NotFound));
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_duplicate_email_leaves_state_unchanged() {
        let directory = InMemoryUserDirectory::new();
        let u1 = directory.create(user("u1", "a@x.com")).await.unwrap();

        let err = directory.create(user("u2", "a@x.com")).await.unwrap_err();
        assert_eq!(err, DirectoryError::EmailConflict("a@x.com".to_string()));
        assert_eq!(directory.find_by_id("u2").await, Err(DirectoryError::NotFound));
        assert_eq!(directory.find_by_email("a@x.com").await.unwrap(), u1);
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_users_without_email_do_not_collide() {
        let directory = InMemoryUserDirectory::new();
        directory.create(User::new("u1", None)).await.unwrap();
        directory.create(User::new("u2", None)).await.unwrap();

        assert_eq!(directory.len().await, 2);
        assert_eq!(directory.find_by_email("").await, Err(DirectoryError::NotFound));
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let directory = InMemoryUserDirectory::new();
        let err = directory.update(user("ghost", "g@x.com")).await.unwrap_err();
        assert_eq!(err, DirectoryError::NotFound);
        assert_eq!(directory.len().await, 0);
    }

    #[tokio::test]
    async fn test_update_repoints_email_index() {
        let directory = InMemoryUserDirectory::new();
        let created = directory.create(user("u1", "old@x.com")).await.unwrap();

        let mut changed = created.clone();
        changed.email = Some("new@x.com".to_string());
        let updated = directory.update(changed).await.unwrap();

        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= updated.created_at);
        assert_eq!(directory.find_by_email("old@x.com").await, Err(DirectoryError::NotFound));
        assert_eq!(directory.find_by_email("new@x.com").await.unwrap(), updated);
        assert_eq!(directory.find_by_id("u1").await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_keeps_stored_created_at() {
        let directory = InMemoryUserDirectory::new();
        let created = directory.create(user("u1", "a@x.com")).await.unwrap();

        let mut tampered = created.clone();
        tampered.created_at = created.created_at + chrono::Duration::days(30);
        let updated = directory.update(tampered).await.unwrap();

        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_update_to_taken_email_changes_nothing() {
        let directory = InMemoryUserDirectory::new();
        let u1 = directory.create(user("u1", "a@x.com")).await.unwrap();
        let u2 = directory.create(user("u2", "b@x.com")).await.unwrap();

        let mut steal = u2.clone();
        steal.email = Some("a@x.com".to_string());
        let err = directory.update(steal).await.unwrap_err();

        assert_eq!(err, DirectoryError::EmailConflict("a@x.com".to_string()));
        assert_eq!(directory.find_by_id("u1").await.unwrap(), u1);
        assert_eq!(directory.find_by_id("u2").await.unwrap(), u2);
        assert_eq!(directory.find_by_email("a@x.com").await.unwrap().id, "u1");
        assert_eq!(directory.find_by_email("b@x.com").await.unwrap().id, "u2");
    }

    #[tokio::test]
    async fn test_update_clearing_email_drops_index_entry() {
        let directory = InMemoryUserDirectory::new();
        let created = directory.create(user("u1", "a@x.com")).await.unwrap();

        let mut cleared = created;
        cleared.email = None;
        directory.update(cleared).await.unwrap();

        assert_eq!(directory.find_by_email("a@x.com").await, Err(DirectoryError::NotFound));
        // The freed email can be claimed by someone else
        directory.create(user("u2", "a@x.com")).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_same_id_single_winner() {
        let directory = Arc::new(InMemoryUserDirectory::new());

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let directory = directory.clone();
                tokio::spawn(async move { directory.create(user("u1", "a@x.com")).await })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(e.is_conflict()),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_same_email_single_winner() {
        let directory = Arc::new(InMemoryUserDirectory::new());

        let handles: Vec<_> = (0..32)
            .map(|i| {
                let directory = directory.clone();
                tokio::spawn(async move { directory.create(user(&format!("u{}", i), "a@x.com")).await })
            })
            .collect();

        let mut winner = None;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(created) => {
                    assert!(winner.is_none(), "two users claimed the same email");
                    winner = Some(created);
                }
                Err(e) => assert_eq!(e, DirectoryError::EmailConflict("a@x.com".to_string())),
            }
        }

        let winner = winner.unwrap();
        assert_eq!(directory.len().await, 1);
        assert_eq!(directory.find_by_email("a@x.com").await.unwrap(), winner);
    }

    #[tokio::test]
    async fn test_empty_email_is_never_indexed() {
        let directory = InMemoryUserDirectory::new();
        let blank = |id: &str| User {
            email: Some(String::new()),
            ..User::new(id, None)
        };

        let u1 = directory.create(blank("u1")).await.unwrap();
        directory.create(blank("u2")).await.unwrap();
        assert!(u1.email.is_none());
        assert_eq!(directory.find_by_email("").await, Err(DirectoryError::NotFound));

        let mut with_email = directory.create(user("u3", "a@x.com")).await.unwrap();
        with_email.email = Some(String::new());
        let updated = directory.update(with_email).await.unwrap();

        assert!(updated.email.is_none());
        assert_eq!(directory.find_by_email("a@x.com").await, Err(DirectoryError::NotFound));
        assert_eq!(directory.find_by_email("").await, Err(DirectoryError::NotFound));
        assert_eq!(directory.len().await, 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_see_half_applied_update() {
        let directory = Arc::new(InMemoryUserDirectory::new());
        directory.create(user("u1", "e0@x.com")).await.unwrap();

        let writer = {
            let directory = directory.clone();
            tokio::spawn(async move {
                for i in 1..200 {
                    let mut next = directory.find_by_id("u1").await.unwrap();
                    next.email = Some(format!("e{}@x.com", i));
                    directory.update(next).await.unwrap();
                }
            })
        };

        let reader = {
            let directory = directory.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let current = directory.find_by_id("u1").await.unwrap();
                    let email = current.email.clone().unwrap();
                    // The record may have moved on since, but whatever the email
                    // index holds must agree with the primary record.
                    if let Ok(indexed) = directory.find_by_email(&email).await {
                        assert_eq!(indexed.email.as_deref(), Some(email.as_str()));
                    }
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(directory.len().await, 1);
    }
}
