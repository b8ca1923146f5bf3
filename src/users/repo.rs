use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::{FromRow, PgPool};
use thiserror::Error;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password: String, // Argon2 PHC string, never exposed
    pub age: i32,
    pub height: i32,
    pub userweight: i32,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub age: i32,
    pub height: i32,
    pub userweight: i32,
}

/// Partial stat update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsPatch {
    pub age: Option<i32>,
    pub height: Option<i32>,
    pub userweight: Option<i32>,
}

impl StatsPatch {
    pub fn is_empty(&self) -> bool {
        self.age.is_none() && self.height.is_none() && self.userweight.is_none()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store call timed out")]
    Timeout,
    #[error("unique constraint violated")]
    UniqueViolation,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError>;
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;
    /// Applies `patch` to the row matching both `id` and `username`.
    async fn update_stats(
        &self,
        id: i32,
        username: &str,
        patch: StatsPatch,
    ) -> Result<Option<User>, StoreError>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
    timeout: Duration,
}

impl PgUserStore {
    pub fn new(db: PgPool, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Err(_) => Err(StoreError::Timeout),
            Ok(Err(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                Err(StoreError::UniqueViolation)
            }
            Ok(res) => res.map_err(StoreError::from),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, password, age, height, userweight
                FROM users
                WHERE username = $1
                "#,
            )
            .bind(username)
            .fetch_optional(&self.db),
        )
        .await
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>(
                r#"
                SELECT id, username, password, age, height, userweight
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(id)
            .fetch_optional(&self.db),
        )
        .await
    }

    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>(
                r#"
                INSERT INTO users (username, password, age, height, userweight)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, username, password, age, height, userweight
                "#,
            )
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.age)
            .bind(user.height)
            .bind(user.userweight)
            .fetch_one(&self.db),
        )
        .await
    }

    async fn update_stats(
        &self,
        id: i32,
        username: &str,
        patch: StatsPatch,
    ) -> Result<Option<User>, StoreError> {
        self.bounded(
            sqlx::query_as::<_, User>(
                r#"
                UPDATE users
                   SET age = COALESCE($3, age),
                       height = COALESCE($4, height),
                       userweight = COALESCE($5, userweight)
                 WHERE id = $1 AND username = $2
                RETURNING id, username, password, age, height, userweight
                "#,
            )
            .bind(id)
            .bind(username)
            .bind(patch.age)
            .bind(patch.height)
            .bind(patch.userweight)
            .fetch_optional(&self.db),
        )
        .await
    }
}


#[cfg(test)]
pub(crate) mod memory {
    use std::sync::Mutex;

    use super::*;

    /// In-process store for handler tests.
    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<Vec<User>>,
        pub unavailable: bool,
    }

    impl MemoryUserStore {
        pub fn unavailable() -> Self {
            Self {
                unavailable: true,
                ..Self::default()
            }
        }

        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.unavailable {
                Err(StoreError::Timeout)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
            self.check()?;
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.username == username).cloned())
        }

        async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
            self.check()?;
            let users = self.users.lock().unwrap();
            Ok(users.iter().find(|u| u.id == id).cloned())
        }

        async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
            self.check()?;
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.username == user.username) {
                return Err(StoreError::UniqueViolation);
            }
            let row = User {
                id: users.len() as i32 + 1,
                username: user.username,
                password: user.password_hash,
                age: user.age,
                height: user.height,
                userweight: user.userweight,
            };
            users.push(row.clone());
            Ok(row)
        }

        async fn update_stats(
            &self,
            id: i32,
            username: &str,
            patch: StatsPatch,
        ) -> Result<Option<User>, StoreError> {
            self.check()?;
            let mut users = self.users.lock().unwrap();
            let Some(user) = users
                .iter_mut()
                .find(|u| u.id == id && u.username == username)
            else {
                return Ok(None);
            };
            if let Some(age) = patch.age {
                user.age = age;
            }
            if let Some(height) = patch.height {
                user.height = height;
            }
            if let Some(userweight) = patch.userweight {
                user.userweight = userweight;
            }
            Ok(Some(user.clone()))
        }
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_username() {
        let store = MemoryUserStore::default();
        let new = NewUser {
            username: "dunder".into(),
            password_hash: "hash".into(),
            age: 30,
            height: 180,
            userweight: 80,
        };
        store.insert(new.clone()).await.unwrap();
        assert!(matches!(
            store.insert(new).await,
            Err(StoreError::UniqueViolation)
        ));
        assert_eq!(store.len(), 1);
    }
}
