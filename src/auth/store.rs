use std::sync::Mutex;

use anyhow::{anyhow, bail, Context};
use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub reset_code: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Persistence contract for user credentials and reset codes.
///
/// Every mutation is a single statement; callers that need
/// read-then-write semantics (duplicate checks, OTP verification)
/// compose these and tolerate last-writer-wins interleavings.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User>;
    async fn list_all(&self) -> anyhow::Result<Vec<User>>;
    async fn update_password(&self, id: i64, new_hash: &str) -> anyhow::Result<()>;
    async fn set_reset_code(&self, email: &str, code: &str) -> anyhow::Result<()>;
    async fn find_by_reset_code(&self, code: &str) -> anyhow::Result<Option<User>>;
    /// Returns false when the code was already consumed or replaced.
    async fn clear_reset_code(&self, code: &str) -> anyhow::Result<bool>;
    /// Returns false when no row matches the email.
    async fn reset_password_by_email(&self, email: &str, new_hash: &str) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, reset_code, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("find user by email")?;
        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, reset_code, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (first_name, last_name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING id, first_name, last_name, email, password_hash, reset_code, created_at
            "#,
        )
        .bind(first_name)
        .bind(last_name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .context("create user")?;
        Ok(user)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, reset_code, created_at
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("list users")?;
        Ok(users)
    }

    async fn update_password(&self, id: i64, new_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(new_hash)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("update password")?;
        Ok(())
    }

    async fn set_reset_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET reset_code = $1 WHERE email = $2")
            .bind(code)
            .bind(email)
            .execute(&self.pool)
            .await
            .context("set reset code")?;
        Ok(())
    }

    async fn find_by_reset_code(&self, code: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, first_name, last_name, email, password_hash, reset_code, created_at
            FROM users
            WHERE reset_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .context("find user by reset code")?;
        Ok(user)
    }

    async fn clear_reset_code(&self, code: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE users SET reset_code = NULL WHERE reset_code = $1")
            .bind(code)
            .execute(&self.pool)
            .await
            .context("clear reset code")?;
        Ok(result.rows_affected() > 0)
    }

    async fn reset_password_by_email(&self, email: &str, new_hash: &str) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, reset_code = NULL WHERE email = $2",
        )
        .bind(new_hash)
        .bind(email)
        .execute(&self.pool)
        .await
        .context("reset password by email")?;
        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store used by `AppState::fake()` and the unit tests.
#[derive(Default)]
pub struct MemoryUserStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    users: Vec<User>,
}

impl MemoryUserStore {
    fn lock(&self) -> anyhow::Result<std::sync::MutexGuard<'_, MemoryInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("user store mutex poisoned"))
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let inner = self.lock()?;
        Ok(inner.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        password_hash: &str,
    ) -> anyhow::Result<User> {
        let mut inner = self.lock()?;
        if inner.users.iter().any(|u| u.email == email) {
            // mirrors the unique constraint on users.email
            bail!("duplicate email");
        }
        inner.next_id += 1;
        let user = User {
            id: inner.next_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            reset_code: None,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let inner = self.lock()?;
        Ok(inner.users.clone())
    }

    async fn update_password(&self, id: i64, new_hash: &str) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        if let Some(user) = inner.users.iter_mut().find(|u| u.id == id) {
            user.password_hash = new_hash.to_string();
        }
        Ok(())
    }

    async fn set_reset_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        let mut inner = self.lock()?;
        if let Some(user) = inner.users.iter_mut().find(|u| u.email == email) {
            user.reset_code = Some(code.to_string());
        }
        Ok(())
    }

    async fn find_by_reset_code(&self, code: &str) -> anyhow::Result<Option<User>> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .iter()
            .find(|u| u.reset_code.as_deref() == Some(code))
            .cloned())
    }

    async fn clear_reset_code(&self, code: &str) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        if let Some(user) = inner
            .users
            .iter_mut()
            .find(|u| u.reset_code.as_deref() == Some(code))
        {
            user.reset_code = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn reset_password_by_email(&self, email: &str, new_hash: &str) -> anyhow::Result<bool> {
        let mut inner = self.lock()?;
        if let Some(user) = inner.users.iter_mut().find(|u| u.email == email) {
            user.password_hash = new_hash.to_string();
            user.reset_code = None;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_assigns_ids_and_enforces_unique_email() {
        let store = MemoryUserStore::default();
        let a = store
            .create("John", "Doe", "john@example.com", "hash-a")
            .await
            .unwrap();
        let b = store
            .create("Jane", "Doe", "jane@example.com", "hash-b")
            .await
            .unwrap();
        assert_eq!(a.id, 1);
        assert_eq!(b.id, 2);
        assert!(store
            .create("Johnny", "Doe", "john@example.com", "hash-c")
            .await
            .is_err());
        assert_eq!(store.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reset_code_lifecycle() {
        let store = MemoryUserStore::default();
        store
            .create("John", "Doe", "john@example.com", "hash")
            .await
            .unwrap();

        store
            .set_reset_code("john@example.com", "123456")
            .await
            .unwrap();
        let found = store.find_by_reset_code("123456").await.unwrap();
        assert_eq!(found.unwrap().email, "john@example.com");

        assert!(store.clear_reset_code("123456").await.unwrap());
        assert!(!store.clear_reset_code("123456").await.unwrap());
        assert!(store.find_by_reset_code("123456").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_password_by_email_reports_missing_rows() {
        let store = MemoryUserStore::default();
        store
            .create("John", "Doe", "john@example.com", "hash")
            .await
            .unwrap();
        assert!(store
            .reset_password_by_email("john@example.com", "new-hash")
            .await
            .unwrap());
        assert!(!store
            .reset_password_by_email("ghost@example.com", "new-hash")
            .await
            .unwrap());
    }
}
