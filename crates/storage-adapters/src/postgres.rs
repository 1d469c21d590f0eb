//! # Postgres credential store
//!
//! `credentials(username PRIMARY KEY, password)`. The conditional insert is
//! `ON CONFLICT DO NOTHING`, so concurrent signups for one username leave a
//! single row.

use std::time::Duration;

use async_trait::async_trait;
use domains::{Credential, CredentialStore, StoreError};
use sqlx::postgres::{PgPool, PgPoolOptions};

pub struct PgCredentialStore {
    pool: PgPool,
}

fn db_error(err: sqlx::Error) -> StoreError {
    StoreError::unavailable(format!("postgres: {err}"))
}

impl PgCredentialStore {
    /// Builds the pool without connecting; the first query opens a connection.
    pub fn connect_lazy(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
            .map_err(db_error)?;
        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                username   TEXT PRIMARY KEY,
                password   TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT username, password FROM credentials WHERE username = $1")
                .bind(username)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error)?;
        Ok(row.map(|(username, password)| Credential { username, password }))
    }

    async fn insert_if_absent(&self, credential: &Credential) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO credentials (username, password) VALUES ($1, $2) \
             ON CONFLICT (username) DO NOTHING",
        )
        .bind(&credential.username)
        .bind(&credential.password)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires running Postgres (DATABASE_URL)
    async fn insert_then_find_roundtrip() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let store = PgCredentialStore::connect_lazy(&url, 2, Duration::from_secs(5)).unwrap();
        store.ensure_schema().await.unwrap();

        let username = format!("user-{}", uuid_like());
        let cred = Credential::new(username.clone(), "pw");
        assert!(store.insert_if_absent(&cred).await.unwrap());
        assert!(!store.insert_if_absent(&cred).await.unwrap());
        assert_eq!(store.find(&username).await.unwrap(), Some(cred));
    }

    fn uuid_like() -> u128 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    }
}
