//! Refresh token storage.
//!
//! Only refresh tokens are persisted; access tokens are stateless and
//! verified purely by signature and expiry. The table is keyed by identity,
//! so the schema itself enforces at most one active refresh token per
//! identity. Timestamps are Unix seconds, matching the token claims.

use sqlx::sqlite::SqlitePool;

/// The single active refresh-token record for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    /// Owning identity (primary key)
    pub identity: String,
    /// The raw refresh token string currently registered for the identity
    pub token: String,
    /// Issued at (Unix seconds)
    pub issued_at: i64,
    /// Expiration (Unix seconds)
    pub expires_at: i64,
}

/// Store for the identity -> refresh token mapping.
pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Look up the current record for an identity. Absent means no active
    /// session.
    pub async fn find(&self, identity: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        let row: Option<(String, String, i64, i64)> = sqlx::query_as(
            "SELECT identity, token, issued_at, expires_at FROM refresh_tokens WHERE identity = ?",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(identity, token, issued_at, expires_at)| RefreshTokenRecord {
            identity,
            token,
            issued_at,
            expires_at,
        }))
    }

    /// Register `token` as the identity's refresh token, replacing any
    /// previous record in place.
    ///
    /// This is the single mutation path. The upsert is one statement, so
    /// racing rotations for the same identity serialize inside SQLite and
    /// the last write wins; the loser's token simply stops matching.
    pub async fn rotate(
        &self,
        identity: &str,
        token: &str,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refresh_tokens (identity, token, issued_at, expires_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(identity) DO UPDATE SET
                 token = excluded.token,
                 issued_at = excluded.issued_at,
                 expires_at = excluded.expires_at",
        )
        .bind(identity)
        .bind(token)
        .bind(issued_at as i64)
        .bind(expires_at as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete the identity's record (logout). Returns whether a record
    /// existed.
    pub async fn delete(&self, identity: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE identity = ?")
            .bind(identity)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all records whose expiry is behind `now`. Hygiene only;
    /// expiry is enforced by the signed claims, not by this sweep.
    pub async fn delete_expired(&self, now: u64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?")
            .bind(now as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
