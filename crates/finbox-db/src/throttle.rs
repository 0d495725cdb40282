//! Per-user analysis throttle store.
//!
//! One row per user holding a cooldown expiry. The upsert uses
//! `GREATEST` so the expiry only ever moves forward within a run.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use finbox_core::{Result, ThrottleStore};

/// PostgreSQL implementation of [`ThrottleStore`].
#[derive(Clone)]
pub struct PgThrottleStore {
    pool: PgPool,
}

impl PgThrottleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ThrottleStore for PgThrottleStore {
    async fn expiry(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query("SELECT expires_at FROM analysis_throttle WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(match row {
            Some(row) => Some(row.try_get("expires_at")?),
            None => None,
        })
    }

    async fn advance(&self, user_id: Uuid, window_days: i64) -> Result<DateTime<Utc>> {
        let target = Utc::now() + Duration::days(window_days);
        let row = sqlx::query(
            r#"
            INSERT INTO analysis_throttle (user_id, expires_at)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET expires_at = GREATEST(analysis_throttle.expires_at, EXCLUDED.expires_at)
            RETURNING expires_at
            "#,
        )
        .bind(user_id)
        .bind(target)
        .fetch_one(&self.pool)
        .await?;

        let expires_at: DateTime<Utc> = row.try_get("expires_at")?;
        debug!(%user_id, %expires_at, "throttle advanced");
        Ok(expires_at)
    }
}
