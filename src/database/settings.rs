use sqlx::{FromRow, PgPool};

use crate::database::error::DatabaseError;

/// Admin-managed gateway credential settings. A singleton row owned by the
/// settings collaborator; the order engine only ever reads it.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentSettings {
    pub id: i32,
    pub active_mode: String,
    pub test_public_key: Option<String>,
    pub test_secret_key: Option<String>,
    pub live_public_key: Option<String>,
    pub live_secret_key: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetch the settings row, if the settings collaborator has created one.
    /// Read fresh on every payment initialization so key rotation takes
    /// effect without a restart.
    pub async fn get(&self) -> Result<Option<PaymentSettings>, DatabaseError> {
        sqlx::query_as::<_, PaymentSettings>(
            "SELECT id, active_mode, test_public_key, test_secret_key,
                    live_public_key, live_secret_key, updated_at
             FROM payment_settings
             ORDER BY id
             LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
