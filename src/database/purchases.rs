use sqlx::{types::BigDecimal, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Fulfillment grant for digital content. Created only by payment
/// settlement; `order_id` is nullable to accommodate legacy manual grants.
#[derive(Debug, Clone, FromRow)]
pub struct Purchase {
    pub id: Uuid,
    pub user_id: Uuid,
    pub content_id: Uuid,
    pub order_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub quantity: i32,
    pub purchase_date: chrono::DateTime<chrono::Utc>,
    pub access_count: i32,
    pub last_accessed: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lookup access to purchase grants
pub struct PurchaseRepository {
    pool: PgPool,
}

impl PurchaseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_for_user(&self, user_id: Uuid) -> Result<Vec<Purchase>, DatabaseError> {
        sqlx::query_as::<_, Purchase>(
            "SELECT id, user_id, content_id, order_id, amount, quantity,
                    purchase_date, access_count, last_accessed
             FROM purchases
             WHERE user_id = $1
             ORDER BY purchase_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_for_order(&self, order_id: Uuid) -> Result<Vec<Purchase>, DatabaseError> {
        sqlx::query_as::<_, Purchase>(
            "SELECT id, user_id, content_id, order_id, amount, quantity,
                    purchase_date, access_count, last_accessed
             FROM purchases
             WHERE order_id = $1
             ORDER BY purchase_date DESC",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

/// Insert a grant unless the user already holds one for this content.
///
/// The guard is (user, content) scoped, not (user, content, order): re-buying
/// the same digital item in a later order leaves the existing grant in place.
/// Returns whether a new row was written.
///
/// Runs on the caller's connection so it participates in the settlement
/// transaction.
pub async fn grant_if_absent(
    conn: &mut PgConnection,
    user_id: Uuid,
    content_id: Uuid,
    order_id: Uuid,
    amount: &BigDecimal,
    quantity: i32,
) -> Result<bool, DatabaseError> {
    let result = sqlx::query(
        "INSERT INTO purchases (id, user_id, content_id, order_id, amount, quantity)
         SELECT $1, $2, $3, $4, $5, $6
         WHERE NOT EXISTS (
             SELECT 1 FROM purchases WHERE user_id = $2 AND content_id = $3
         )",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(content_id)
    .bind(order_id)
    .bind(amount)
    .bind(quantity)
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    Ok(result.rows_affected() > 0)
}
