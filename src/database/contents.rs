use sqlx::{types::BigDecimal, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// Catalog entry. The order engine only reads these rows, except for the
/// stock decrement applied when a payment for a physical item is verified.
#[derive(Debug, Clone, FromRow)]
pub struct Content {
    pub id: Uuid,
    pub title: String,
    pub content_type: String,
    pub price: BigDecimal,
    pub is_active: bool,
    pub stock_quantity: Option<i32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Content type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Document,
    Video,
    Audio,
    Physical,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Physical => "physical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "document" => Some(Self::Document),
            "video" => Some(Self::Video),
            "audio" => Some(Self::Audio),
            "physical" => Some(Self::Physical),
            _ => None,
        }
    }

    /// Digital content is fulfilled with a purchase grant; physical content
    /// with a stock decrement.
    pub fn is_digital(&self) -> bool {
        !matches!(self, Self::Physical)
    }
}

impl Content {
    pub fn content_type(&self) -> Option<ContentType> {
        ContentType::parse(&self.content_type)
    }
}

/// Outcome of a verified-payment stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// Full ordered quantity was deducted
    Exact,
    /// A competing order drained stock first; counter clamped at zero
    Clamped,
}

/// Read access to the catalog
pub struct ContentRepository {
    pool: PgPool,
}

impl ContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, content_id: Uuid) -> Result<Option<Content>, DatabaseError> {
        sqlx::query_as::<_, Content>(
            "SELECT id, title, content_type, price, is_active, stock_quantity,
                    created_at, updated_at
             FROM contents
             WHERE id = $1",
        )
        .bind(content_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

/// Deduct verified-order stock from a physical content row.
///
/// The decrement is conditional: it only fires when enough stock remains, so
/// two concurrent settlements cannot drive the counter negative. If the exact
/// deduction is no longer possible the counter is clamped to zero and
/// `Clamped` is returned for the caller to flag.
///
/// Runs on the caller's connection so it participates in the settlement
/// transaction.
pub async fn decrement_stock(
    conn: &mut PgConnection,
    content_id: Uuid,
    quantity: i32,
) -> Result<StockDecrement, DatabaseError> {
    let exact = sqlx::query(
        "UPDATE contents
         SET stock_quantity = stock_quantity - $2, updated_at = NOW()
         WHERE id = $1
           AND content_type = 'physical'
           AND stock_quantity >= $2",
    )
    .bind(content_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    if exact.rows_affected() > 0 {
        return Ok(StockDecrement::Exact);
    }

    sqlx::query(
        "UPDATE contents
         SET stock_quantity = 0, updated_at = NOW()
         WHERE id = $1
           AND content_type = 'physical'
           AND stock_quantity IS NOT NULL",
    )
    .bind(content_id)
    .execute(&mut *conn)
    .await
    .map_err(DatabaseError::from_sqlx)?;

    Ok(StockDecrement::Clamped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_round_trips() {
        for raw in ["document", "video", "audio", "physical"] {
            let parsed = ContentType::parse(raw).expect("known content type");
            assert_eq!(parsed.as_str(), raw);
        }
        assert!(ContentType::parse("ebook").is_none());
    }

    #[test]
    fn only_physical_content_is_not_digital() {
        assert!(ContentType::Document.is_digital());
        assert!(ContentType::Video.is_digital());
        assert!(ContentType::Audio.is_digital());
        assert!(!ContentType::Physical.is_digital());
    }
}
