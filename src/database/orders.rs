//! Order ledger: the Order/OrderItem data model and its invariants.
//!
//! `total_amount` is computed once at creation from the per-line price
//! snapshots and never recomputed; later catalog price changes do not touch
//! existing orders. Status transitions are one-directional and settlement is
//! applied in a single transaction guarded by a row lock on the order.

use sqlx::{types::BigDecimal, FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::database::contents::{decrement_stock, StockDecrement};
use crate::database::error::DatabaseError;
use crate::database::purchases::grant_if_absent;

/// Order lifecycle states
///
/// `Processing` is never assigned by this service; it exists for rows
/// written by admin tooling and earlier schema versions, and such orders
/// read as not payable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "refunded" => Some(Self::Refunded),
            _ => None,
        }
    }

    /// Transitions are one-directional; no state is ever re-entered.
    /// Refunds depart only from a completed order.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Cancelled)
                | (Self::Completed, Self::Refunded)
        )
    }

    /// Only pending orders accept a payment attempt.
    pub fn is_payable(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// One checkout attempt
#[derive(Debug, Clone, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: String,
    pub total_amount: BigDecimal,
    pub payment_reference: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Order {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::parse(&self.status)
    }
}

/// Line item; immutable after creation, owned exclusively by its order
#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub content_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
}

/// Validated, priced input line for order creation
#[derive(Debug, Clone)]
pub struct PricedLine {
    pub content_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
}

/// Line item joined with its catalog row's type, for fulfillment planning
#[derive(Debug, Clone, FromRow)]
pub struct FulfillmentRow {
    pub content_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
    pub content_type: String,
}

/// Digital grant to write during settlement
#[derive(Debug, Clone)]
pub struct GrantLine {
    pub content_id: Uuid,
    pub amount: BigDecimal,
    pub quantity: i32,
}

/// Physical stock deduction to apply during settlement
#[derive(Debug, Clone)]
pub struct StockLine {
    pub content_id: Uuid,
    pub quantity: i32,
}

/// Result of applying settlement to an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// Fulfillment applied in this call
    Completed {
        grants_created: u32,
        stock_clamped: u32,
    },
    /// A concurrent delivery of the same reference won the race; nothing
    /// was re-applied
    AlreadyCompleted,
    /// Order left the pending state some other way (e.g. cancelled)
    NotPayable,
}

/// Owns order rows, their items and the settlement write path
pub struct OrderLedger {
    pool: PgPool,
}

impl OrderLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist an order and its items as one atomic unit, status pending.
    /// The frozen total is the sum of the line snapshots.
    pub async fn create(
        &self,
        user_id: Uuid,
        lines: &[PricedLine],
        shipping_address: Option<&str>,
        notes: Option<&str>,
    ) -> Result<(Order, Vec<OrderItem>), DatabaseError> {
        let total = lines.iter().fold(BigDecimal::from(0), |acc, line| {
            acc + &line.price_at_purchase * BigDecimal::from(line.quantity)
        });

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let order = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (id, user_id, status, total_amount, shipping_address, notes)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, user_id, status, total_amount, payment_reference, payment_method,
                       shipping_address, notes, created_at, updated_at, completed_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(OrderStatus::Pending.as_str())
        .bind(&total)
        .bind(shipping_address)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = sqlx::query_as::<_, OrderItem>(
                "INSERT INTO order_items (id, order_id, content_id, quantity, price_at_purchase)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING id, order_id, content_id, quantity, price_at_purchase",
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.content_id)
            .bind(line.quantity)
            .bind(&line.price_at_purchase)
            .fetch_one(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;
            items.push(item);
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok((order, items))
    }

    /// Fetch an order scoped to its owner. Someone else's order id behaves
    /// exactly like a missing one.
    pub async fn find_for_user(
        &self,
        order_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_amount, payment_reference, payment_method,
                    shipping_address, notes, created_at, updated_at, completed_at
             FROM orders
             WHERE id = $1 AND user_id = $2",
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_amount, payment_reference, payment_method,
                    shipping_address, notes, created_at, updated_at, completed_at
             FROM orders
             WHERE user_id = $1
             ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn items(&self, order_id: Uuid) -> Result<Vec<OrderItem>, DatabaseError> {
        sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, content_id, quantity, price_at_purchase
             FROM order_items
             WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Line items joined with their catalog type, for fulfillment planning
    pub async fn items_with_content(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<FulfillmentRow>, DatabaseError> {
        sqlx::query_as::<_, FulfillmentRow>(
            "SELECT oi.content_id, oi.quantity, oi.price_at_purchase, c.content_type
             FROM order_items oi
             JOIN contents c ON c.id = oi.content_id
             WHERE oi.order_id = $1",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_amount, payment_reference, payment_method,
                    shipping_address, notes, created_at, updated_at, completed_at
             FROM orders
             WHERE payment_reference = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_reference_for_user(
        &self,
        reference: &str,
        user_id: Uuid,
    ) -> Result<Option<Order>, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "SELECT id, user_id, status, total_amount, payment_reference, payment_method,
                    shipping_address, notes, created_at, updated_at, completed_at
             FROM orders
             WHERE payment_reference = $1 AND user_id = $2",
        )
        .bind(reference)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Store the reference for the current payment attempt, discarding any
    /// prior one. Verification only ever checks the stored reference, so an
    /// abandoned gateway session from an earlier attempt becomes orphaned by
    /// design.
    pub async fn store_payment_reference(
        &self,
        order_id: Uuid,
        reference: &str,
    ) -> Result<Order, DatabaseError> {
        sqlx::query_as::<_, Order>(
            "UPDATE orders
             SET payment_reference = $2, updated_at = NOW()
             WHERE id = $1
             RETURNING id, user_id, status, total_amount, payment_reference, payment_method,
                       shipping_address, notes, created_at, updated_at, completed_at",
        )
        .bind(order_id)
        .bind(reference)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Apply a verified payment: complete the order and land every
    /// fulfillment effect, atomically.
    ///
    /// The order row is locked and its status re-checked inside the
    /// transaction, so a double delivery of the same reference (client
    /// redirect plus webhook) applies fulfillment exactly once.
    pub async fn settle_success(
        &self,
        order: &Order,
        channel: Option<&str>,
        grants: &[GrantLine],
        stock: &[StockLine],
    ) -> Result<SettlementOutcome, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let current: String =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(order.id)
                .fetch_one(&mut *tx)
                .await
                .map_err(DatabaseError::from_sqlx)?;

        match OrderStatus::parse(&current) {
            Some(OrderStatus::Completed) => return Ok(SettlementOutcome::AlreadyCompleted),
            Some(status) if status.is_payable() => {}
            _ => return Ok(SettlementOutcome::NotPayable),
        }

        sqlx::query(
            "UPDATE orders
             SET status = $2, payment_method = $3, completed_at = NOW(), updated_at = NOW()
             WHERE id = $1",
        )
        .bind(order.id)
        .bind(OrderStatus::Completed.as_str())
        .bind(channel)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let mut grants_created = 0;
        for grant in grants {
            let created = grant_if_absent(
                &mut *tx,
                order.user_id,
                grant.content_id,
                order.id,
                &grant.amount,
                grant.quantity,
            )
            .await?;
            if created {
                grants_created += 1;
            }
        }

        let mut stock_clamped = 0;
        for line in stock {
            let outcome = decrement_stock(&mut *tx, line.content_id, line.quantity).await?;
            if outcome == StockDecrement::Clamped {
                warn!(
                    order_id = %order.id,
                    content_id = %line.content_id,
                    quantity = line.quantity,
                    "stock exhausted by a competing order; counter clamped at zero"
                );
                stock_clamped += 1;
            }
        }

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        Ok(SettlementOutcome::Completed {
            grants_created,
            stock_clamped,
        })
    }

    /// Record a gateway-reported payment failure
    pub async fn cancel(&self, order_id: Uuid) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE orders
             SET status = $2, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(order_id)
        .bind(OrderStatus::Cancelled.as_str())
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for raw in ["pending", "processing", "completed", "cancelled", "refunded"] {
            let parsed = OrderStatus::parse(raw).expect("known status");
            assert_eq!(parsed.as_str(), raw);
        }
        assert!(OrderStatus::parse("shipped").is_none());
    }

    #[test]
    fn only_pending_orders_are_payable() {
        assert!(OrderStatus::Pending.is_payable());
        for status in [
            OrderStatus::Processing,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
        ] {
            assert!(!status.is_payable(), "{:?} must not be payable", status);
        }
    }

    #[test]
    fn transitions_are_one_directional() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Completed));
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Completed.can_transition_to(OrderStatus::Refunded));

        // no state is ever re-entered
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Refunded.can_transition_to(OrderStatus::Completed));
    }
}
