//! Fulfillment planning.
//!
//! Maps a verified order's line items onto the effects settlement must
//! apply: digital content (document, video, audio) yields a purchase grant,
//! physical content yields a stock decrement. Planning is pure; the ledger
//! applies the plan transactionally.

use crate::database::contents::ContentType;
use crate::database::orders::{FulfillmentRow, GrantLine, StockLine};

#[derive(Debug, Clone, Default)]
pub struct FulfillmentPlan {
    pub grants: Vec<GrantLine>,
    pub stock: Vec<StockLine>,
}

impl FulfillmentPlan {
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.stock.is_empty()
    }
}

/// Build the fulfillment plan for an order's items. Lines whose content type
/// is unrecognized are skipped rather than guessed at; the catalog
/// collaborator owns that enum.
pub fn plan(rows: &[FulfillmentRow]) -> FulfillmentPlan {
    let mut plan = FulfillmentPlan::default();

    for row in rows {
        match ContentType::parse(&row.content_type) {
            Some(kind) if kind.is_digital() => plan.grants.push(GrantLine {
                content_id: row.content_id,
                amount: row.price_at_purchase.clone(),
                quantity: row.quantity,
            }),
            Some(_) => plan.stock.push(StockLine {
                content_id: row.content_id,
                quantity: row.quantity,
            }),
            None => {
                tracing::warn!(
                    content_id = %row.content_id,
                    content_type = %row.content_type,
                    "unrecognized content type; line skipped during fulfillment"
                );
            }
        }
    }

    plan
}
