//! Order service: the state machine driving checkout.
//!
//! create (price + persist pending) → initialize (mint reference, open the
//! gateway session) → verify (confirm with the gateway, apply fulfillment).
//! Gateway calls always happen outside any database transaction so a slow
//! gateway cannot starve the connection pool.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::GatewayConfig;
use crate::database::contents::{Content, ContentRepository, ContentType};
use crate::database::orders::{Order, OrderItem, OrderLedger, PricedLine, SettlementOutcome};
use crate::database::settings::SettingsRepository;
use crate::error::{AppError, DomainError, ValidationError};
use crate::gateway::client::{InitializedTransaction, PaystackClient};
use crate::services::credentials::{resolve_secret, GatewayCredentials, GatewayMode};
use crate::services::fulfillment;

/// Prefix for payment references minted by this service
const REFERENCE_PREFIX: &str = "ORD";

/// One requested line of a new order
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub content_id: Uuid,
    pub quantity: i64,
}

/// Input to order creation
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub items: Vec<NewOrderItem>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

/// Outcome of a verification call, for response shaping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifySummary {
    /// Fulfillment applied by this call
    Verified,
    /// The order was already completed; nothing re-applied
    AlreadyVerified,
}

pub struct OrderService {
    ledger: OrderLedger,
    contents: ContentRepository,
    settings: SettingsRepository,
    gateway: Arc<PaystackClient>,
    config: GatewayConfig,
}

impl OrderService {
    pub fn new(pool: PgPool, gateway: Arc<PaystackClient>, config: GatewayConfig) -> Self {
        Self {
            ledger: OrderLedger::new(pool.clone()),
            contents: ContentRepository::new(pool.clone()),
            settings: SettingsRepository::new(pool),
            gateway,
            config,
        }
    }

    /// Validate and price the requested items, then persist the pending
    /// order with its line snapshots as one atomic write.
    ///
    /// Stock is validated here but not reserved; it is only decremented once
    /// payment is verified (optimistic availability).
    pub async fn create_order(
        &self,
        user_id: Uuid,
        request: NewOrder,
    ) -> Result<(Order, Vec<OrderItem>), AppError> {
        let mut lines = Vec::with_capacity(request.items.len());

        for item in &request.items {
            // A zero quantity fails before the catalog lookup; a negative
            // one only after the content is known to exist, so a negative
            // quantity against a missing item reads as not-found.
            if item.quantity == 0 {
                return Err(AppError::validation(ValidationError::InvalidQuantity {
                    quantity: item.quantity,
                }));
            }

            let content = self
                .contents
                .find_by_id(item.content_id)
                .await?
                .ok_or_else(|| {
                    AppError::domain(DomainError::ContentNotFound {
                        content_id: item.content_id.to_string(),
                    })
                })?;

            if item.quantity < 0 {
                return Err(AppError::validation(ValidationError::InvalidQuantity {
                    quantity: item.quantity,
                }));
            }

            let quantity = i32::try_from(item.quantity).map_err(|_| {
                AppError::validation(ValidationError::InvalidQuantity {
                    quantity: item.quantity,
                })
            })?;

            lines.push(price_line(&content, quantity)?);
        }

        let (order, items) = self
            .ledger
            .create(
                user_id,
                &lines,
                request.shipping_address.as_deref(),
                request.notes.as_deref(),
            )
            .await?;

        info!(
            order_id = %order.id,
            user_id = %user_id,
            total_amount = %order.total_amount,
            items = items.len(),
            "order created"
        );

        Ok((order, items))
    }

    pub async fn get_order(
        &self,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(Order, Vec<OrderItem>), AppError> {
        let order = self
            .ledger
            .find_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| AppError::domain(DomainError::OrderNotFound))?;
        let items = self.ledger.items(order.id).await?;
        Ok((order, items))
    }

    pub async fn list_orders(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<(Order, Vec<OrderItem>)>, AppError> {
        let orders = self.ledger.list_for_user(user_id).await?;
        let mut result = Vec::with_capacity(orders.len());
        for order in orders {
            let items = self.ledger.items(order.id).await?;
            result.push((order, items));
        }
        Ok(result)
    }

    /// Open a gateway checkout session for a pending order.
    ///
    /// A fresh reference is minted on every call and overwrites the previous
    /// one, so repeated initialization is not idempotent: an earlier gateway
    /// session for this order is simply abandoned, and verification only
    /// honors the latest stored reference.
    pub async fn initialize_payment(
        &self,
        user_id: Uuid,
        email: &str,
        order_id: Uuid,
    ) -> Result<InitializedTransaction, AppError> {
        let order = self
            .ledger
            .find_for_user(order_id, user_id)
            .await?
            .ok_or_else(|| AppError::domain(DomainError::OrderNotFound))?;

        if !order.status().map(|s| s.is_payable()).unwrap_or(false) {
            return Err(AppError::domain(DomainError::OrderNotPayable));
        }

        let reference = mint_reference(order.id);
        let secret = self.resolve_gateway_secret().await?;

        // Gateway round trip happens with no transaction open.
        let initialized = self
            .gateway
            .initialize_transaction(
                &secret,
                email,
                &order.total_amount,
                &reference,
                &self.config.callback_url,
            )
            .await?;

        self.ledger
            .store_payment_reference(order.id, &reference)
            .await?;

        info!(order_id = %order.id, reference = %reference, "payment initialized");

        Ok(initialized)
    }

    /// Confirm a payment with the gateway and settle the order.
    ///
    /// Safe to call twice with the same reference (client redirect plus
    /// webhook): a completed order short-circuits before any fulfillment
    /// effect is re-applied.
    pub async fn verify_payment(
        &self,
        user_id: Uuid,
        reference: &str,
    ) -> Result<VerifySummary, AppError> {
        let order = self
            .ledger
            .find_by_reference_for_user(reference, user_id)
            .await?
            .ok_or_else(|| AppError::domain(DomainError::OrderNotFound))?;

        self.settle(order, reference).await
    }

    /// Webhook settlement path: the signature has already been validated and
    /// the order row itself names the owner, so no caller scoping applies.
    pub async fn settle_by_reference(&self, reference: &str) -> Result<VerifySummary, AppError> {
        let order = self
            .ledger
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| AppError::domain(DomainError::OrderNotFound))?;

        self.settle(order, reference).await
    }

    async fn settle(&self, order: Order, reference: &str) -> Result<VerifySummary, AppError> {
        match order.status() {
            Some(status) if status.is_payable() => {}
            Some(crate::database::orders::OrderStatus::Completed) => {
                return Ok(VerifySummary::AlreadyVerified);
            }
            _ => return Err(AppError::domain(DomainError::OrderNotPayable)),
        }

        // Resolved fresh here as well, so a key rotation between initialize
        // and verify still reaches the gateway.
        let secret = self.resolve_gateway_secret().await?;

        let verified = self.gateway.verify_transaction(&secret, reference).await?;

        if !verified.is_success() {
            self.ledger.cancel(order.id).await?;
            warn!(
                order_id = %order.id,
                reference = %reference,
                gateway_status = %verified.status,
                "payment verification failed; order cancelled"
            );
            return Err(AppError::domain(DomainError::PaymentFailed));
        }

        let rows = self.ledger.items_with_content(order.id).await?;
        let plan = fulfillment::plan(&rows);

        let outcome = self
            .ledger
            .settle_success(
                &order,
                verified.channel.as_deref(),
                &plan.grants,
                &plan.stock,
            )
            .await?;

        match outcome {
            SettlementOutcome::Completed {
                grants_created,
                stock_clamped,
            } => {
                info!(
                    order_id = %order.id,
                    reference = %reference,
                    grants_created,
                    stock_clamped,
                    "payment verified and order fulfilled"
                );
                Ok(VerifySummary::Verified)
            }
            SettlementOutcome::AlreadyCompleted => Ok(VerifySummary::AlreadyVerified),
            SettlementOutcome::NotPayable => Err(AppError::domain(DomainError::OrderNotPayable)),
        }
    }

    /// Resolve the gateway secret from the freshly-read settings row, with
    /// the deployment default as fallback.
    pub async fn resolve_gateway_secret(&self) -> Result<String, AppError> {
        let settings = self.settings.get().await?;
        let credentials = GatewayCredentials {
            settings: settings.as_ref(),
            mode_override: self.config.mode.as_deref().map(GatewayMode::parse),
        };

        Ok(resolve_secret(
            &credentials,
            self.config.secret_key.as_deref(),
        )?)
    }
}

/// Validate a single catalog line and snapshot its price.
fn price_line(content: &Content, quantity: i32) -> Result<PricedLine, AppError> {
    if !content.is_active {
        return Err(AppError::domain(DomainError::ContentUnavailable {
            title: content.title.clone(),
        }));
    }

    if content.content_type() == Some(ContentType::Physical) {
        let available = content.stock_quantity.unwrap_or(0);
        if content.stock_quantity.is_none() || available < quantity {
            return Err(AppError::domain(DomainError::InsufficientStock {
                title: content.title.clone(),
            }));
        }
    }

    Ok(PricedLine {
        content_id: content.id,
        quantity,
        price_at_purchase: content.price.clone(),
    })
}

/// Mint a per-attempt payment reference: stable prefix, order id, random
/// suffix. Unique per call so every initialization opens a distinct gateway
/// transaction.
fn mint_reference(order_id: Uuid) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    format!("{}-{}-{}", REFERENCE_PREFIX, order_id.simple(), suffix)
}
