pub mod auth;
pub mod orders;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::health::HealthChecker;
use crate::services::orders::OrderService;

/// Shared state for all request handlers
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub health_checker: HealthChecker,
}

/// Assemble the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(crate::health::health))
        .route(
            "/api/orders",
            post(orders::create_order).get(orders::list_orders),
        )
        .route("/api/orders/{id}", get(orders::get_order))
        .route(
            "/api/orders/{id}/initialize-payment",
            post(orders::initialize_payment),
        )
        .route(
            "/api/orders/verify-payment/{reference}",
            post(orders::verify_payment),
        )
        .route("/webhooks/paystack", post(webhooks::handle_paystack_webhook))
        .with_state(state)
}
