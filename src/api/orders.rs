//! Order endpoints: creation, payment initialization and verification.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::Principal;
use crate::api::AppState;
use crate::database::orders::{Order, OrderItem};
use crate::error::AppError;
use crate::middleware::error::get_request_id_from_headers;
use crate::services::orders::{NewOrder, NewOrderItem, VerifySummary};

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<CreateOrderItemRequest>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderItemRequest {
    pub content_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub status: String,
    pub total_amount: String,
    pub payment_reference: Option<String>,
    pub payment_method: Option<String>,
    pub shipping_address: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub content_id: Uuid,
    pub quantity: i32,
    pub price_at_purchase: String,
}

#[derive(Debug, Serialize)]
pub struct InitializePaymentResponse {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    pub message: String,
    pub status: String,
}

impl OrderResponse {
    fn new(order: Order, items: Vec<OrderItem>) -> Self {
        Self {
            id: order.id,
            status: order.status,
            total_amount: order.total_amount.to_string(),
            payment_reference: order.payment_reference,
            payment_method: order.payment_method,
            shipping_address: order.shipping_address,
            notes: order.notes,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    content_id: item.content_id,
                    quantity: item.quantity,
                    price_at_purchase: item.price_at_purchase.to_string(),
                })
                .collect(),
            created_at: order.created_at,
            completed_at: order.completed_at,
        }
    }
}

fn tag_request(err: AppError, headers: &HeaderMap) -> AppError {
    match get_request_id_from_headers(headers) {
        Some(request_id) => err.with_request_id(request_id),
        None => err,
    }
}

/// POST /api/orders
pub async fn create_order(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), AppError> {
    let request = NewOrder {
        items: payload
            .items
            .into_iter()
            .map(|item| NewOrderItem {
                content_id: item.content_id,
                quantity: item.quantity,
            })
            .collect(),
        shipping_address: payload.shipping_address,
        notes: payload.notes,
    };

    let (order, items) = state
        .orders
        .create_order(principal.user_id, request)
        .await
        .map_err(|e| tag_request(e, &headers))?;

    Ok((StatusCode::CREATED, Json(OrderResponse::new(order, items))))
}

/// GET /api/orders
pub async fn list_orders(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
) -> Result<Json<Vec<OrderResponse>>, AppError> {
    let orders = state
        .orders
        .list_orders(principal.user_id)
        .await
        .map_err(|e| tag_request(e, &headers))?;

    Ok(Json(
        orders
            .into_iter()
            .map(|(order, items)| OrderResponse::new(order, items))
            .collect(),
    ))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<OrderResponse>, AppError> {
    let (order, items) = state
        .orders
        .get_order(principal.user_id, order_id)
        .await
        .map_err(|e| tag_request(e, &headers))?;

    Ok(Json(OrderResponse::new(order, items)))
}

/// POST /api/orders/{id}/initialize-payment
pub async fn initialize_payment(
    State(state): State<AppState>,
    principal: Principal,
    Path(order_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<InitializePaymentResponse>, AppError> {
    let initialized = state
        .orders
        .initialize_payment(principal.user_id, &principal.email, order_id)
        .await
        .map_err(|e| tag_request(e, &headers))?;

    Ok(Json(InitializePaymentResponse {
        authorization_url: initialized.authorization_url,
        access_code: initialized.access_code,
        reference: initialized.reference,
    }))
}

/// POST /api/orders/verify-payment/{reference}
pub async fn verify_payment(
    State(state): State<AppState>,
    principal: Principal,
    Path(reference): Path<String>,
    headers: HeaderMap,
) -> Result<Json<VerifyPaymentResponse>, AppError> {
    let summary = state
        .orders
        .verify_payment(principal.user_id, &reference)
        .await
        .map_err(|e| tag_request(e, &headers))?;

    let response = match summary {
        VerifySummary::Verified => VerifyPaymentResponse {
            message: "Payment verified successfully".to_string(),
            status: "completed".to_string(),
        },
        VerifySummary::AlreadyVerified => VerifyPaymentResponse {
            message: "Payment already verified".to_string(),
            status: "completed".to_string(),
        },
    };

    Ok(Json(response))
}
