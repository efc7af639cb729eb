//! Order checkout, query and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{
    Money, OrderDetailId, OrderId, OrderStatus, PaymentMethod, PaymentStatus, ProductId,
    TransactionId, TransactionStatus, UserId,
};
use domain::{Caller, CancelOrder, Order, PlaceOrder, UpdateOrderStatus, UpdatePaymentStatus};
use serde::{Deserialize, Serialize};
use store::{
    DEFAULT_PAGE_SIZE, OrderQuery, OrderRecord, OrderSortField, SortDirection, Store,
    TransactionRecord, Version,
};

use super::{Envelope, ok, parse_id};
use crate::error::ApiError;
use crate::identity::{Identity, caller_from_headers, has_gateway_key};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: String,
    pub shipping_phone: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<OrderSortField>,
    pub sort_order: Option<SortDirection>,
}

impl ListOrdersParams {
    fn into_query(self) -> OrderQuery {
        let mut query = OrderQuery::new()
            .created_between(self.from, self.to)
            .sort(
                self.sort_by.unwrap_or_default(),
                self.sort_order.unwrap_or_default(),
            )
            .paginate(
                self.page.unwrap_or(1),
                self.limit.unwrap_or(DEFAULT_PAGE_SIZE),
            );
        if let Some(status) = self.status {
            query = query.status(status);
        }
        if let Some(payment_status) = self.payment_status {
            query = query.payment_status(payment_status);
        }
        query
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub subtotal: Money,
    pub shipping_fee: Money,
    pub discount_amount: Money,
    pub total_money: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub shipping_phone: String,
    pub note: Option<String>,
    pub cancel_reason: Option<String>,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemResponse>,
    pub transactions: Vec<TransactionResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: OrderDetailId,
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub order_id: Option<OrderId>,
    pub method: PaymentMethod,
    pub transaction_code: String,
    pub amount: Money,
    pub status: TransactionStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<&TransactionRecord> for TransactionResponse {
    fn from(t: &TransactionRecord) -> Self {
        Self {
            id: t.id,
            order_id: t.order_id,
            method: t.method,
            transaction_code: t.transaction_code.clone(),
            amount: t.amount,
            status: t.status,
            description: t.description.clone(),
            created_at: t.created_at,
        }
    }
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let header = order.header();
        Self {
            id: header.id,
            user_id: header.user_id,
            subtotal: header.subtotal,
            shipping_fee: header.shipping_fee,
            discount_amount: header.discount_amount,
            total_money: header.total,
            status: header.status,
            payment_status: header.payment_status,
            payment_method: header.payment_method,
            shipping_address: header.shipping_address.clone(),
            shipping_phone: header.shipping_phone.clone(),
            note: header.note.clone(),
            cancel_reason: header.cancel_reason.clone(),
            version: header.version,
            created_at: header.created_at,
            updated_at: header.updated_at,
            items: order
                .details()
                .iter()
                .map(|d| OrderItemResponse {
                    id: d.id,
                    product_id: d.product_id,
                    product_name: d.product_name.clone(),
                    unit_price: d.unit_price,
                    quantity: d.quantity,
                    subtotal: d.subtotal,
                })
                .collect(),
            transactions: order
                .transactions()
                .iter()
                .map(TransactionResponse::from)
                .collect(),
        }
    }
}

/// Order header without lines, used in listings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummaryResponse {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub total_money: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderRecord> for OrderSummaryResponse {
    fn from(o: OrderRecord) -> Self {
        Self {
            id: o.id,
            user_id: o.user_id,
            total_money: o.total,
            status: o.status,
            payment_status: o.payment_status,
            payment_method: o.payment_method,
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderSummaryResponse>,
    pub pagination: Pagination,
}

// -- Handlers --

/// POST /orders: place an order from the caller's cart.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    payload: Result<Json<PlaceOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<OrderResponse>>), ApiError> {
    let Json(req) = payload?;
    let mut cmd = PlaceOrder::new(req.shipping_address, req.shipping_phone, req.payment_method);
    cmd.note = req.note;

    let order = state.checkout.checkout(caller, cmd).await?;
    Ok((StatusCode::CREATED, ok(OrderResponse::from(&order))))
}

/// GET /orders: list orders visible to the caller.
#[tracing::instrument(skip(state, params))]
pub async fn list<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    params: Result<Query<ListOrdersParams>, QueryRejection>,
) -> Result<Json<Envelope<OrderListResponse>>, ApiError> {
    let Query(params) = params?;
    let page = state.orders.list_orders(caller, params.into_query()).await?;

    let pagination = Pagination {
        page: page.page,
        limit: page.limit,
        total: page.total,
        total_pages: page.total_pages(),
    };
    Ok(ok(OrderListResponse {
        orders: page.items.into_iter().map(Into::into).collect(),
        pagination,
    }))
}

/// GET /orders/{id}: load one order with its lines and transactions.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let order = state.orders.get_order(caller, order_id).await?;
    Ok(ok(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/status: admin status change.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let Json(req) = payload?;

    let order = state
        .orders
        .update_status(caller, UpdateOrderStatus::new(order_id, req.status))
        .await?;
    Ok(ok(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/payment: payment status change by an admin or the gateway.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn update_payment<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    payload: Result<Json<UpdatePaymentRequest>, JsonRejection>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError> {
    let caller = if has_gateway_key(&headers, state.webhook_key.as_deref()) {
        Caller::gateway()
    } else {
        caller_from_headers(&headers)?
    };
    let order_id: OrderId = parse_id("order", &id)?;
    let Json(req) = payload?;

    let order = state
        .orders
        .update_payment_status(caller, UpdatePaymentStatus::new(order_id, req.payment_status))
        .await?;
    Ok(ok(OrderResponse::from(&order)))
}

/// PUT /orders/{id}/cancel: cancel by the owner or an admin. Body is optional.
#[tracing::instrument(skip(state, body))]
pub async fn cancel<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Identity(caller): Identity,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Envelope<OrderResponse>>, ApiError> {
    let order_id: OrderId = parse_id("order", &id)?;
    let req: CancelRequest = if body.iter().all(u8::is_ascii_whitespace) {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {e}")))?
    };

    let cmd = CancelOrder {
        order_id,
        reason: req.reason,
    };
    let order = state.orders.cancel(caller, cmd).await?;
    Ok(ok(OrderResponse::from(&order)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_defaults() {
        let params: ListOrdersParams = serde_json::from_value(serde_json::json!({})).unwrap();
        let query = params.into_query();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, DEFAULT_PAGE_SIZE);
        assert_eq!(query.sort_by, OrderSortField::CreatedAt);
        assert_eq!(query.direction, SortDirection::Desc);
        assert!(query.status.is_none());
    }

    #[test]
    fn test_list_params_are_clamped() {
        let params: ListOrdersParams = serde_json::from_value(serde_json::json!({
            "page": 0,
            "limit": 1000,
            "status": "SHIPPING",
            "sortBy": "totalMoney",
            "sortOrder": "asc"
        }))
        .unwrap();
        let query = params.into_query();
        assert_eq!(query.page, 1);
        assert_eq!(query.limit, 100);
        assert_eq!(query.status, Some(OrderStatus::Shipping));
        assert_eq!(query.sort_by, OrderSortField::TotalMoney);
        assert_eq!(query.direction, SortDirection::Asc);
    }
}
