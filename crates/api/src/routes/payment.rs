//! Payment gateway webhook.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use common::{OrderId, TransactionId, TransactionStatus};
use domain::{GatewayNotification, ReconciliationOutcome, RejectReason};
use serde::Serialize;
use store::Store;

use super::{Envelope, ok};
use crate::error::ApiError;
use crate::identity::has_gateway_key;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub outcome: &'static str,
    pub transaction_id: TransactionId,
    pub transaction_status: TransactionStatus,
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<ReconciliationOutcome> for WebhookResponse {
    fn from(outcome: ReconciliationOutcome) -> Self {
        let label = outcome.as_str();
        let transaction = outcome.transaction();
        let (transaction_id, transaction_status, order_id) =
            (transaction.id, transaction.status, transaction.order_id);
        let reason = match outcome {
            ReconciliationOutcome::Rejected { reason, .. } => Some(reason),
            _ => None,
        };
        Self {
            outcome: label,
            transaction_id,
            transaction_status,
            order_id,
            message: reason.as_ref().map(ToString::to_string),
            reason,
        }
    }
}

/// POST /payment/webhook: reconcile a gateway notification.
///
/// Requires the shared `x-api-key`. Once authenticated, business rejections
/// are reported in `data` with status 200.
#[tracing::instrument(skip(state, headers, payload))]
pub async fn webhook<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    payload: Result<Json<GatewayNotification>, JsonRejection>,
) -> Result<Json<Envelope<WebhookResponse>>, ApiError> {
    if !has_gateway_key(&headers, state.webhook_key.as_deref()) {
        metrics::counter!("payment_webhook_unauthorized_total").increment(1);
        tracing::warn!("webhook call with missing or invalid api key");
        return Err(ApiError::Unauthenticated("Invalid API key".to_string()));
    }
    let Json(notification) = payload?;

    let outcome = state.payments.reconcile(notification).await?;
    Ok(ok(WebhookResponse::from(outcome)))
}
