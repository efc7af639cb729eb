//! Payment gateway reconciliation.
//!
//! Gateway notifications may arrive late, twice, or for orders that can no
//! longer be paid. Each one is recorded as exactly one transaction row per
//! transaction code; only an acceptable notification moves the order to PAID.

use chrono::{DateTime, Utc};
use common::{
    Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, TransactionId, TransactionStatus,
};
use serde::{Deserialize, Serialize};
use store::{Store, TransactionRecord, UnitOfWork};

use crate::error::DomainError;
use crate::order::{Order, load_order, save};
use crate::retry::{DEFAULT_MAX_ATTEMPTS, run_with_retry};

const MAX_CODE_LEN: usize = 255;

/// Result reported by the gateway for a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayStatus {
    Success,
    Failed,
}

/// A payment notification as delivered by the gateway webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayNotification {
    pub transaction_code: String,
    /// Order id as sent by the gateway. May be absent or malformed.
    #[serde(default, alias = "orderId")]
    pub order_reference: Option<String>,
    pub amount: Money,
    #[serde(default = "gateway_method")]
    pub method: PaymentMethod,
    pub status: GatewayStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

fn gateway_method() -> PaymentMethod {
    PaymentMethod::Gateway
}

impl GatewayNotification {
    pub fn success(code: impl Into<String>, order_id: OrderId, amount: Money) -> Self {
        Self {
            transaction_code: code.into(),
            order_reference: Some(order_id.to_string()),
            amount,
            method: PaymentMethod::Gateway,
            status: GatewayStatus::Success,
            description: None,
            occurred_at: None,
        }
    }

    pub fn failed(code: impl Into<String>, order_id: OrderId, amount: Money) -> Self {
        Self {
            status: GatewayStatus::Failed,
            ..Self::success(code, order_id, amount)
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        let code = self.transaction_code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("transactionCode", "must not be empty"));
        }
        if code.len() > MAX_CODE_LEN {
            return Err(DomainError::validation(
                "transactionCode",
                format!("must be at most {MAX_CODE_LEN} characters"),
            ));
        }
        if self.amount.is_negative() {
            return Err(DomainError::validation("amount", "must not be negative"));
        }
        Ok(())
    }
}

/// Why a notification did not mark its order as paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectReason {
    MissingOrderReference,
    UnknownOrder { reference: String },
    AmountMismatch { expected: Money, received: Money },
    OrderCancelled,
    AlreadySettled { payment_status: PaymentStatus },
    GatewayFailure,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingOrderReference => write!(f, "notification has no order reference"),
            RejectReason::UnknownOrder { reference } => write!(f, "unknown order {reference}"),
            RejectReason::AmountMismatch { expected, received } => {
                write!(f, "amount {received} does not match order total {expected}")
            }
            RejectReason::OrderCancelled => write!(f, "order is cancelled"),
            RejectReason::AlreadySettled { payment_status } => {
                write!(f, "order payment status is already {payment_status}")
            }
            RejectReason::GatewayFailure => write!(f, "gateway reported failure"),
        }
    }
}

/// What reconciling one notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationOutcome {
    /// A SUCCESS transaction was recorded and the order is now PAID.
    Applied {
        order_id: OrderId,
        transaction: TransactionRecord,
    },
    /// The code was already settled. Nothing changed.
    Duplicate { transaction: TransactionRecord },
    /// A FAILED transaction was recorded. The order is untouched.
    Rejected {
        reason: RejectReason,
        transaction: TransactionRecord,
    },
}

impl ReconciliationOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationOutcome::Applied { .. } => "applied",
            ReconciliationOutcome::Duplicate { .. } => "duplicate",
            ReconciliationOutcome::Rejected { .. } => "rejected",
        }
    }

    pub fn transaction(&self) -> &TransactionRecord {
        match self {
            ReconciliationOutcome::Applied { transaction, .. }
            | ReconciliationOutcome::Duplicate { transaction }
            | ReconciliationOutcome::Rejected { transaction, .. } => transaction,
        }
    }
}

/// Applies gateway notifications to orders.
#[derive(Clone)]
pub struct PaymentReconciler<S: Store> {
    store: S,
    max_attempts: u32,
}

impl<S: Store> PaymentReconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Reconciles one notification.
    ///
    /// Business rejections are recorded and returned as
    /// [`ReconciliationOutcome::Rejected`], never as errors. A redelivery
    /// racing on the same code resolves to `Duplicate` on retry.
    #[tracing::instrument(skip(self, notification), fields(code = %notification.transaction_code))]
    pub async fn reconcile(
        &self,
        notification: GatewayNotification,
    ) -> Result<ReconciliationOutcome, DomainError> {
        notification.validate()?;

        let outcome = run_with_retry("reconcile", self.max_attempts, || {
            self.try_reconcile(&notification)
        })
        .await?;

        metrics::counter!("payment_notifications_total", "outcome" => outcome.as_str())
            .increment(1);
        match &outcome {
            ReconciliationOutcome::Applied { order_id, .. } => {
                tracing::info!(%order_id, "payment applied");
            }
            ReconciliationOutcome::Duplicate { .. } => {
                tracing::info!("duplicate payment notification ignored");
            }
            ReconciliationOutcome::Rejected { reason, .. } => {
                tracing::warn!(%reason, "payment notification rejected");
            }
        }
        Ok(outcome)
    }

    async fn try_reconcile(
        &self,
        notification: &GatewayNotification,
    ) -> Result<ReconciliationOutcome, DomainError> {
        let code = notification.transaction_code.trim();
        let mut uow = self.store.begin().await?;

        let existing = uow.transaction_by_code(code).await?;
        if let Some(transaction) = existing.as_ref()
            && transaction.status == TransactionStatus::Success
        {
            uow.rollback().await?;
            return Ok(ReconciliationOutcome::Duplicate {
                transaction: transaction.clone(),
            });
        }

        let (mut order, verdict) = evaluate(&mut uow, notification).await?;

        let description = match &verdict {
            Ok(()) => notification
                .description
                .clone()
                .unwrap_or_else(|| "payment received".to_string()),
            Err(reason) => match &notification.description {
                Some(text) => format!("{reason}: {text}"),
                None => reason.to_string(),
            },
        };
        let transaction = TransactionRecord {
            id: existing.as_ref().map_or_else(TransactionId::new, |t| t.id),
            order_id: order.as_ref().map(Order::id),
            method: notification.method,
            transaction_code: code.to_string(),
            amount: notification.amount,
            status: if verdict.is_ok() {
                TransactionStatus::Success
            } else {
                TransactionStatus::Failed
            },
            description,
            created_at: notification.occurred_at.unwrap_or_else(Utc::now),
        };

        if existing.is_some() {
            uow.update_transaction(&transaction).await?;
        } else {
            uow.insert_transaction(&transaction).await?;
        }

        let outcome = match (verdict, order.as_mut()) {
            (Ok(()), Some(order)) => {
                order.set_payment_status(PaymentStatus::Paid)?;
                save(&mut uow, order).await?;
                order.push_transaction(transaction.clone());
                ReconciliationOutcome::Applied {
                    order_id: order.id(),
                    transaction,
                }
            }
            (Ok(()), None) => ReconciliationOutcome::Rejected {
                reason: RejectReason::MissingOrderReference,
                transaction,
            },
            (Err(reason), _) => ReconciliationOutcome::Rejected {
                reason,
                transaction,
            },
        };

        uow.commit().await?;
        Ok(outcome)
    }
}

/// Resolves the referenced order and decides whether the notification pays it.
async fn evaluate<U: UnitOfWork>(
    uow: &mut U,
    notification: &GatewayNotification,
) -> Result<(Option<Order>, Result<(), RejectReason>), DomainError> {
    let Some(reference) = notification
        .order_reference
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
    else {
        return Ok((None, Err(RejectReason::MissingOrderReference)));
    };

    let unknown = || RejectReason::UnknownOrder {
        reference: reference.to_string(),
    };
    let Ok(order_id) = OrderId::parse_str(reference) else {
        return Ok((None, Err(unknown())));
    };
    let order = match load_order(uow, order_id).await {
        Ok(order) => order,
        Err(DomainError::NotFound { .. }) => return Ok((None, Err(unknown()))),
        Err(e) => return Err(e),
    };

    let verdict = if notification.status == GatewayStatus::Failed {
        Err(RejectReason::GatewayFailure)
    } else if order.status() == OrderStatus::Cancelled {
        Err(RejectReason::OrderCancelled)
    } else if order.payment_status() != PaymentStatus::Unpaid {
        Err(RejectReason::AlreadySettled {
            payment_status: order.payment_status(),
        })
    } else if notification.amount != order.total() {
        Err(RejectReason::AmountMismatch {
            expected: order.total(),
            received: notification.amount,
        })
    } else {
        Ok(())
    };

    Ok((Some(order), verdict))
}
