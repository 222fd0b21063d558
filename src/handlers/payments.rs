//! Payment-observation entry points: the gateway webhook, the customer
//! status polls, and the success-redirect confirmation. Each one locates the
//! order its own way and hands the observation to the reconciliation engine.

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::reconciliation::ReconcileResult;
use crate::domain::errors::DomainError;
use crate::domain::order::OrderWithPayment;
use crate::domain::order_code::{derive_order_code, normalize_order_code, parse_order_code};
use crate::domain::ports::OrderStore;
use crate::domain::status::{GatewayStatus, OrderStatus, PaymentStatus};
use crate::errors::AppError;
use crate::handlers::require_user;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

/// Push notification from the gateway. Only the invoice id and status are
/// consumed; gateways attach plenty more, all ignored.
#[derive(Debug, Deserialize, ToSchema)]
pub struct WebhookNotification {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReconcileSummary {
    pub order_id: i64,
    pub changed: bool,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
}

impl From<(i64, &ReconcileResult)> for ReconcileSummary {
    fn from((order_id, result): (i64, &ReconcileResult)) -> Self {
        ReconcileSummary {
            order_id,
            changed: result.changed,
            payment_status: result.new_payment_status,
            order_status: result.new_order_status,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SyncStatusResponse {
    pub order_id: i64,
    pub order_code: String,
    /// Customer-facing label: paid / pending / failed / expired.
    pub status: String,
    pub order_status: OrderStatus,
    /// Whether this poll actually moved the order; the storefront shows a
    /// toast only when true.
    pub changed: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessRedirectResponse {
    pub order_id: i64,
    pub order_code: String,
    pub already_paid: bool,
    pub status: String,
}

/// Load an order through a supplied order code, accepting it with or without
/// the leading '#'. The code is re-derived from the order found and compared
/// byte-for-byte, so a forged or mistyped code never resolves.
fn find_by_verified_code(
    store: &Arc<dyn OrderStore>,
    raw: &str,
) -> Result<OrderWithPayment, DomainError> {
    let code = normalize_order_code(raw);
    let order_id = parse_order_code(&code)?;
    let loaded = store.find_order(order_id)?.ok_or(DomainError::NotFound)?;
    if derive_order_code(loaded.order.id, loaded.order.created_at) != code {
        return Err(DomainError::InvalidInput(format!(
            "order code '{code}' does not match order {order_id}"
        )));
    }
    Ok(loaded)
}

/// Shared tail of the two poll endpoints: read the live invoice status from
/// the gateway, then reconcile.
async fn poll_gateway_and_reconcile(
    state: &AppState,
    loaded: &OrderWithPayment,
) -> Result<SyncStatusResponse, AppError> {
    let payment = loaded.payment.as_ref().ok_or(AppError::NotFound)?;
    let snapshot = state.gateway.get_invoice(&payment.invoice_id).await?;

    let engine = state.engine.clone();
    let order_id = loaded.order.id;
    let result = web::block(move || engine.reconcile(order_id, &snapshot.status))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(SyncStatusResponse {
        order_id,
        order_code: derive_order_code(order_id, loaded.order.created_at),
        status: result.new_payment_status.label().to_string(),
        order_status: result.new_order_status,
        changed: result.changed,
    })
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /payments/webhook
///
/// Asynchronous push from the gateway. Replays and duplicates are expected;
/// the reconcile no-ops on anything already applied. Invoices this system
/// never issued (e.g. gateway test events) get a 404, not an error page.
#[utoipa::path(
    post,
    path = "/payments/webhook",
    request_body = WebhookNotification,
    responses(
        (status = 200, description = "Reconciled", body = ReconcileSummary),
        (status = 401, description = "Missing or wrong callback token"),
        (status = 404, description = "Unknown invoice id"),
    ),
    tag = "payments"
)]
pub async fn webhook(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<WebhookNotification>,
) -> Result<HttpResponse, AppError> {
    if let Some(expected) = &state.webhook_token {
        let provided = req
            .headers()
            .get("x-callback-token")
            .and_then(|value| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(AppError::Unauthorized);
        }
    }

    let body = body.into_inner();
    let store = state.store.clone();
    let invoice_id = body.id.clone();
    let loaded = web::block(move || store.find_order_by_invoice(&invoice_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??
        .ok_or_else(|| {
            log::warn!("webhook for unknown invoice '{}'", body.id);
            AppError::NotFound
        })?;

    let observed = GatewayStatus::parse(&body.status);
    let engine = state.engine.clone();
    let order_id = loaded.order.id;
    let result = web::block(move || engine.reconcile(order_id, &observed))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    log::info!(
        "webhook invoice '{}' status '{}': order {} changed={}",
        body.id,
        body.status,
        order_id,
        result.changed
    );
    Ok(HttpResponse::Ok().json(ReconcileSummary::from((order_id, &result))))
}

/// POST /orders/{id}/sync-status
///
/// Customer-initiated poll from the dashboard: reads the live invoice status
/// from the gateway and reconciles. Safe at any frequency.
#[utoipa::path(
    post,
    path = "/orders/{id}/sync-status",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-User-Id" = Uuid, Header, description = "Requesting user"),
    ),
    responses(
        (status = 200, description = "Current status after reconciliation", body = SyncStatusResponse),
        (status = 404, description = "Order not found or not owned by the user"),
        (status = 502, description = "Payment gateway unavailable"),
    ),
    tag = "payments"
)]
pub async fn sync_status(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user(&req)?;
    let order_id = path.into_inner();

    let store = state.store.clone();
    let loaded = web::block(move || store.find_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??
        .ok_or(AppError::NotFound)?;
    if loaded.order.user_id != user_id {
        return Err(AppError::NotFound);
    }

    let response = poll_gateway_and_reconcile(&state, &loaded).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// POST /orders/code/{code}/sync-status
///
/// Public poll keyed by the printed/QR order code instead of an
/// authenticated id.
#[utoipa::path(
    post,
    path = "/orders/code/{code}/sync-status",
    params(
        ("code" = String, Path, description = "Order code, with or without the leading '#'"),
    ),
    responses(
        (status = 200, description = "Current status after reconciliation", body = SyncStatusResponse),
        (status = 400, description = "Malformed or mismatched order code"),
        (status = 404, description = "No such order"),
        (status = 502, description = "Payment gateway unavailable"),
    ),
    tag = "payments"
)]
pub async fn sync_status_by_code(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let raw = path.into_inner();
    let store = state.store.clone();
    let loaded = web::block(move || find_by_verified_code(&store, &raw))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let response = poll_gateway_and_reconcile(&state, &loaded).await?;
    Ok(HttpResponse::Ok().json(response))
}

/// GET /payments/success/{code}
///
/// Landing endpoint for the gateway's success redirect. The gateway only
/// sends customers here after payment, so this confirms PAID directly,
/// without a live status call, to cover the window before the webhook
/// arrives. Idempotent: an already-paid order answers `already_paid: true`.
#[utoipa::path(
    get,
    path = "/payments/success/{code}",
    params(
        ("code" = String, Path, description = "Order code, with or without the leading '#'"),
    ),
    responses(
        (status = 200, description = "Payment confirmed (or already was)", body = SuccessRedirectResponse),
        (status = 400, description = "Malformed or mismatched order code"),
        (status = 404, description = "No such order"),
    ),
    tag = "payments"
)]
pub async fn success_redirect(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let raw = path.into_inner();
    let store = state.store.clone();
    let engine = state.engine.clone();

    let (order_id, order_code, result) = web::block(move || {
        let loaded = find_by_verified_code(&store, &raw)?;
        let result = engine.confirm_success_redirect(loaded.order.id)?;
        Ok::<_, DomainError>((
            loaded.order.id,
            derive_order_code(loaded.order.id, loaded.order.created_at),
            result,
        ))
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))??;

    let already_paid = !result.changed && result.old_payment_status == PaymentStatus::Paid;
    if result.changed {
        log::info!("order {order_id} confirmed paid via success redirect");
    }
    Ok(HttpResponse::Ok().json(SuccessRedirectResponse {
        order_id,
        order_code,
        already_paid,
        status: result.new_payment_status.label().to_string(),
    }))
}
