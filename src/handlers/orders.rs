use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::checkout::PlaceOrderRequest;
use crate::domain::order::{OrderItemInput, OrderView, OrderWithPayment};
use crate::domain::order_code::derive_order_code;
use crate::domain::status::OrderStatus;
use crate::errors::AppError;
use crate::handlers::require_user;
use crate::AppState;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    pub user_id: Uuid,
    pub email: String,
    pub customer_name: Option<String>,
    pub items: Vec<CreateOrderItemRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub id: i64,
    pub order_code: String,
    pub total_amount: i64,
    pub status: OrderStatus,
    /// Hosted payment page the customer is sent to.
    pub invoice_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub invoice_id: String,
    pub invoice_url: String,
    pub amount: i64,
    /// Customer-facing label: paid / pending / failed / expired.
    pub status: String,
    pub paid_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub order_code: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
    pub payment: Option<PaymentResponse>,
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UpdateOrderStatusResponse {
    pub id: i64,
    pub status: OrderStatus,
}

fn order_body(order: &OrderView) -> OrderResponse {
    OrderResponse {
        id: order.id,
        order_code: derive_order_code(order.id, order.created_at),
        user_id: order.user_id,
        status: order.status,
        total_amount: order.total_amount,
        created_at: order.created_at.to_rfc3339(),
        items: order
            .items
            .iter()
            .map(|item| OrderItemResponse {
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect(),
        payment: None,
    }
}

fn order_with_payment_body(loaded: &OrderWithPayment) -> OrderResponse {
    let mut body = order_body(&loaded.order);
    body.payment = loaded.payment.as_ref().map(|payment| PaymentResponse {
        invoice_id: payment.invoice_id.clone(),
        invoice_url: payment.invoice_url.clone(),
        amount: payment.amount,
        status: payment.status.label().to_string(),
        paid_at: payment.paid_at.map(|at| at.to_rfc3339()),
    });
    body
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /orders
///
/// Checkout: prices the requested items, issues the gateway invoice, then
/// persists order + items + PENDING payment in a single transaction. A
/// gateway failure leaves nothing behind.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created, payment pending", body = CreateOrderResponse),
        (status = 400, description = "Empty items, bad quantity, or out of stock"),
        (status = 404, description = "Unknown product"),
        (status = 502, description = "Payment gateway unavailable"),
    ),
    tag = "orders"
)]
pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = PlaceOrderRequest {
        user_id: body.user_id,
        email: body.email,
        customer_name: body.customer_name,
        items: body
            .items
            .iter()
            .map(|item| OrderItemInput {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect(),
    };

    let checkout = state.checkout.clone();
    let draft = web::block(move || checkout.prepare(request))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let invoice = state
        .gateway
        .create_invoice(&state.checkout.invoice_request(&draft))
        .await?;

    let response = CreateOrderResponse {
        id: draft.id,
        order_code: draft.order_code.clone(),
        total_amount: draft.total_amount,
        status: OrderStatus::AwaitingPayment,
        invoice_url: invoice.invoice_url.clone(),
    };

    let checkout = state.checkout.clone();
    let committed_invoice = invoice.clone();
    web::block(move || checkout.commit(draft, &committed_invoice))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    log::info!(
        "order {} placed (code {}, invoice {})",
        response.id,
        response.order_code,
        invoice.id
    );
    Ok(HttpResponse::Created().json(response))
}

/// GET /orders/{id}
///
/// Returns the order with its items and payment, scoped to the requesting
/// user.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = i64, Path, description = "Order id"),
        ("X-User-Id" = Uuid, Header, description = "Requesting user"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 404, description = "Order not found or not owned by the user"),
    ),
    tag = "orders"
)]
pub async fn get_order(
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
    Ok(HttpResponse::Ok().json(order_with_payment_body(&loaded)))
}

/// GET /orders
///
/// Paginated list of the requesting user's orders, newest first (without
/// their items).
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
        ("X-User-Id" = Uuid, Header, description = "Requesting user"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<ListOrdersParams>,
    req: HttpRequest,
) -> Result<HttpResponse, AppError> {
    let user_id = require_user(&req)?;
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let store = state.store.clone();
    let result = web::block(move || store.list_orders_for_user(user_id, page, limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.iter().map(order_body).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// PATCH /admin/orders/{id}/status
///
/// Back-office fulfillment: PAID → READY_FOR_PICKUP → PICKED_UP → COMPLETED,
/// one step at a time.
#[utoipa::path(
    patch,
    path = "/admin/orders/{id}/status",
    request_body = UpdateOrderStatusRequest,
    params(
        ("id" = i64, Path, description = "Order id"),
    ),
    responses(
        (status = 200, description = "Status advanced", body = UpdateOrderStatusResponse),
        (status = 400, description = "Target is not the next step in the chain"),
        (status = 404, description = "Order not found"),
    ),
    tag = "admin"
)]
pub async fn advance_status(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    body: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let target = body.into_inner().status;

    let fulfillment = state.fulfillment.clone();
    let order = web::block(move || fulfillment.advance(order_id, target))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(UpdateOrderStatusResponse {
        id: order.id,
        status: order.status,
    }))
}
