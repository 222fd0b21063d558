use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::status::{OrderStatus, PaymentStatus};

/// A line requested at checkout, before pricing.
#[derive(Debug, Clone)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// A priced line as it will be snapshotted on the order.
#[derive(Debug, Clone)]
pub struct PricedItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price: i64,
}

/// Catalog facts needed to price a checkout.
#[derive(Debug, Clone)]
pub struct ProductInfo {
    pub id: Uuid,
    pub name: String,
    pub price: i64,
}

#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Debug, Clone)]
pub struct PaymentView {
    pub id: i64,
    pub order_id: i64,
    pub invoice_id: String,
    pub invoice_url: String,
    pub amount: i64,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: i64,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

/// An order together with its payment, as one consistent read.
///
/// `payment` is optional only because the row pair is created in a single
/// transaction elsewhere; an order without a payment is unexpected and
/// treated as not-found by the engine.
#[derive(Debug, Clone)]
pub struct OrderWithPayment {
    pub order: OrderView,
    pub payment: Option<PaymentView>,
}

/// Everything the store needs to create an order atomically: the order row,
/// its item snapshot, and the PENDING payment referencing the gateway invoice.
/// The id is pre-allocated so the invoice could be issued first.
#[derive(Debug, Clone)]
pub struct NewOrderRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub total_amount: i64,
    pub created_at: DateTime<Utc>,
    pub items: Vec<PricedItem>,
    pub invoice_id: String,
    pub invoice_url: String,
}

#[derive(Debug, Clone)]
pub struct OrderPage {
    pub items: Vec<OrderView>,
    pub total: i64,
}
