use async_trait::async_trait;
use uuid::Uuid;

use super::errors::DomainError;
use super::order::{NewOrderRecord, OrderPage, OrderWithPayment, ProductInfo};
use super::status::{GatewayStatus, OrderStatus, StatusTransition};

/// Persistence port for the order/payment aggregates.
///
/// Implementations must make `create_order`, `apply_transition` and
/// `advance_order_status` atomic: either every write in the operation commits
/// or none does. The two transition methods are conditional writes: they
/// return `false` (having changed nothing) when the expected current state no
/// longer holds, which is how concurrent reconcilers lose a race safely.
pub trait OrderStore: Send + Sync + 'static {
    /// Allocate the next order id without creating a row.
    fn next_order_id(&self) -> Result<i64, DomainError>;

    /// Look up the catalog facts for the given products. Missing ids are
    /// simply absent from the result.
    fn product_info(&self, ids: &[Uuid]) -> Result<Vec<ProductInfo>, DomainError>;

    /// Create order + items + PENDING payment in one transaction, decrementing
    /// each product's stock. Fails with `InvalidInput` (and commits nothing)
    /// when any product lacks stock.
    fn create_order(&self, record: NewOrderRecord) -> Result<(), DomainError>;

    fn find_order(&self, id: i64) -> Result<Option<OrderWithPayment>, DomainError>;

    /// Resolve an order through the gateway's invoice id, the correlation key
    /// webhooks carry.
    fn find_order_by_invoice(&self, invoice_id: &str)
        -> Result<Option<OrderWithPayment>, DomainError>;

    fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError>;

    /// Apply a payment/order status transition (plus stock restoration when
    /// asked) in one transaction. Returns whether it applied.
    fn apply_transition(
        &self,
        order_id: i64,
        transition: &StatusTransition,
    ) -> Result<bool, DomainError>;

    /// Move an order from `from` to `to` (admin fulfillment chain). Returns
    /// whether the conditional update applied.
    fn advance_order_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, DomainError>;
}

/// What the gateway needs to issue a hosted invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoiceRequest {
    pub order_id: i64,
    pub amount: i64,
    pub description: String,
    pub customer_email: String,
    pub customer_name: Option<String>,
    pub items: Vec<InvoiceLineItem>,
    pub success_redirect_url: String,
}

#[derive(Debug, Clone)]
pub struct InvoiceLineItem {
    pub name: String,
    pub quantity: i32,
    pub price: i64,
}

#[derive(Debug, Clone)]
pub struct CreatedInvoice {
    pub id: String,
    pub invoice_url: String,
}

/// A point-in-time read of an invoice's gateway status.
#[derive(Debug, Clone)]
pub struct InvoiceSnapshot {
    pub id: String,
    pub status: GatewayStatus,
}

/// Outbound port to the payment processor. Network failures surface as
/// `DomainError::Upstream`; callers must never substitute a status for them.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<CreatedInvoice, DomainError>;

    async fn get_invoice(&self, invoice_id: &str) -> Result<InvoiceSnapshot, DomainError>;
}
