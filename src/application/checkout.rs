//! Checkout: price the requested items, allocate the order identity, and,
//! once the gateway invoice exists, persist order, items and payment as one
//! transaction.
//!
//! The flow is split in two sync halves around the async gateway call so no
//! database transaction ever spans a network round-trip:
//! `prepare` → (caller issues the invoice) → `commit`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrderRecord, OrderItemInput, PricedItem};
use crate::domain::order_code::derive_order_code;
use crate::domain::ports::{CreateInvoiceRequest, CreatedInvoice, InvoiceLineItem, OrderStore};

/// Checkout intent, as received from the storefront.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    pub user_id: Uuid,
    pub email: String,
    pub customer_name: Option<String>,
    pub items: Vec<OrderItemInput>,
}

/// A fully priced order that does not exist yet. Carries everything the
/// gateway invoice and the final insert need, including the pre-allocated id
/// and the creation timestamp the order code derives from.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub id: i64,
    pub user_id: Uuid,
    pub email: String,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub order_code: String,
    pub total_amount: i64,
    pub items: Vec<PricedItem>,
}

pub struct CheckoutService {
    store: Arc<dyn OrderStore>,
    public_base_url: String,
}

impl CheckoutService {
    pub fn new(store: Arc<dyn OrderStore>, public_base_url: String) -> Self {
        Self {
            store,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Validate and price a checkout request, allocating the order id.
    ///
    /// Nothing is persisted; an abandoned draft costs only a skipped id.
    pub fn prepare(&self, request: PlaceOrderRequest) -> Result<OrderDraft, DomainError> {
        if request.items.is_empty() {
            return Err(DomainError::InvalidInput(
                "order must contain at least one item".to_string(),
            ));
        }
        if request.items.iter().any(|item| item.quantity < 1) {
            return Err(DomainError::InvalidInput(
                "item quantity must be at least 1".to_string(),
            ));
        }

        let product_ids: Vec<Uuid> = request.items.iter().map(|item| item.product_id).collect();
        let catalog: HashMap<Uuid, _> = self
            .store
            .product_info(&product_ids)?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let mut items = Vec::with_capacity(request.items.len());
        let mut total_amount: i64 = 0;
        for item in &request.items {
            let product = catalog.get(&item.product_id).ok_or(DomainError::NotFound)?;
            total_amount += product.price * i64::from(item.quantity);
            items.push(PricedItem {
                product_id: product.id,
                name: product.name.clone(),
                quantity: item.quantity,
                unit_price: product.price,
            });
        }

        let id = self.store.next_order_id()?;
        let created_at = Utc::now();
        Ok(OrderDraft {
            id,
            user_id: request.user_id,
            email: request.email,
            customer_name: request.customer_name,
            created_at,
            order_code: derive_order_code(id, created_at),
            total_amount,
            items,
        })
    }

    /// The invoice the gateway should issue for a draft. The success redirect
    /// embeds the order code (without the '#', which URLs reserve).
    pub fn invoice_request(&self, draft: &OrderDraft) -> CreateInvoiceRequest {
        CreateInvoiceRequest {
            order_id: draft.id,
            amount: draft.total_amount,
            description: format!("Order {}", draft.order_code),
            customer_email: draft.email.clone(),
            customer_name: draft.customer_name.clone(),
            items: draft
                .items
                .iter()
                .map(|item| InvoiceLineItem {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    price: item.unit_price,
                })
                .collect(),
            success_redirect_url: format!(
                "{}/payments/success/{}",
                self.public_base_url,
                draft.order_code.trim_start_matches('#')
            ),
        }
    }

    /// Persist the draft with its issued invoice: order + items + PENDING
    /// payment + stock decrements, all-or-nothing.
    pub fn commit(&self, draft: OrderDraft, invoice: &CreatedInvoice) -> Result<(), DomainError> {
        self.store.create_order(NewOrderRecord {
            id: draft.id,
            user_id: draft.user_id,
            total_amount: draft.total_amount,
            created_at: draft.created_at,
            items: draft.items,
            invoice_id: invoice.id.clone(),
            invoice_url: invoice.invoice_url.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::status::{OrderStatus, PaymentStatus};
    use crate::infrastructure::in_memory::InMemoryOrderStore;

    fn service(store: &Arc<InMemoryOrderStore>) -> CheckoutService {
        CheckoutService::new(
            store.clone() as Arc<dyn OrderStore>,
            "https://shop.example/".to_string(),
        )
    }

    fn request(product_id: Uuid, quantity: i32) -> PlaceOrderRequest {
        PlaceOrderRequest {
            user_id: Uuid::new_v4(),
            email: "customer@example.com".to_string(),
            customer_name: Some("Ada".to_string()),
            items: vec![OrderItemInput {
                product_id,
                quantity,
            }],
        }
    }

    #[test]
    fn prepare_prices_items_and_derives_the_code() {
        let store = Arc::new(InMemoryOrderStore::new());
        let product_id = Uuid::new_v4();
        store.add_product(product_id, "Mug", 12_000, 5);

        let draft = service(&store).prepare(request(product_id, 2)).unwrap();

        assert_eq!(draft.total_amount, 24_000);
        assert_eq!(draft.items.len(), 1);
        assert_eq!(draft.items[0].unit_price, 12_000);
        assert_eq!(
            draft.order_code,
            derive_order_code(draft.id, draft.created_at)
        );
        // Nothing persisted yet.
        assert!(store.find_order(draft.id).unwrap().is_none());
        assert_eq!(store.product_stock(product_id), Some(5));
    }

    #[test]
    fn prepare_rejects_empty_and_non_positive_items() {
        let store = Arc::new(InMemoryOrderStore::new());
        let service = service(&store);

        let empty = service.prepare(PlaceOrderRequest {
            user_id: Uuid::new_v4(),
            email: "a@b.c".to_string(),
            customer_name: None,
            items: vec![],
        });
        assert!(matches!(empty, Err(DomainError::InvalidInput(_))));

        let product_id = Uuid::new_v4();
        store.add_product(product_id, "Mug", 12_000, 5);
        let zero = service.prepare(request(product_id, 0));
        assert!(matches!(zero, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn prepare_fails_for_unknown_product() {
        let store = Arc::new(InMemoryOrderStore::new());
        let result = service(&store).prepare(request(Uuid::new_v4(), 1));
        assert!(matches!(result, Err(DomainError::NotFound)));
    }

    #[test]
    fn invoice_request_carries_lines_and_redirect() {
        let store = Arc::new(InMemoryOrderStore::new());
        let product_id = Uuid::new_v4();
        store.add_product(product_id, "Mug", 12_000, 5);
        let service = service(&store);

        let draft = service.prepare(request(product_id, 2)).unwrap();
        let invoice = service.invoice_request(&draft);

        assert_eq!(invoice.order_id, draft.id);
        assert_eq!(invoice.amount, 24_000);
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.items[0].name, "Mug");
        assert_eq!(
            invoice.success_redirect_url,
            format!(
                "https://shop.example/payments/success/{}",
                draft.order_code.trim_start_matches('#')
            )
        );
    }

    #[test]
    fn commit_creates_order_payment_and_reserves_stock() {
        let store = Arc::new(InMemoryOrderStore::new());
        let product_id = Uuid::new_v4();
        store.add_product(product_id, "Mug", 12_000, 5);
        let service = service(&store);

        let draft = service.prepare(request(product_id, 2)).unwrap();
        let order_id = draft.id;
        service
            .commit(
                draft,
                &CreatedInvoice {
                    id: "inv-123".to_string(),
                    invoice_url: "https://pay.example/inv-123".to_string(),
                },
            )
            .unwrap();

        let loaded = store.find_order(order_id).unwrap().unwrap();
        assert_eq!(loaded.order.status, OrderStatus::AwaitingPayment);
        assert_eq!(loaded.order.total_amount, 24_000);
        let payment = loaded.payment.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.invoice_id, "inv-123");
        assert_eq!(payment.amount, 24_000);
        assert!(payment.paid_at.is_none());
        assert_eq!(store.product_stock(product_id), Some(3));
        assert!(store
            .find_order_by_invoice("inv-123")
            .unwrap()
            .is_some());
    }

    #[test]
    fn commit_rolls_back_on_insufficient_stock() {
        let store = Arc::new(InMemoryOrderStore::new());
        let product_id = Uuid::new_v4();
        store.add_product(product_id, "Mug", 12_000, 1);
        let service = service(&store);

        let draft = service.prepare(request(product_id, 3)).unwrap();
        let order_id = draft.id;
        let result = service.commit(
            draft,
            &CreatedInvoice {
                id: "inv-err".to_string(),
                invoice_url: "https://pay.example/inv-err".to_string(),
            },
        );

        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        assert!(store.find_order(order_id).unwrap().is_none());
        assert_eq!(store.product_stock(product_id), Some(1));
    }
}
