//! In-memory `OrderStore`, the reference implementation used by unit and
//! HTTP tests. A single mutex over the whole state gives every store
//! operation the same all-or-nothing visibility the SQL implementation gets
//! from transactions.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{
    NewOrderRecord, OrderItemView, OrderPage, OrderView, OrderWithPayment, PaymentView,
    ProductInfo,
};
use crate::domain::ports::OrderStore;
use crate::domain::status::{OrderStatus, PaymentStatus, StatusTransition};

#[derive(Debug, Clone)]
struct StoredProduct {
    name: String,
    price: i64,
    stock: i32,
}

#[derive(Debug, Clone)]
struct StoredOrder {
    order: OrderView,
    payment: PaymentView,
}

/// Mirror of an `order_outbox` row, kept so tests can assert on the
/// notification side effects of each transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub order_id: i64,
    pub event_type: String,
}

#[derive(Default)]
struct State {
    next_id: i64,
    orders: BTreeMap<i64, StoredOrder>,
    invoice_index: HashMap<String, i64>,
    products: HashMap<Uuid, StoredProduct>,
    events: Vec<RecordedEvent>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    state: Mutex<State>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, id: Uuid, name: &str, price: i64, stock: i32) {
        let mut state = self.state.lock().unwrap();
        state.products.insert(
            id,
            StoredProduct {
                name: name.to_string(),
                price,
                stock,
            },
        );
    }

    pub fn product_stock(&self, id: Uuid) -> Option<i32> {
        let state = self.state.lock().unwrap();
        state.products.get(&id).map(|p| p.stock)
    }

    pub fn recorded_events(&self) -> Vec<RecordedEvent> {
        let state = self.state.lock().unwrap();
        state.events.clone()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn next_order_id(&self) -> Result<i64, DomainError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        Ok(state.next_id)
    }

    fn product_info(&self, ids: &[Uuid]) -> Result<Vec<ProductInfo>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| {
                state.products.get(id).map(|p| ProductInfo {
                    id: *id,
                    name: p.name.clone(),
                    price: p.price,
                })
            })
            .collect())
    }

    fn create_order(&self, record: NewOrderRecord) -> Result<(), DomainError> {
        let mut state = self.state.lock().unwrap();

        // Validate every reservation before touching anything so a failure
        // leaves no partial decrement.
        for item in &record.items {
            let product = state
                .products
                .get(&item.product_id)
                .ok_or(DomainError::NotFound)?;
            if product.stock < item.quantity {
                return Err(DomainError::InvalidInput(format!(
                    "insufficient stock for product {}",
                    item.product_id
                )));
            }
        }
        for item in &record.items {
            if let Some(product) = state.products.get_mut(&item.product_id) {
                product.stock -= item.quantity;
            }
        }

        let items = record
            .items
            .iter()
            .map(|item| OrderItemView {
                id: Uuid::new_v4(),
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
            })
            .collect();

        state.invoice_index.insert(record.invoice_id.clone(), record.id);
        state.orders.insert(
            record.id,
            StoredOrder {
                order: OrderView {
                    id: record.id,
                    user_id: record.user_id,
                    total_amount: record.total_amount,
                    status: OrderStatus::AwaitingPayment,
                    created_at: record.created_at,
                    updated_at: record.created_at,
                    items,
                },
                payment: PaymentView {
                    id: record.id,
                    order_id: record.id,
                    invoice_id: record.invoice_id,
                    invoice_url: record.invoice_url,
                    amount: record.total_amount,
                    status: PaymentStatus::Pending,
                    paid_at: None,
                },
            },
        );
        state.events.push(RecordedEvent {
            order_id: record.id,
            event_type: "OrderPlaced".to_string(),
        });
        Ok(())
    }

    fn find_order(&self, id: i64) -> Result<Option<OrderWithPayment>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state.orders.get(&id).map(|stored| OrderWithPayment {
            order: stored.order.clone(),
            payment: Some(stored.payment.clone()),
        }))
    }

    fn find_order_by_invoice(
        &self,
        invoice_id: &str,
    ) -> Result<Option<OrderWithPayment>, DomainError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .invoice_index
            .get(invoice_id)
            .and_then(|id| state.orders.get(id))
            .map(|stored| OrderWithPayment {
                order: stored.order.clone(),
                payment: Some(stored.payment.clone()),
            }))
    }

    fn list_orders_for_user(
        &self,
        user_id: Uuid,
        page: i64,
        limit: i64,
    ) -> Result<OrderPage, DomainError> {
        let state = self.state.lock().unwrap();
        // Ids are monotonic, so descending id order is newest-first.
        let mine: Vec<&StoredOrder> = state
            .orders
            .values()
            .rev()
            .filter(|stored| stored.order.user_id == user_id)
            .collect();
        let total = mine.len() as i64;
        let offset = ((page - 1) * limit).max(0) as usize;
        let items = mine
            .into_iter()
            .skip(offset)
            .take(limit.max(0) as usize)
            .map(|stored| stored.order.clone())
            .collect();
        Ok(OrderPage { items, total })
    }

    fn apply_transition(
        &self,
        order_id: i64,
        transition: &StatusTransition,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().unwrap();
        let stored = match state.orders.get(&order_id) {
            Some(stored) => stored,
            None => return Err(DomainError::NotFound),
        };

        if stored.payment.status != PaymentStatus::Pending {
            return Ok(false);
        }
        if transition.order_status.is_some()
            && stored.order.status != OrderStatus::AwaitingPayment
        {
            return Ok(false);
        }

        let item_quantities: Vec<(Uuid, i32)> = stored
            .order
            .items
            .iter()
            .map(|item| (item.product_id, item.quantity))
            .collect();

        let now = Utc::now();
        let stored = state.orders.get_mut(&order_id).unwrap();
        stored.payment.status = transition.payment_status;
        if transition.set_paid_at {
            stored.payment.paid_at = Some(now);
        }
        if let Some(order_status) = transition.order_status {
            stored.order.status = order_status;
        }
        stored.order.updated_at = now;

        if transition.restore_stock {
            for (product_id, quantity) in item_quantities {
                if let Some(product) = state.products.get_mut(&product_id) {
                    product.stock += quantity;
                }
            }
        }
        state.events.push(RecordedEvent {
            order_id,
            event_type: transition.event_type().to_string(),
        });
        Ok(true)
    }

    fn advance_order_status(
        &self,
        order_id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.lock().unwrap();
        let stored = match state.orders.get_mut(&order_id) {
            Some(stored) => stored,
            None => return Err(DomainError::NotFound),
        };
        if stored.order.status != from {
            return Ok(false);
        }
        stored.order.status = to;
        stored.order.updated_at = Utc::now();
        state.events.push(RecordedEvent {
            order_id,
            event_type: "OrderStatusChanged".to_string(),
        });
        Ok(true)
    }
}
