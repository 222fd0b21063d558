//! Admin-driven fulfillment transitions. These never talk to the gateway:
//! the only rule is that each step starts from its immediate predecessor
//! (PAID → READY_FOR_PICKUP → PICKED_UP → COMPLETED), enforced both here and
//! by the store's conditional update.

use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::order::OrderView;
use crate::domain::ports::OrderStore;
use crate::domain::status::OrderStatus;

pub struct FulfillmentService {
    store: Arc<dyn OrderStore>,
}

impl FulfillmentService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    pub fn advance(&self, order_id: i64, target: OrderStatus) -> Result<OrderView, DomainError> {
        let from = target.fulfillment_predecessor().ok_or_else(|| {
            DomainError::InvalidInput(format!("{target} is not an assignable fulfillment status"))
        })?;

        let loaded = self
            .store
            .find_order(order_id)?
            .ok_or(DomainError::NotFound)?;
        if loaded.order.status != from {
            return Err(DomainError::InvalidInput(format!(
                "order {order_id} is {}, cannot move to {target}",
                loaded.order.status
            )));
        }

        let applied = self.store.advance_order_status(order_id, from, target)?;
        if !applied {
            return Err(DomainError::InvalidInput(format!(
                "order {order_id} changed concurrently, cannot move to {target}"
            )));
        }

        log::info!("order {order_id}: fulfillment {from} -> {target}");
        let refreshed = self
            .store
            .find_order(order_id)?
            .ok_or(DomainError::NotFound)?;
        Ok(refreshed.order)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::order::{NewOrderRecord, PricedItem};
    use crate::domain::status::{GatewayStatus, PaymentStatus};
    use crate::application::reconciliation::ReconciliationEngine;
    use crate::infrastructure::in_memory::InMemoryOrderStore;

    fn paid_order(store: &Arc<InMemoryOrderStore>) -> i64 {
        let product_id = Uuid::new_v4();
        store.add_product(product_id, "Tote bag", 9_000, 10);
        let order_id = store.next_order_id().unwrap();
        store
            .create_order(NewOrderRecord {
                id: order_id,
                user_id: Uuid::new_v4(),
                total_amount: 9_000,
                created_at: Utc::now(),
                items: vec![PricedItem {
                    product_id,
                    name: "Tote bag".to_string(),
                    quantity: 1,
                    unit_price: 9_000,
                }],
                invoice_id: format!("inv-{order_id}"),
                invoice_url: "https://pay.example/inv".to_string(),
            })
            .unwrap();
        ReconciliationEngine::new(store.clone() as Arc<dyn OrderStore>)
            .reconcile(order_id, &GatewayStatus::Paid)
            .unwrap();
        order_id
    }

    #[test]
    fn advances_through_the_full_chain() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order_id = paid_order(&store);
        let service = FulfillmentService::new(store.clone() as Arc<dyn OrderStore>);

        for target in [
            OrderStatus::ReadyForPickup,
            OrderStatus::PickedUp,
            OrderStatus::Completed,
        ] {
            let order = service.advance(order_id, target).unwrap();
            assert_eq!(order.status, target);
        }
    }

    #[test]
    fn rejects_skipping_a_step() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order_id = paid_order(&store);
        let service = FulfillmentService::new(store.clone() as Arc<dyn OrderStore>);

        let result = service.advance(order_id, OrderStatus::PickedUp);
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn rejects_moving_backward() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order_id = paid_order(&store);
        let service = FulfillmentService::new(store.clone() as Arc<dyn OrderStore>);
        service.advance(order_id, OrderStatus::ReadyForPickup).unwrap();
        service.advance(order_id, OrderStatus::PickedUp).unwrap();

        let result = service.advance(order_id, OrderStatus::ReadyForPickup);
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn rejects_non_fulfillment_targets() {
        let store = Arc::new(InMemoryOrderStore::new());
        let order_id = paid_order(&store);
        let service = FulfillmentService::new(store.clone() as Arc<dyn OrderStore>);

        for target in [OrderStatus::AwaitingPayment, OrderStatus::Paid] {
            let result = service.advance(order_id, target);
            assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        }
    }

    #[test]
    fn rejects_unpaid_orders() {
        let store = Arc::new(InMemoryOrderStore::new());
        let product_id = Uuid::new_v4();
        store.add_product(product_id, "Tote bag", 9_000, 10);
        let order_id = store.next_order_id().unwrap();
        store
            .create_order(NewOrderRecord {
                id: order_id,
                user_id: Uuid::new_v4(),
                total_amount: 9_000,
                created_at: Utc::now(),
                items: vec![PricedItem {
                    product_id,
                    name: "Tote bag".to_string(),
                    quantity: 1,
                    unit_price: 9_000,
                }],
                invoice_id: format!("inv-{order_id}"),
                invoice_url: "https://pay.example/inv".to_string(),
            })
            .unwrap();
        let service = FulfillmentService::new(store.clone() as Arc<dyn OrderStore>);

        let result = service.advance(order_id, OrderStatus::ReadyForPickup);
        assert!(matches!(result, Err(DomainError::InvalidInput(_))));
        // Payment untouched by the attempt.
        let loaded = store.find_order(order_id).unwrap().unwrap();
        assert_eq!(loaded.payment.unwrap().status, PaymentStatus::Pending);
    }

    #[test]
    fn unknown_order_is_not_found() {
        let store = Arc::new(InMemoryOrderStore::new());
        let service = FulfillmentService::new(store as Arc<dyn OrderStore>);
        let result = service.advance(99, OrderStatus::ReadyForPickup);
        assert!(matches!(result, Err(DomainError::NotFound)));
    }
}
