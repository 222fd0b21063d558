//! The reconciliation engine: given an order and a freshly observed gateway
//! status, decide whether a transition is due and ask the store to apply it
//! atomically.
//!
//! The engine performs no network I/O. Entry points fetch the gateway status
//! (or, for the success redirect, stand in for it) and hand the observation
//! here, which keeps the state machine testable against any `OrderStore`.

use std::sync::Arc;

use crate::domain::errors::DomainError;
use crate::domain::ports::OrderStore;
use crate::domain::status::{
    map_gateway_status, GatewayStatus, OrderStatus, PaymentStatus, StatusTransition,
};

/// Outcome of one reconcile attempt, used by callers to decide whether to
/// notify. `changed == false` covers every no-op: already settled, terminal
/// order state, pending observation, or a lost race.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    pub changed: bool,
    pub old_order_status: OrderStatus,
    pub new_order_status: OrderStatus,
    pub old_payment_status: PaymentStatus,
    pub new_payment_status: PaymentStatus,
}

impl ReconcileResult {
    fn unchanged(order: OrderStatus, payment: PaymentStatus) -> ReconcileResult {
        ReconcileResult {
            changed: false,
            old_order_status: order,
            new_order_status: order,
            old_payment_status: payment,
            new_payment_status: payment,
        }
    }
}

pub struct ReconciliationEngine {
    store: Arc<dyn OrderStore>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Reconcile the order against an observed gateway status.
    ///
    /// Idempotent: repeating the same observation reports `changed: false`
    /// and leaves the persisted state untouched. An order whose fulfillment
    /// has progressed past AWAITING_PAYMENT is never regressed, and a settled
    /// payment is never rewritten.
    pub fn reconcile(
        &self,
        order_id: i64,
        observed: &GatewayStatus,
    ) -> Result<ReconcileResult, DomainError> {
        let loaded = self
            .store
            .find_order(order_id)?
            .ok_or(DomainError::NotFound)?;
        let payment = loaded.payment.as_ref().ok_or(DomainError::NotFound)?;
        let order = &loaded.order;

        if order.status > OrderStatus::AwaitingPayment {
            return Ok(ReconcileResult::unchanged(order.status, payment.status));
        }
        if payment.status.is_settled() {
            return Ok(ReconcileResult::unchanged(order.status, payment.status));
        }

        let target = map_gateway_status(observed);
        if !target.payment.is_settled() {
            if let GatewayStatus::Unknown(raw) = observed {
                log::warn!(
                    "order {}: unrecognized gateway status '{}', leaving payment pending",
                    order_id,
                    raw
                );
            }
            return Ok(ReconcileResult::unchanged(order.status, payment.status));
        }

        let transition = StatusTransition::for_target(target);
        let applied = self.store.apply_transition(order_id, &transition)?;
        if !applied {
            // A concurrent reconciler committed first; report its outcome.
            let fresh = self
                .store
                .find_order(order_id)?
                .ok_or(DomainError::NotFound)?;
            let fresh_payment = fresh.payment.as_ref().ok_or(DomainError::NotFound)?;
            return Ok(ReconcileResult::unchanged(
                fresh.order.status,
                fresh_payment.status,
            ));
        }

        let new_order_status = transition.order_status.unwrap_or(order.status);
        log::info!(
            "order {}: payment {} -> {}, order {} -> {}",
            order_id,
            payment.status,
            transition.payment_status,
            order.status,
            new_order_status
        );
        Ok(ReconcileResult {
            changed: true,
            old_order_status: order.status,
            new_order_status,
            old_payment_status: payment.status,
            new_payment_status: transition.payment_status,
        })
    }

    /// Confirm payment after the customer landed on the success-redirect URL.
    ///
    /// The gateway only redirects to this URL after a completed payment, so
    /// arrival is accepted as a PAID observation without a live status call.
    /// This is a deliberate trust boundary that covers delayed or blocked
    /// webhooks; the webhook and poll paths reconcile the same order later
    /// and no-op. An already-paid order reports `changed: false`.
    pub fn confirm_success_redirect(&self, order_id: i64) -> Result<ReconcileResult, DomainError> {
        self.reconcile(order_id, &GatewayStatus::Paid)
    }
}
