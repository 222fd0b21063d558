//! Order and payment status vocabulary, and the mapping from the payment
//! gateway's status strings onto it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::errors::DomainError;

/// Fulfillment state of an order. Variants are declared in lifecycle order so
/// the derived `Ord` matches "how far along" an order is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    AwaitingPayment,
    Paid,
    ReadyForPickup,
    PickedUp,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::PickedUp => "PICKED_UP",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    /// The state an admin-driven transition must start from to reach `self`.
    /// Only fulfillment states (after payment) are reachable this way.
    pub fn fulfillment_predecessor(&self) -> Option<OrderStatus> {
        match self {
            OrderStatus::ReadyForPickup => Some(OrderStatus::Paid),
            OrderStatus::PickedUp => Some(OrderStatus::ReadyForPickup),
            OrderStatus::Completed => Some(OrderStatus::PickedUp),
            OrderStatus::AwaitingPayment | OrderStatus::Paid => None,
        }
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AWAITING_PAYMENT" => Ok(OrderStatus::AwaitingPayment),
            "PAID" => Ok(OrderStatus::Paid),
            "READY_FOR_PICKUP" => Ok(OrderStatus::ReadyForPickup),
            "PICKED_UP" => Ok(OrderStatus::PickedUp),
            "COMPLETED" => Ok(OrderStatus::Completed),
            other => Err(DomainError::InvalidInput(format!(
                "unknown order status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement state of a payment. `Pending` is the only state a payment can
/// leave; everything else is final.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Expired => "EXPIRED",
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Customer-facing label. Customers never see the internal vocabulary.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "FAILED" => Ok(PaymentStatus::Failed),
            "EXPIRED" => Ok(PaymentStatus::Expired),
            other => Err(DomainError::InvalidInput(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status vocabulary reported by the payment gateway, as a closed enum.
///
/// The gateway is free to invent new strings; anything outside the known set
/// parses to `Unknown` and is treated as "still pending" rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    Paid,
    Settled,
    Expired,
    Failed,
    Unknown(String),
}

impl GatewayStatus {
    /// Case-insensitive parse of a raw gateway status string.
    pub fn parse(raw: &str) -> GatewayStatus {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PAID" => GatewayStatus::Paid,
            "SETTLED" => GatewayStatus::Settled,
            "EXPIRED" => GatewayStatus::Expired,
            "FAILED" => GatewayStatus::Failed,
            _ => GatewayStatus::Unknown(raw.to_string()),
        }
    }
}

/// Internal state a gateway observation maps to: the payment status it
/// implies, and the order status change (if any) that goes with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTarget {
    pub payment: PaymentStatus,
    pub order: Option<OrderStatus>,
}

/// Map a gateway status onto internal statuses. Pure and total: unknown
/// gateway vocabulary lands on `Pending`/no-change instead of failing.
pub fn map_gateway_status(observed: &GatewayStatus) -> StatusTarget {
    match observed {
        GatewayStatus::Paid | GatewayStatus::Settled => StatusTarget {
            payment: PaymentStatus::Paid,
            order: Some(OrderStatus::Paid),
        },
        GatewayStatus::Expired => StatusTarget {
            payment: PaymentStatus::Expired,
            order: None,
        },
        GatewayStatus::Failed => StatusTarget {
            payment: PaymentStatus::Failed,
            order: None,
        },
        GatewayStatus::Unknown(_) => StatusTarget {
            payment: PaymentStatus::Pending,
            order: None,
        },
    }
}

/// A status change the reconciliation engine asks the store to apply.
///
/// The store commits all of it in one transaction, conditionally: the payment
/// write only applies while the payment is still `PENDING`, the order write
/// only while the order is still `AWAITING_PAYMENT`. A command that finds
/// neither precondition holding applies nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTransition {
    pub payment_status: PaymentStatus,
    pub order_status: Option<OrderStatus>,
    pub set_paid_at: bool,
    pub restore_stock: bool,
}

impl StatusTransition {
    /// Build the transition a mapped target calls for.
    pub fn for_target(target: StatusTarget) -> StatusTransition {
        StatusTransition {
            payment_status: target.payment,
            order_status: target.order,
            set_paid_at: target.payment == PaymentStatus::Paid,
            restore_stock: target.payment == PaymentStatus::Expired,
        }
    }

    /// Outbox event type recorded alongside this transition.
    pub fn event_type(&self) -> &'static str {
        match self.payment_status {
            PaymentStatus::Paid => "OrderPaid",
            PaymentStatus::Expired => "PaymentExpired",
            PaymentStatus::Failed => "PaymentFailed",
            PaymentStatus::Pending => "PaymentPending",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paid_and_settled_map_to_paid_paid() {
        for status in [GatewayStatus::Paid, GatewayStatus::Settled] {
            let target = map_gateway_status(&status);
            assert_eq!(target.payment, PaymentStatus::Paid);
            assert_eq!(target.order, Some(OrderStatus::Paid));
        }
    }

    #[test]
    fn expired_maps_to_expired_payment_order_unchanged() {
        let target = map_gateway_status(&GatewayStatus::Expired);
        assert_eq!(target.payment, PaymentStatus::Expired);
        assert_eq!(target.order, None);
    }

    #[test]
    fn failed_maps_to_failed_payment_order_unchanged() {
        let target = map_gateway_status(&GatewayStatus::Failed);
        assert_eq!(target.payment, PaymentStatus::Failed);
        assert_eq!(target.order, None);
    }

    #[test]
    fn unknown_status_defaults_to_pending() {
        let target = map_gateway_status(&GatewayStatus::parse("SOME_UNKNOWN_STATUS"));
        assert_eq!(target.payment, PaymentStatus::Pending);
        assert_eq!(target.order, None);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(GatewayStatus::parse("paid"), GatewayStatus::Paid);
        assert_eq!(GatewayStatus::parse("Settled"), GatewayStatus::Settled);
        assert_eq!(GatewayStatus::parse(" expired "), GatewayStatus::Expired);
        assert_eq!(GatewayStatus::parse("fAiLeD"), GatewayStatus::Failed);
    }

    #[test]
    fn parse_keeps_unknown_raw_value() {
        assert_eq!(
            GatewayStatus::parse("VOIDED"),
            GatewayStatus::Unknown("VOIDED".to_string())
        );
    }

    #[test]
    fn order_status_ordering_follows_lifecycle() {
        assert!(OrderStatus::AwaitingPayment < OrderStatus::Paid);
        assert!(OrderStatus::Paid < OrderStatus::ReadyForPickup);
        assert!(OrderStatus::ReadyForPickup < OrderStatus::PickedUp);
        assert!(OrderStatus::PickedUp < OrderStatus::Completed);
    }

    #[test]
    fn order_status_roundtrips_through_strings() {
        for status in [
            OrderStatus::AwaitingPayment,
            OrderStatus::Paid,
            OrderStatus::ReadyForPickup,
            OrderStatus::PickedUp,
            OrderStatus::Completed,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn fulfillment_predecessors_form_the_admin_chain() {
        assert_eq!(
            OrderStatus::ReadyForPickup.fulfillment_predecessor(),
            Some(OrderStatus::Paid)
        );
        assert_eq!(
            OrderStatus::PickedUp.fulfillment_predecessor(),
            Some(OrderStatus::ReadyForPickup)
        );
        assert_eq!(
            OrderStatus::Completed.fulfillment_predecessor(),
            Some(OrderStatus::PickedUp)
        );
        assert_eq!(OrderStatus::Paid.fulfillment_predecessor(), None);
        assert_eq!(OrderStatus::AwaitingPayment.fulfillment_predecessor(), None);
    }

    #[test]
    fn settled_payment_statuses() {
        assert!(!PaymentStatus::Pending.is_settled());
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Failed.is_settled());
        assert!(PaymentStatus::Expired.is_settled());
    }

    #[test]
    fn transition_for_paid_target_sets_paid_at() {
        let t = StatusTransition::for_target(map_gateway_status(&GatewayStatus::Paid));
        assert!(t.set_paid_at);
        assert!(!t.restore_stock);
        assert_eq!(t.order_status, Some(OrderStatus::Paid));
    }

    #[test]
    fn transition_for_expired_target_restores_stock() {
        let t = StatusTransition::for_target(map_gateway_status(&GatewayStatus::Expired));
        assert!(!t.set_paid_at);
        assert!(t.restore_stock);
        assert_eq!(t.order_status, None);
    }
}
