use std::fmt::Display;

use fmp_common::Cents;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatusType, PaymentStatusType};

/// Payment intent states as reported by the card gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Succeeded,
    Processing,
    RequiresPaymentMethod,
    Failed,
    Canceled,
    /// Any status the engine does not act on, e.g. `requires_action`.
    Other(String),
}

impl GatewayStatus {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "succeeded" => Self::Succeeded,
            "processing" => Self::Processing,
            "requires_payment_method" => Self::RequiresPaymentMethod,
            "failed" | "payment_failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            other => Self::Other(other.to_string()),
        }
    }

    /// The `(order status, payment status)` pair a gateway status maps to, or `None` if it has no effect.
    pub fn target(&self) -> Option<(OrderStatusType, PaymentStatusType)> {
        match self {
            GatewayStatus::Succeeded => Some((OrderStatusType::Confirmed, PaymentStatusType::Completed)),
            GatewayStatus::Processing => Some((OrderStatusType::Pending, PaymentStatusType::Processing)),
            GatewayStatus::RequiresPaymentMethod | GatewayStatus::Failed | GatewayStatus::Canceled => {
                Some((OrderStatusType::PaymentFailed, PaymentStatusType::Failed))
            },
            GatewayStatus::Other(_) => None,
        }
    }
}

impl Display for GatewayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayStatus::Succeeded => write!(f, "succeeded"),
            GatewayStatus::Processing => write!(f, "processing"),
            GatewayStatus::RequiresPaymentMethod => write!(f, "requires_payment_method"),
            GatewayStatus::Failed => write!(f, "failed"),
            GatewayStatus::Canceled => write!(f, "canceled"),
            GatewayStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Whether the order may move from its current status pair to `target` in response to a gateway notification.
///
/// The order status must either stay the same or follow a lifecycle edge, and the payment status must move forward.
/// A `payment_failed` order that sees a successful payment is walked back through `pending` first, which is why the
/// two-step path `payment_failed -> pending -> confirmed` is accepted here.
pub fn is_reachable(
    current: (OrderStatusType, PaymentStatusType),
    target: (OrderStatusType, PaymentStatusType),
) -> bool {
    let (status, payment) = current;
    let (next_status, next_payment) = target;
    if !payment.can_progress_to(next_payment) {
        return false;
    }
    status == next_status ||
        status.can_transition_to(next_status) ||
        (status == OrderStatusType::PaymentFailed &&
            OrderStatusType::Pending.can_transition_to(next_status))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The order is already in the target state.
    Duplicate,
    /// The order has moved past the state this notification would produce.
    Stale,
    /// The gateway status carries no meaning for the order.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Applied(Order),
    NoOp { order: Order, reason: NoOpReason },
}

impl ReconcileOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ReconcileOutcome::Applied(order) => order,
            ReconcileOutcome::NoOp { order, .. } => order,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ReconcileOutcome::Applied(_))
    }
}

/// Returned to the buyer's client after an intent has been created or looked up for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentResponse {
    pub intent_ref: String,
    pub client_secret: Option<String>,
    pub amount: Cents,
    pub currency: String,
}

/// A read-only view of the payment state of an order, combining local state with the gateway's view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatusReport {
    pub order_status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub gateway_status: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::db_types::{OrderStatusType::*, PaymentStatusType as P};

    #[test]
    fn gateway_status_mapping() {
        assert_eq!(GatewayStatus::parse("succeeded").target(), Some((Confirmed, P::Completed)));
        assert_eq!(GatewayStatus::parse("processing").target(), Some((Pending, P::Processing)));
        assert_eq!(GatewayStatus::parse("requires_payment_method").target(), Some((PaymentFailed, P::Failed)));
        assert_eq!(GatewayStatus::parse("canceled").target(), Some((PaymentFailed, P::Failed)));
        assert_eq!(GatewayStatus::parse("requires_action").target(), None);
        assert_eq!(GatewayStatus::parse("requires_action").to_string(), "requires_action");
    }

    #[test]
    fn reachability() {
        assert!(is_reachable((Pending, P::Pending), (Confirmed, P::Completed)));
        assert!(is_reachable((Pending, P::Pending), (Pending, P::Processing)));
        assert!(is_reachable((Pending, P::Processing), (PaymentFailed, P::Failed)));
        assert!(is_reachable((PaymentFailed, P::Failed), (Confirmed, P::Completed)));
        assert!(is_reachable((PaymentFailed, P::Failed), (Pending, P::Processing)));
        // A late "processing" after success must not regress the order
        assert!(!is_reachable((Confirmed, P::Completed), (Pending, P::Processing)));
        assert!(!is_reachable((Confirmed, P::Completed), (PaymentFailed, P::Failed)));
        assert!(!is_reachable((OutForDelivery, P::Completed), (Confirmed, P::Completed)));
        assert!(!is_reachable((Cancelled, P::Pending), (Confirmed, P::Completed)));
    }
}
