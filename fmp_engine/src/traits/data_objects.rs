use fmp_common::Cents;
use serde::{Deserialize, Serialize};

use crate::db_types::{OrderStatusType, PaymentStatusType};

/// A compare-and-set request against an order's status pair.
///
/// The update is applied only if the order's current status is one of `expected_status` (and, when given, its payment
/// status equals `expected_payment_status`). Otherwise nothing is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub expected_status: Vec<OrderStatusType>,
    pub expected_payment_status: Option<PaymentStatusType>,
    pub new_status: OrderStatusType,
    pub new_payment_status: Option<PaymentStatusType>,
}

impl StatusChange {
    /// A transition to `new_status` from any of its legal predecessors.
    pub fn to(new_status: OrderStatusType) -> Self {
        Self {
            expected_status: new_status.predecessors(),
            expected_payment_status: None,
            new_status,
            new_payment_status: None,
        }
    }

    pub fn from_status(mut self, status: OrderStatusType) -> Self {
        self.expected_status = vec![status];
        self
    }

    pub fn with_expected_payment_status(mut self, status: PaymentStatusType) -> Self {
        self.expected_payment_status = Some(status);
        self
    }

    pub fn with_payment_status(mut self, status: PaymentStatusType) -> Self {
        self.new_payment_status = Some(status);
        self
    }
}

/// A payment intent as the gateway reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIntent {
    pub intent_ref: String,
    pub status: String,
    pub amount: Cents,
    pub currency: String,
    /// Handed to the buyer's client to complete the payment. Never logged.
    pub client_secret: Option<String>,
}
