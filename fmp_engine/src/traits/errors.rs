use fmp_common::Cents;
use thiserror::Error;

use crate::db_types::{OrderId, OrderStatusType, ProductId};

/// Coarse classification of a [`MarketError`]. Callers map these onto their own transport (HTTP status codes, CLI
/// exit codes and so on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Upstream,
    Internal,
}

#[derive(Debug, Clone, Error)]
pub enum MarketError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Cart line {0} does not exist")]
    CartLineNotFound(i64),
    #[error("No payment intent with reference {0} is known")]
    PaymentIntentNotFound(String),
    #[error("Insufficient stock for {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: ProductId, requested: i64, available: i64 },
    #[error("Cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Order {order_id} is already bound to payment intent {existing}")]
    IntentAlreadyBound { order_id: OrderId, existing: String },
    #[error("Payment intent {0} is already bound to another order")]
    IntentInUse(String),
    #[error("The cart is empty")]
    EmptyCart,
    #[error("Stock for {product_id} is already reserved by checkout {checkout_id}")]
    DuplicateReservation { checkout_id: String, product_id: ProductId },
    #[error("The reservations for checkout {0} have expired")]
    CheckoutExpired(OrderId),
    #[error("Payment amount {actual} does not match the order total of {expected}")]
    AmountMismatch { expected: Cents, actual: Cents },
    #[error("Permission denied. {0}")]
    PermissionDenied(String),
    #[error("The payment gateway returned an error. {0}")]
    UpstreamError(String),
    #[error("Stock could not be returned for checkout {checkout_id}. It will be recovered by the repair worker. {reason}")]
    CompensationPending { checkout_id: String, reason: String },
    #[error("The order status changed concurrently too many times. Giving up on {0}")]
    ContentionLimitReached(OrderId),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        use MarketError::*;
        match self {
            ValidationError(_) | EmptyCart | AmountMismatch { .. } => ErrorKind::Validation,
            ProductNotFound(_) | OrderNotFound(_) | CartLineNotFound(_) | PaymentIntentNotFound(_) => {
                ErrorKind::NotFound
            },
            InsufficientStock { .. } |
            InvalidTransition { .. } |
            IntentAlreadyBound { .. } |
            IntentInUse(_) |
            DuplicateReservation { .. } |
            CheckoutExpired(_) |
            ContentionLimitReached(_) => ErrorKind::Conflict,
            PermissionDenied(_) => ErrorKind::Forbidden,
            UpstreamError(_) => ErrorKind::Upstream,
            DatabaseError(_) | CompensationPending { .. } => ErrorKind::Internal,
        }
    }
}

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        MarketError::DatabaseError(e.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_kinds() {
        let e = MarketError::InsufficientStock { product_id: "A".into(), requested: 3, available: 2 };
        assert_eq!(e.kind(), ErrorKind::Conflict);
        assert_eq!(e.to_string(), "Insufficient stock for A. Requested 3, but only 2 available");
        assert_eq!(MarketError::EmptyCart.kind(), ErrorKind::Validation);
        assert_eq!(MarketError::OrderNotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(MarketError::PermissionDenied("no".into()).kind(), ErrorKind::Forbidden);
        assert_eq!(MarketError::UpstreamError("502".into()).kind(), ErrorKind::Upstream);
        let e = MarketError::from(sqlx::Error::RowNotFound);
        assert_eq!(e.kind(), ErrorKind::Internal);
    }
}
