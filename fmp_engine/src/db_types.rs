use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use fmp_common::Cents;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::traits::MarketError;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------       ProductId       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for ProductId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// Order identifiers are minted by the engine as random v4 UUIDs when a checkout begins. The same identifier keys the
/// stock reservations taken out for that checkout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

//--------------------------------------         Role          ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Farmer,
    Admin,
    /// The engine itself, e.g. the payment reconciler or a background worker.
    System,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Farmer => write!(f, "farmer"),
            Role::Admin => write!(f, "admin"),
            Role::System => write!(f, "system"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "farmer" => Ok(Self::Farmer),
            "admin" => Ok(Self::Admin),
            "system" => Ok(Self::System),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// The authenticated caller of an engine operation. Authentication itself happens upstream; the engine only checks
/// that the role and subject are allowed to perform the requested action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub subject_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new<S: Into<String>>(subject_id: S, role: Role) -> Self {
        Self { subject_id: subject_id.into(), role }
    }

    pub fn customer<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Customer)
    }

    pub fn farmer<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Farmer)
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn system() -> Self {
        Self::new("system", Role::System)
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.subject_id)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// The order was placed and is awaiting payment.
    Pending,
    /// The payment gateway reported a failed payment. The buyer may retry.
    PaymentFailed,
    /// Payment succeeded.
    Confirmed,
    /// A farmer has started preparing the order.
    Preparing,
    /// Packed and waiting for pickup or a driver.
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatusType {
    pub const ALL: [OrderStatusType; 8] = [
        OrderStatusType::Pending,
        OrderStatusType::PaymentFailed,
        OrderStatusType::Confirmed,
        OrderStatusType::Preparing,
        OrderStatusType::Ready,
        OrderStatusType::OutForDelivery,
        OrderStatusType::Delivered,
        OrderStatusType::Cancelled,
    ];

    /// The lifecycle edges an order may follow. Anything not listed here is an invalid transition.
    pub fn can_transition_to(&self, next: OrderStatusType) -> bool {
        use OrderStatusType::*;
        matches!(
            (self, next),
            (Pending, Confirmed) |
                (Pending, PaymentFailed) |
                (Pending, Cancelled) |
                (PaymentFailed, Pending) |
                (PaymentFailed, Cancelled) |
                (Confirmed, Preparing) |
                (Confirmed, Cancelled) |
                (Preparing, Ready) |
                (Preparing, Cancelled) |
                (Ready, OutForDelivery) |
                (Ready, Cancelled) |
                (OutForDelivery, Delivered)
        )
    }

    /// Every status from which `self` may legally be reached in a single step.
    pub fn predecessors(&self) -> Vec<OrderStatusType> {
        Self::ALL.iter().copied().filter(|s| s.can_transition_to(*self)).collect()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatusType::Delivered | OrderStatusType::Cancelled)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "pending"),
            OrderStatusType::PaymentFailed => write!(f, "payment_failed"),
            OrderStatusType::Confirmed => write!(f, "confirmed"),
            OrderStatusType::Preparing => write!(f, "preparing"),
            OrderStatusType::Ready => write!(f, "ready"),
            OrderStatusType::OutForDelivery => write!(f, "out_for_delivery"),
            OrderStatusType::Delivered => write!(f, "delivered"),
            OrderStatusType::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "payment_failed" => Ok(Self::PaymentFailed),
            "confirmed" => Ok(Self::Confirmed),
            "preparing" => Ok(Self::Preparing),
            "ready" => Ok(Self::Ready),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to pending");
            OrderStatusType::Pending
        })
    }
}

//--------------------------------------  PaymentStatusType    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatusType {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatusType {
    /// Payment status may only move forward. `Failed` can be retried, `Completed` is final.
    pub fn can_progress_to(&self, next: PaymentStatusType) -> bool {
        use PaymentStatusType::*;
        matches!(
            (self, next),
            (Pending, Processing) |
                (Pending, Completed) |
                (Pending, Failed) |
                (Processing, Completed) |
                (Processing, Failed) |
                (Failed, Processing) |
                (Failed, Completed)
        )
    }
}

impl Display for PaymentStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatusType::Pending => write!(f, "pending"),
            PaymentStatusType::Processing => write!(f, "processing"),
            PaymentStatusType::Completed => write!(f, "completed"),
            PaymentStatusType::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PaymentStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------       Product         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub farmer_id: String,
    pub name: String,
    pub unit: String,
    pub price: Cents,
    pub stock: i64,
    pub units_sold: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub farmer_id: String,
    pub name: String,
    pub unit: String,
    pub price: Cents,
    pub stock: i64,
}

impl NewProduct {
    pub fn new<P: Into<ProductId>, S: Into<String>>(id: P, farmer_id: S, name: S, price: Cents, stock: i64) -> Self {
        Self { id: id.into(), farmer_id: farmer_id.into(), name: name.into(), unit: "each".into(), price, stock }
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = unit.into();
        self
    }
}

//--------------------------------------       CartLine        ---------------------------------------------------------
/// A single line in a buyer's cart. Lines are keyed on `(buyer_id, product_id)`; adding the same product again
/// increases the quantity of the existing line.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartLine {
    pub id: i64,
    pub buyer_id: String,
    pub product_id: ProductId,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the catalog at read time. Prices are never stored in the cart.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ResolvedCartLine {
    pub line_id: i64,
    pub product_id: ProductId,
    pub product_name: String,
    pub farmer_id: String,
    pub quantity: i64,
    pub unit_price: Cents,
    pub available_stock: i64,
}

impl ResolvedCartLine {
    /// `None` if the line total does not fit in `Cents`.
    pub fn line_total(&self) -> Option<Cents> {
        self.unit_price.checked_mul(self.quantity)
    }
}

//--------------------------------------   DeliveryAddress     ---------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl DeliveryAddress {
    pub fn new<S: Into<String>>(street: S, city: S, state: S, zip_code: S, country: S) -> Self {
        Self {
            street: street.into(),
            city: city.into(),
            state: state.into(),
            zip_code: zip_code.into(),
            country: country.into(),
        }
    }

    /// Returns the names of any fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zip_code", &self.zip_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect()
    }
}

//--------------------------------------       OrderItem       ---------------------------------------------------------
/// A line item captured at checkout. The product name and unit price are copied so that later catalog edits never
/// change order history.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub farmer_id: String,
    pub quantity: i64,
    pub unit_price: Cents,
}

impl OrderItem {
    /// `None` if the line total does not fit in `Cents`.
    pub fn line_total(&self) -> Option<Cents> {
        self.unit_price.checked_mul(self.quantity)
    }
}

impl From<ResolvedCartLine> for OrderItem {
    fn from(line: ResolvedCartLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name,
            farmer_id: line.farmer_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub buyer_id: String,
    pub total_amount: Cents,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_status: PaymentStatusType,
    pub payment_method: String,
    pub payment_intent_ref: Option<String>,
    #[sqlx(flatten)]
    pub delivery_address: DeliveryAddress,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn farmer_ids(&self) -> Vec<&str> {
        let mut ids = self.items.iter().map(|i| i.farmer_id.as_str()).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn involves_farmer(&self, farmer_id: &str) -> bool {
        self.items.iter().any(|i| i.farmer_id == farmer_id)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The id minted when the checkout began. Reservations for this order are keyed on it.
    pub order_id: OrderId,
    pub buyer_id: String,
    pub items: Vec<OrderItem>,
    pub currency: String,
    pub payment_method: String,
    pub delivery_address: DeliveryAddress,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new<S: Into<String>>(
        order_id: OrderId,
        buyer_id: S,
        items: Vec<OrderItem>,
        delivery_address: DeliveryAddress,
        payment_method: S,
    ) -> Self {
        Self {
            order_id,
            buyer_id: buyer_id.into(),
            items,
            currency: fmp_common::DEFAULT_CURRENCY_CODE.to_string(),
            payment_method: payment_method.into(),
            delivery_address,
            notes: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    /// The order total is always the sum of the line totals. It is never accepted from a caller.
    ///
    /// Fails with `ValidationError` if the total cannot be represented.
    pub fn total_amount(&self) -> Result<Cents, MarketError> {
        self.items
            .iter()
            .map(OrderItem::line_total)
            .collect::<Option<Vec<_>>>()
            .and_then(Cents::checked_sum)
            .ok_or_else(|| MarketError::ValidationError(format!("The total for order {} is too large", self.order_id)))
    }
}

//--------------------------------------   StockReservation    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationState {
    /// Stock has been taken out of the ledger on behalf of a checkout that has not finished yet.
    Held,
    /// The checkout produced an order. The stock now belongs to that order.
    Committed,
    /// The stock was given back, either by compensation, expiry or cancellation.
    Released,
}

impl Display for ReservationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationState::Held => write!(f, "held"),
            ReservationState::Committed => write!(f, "committed"),
            ReservationState::Released => write!(f, "released"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StockReservation {
    pub id: i64,
    pub checkout_id: String,
    pub product_id: ProductId,
    pub quantity: i64,
    pub state: ReservationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------  PaymentIntentRecord  ---------------------------------------------------------
/// The engine's local mirror of a gateway payment intent.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentIntentRecord {
    pub intent_ref: String,
    pub order_id: OrderId,
    pub status: String,
    pub amount: Cents,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventOutcome {
    Applied,
    Duplicate,
    Stale,
    Ignored,
}

impl Display for PaymentEventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentEventOutcome::Applied => write!(f, "applied"),
            PaymentEventOutcome::Duplicate => write!(f, "duplicate"),
            PaymentEventOutcome::Stale => write!(f, "stale"),
            PaymentEventOutcome::Ignored => write!(f, "ignored"),
        }
    }
}

/// An audit entry for every gateway status notification the reconciler has seen.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PaymentEvent {
    pub id: i64,
    pub intent_ref: String,
    pub gateway_status: String,
    pub amount: Option<Cents>,
    pub outcome: PaymentEventOutcome,
    pub created_at: DateTime<Utc>,
}
