use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use vmc_common::Cents;

/// The number of units of every linked ingredient that one drink consumes. A drink can only be sold when each of
/// its ingredients has at least this much stock.
pub const INGREDIENT_UNITS_PER_DRINK: i64 = 2;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------       MenuItem        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: Cents,
    pub availability: bool,
}

#[derive(Debug, Clone)]
pub struct NewMenuItem {
    pub name: String,
    pub category: String,
    pub price: Cents,
    pub availability: bool,
}

impl NewMenuItem {
    pub fn new<S: Into<String>>(name: S, category: S, price: Cents) -> Self {
        Self { name: name.into(), category: category.into(), price, availability: true }
    }

    pub fn unavailable(mut self) -> Self {
        self.availability = false;
        self
    }
}

//--------------------------------------     InventoryItem     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryItem {
    #[sqlx(rename = "inventory_id")]
    pub id: i64,
    #[sqlx(rename = "inventory_name")]
    pub name: String,
    pub amount: i64,
}

/// One ingredient line of a drink's recipe. `name` and `amount` are `None` when the link points at an inventory row
/// that no longer exists.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecipeLine {
    pub inventory_id: i64,
    pub inventory_name: Option<String>,
    pub amount: Option<i64>,
}

//--------------------------------------         User          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub name: String,
    pub phone_number: Option<String>,
    pub chat_id: Option<String>,
    pub rfid_card_id: Option<String>,
    pub credit: Cents,
}

#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub name: String,
    pub phone_number: Option<String>,
    pub chat_id: Option<String>,
    pub rfid_card_id: Option<String>,
    pub credit: Cents,
}

impl NewUser {
    pub fn new<S: Into<String>>(name: S, credit: Cents) -> Self {
        Self { name: name.into(), credit, ..Default::default() }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone_number = Some(phone.into());
        self
    }

    pub fn with_chat_id<S: Into<String>>(mut self, chat_id: S) -> Self {
        self.chat_id = Some(chat_id.into());
        self
    }

    pub fn with_rfid<S: Into<String>>(mut self, card: S) -> Self {
        self.rfid_card_id = Some(card.into());
        self
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created. Nothing has been paid or dispensed yet.
    Pending,
    /// Payment for the order has been recorded and a sale appended to the ledger.
    Paid,
    /// The dispenser is working on the order.
    Preparing,
    /// The drink was dispensed.
    Completed,
    /// The dispenser reported a failure while preparing the drink.
    Failed,
}

impl OrderStatusType {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Paid => 1,
            Self::Preparing => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    /// Statuses only ever move forward. `Pending` may skip `Paid` and go straight to `Preparing`.
    pub fn can_advance_to(&self, next: OrderStatusType) -> bool {
        next.rank() > self.rank()
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Preparing => write!(f, "Preparing"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Preparing" => Ok(Self::Preparing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------      OrderSource      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderSource {
    /// Entered on the kiosk keypad
    Local,
    /// Placed through the remote ordering service
    Remote,
}

impl Display for OrderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSource::Local => write!(f, "local"),
            OrderSource::Remote => write!(f, "remote"),
        }
    }
}

//--------------------------------------     PaymentMethod     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    #[sqlx(rename = "RFID")]
    #[serde(rename = "RFID")]
    Rfid,
    #[sqlx(rename = "QR")]
    #[serde(rename = "QR")]
    Qr,
    Card,
    /// Settled by the remote ordering service before the order reached the kiosk
    Remote,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Rfid => write!(f, "RFID"),
            PaymentMethod::Qr => write!(f, "QR"),
            PaymentMethod::Card => write!(f, "Card"),
            PaymentMethod::Remote => write!(f, "Remote"),
        }
    }
}

//--------------------------------------         Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,
    pub item_id: i64,
    pub user_id: Option<i64>,
    pub source: OrderSource,
    pub status: OrderStatusType,
    #[sqlx(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub transaction_id: Option<String>,
    #[sqlx(rename = "payment_source")]
    pub payment_method: Option<PaymentMethod>,
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub item_id: i64,
    pub user_id: Option<i64>,
    pub source: OrderSource,
    pub payment_method: Option<PaymentMethod>,
}

impl NewOrder {
    pub fn local(item_id: i64) -> Self {
        Self { item_id, user_id: None, source: OrderSource::Local, payment_method: None }
    }

    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }
}

//--------------------------------------      RemoteOrder      ---------------------------------------------------------
/// An order as reported by the remote ordering service. `order_id` is assigned upstream and is used verbatim as the
/// local primary key, which is what makes repeated polling idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub order_id: i64,
    pub item_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrderResult {
    Inserted(i64),
    AlreadyExists(i64),
}

impl InsertOrderResult {
    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }
}

//--------------------------------------      PendingWork      ---------------------------------------------------------
/// The next order the dispenser should work on.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PendingWork {
    pub order_id: i64,
    pub item_id: i64,
    pub source: OrderSource,
    pub user_id: Option<i64>,
}

//--------------------------------------         Sale          ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Sale {
    pub sale_id: i64,
    pub order_id: i64,
    pub item_id: i64,
    #[sqlx(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
    pub price: Cents,
    pub source: OrderSource,
    #[sqlx(rename = "payment_source")]
    pub payment_method: PaymentMethod,
}

/// The details needed to settle an order. When `user_id` is `None` (cash, or settled upstream) no credit is debited.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: i64,
    pub user_id: Option<i64>,
    pub price: Cents,
    pub method: PaymentMethod,
}

impl PaymentRequest {
    pub fn new(order_id: i64, user_id: Option<i64>, price: Cents, method: PaymentMethod) -> Self {
        Self { order_id, user_id, price, method }
    }
}

//--------------------------------------     CollectionQr      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CollectionStatus {
    Pending,
    Collected,
}

impl Display for CollectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectionStatus::Pending => write!(f, "Pending"),
            CollectionStatus::Collected => write!(f, "Collected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CollectionQr {
    pub id: i64,
    pub order_id: i64,
    pub phone_number: Option<String>,
    pub chat_id: Option<String>,
    #[sqlx(rename = "qr_code")]
    pub code: String,
    pub status: CollectionStatus,
    #[sqlx(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCollectionQr {
    pub order_id: i64,
    pub phone_number: Option<String>,
    pub chat_id: Option<String>,
    pub code: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use OrderStatusType::*;

    #[test]
    fn status_transitions_only_move_forward() {
        assert!(Pending.can_advance_to(Paid));
        assert!(Pending.can_advance_to(Preparing));
        assert!(Paid.can_advance_to(Preparing));
        assert!(Preparing.can_advance_to(Completed));
        assert!(Preparing.can_advance_to(Failed));
        assert!(!Paid.can_advance_to(Pending));
        assert!(!Completed.can_advance_to(Preparing));
        assert!(!Completed.can_advance_to(Failed));
        assert!(!Preparing.can_advance_to(Preparing));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for s in [Pending, Paid, Preparing, Completed, Failed] {
            assert_eq!(s.to_string().parse::<OrderStatusType>().unwrap(), s);
        }
        assert_eq!(OrderStatusType::from("bogus".to_string()), Pending);
    }

    #[test]
    fn remote_order_user_is_optional() {
        let orders: Vec<RemoteOrder> =
            serde_json::from_str(r#"[{"order_id": 7, "item_id": 2}, {"order_id": 8, "item_id": 1, "user_id": 3}]"#)
                .unwrap();
        assert_eq!(orders[0], RemoteOrder { order_id: 7, item_id: 2, user_id: None });
        assert_eq!(orders[1].user_id, Some(3));
    }
}
