use chrono::{DateTime, Utc};

use crate::{
    db_types::{
        CollectionQr,
        InsertOrderResult,
        InventoryItem,
        NewCollectionQr,
        NewOrder,
        Order,
        OrderStatusType,
        PaymentRequest,
        PendingWork,
        RemoteOrder,
        Sale,
    },
    traits::{AccountManagement, CatalogManagement, VendingDbError},
};

/// The highest level of behaviour for backends supporting the vending engine.
///
/// The database is the system of record and the only shared resource, so every operation that touches more than
/// one row runs in a single transaction.
#[allow(async_fn_in_trait)]
pub trait VendingDatabase: Clone + CatalogManagement + AccountManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new order with status `Pending`, stamped with the current server time. Returns the new order id.
    async fn insert_order(&self, order: NewOrder) -> Result<i64, VendingDbError>;

    /// Stores a remote order under its upstream id with source `remote` and status `Pending`.
    ///
    /// This call is idempotent: if an order with the same id already exists, nothing is written.
    async fn insert_remote_order(&self, order: RemoteOrder) -> Result<InsertOrderResult, VendingDbError>;

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, VendingDbError>;

    /// Returns the oldest order the dispenser should work on, if any.
    ///
    /// Work is any remote order still `Pending`, or any `Paid` order whose collection code (if one was issued) has
    /// not been redeemed. Local `Pending` orders were never paid and are not work.
    async fn fetch_next_work(&self) -> Result<Option<PendingWork>, VendingDbError>;

    /// Overwrites the order's status. Returns the previous status.
    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatusType,
    ) -> Result<OrderStatusType, VendingDbError>;

    /// Settles an order in a single atomic transaction:
    /// * re-reads the payer's credit and fails with [`VendingDbError::InsufficientCredit`] if it does not cover the
    ///   price,
    /// * debits the price from the payer's credit (skipped when there is no payer),
    /// * marks the order `Paid` and tags it with the payment method,
    /// * appends the sale.
    ///
    /// If any step fails, none of the effects are applied.
    async fn record_payment(&self, payment: PaymentRequest) -> Result<(Order, Sale), VendingDbError>;

    /// Marks the order `Completed`. If no sale exists for the order yet, one is appended at the menu price in the
    /// same transaction. Returns the updated order.
    async fn complete_order(&self, order_id: i64) -> Result<Order, VendingDbError>;

    /// Takes [`crate::db_types::INGREDIENT_UNITS_PER_DRINK`] units of every linked ingredient out of stock. The
    /// decrement is unconditional. Returns the updated inventory rows.
    async fn consume_ingredients(&self, item_id: i64) -> Result<Vec<InventoryItem>, VendingDbError>;

    /// Local orders that are still `Pending` and were created before `cutoff`.
    async fn fetch_stale_unpaid_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, VendingDbError>;

    /// Stores a new collection code with status `Pending`. Fails with [`VendingDbError::CodeAlreadyIssued`] if the
    /// order already has one.
    async fn issue_collection_code(&self, code: NewCollectionQr) -> Result<CollectionQr, VendingDbError>;

    /// Flips a `Pending` collection code to `Collected`. Returns `None` if the code is unknown or was already
    /// collected.
    async fn redeem_collection_code(&self, code: &str) -> Result<Option<CollectionQr>, VendingDbError>;

    async fn fetch_collection_code(&self, order_id: i64) -> Result<Option<CollectionQr>, VendingDbError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), VendingDbError> {
        Ok(())
    }
}
