use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{
        CollectionQr,
        NewCollectionQr,
        NewOrder,
        Order,
        OrderStatusType,
        PaymentRequest,
        User,
    },
    events::{EventProducers, OrderFinishedEvent, OrderPaidEvent},
    helpers::{collection_code, parse_collection_code},
    traits::{VendingDatabase, VendingDbError},
};

/// `OrderFlowApi` owns the state transitions of an order: creation, payment, preparation and completion.
///
/// Status normally moves `Pending -> Paid -> Preparing -> Completed | Failed`, or `Pending -> Preparing -> ...` for
/// remote orders that were paid upstream.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: VendingDatabase
{
    /// Creates a new order with status `Pending`, stamped with the current time. Returns the new order id.
    pub async fn create_order(&self, order: NewOrder) -> Result<i64, VendingDbError> {
        let item_id = order.item_id;
        let id = self.db.insert_order(order).await?;
        info!("🔄️ Order #{id} created for item {item_id}");
        Ok(id)
    }

    pub async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, VendingDbError> {
        self.db.fetch_order(order_id).await
    }

    /// Overwrites the order status. The write is unconditional; a transition that moves backwards is logged, since
    /// nothing in the kiosk should ever ask for one.
    pub async fn set_status(&self, order_id: i64, status: OrderStatusType) -> Result<(), VendingDbError> {
        let old = self.db.update_order_status(order_id, status).await?;
        if old != status && !old.can_advance_to(status) {
            warn!("🔄️ Order #{order_id} moved backwards from {old} to {status}");
        } else {
            debug!("🔄️ Order #{order_id}: {old} -> {status}");
        }
        Ok(())
    }

    /// Settles the order: debits the payer (if any), marks the order `Paid` and appends the sale, all in one
    /// transaction. On success the order-paid hook fires.
    pub async fn record_payment(&self, payment: PaymentRequest) -> Result<Order, VendingDbError> {
        let order_id = payment.order_id;
        let method = payment.method;
        let (order, sale) = self.db.record_payment(payment).await?;
        info!("🔄️💰️ Order #{order_id} paid: {} by {method}", sale.price);
        self.producers.publish_order_paid(OrderPaidEvent::new(order.clone(), sale));
        Ok(order)
    }

    pub async fn begin_preparation(&self, order_id: i64) -> Result<(), VendingDbError> {
        self.set_status(order_id, OrderStatusType::Preparing).await
    }

    /// Records the outcome of preparing the order. A successful order is `Completed` (with a sale appended if the
    /// order never had one); an unsuccessful one is `Failed`. The order-finished hook fires either way.
    pub async fn finish_preparation(&self, order_id: i64, success: bool) -> Result<Order, VendingDbError> {
        let order = if success {
            self.db.complete_order(order_id).await?
        } else {
            self.set_status(order_id, OrderStatusType::Failed).await?;
            self.db.fetch_order(order_id).await?.ok_or(VendingDbError::OrderNotFound(order_id))?
        };
        info!("🔄️ Order #{order_id} finished with status {}", order.status);
        self.producers.publish_order_finished(OrderFinishedEvent::new(order.clone(), success));
        Ok(order)
    }

    /// Issues the collection code for the order and the given customer.
    pub async fn issue_collection_code(&self, order_id: i64, user: &User) -> Result<CollectionQr, VendingDbError> {
        let phone = user.phone_number.clone().unwrap_or_default();
        let code = NewCollectionQr {
            order_id,
            phone_number: user.phone_number.clone(),
            chat_id: user.chat_id.clone(),
            code: collection_code(order_id, &phone),
        };
        self.db.issue_collection_code(code).await
    }

    /// Redeems a scanned collection code. Returns `None` if the code is malformed, unknown, already collected, or its
    /// order has not been completed.
    pub async fn redeem_collection_code(&self, code: &str) -> Result<Option<CollectionQr>, VendingDbError> {
        if parse_collection_code(code).is_none() {
            debug!("🔄️ Ignoring malformed collection code");
            return Ok(None);
        }
        self.db.redeem_collection_code(code.trim()).await
    }

    /// Local orders that have been `Pending` for longer than `max_age`.
    pub async fn fetch_stale_unpaid_orders(&self, max_age: Duration) -> Result<Vec<Order>, VendingDbError> {
        self.db.fetch_stale_unpaid_orders(Utc::now() - max_age).await
    }
}
