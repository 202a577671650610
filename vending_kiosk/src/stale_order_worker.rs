use std::collections::HashSet;

use chrono::Duration;
use log::*;
use tokio::task::JoinHandle;
use vending_engine::{db_types::Order, events::EventProducers, OrderFlowApi, SqliteDatabase, VendingDatabase};

use crate::notifications::Notifier;

/// Reports local orders that were created but never paid for. Each order is reported once. Their status is left
/// alone; the customer may still come back and pay.
#[derive(Debug, Default)]
pub struct StaleOrderReporter {
    reported: HashSet<i64>,
}

impl StaleOrderReporter {
    /// Returns the stale orders that have not been reported before.
    pub async fn check<B: VendingDatabase>(
        &mut self,
        api: &OrderFlowApi<B>,
        max_age: Duration,
    ) -> Result<Vec<Order>, vending_engine::VendingDbError> {
        let stale = api.fetch_stale_unpaid_orders(max_age).await?;
        let current = stale.iter().map(|o| o.order_id).collect::<HashSet<_>>();
        // Forget orders that have since been paid, so the set does not grow forever
        self.reported.retain(|id| current.contains(id));
        let fresh = stale.into_iter().filter(|o| self.reported.insert(o.order_id)).collect();
        Ok(fresh)
    }
}

/// Starts the stale order worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_stale_order_worker(
    db: SqliteDatabase,
    notifier: Notifier,
    max_age: Duration,
    period: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        let api = OrderFlowApi::new(db, EventProducers::default());
        let mut reporter = StaleOrderReporter::default();
        info!("🕰️ Stale order worker started");
        loop {
            timer.tick().await;
            trace!("🕰️ Checking for stale unpaid orders");
            match reporter.check(&api, max_age).await {
                Ok(orders) if orders.is_empty() => {},
                Ok(orders) => {
                    warn!("🕰️ {} orders have been waiting for payment for too long: {}", orders.len(), order_list(&orders));
                    notifier.admin(format!("Unpaid orders waiting at the kiosk: {}", order_list(&orders)));
                },
                Err(e) => {
                    error!("🕰️ Error checking for stale orders: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("#{} (item {}, since {})", o.order_id, o.item_id, o.created_at.format("%H:%M")))
        .collect::<Vec<String>>()
        .join(", ")
}
