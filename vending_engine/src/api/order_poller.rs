use log::*;

use crate::{
    db_types::PendingWork,
    traits::{RemoteOrderSource, VendingDatabase},
};

/// Merges orders from the remote ordering service into the local store and hands out the next unit of work.
pub struct OrderPoller<B, S> {
    db: B,
    source: S,
}

impl<B, S> OrderPoller<B, S>
where
    B: VendingDatabase,
    S: RemoteOrderSource,
{
    pub fn new(db: B, source: S) -> Self {
        Self { db, source }
    }

    /// Fetches the remote pending orders and inserts the ones that are not yet known locally. Returns the number of
    /// orders inserted.
    ///
    /// A source failure is logged and counts as "no remote orders". An order that cannot be stored is logged and
    /// skipped; the rest of the batch is still merged.
    pub async fn merge_remote_orders(&self) -> usize {
        let remote = match self.source.fetch_pending_orders().await {
            Ok(orders) => orders,
            Err(e) => {
                warn!("📡️ Remote orders unavailable: {e}");
                return 0;
            },
        };
        trace!("📡️ {} remote orders reported", remote.len());
        let mut inserted = 0;
        for order in remote {
            let order_id = order.order_id;
            match self.db.insert_remote_order(order).await {
                Ok(result) if result.was_inserted() => {
                    info!("📡️ New remote order #{order_id}");
                    inserted += 1;
                },
                Ok(_) => {},
                Err(e) => warn!("📡️ Could not store remote order #{order_id}: {e}"),
            }
        }
        inserted
    }

    /// Merges the remote orders and then returns the oldest unit of work, or `None` if there is nothing to do.
    ///
    /// Never fails. Storage errors are logged and reported as "nothing to do".
    pub async fn poll_and_merge(&self) -> Option<PendingWork> {
        self.merge_remote_orders().await;
        match self.db.fetch_next_work().await {
            Ok(work) => work,
            Err(e) => {
                error!("📡️ Could not look up pending work: {e}");
                None
            },
        }
    }
}
