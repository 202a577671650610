use crate::{db_types::RemoteOrder, traits::RemoteOrderError};

/// A source of orders placed outside the kiosk. Implementations return every order the remote service still
/// considers pending; the same order may be reported on many consecutive calls.
#[allow(async_fn_in_trait)]
pub trait RemoteOrderSource {
    async fn fetch_pending_orders(&self) -> Result<Vec<RemoteOrder>, RemoteOrderError>;
}
