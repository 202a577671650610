//! Vending Engine
//!
//! The vending engine is the system of record for a drinks kiosk. It owns the order lifecycle, the ingredient stock,
//! customer credit and the sales ledger. It knows nothing about keypads, displays or dispensers.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@traits`] and [`SqliteDatabase`]). The kiosk should never need to access
//!    the database directly. The record types are defined in the [`mod@db_types`] module and are public.
//! 2. The engine public API: [`OrderFlowApi`] (order state transitions and payment), [`InventoryGate`] (stock checks)
//!    and [`OrderPoller`] (merging remote orders and picking the next unit of work).
//!
//! The engine also emits events when an order is paid and when the dispenser finishes with it. Subscribers hook into
//! these through [`events::EventHooks`]; they are run on a dedicated worker and never slow the caller down.
mod api;
mod sqlite;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use api::{inventory_gate::InventoryGate, order_flow_api::OrderFlowApi, order_poller::OrderPoller};
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{
    AccountManagement,
    CatalogManagement,
    RemoteOrderError,
    RemoteOrderSource,
    VendingDatabase,
    VendingDbError,
};
