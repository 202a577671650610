//! # Storage contracts
//!
//! The kiosk never talks to the database directly. Everything goes through the traits in this module, which
//! [`crate::SqliteDatabase`] implements.
//!
//! * [`VendingDatabase`] owns the order lifecycle: creating orders, merging remote orders, settling payments and
//!   consuming ingredients. Every multi-step write is a single transaction.
//! * [`CatalogManagement`] answers read-only questions about the menu and stock levels.
//! * [`AccountManagement`] answers read-only questions about customers and the sales ledger.
//! * [`RemoteOrderSource`] is the seam to the remote ordering service.
mod account_management;
mod catalog_management;
mod errors;
mod remote_orders;
mod vending_database;

pub use account_management::AccountManagement;
pub use catalog_management::CatalogManagement;
pub use errors::{RemoteOrderError, VendingDbError};
pub use remote_orders::RemoteOrderSource;
pub use vending_database::VendingDatabase;
