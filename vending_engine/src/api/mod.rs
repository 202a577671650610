//! # Vending engine public API
//!
//! * [`order_flow_api`] owns every state transition of an order: creation, payment, preparation and completion.
//! * [`inventory_gate`] decides whether a drink can be made from the current stock.
//! * [`order_poller`] merges orders from the remote ordering service into the local store and picks the next unit
//!   of work for the dispenser.
//!
//! Each API is created by supplying a database backend that implements the traits it needs:
//!
//! ```rust,ignore
//! use vending_engine::{InventoryGate, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let gate = InventoryGate::new(db);
//! if gate.check_inventory(3).await { ... }
//! ```
pub mod inventory_gate;
pub mod order_flow_api;
pub mod order_poller;
