//! # Vending kiosk
//!
//! The keypad front end of the campus drinks machine. It drives the display, the readers and the dispenser, and
//! leaves all bookkeeping to the vending engine.
//!
//! The kiosk is responsible for:
//! * Making online orders as soon as they arrive, and paid walk-in orders straight after payment.
//! * Taking walk-in orders on the keypad, in cash or account mode (see [config](config/index.html)).
//! * Letting customers collect drinks with their QR code.
//! * The admin maintenance login, tamper alerts and customer notifications.
//!
//! ## Configuration
//! The kiosk is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod hal;
pub mod integrations;
pub mod keypad;
pub mod kiosk;
pub mod machine;
pub mod notifications;
pub mod payment;
pub mod preparation;
pub mod security;
pub mod stale_order_worker;
