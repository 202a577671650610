//! Clients for the services the kiosk talks to over HTTP.
pub mod remote_orders;
pub mod telegram;
#[cfg(test)]
mod test_server;

pub use remote_orders::HttpOrderSource;
pub use telegram::TelegramBot;
