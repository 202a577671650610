use thiserror::Error;
use vmc_common::Cents;

#[derive(Debug, Clone, Error)]
pub enum VendingDbError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested user {0} does not exist")]
    UserNotFound(i64),
    #[error("The requested menu item {0} does not exist")]
    MenuItemNotFound(i64),
    #[error("User {user_id} has {credit} credit, which is not enough to pay {price}")]
    InsufficientCredit { user_id: i64, credit: Cents, price: Cents },
    #[error("Order {0} has already been paid")]
    OrderAlreadyPaid(i64),
    #[error("A collection code has already been issued for order {0}")]
    CodeAlreadyIssued(i64),
}

impl From<sqlx::Error> for VendingDbError {
    fn from(e: sqlx::Error) -> Self {
        VendingDbError::DatabaseError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum RemoteOrderError {
    #[error("Could not reach the remote order service: {0}")]
    Network(String),
    #[error("The remote order service replied with status {0}")]
    UnexpectedStatus(u16),
    #[error("The remote order service sent a payload we could not read: {0}")]
    InvalidPayload(String),
}
