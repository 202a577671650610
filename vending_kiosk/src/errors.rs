use thiserror::Error;
use vending_engine::VendingDbError;

#[derive(Debug, Clone, Error)]
pub enum HardwareError {
    #[error("The device reported an error. {0}")]
    Device(String),
    #[error("The device is not available. {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("Could not reach the notification service. {0}")]
    Transport(String),
    #[error("The notification was rejected. Error {status}. {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Error)]
pub enum KioskError {
    #[error("Could not initialize the kiosk. {0}")]
    InitializeError(String),
    #[error("A database error occurred. {0}")]
    DatabaseError(#[from] VendingDbError),
    #[error("A hardware error occurred. {0}")]
    HardwareError(#[from] HardwareError),
    #[error("Invalid kiosk configuration. {0}")]
    ConfigurationError(String),
}
