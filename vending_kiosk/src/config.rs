use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use vending_engine::db_url;
use vmc_common::{helpers::parse_boolean_flag, Secret};

use crate::errors::KioskError;

const DEFAULT_REMOTE_ORDERS_URL: &str = "http://localhost:5000/order";
const DEFAULT_REMOTE_POLL_INTERVAL: Duration = Duration::from_millis(500);
const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_millis(2000);
const DEFAULT_INPUT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_RFID_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_QR_SCAN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_ADMIN_PASSCODE: &str = "1234";
const DEFAULT_MAX_FAILED_LOGINS: u32 = 2;
const DEFAULT_STALE_ORDER_TIMEOUT_MINS: i64 = 30;

/// How customers pay for locally entered orders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PaymentMode {
    /// Cash is taken at the machine. There is no customer login and no account debit.
    Cash,
    /// Customers log in with their phone number and pay from their account balance by RFID card or QR code.
    #[default]
    Account,
}

impl FromStr for PaymentMode {
    type Err = KioskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cash" => Ok(Self::Cash),
            "account" => Ok(Self::Account),
            _ => Err(KioskError::ConfigurationError(format!("Unknown payment mode: {s}"))),
        }
    }
}

impl Display for PaymentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Account => write!(f, "account"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct KioskConfig {
    pub database_url: String,
    /// The endpoint that lists orders placed through the online ordering service.
    pub remote_orders_url: String,
    /// How often remote orders are checked while a customer is entering a selection.
    pub remote_poll_interval: Duration,
    pub remote_timeout: Duration,
    pub payment_mode: PaymentMode,
    /// How long the kiosk waits for keypad input mid-flow before abandoning the session.
    pub input_timeout: Duration,
    pub rfid_timeout: Duration,
    pub qr_scan_timeout: Duration,
    pub admin_passcode: Secret<String>,
    /// Consecutive failed admin logins before a security alert is raised.
    pub max_failed_logins: u32,
    pub telegram_bot_token: Option<Secret<String>>,
    pub admin_chat_id: Option<String>,
    /// Local orders left unpaid for longer than this are reported to the admin.
    pub stale_order_timeout: chrono::Duration,
    pub security_monitor: bool,
    pub simulate_hardware: bool,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            database_url: db_url(),
            remote_orders_url: DEFAULT_REMOTE_ORDERS_URL.to_string(),
            remote_poll_interval: DEFAULT_REMOTE_POLL_INTERVAL,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
            payment_mode: PaymentMode::default(),
            input_timeout: DEFAULT_INPUT_TIMEOUT,
            rfid_timeout: DEFAULT_RFID_TIMEOUT,
            qr_scan_timeout: DEFAULT_QR_SCAN_TIMEOUT,
            admin_passcode: Secret::new(DEFAULT_ADMIN_PASSCODE.to_string()),
            max_failed_logins: DEFAULT_MAX_FAILED_LOGINS,
            telegram_bot_token: None,
            admin_chat_id: None,
            stale_order_timeout: chrono::Duration::minutes(DEFAULT_STALE_ORDER_TIMEOUT_MINS),
            security_monitor: true,
            simulate_hardware: true,
        }
    }
}

impl KioskConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = db_url();
        let remote_orders_url = env::var("VMC_REMOTE_ORDERS_URL").ok().unwrap_or_else(|| {
            info!("🪛️ VMC_REMOTE_ORDERS_URL is not set. Using the default, {DEFAULT_REMOTE_ORDERS_URL}.");
            DEFAULT_REMOTE_ORDERS_URL.to_string()
        });
        let remote_poll_interval =
            parse_env::<u64>("VMC_REMOTE_POLL_INTERVAL_MS").map(Duration::from_millis).unwrap_or(DEFAULT_REMOTE_POLL_INTERVAL);
        let remote_timeout =
            parse_env::<u64>("VMC_REMOTE_TIMEOUT_MS").map(Duration::from_millis).unwrap_or(DEFAULT_REMOTE_TIMEOUT);
        let payment_mode = parse_env::<PaymentMode>("VMC_PAYMENT_MODE").unwrap_or_default();
        let input_timeout =
            parse_env::<u64>("VMC_INPUT_TIMEOUT_SECS").map(Duration::from_secs).unwrap_or(DEFAULT_INPUT_TIMEOUT);
        let rfid_timeout =
            parse_env::<u64>("VMC_RFID_TIMEOUT_SECS").map(Duration::from_secs).unwrap_or(DEFAULT_RFID_TIMEOUT);
        let qr_scan_timeout =
            parse_env::<u64>("VMC_QR_SCAN_TIMEOUT_SECS").map(Duration::from_secs).unwrap_or(DEFAULT_QR_SCAN_TIMEOUT);
        let admin_passcode = match env::var("VMC_ADMIN_PASSCODE").ok().filter(|s| !s.trim().is_empty()) {
            Some(p) if p.chars().all(|c| c.is_ascii_digit()) => Secret::new(p),
            Some(_) => {
                error!("🪛️ VMC_ADMIN_PASSCODE must only contain digits. Using the default passcode instead.");
                Secret::new(DEFAULT_ADMIN_PASSCODE.to_string())
            },
            None => {
                warn!("🪛️ VMC_ADMIN_PASSCODE is not set. Using the default passcode. Change it before deploying.");
                Secret::new(DEFAULT_ADMIN_PASSCODE.to_string())
            },
        };
        let max_failed_logins = parse_env::<u32>("VMC_MAX_FAILED_LOGINS")
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_FAILED_LOGINS);
        let telegram_bot_token = env::var("VMC_TELEGRAM_BOT_TOKEN").ok().filter(|s| !s.is_empty()).map(Secret::new);
        if telegram_bot_token.is_none() {
            info!("🪛️ VMC_TELEGRAM_BOT_TOKEN is not set. Notifications will only be logged.");
        }
        let admin_chat_id = env::var("VMC_ADMIN_CHAT_ID").ok().filter(|s| !s.is_empty());
        let stale_order_timeout = chrono::Duration::minutes(
            parse_env::<i64>("VMC_STALE_ORDER_TIMEOUT_MINS")
                .filter(|&m| m > 0)
                .unwrap_or(DEFAULT_STALE_ORDER_TIMEOUT_MINS),
        );
        let security_monitor = parse_boolean_flag(env::var("VMC_SECURITY_MONITOR").ok(), true);
        let simulate_hardware = parse_boolean_flag(env::var("VMC_SIMULATE_HARDWARE").ok(), true);
        Self {
            database_url,
            remote_orders_url,
            remote_poll_interval,
            remote_timeout,
            payment_mode,
            input_timeout,
            rfid_timeout,
            qr_scan_timeout,
            admin_passcode,
            max_failed_logins,
            telegram_bot_token,
            admin_chat_id,
            stale_order_timeout,
            security_monitor,
            simulate_hardware,
        }
    }
}

/// Reads and parses an environment variable. Unset variables give `None`. Unparseable values are logged and also
/// give `None`, so that the caller falls back to its default.
fn parse_env<T>(name: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let s = env::var(name).ok()?;
    s.parse::<T>()
        .map_err(|e| error!("🪛️ {s} is not a valid value for {name}. {e} Using the default instead."))
        .ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_mode_parsing() {
        assert_eq!("cash".parse::<PaymentMode>().unwrap(), PaymentMode::Cash);
        assert_eq!(" Account ".parse::<PaymentMode>().unwrap(), PaymentMode::Account);
        assert!("card".parse::<PaymentMode>().is_err());
        assert_eq!(PaymentMode::default(), PaymentMode::Account);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        env::set_var("VMC_TEST_RFID_TIMEOUT", "ten");
        assert!(parse_env::<u64>("VMC_TEST_RFID_TIMEOUT").is_none());
        env::set_var("VMC_TEST_RFID_TIMEOUT", "15");
        assert_eq!(parse_env::<u64>("VMC_TEST_RFID_TIMEOUT"), Some(15));
        assert!(parse_env::<u64>("VMC_TEST_NOT_SET").is_none());
    }

    #[test]
    fn secrets_do_not_leak_into_debug_output() {
        let config = KioskConfig {
            telegram_bot_token: Some(Secret::new("bot-token-value".to_string())),
            ..Default::default()
        };
        let output = format!("{config:?}");
        assert!(!output.contains("bot-token-value"));
        assert!(!output.contains(DEFAULT_ADMIN_PASSCODE));
    }
}
