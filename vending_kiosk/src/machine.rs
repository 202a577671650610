use std::{sync::Arc, time::Duration};

use log::*;
use vending_engine::{events::EventHandlers, SqliteDatabase};

use crate::{
    config::KioskConfig,
    errors::KioskError,
    hal::{sim::simulated_hardware, Keypad},
    integrations::{HttpOrderSource, TelegramBot},
    kiosk::{Kiosk, KioskSettings},
    notifications::{customer_hooks, notification_handler, Notifier},
    security::{start_security_monitor, SecurityFlags, SAMPLE_PERIOD},
    stale_order_worker::start_stale_order_worker,
};

const MAX_DB_CONNECTIONS: u32 = 5;
const EVENT_BUFFER_SIZE: usize = 25;
const STALE_ORDER_CHECK_PERIOD: Duration = Duration::from_secs(60);

/// Sets up the database, the devices and the background workers, then runs the kiosk loop. Only returns if the
/// kiosk could not be started.
pub async fn run_kiosk(config: KioskConfig) -> Result<(), KioskError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| KioskError::InitializeError(e.to_string()))?;
    db.migrate().await?;
    info!("🗃️ Database ready at {}", config.database_url);

    if !config.simulate_hardware {
        return Err(KioskError::ConfigurationError(
            "This build has no device drivers. Set VMC_SIMULATE_HARDWARE=true to use the console simulator.".into(),
        ));
    }
    let (hardware, keypad, sensors) = simulated_hardware();

    let bot = config
        .telegram_bot_token
        .clone()
        .map(TelegramBot::new)
        .transpose()
        .map_err(|e| KioskError::InitializeError(e.to_string()))?;
    let notifications = notification_handler(bot, config.admin_chat_id.clone());
    let notifier = Notifier::new(notifications.subscribe());
    tokio::spawn(notifications.start_handler());

    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, customer_hooks(db.clone(), notifier.clone()));
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let source = HttpOrderSource::new(&config.remote_orders_url, config.remote_timeout)
        .map_err(|e| KioskError::InitializeError(e.to_string()))?;
    let flags = SecurityFlags::default();
    let kiosk = Kiosk::new(db.clone(), source, producers, hardware.clone(), KioskSettings::from_config(&config))
        .with_notifier(notifier.clone())
        .with_security_flags(flags.clone());
    keypad.start(kiosk.key_sink())?;

    if config.security_monitor {
        start_security_monitor(Arc::new(sensors), hardware, notifier.clone(), flags, SAMPLE_PERIOD);
    } else {
        warn!("🛡️ The security monitor is disabled");
    }
    start_stale_order_worker(db, notifier, config.stale_order_timeout, STALE_ORDER_CHECK_PERIOD);

    kiosk.run().await;
    Ok(())
}
