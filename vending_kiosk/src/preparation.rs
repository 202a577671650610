use std::time::Duration;

use log::*;
use vending_engine::VendingDatabase;

use crate::{errors::HardwareError, hal::Hardware};

pub const POUR_ANGLE: u16 = 90;
pub const REST_ANGLE: u16 = 180;
pub const HOME_ANGLE: u16 = 0;

/// Durations of each step of the dispensing sequence.
#[derive(Debug, Clone, Copy)]
pub struct PrepTimings {
    pub start_pause: Duration,
    pub pour: Duration,
    pub settle: Duration,
    pub cup_drop: Duration,
    pub beep: Duration,
}

impl Default for PrepTimings {
    fn default() -> Self {
        Self {
            start_pause: Duration::from_secs(1),
            pour: Duration::from_secs(2),
            settle: Duration::from_secs(1),
            cup_drop: Duration::from_secs(2),
            beep: Duration::from_millis(100),
        }
    }
}

impl PrepTimings {
    /// No pauses at all. For tests.
    pub fn instant() -> Self {
        Self {
            start_pause: Duration::ZERO,
            pour: Duration::ZERO,
            settle: Duration::ZERO,
            cup_drop: Duration::ZERO,
            beep: Duration::ZERO,
        }
    }
}

/// Runs the dispenser for one drink and books the ingredients it used.
pub struct Preparer<B> {
    db: B,
    hardware: Hardware,
    timings: PrepTimings,
}

impl<B> Preparer<B>
where B: VendingDatabase
{
    pub fn new(db: B, hardware: Hardware, timings: PrepTimings) -> Self {
        Self { db, hardware, timings }
    }

    /// Prepares one drink of `item_id`. Returns `false` if the dispenser failed, in which case the stock is left
    /// untouched. After a successful pour every ingredient of the drink is decremented. A failure to record the
    /// decrement is logged but does not undo the drink.
    pub async fn prepare(&self, item_id: i64) -> bool {
        info!("☕️ Preparing item {item_id}");
        if let Err(e) = self.dispense().await {
            error!("☕️ Dispenser failure while preparing item {item_id}. {e}");
            self.return_to_home();
            return false;
        }
        match self.db.consume_ingredients(item_id).await {
            Ok(stock) => {
                debug!(
                    "☕️ Stock after item {item_id}: {}",
                    stock.iter().map(|i| format!("{}={}", i.name, i.amount)).collect::<Vec<_>>().join(", ")
                );
            },
            Err(e) => error!("☕️ Item {item_id} was dispensed, but the stock could not be updated. {e}"),
        }
        info!("☕️ Item {item_id} is ready");
        true
    }

    async fn dispense(&self) -> Result<(), HardwareError> {
        let hw = &self.hardware;
        let t = &self.timings;
        hw.beep(t.beep * 2, t.beep * 2, 1).await;
        tokio::time::sleep(t.start_pause).await;
        trace!("☕️ Pouring");
        hw.dispenser.set_angle(POUR_ANGLE)?;
        tokio::time::sleep(t.pour).await;
        hw.dispenser.set_angle(REST_ANGLE)?;
        tokio::time::sleep(t.settle).await;
        hw.beep(t.beep, t.beep, 3).await;
        hw.led.set(true)?;
        hw.led.set(false)?;
        trace!("☕️ Dropping cup");
        hw.cup.set_angle(POUR_ANGLE)?;
        tokio::time::sleep(t.cup_drop).await;
        hw.cup.set_angle(REST_ANGLE)?;
        tokio::time::sleep(t.settle).await;
        hw.dispenser.set_angle(HOME_ANGLE)?;
        hw.cup.set_angle(HOME_ANGLE)?;
        tokio::time::sleep(t.settle).await;
        Ok(())
    }

    fn return_to_home(&self) {
        let result = self.hardware.dispenser.set_angle(HOME_ANGLE).and_then(|_| self.hardware.cup.set_angle(HOME_ANGLE));
        if let Err(e) = result {
            warn!("☕️ Could not return the dispenser to its home position. {e}");
        }
    }
}
