//! Hardware capabilities used by the kiosk.
//!
//! Each device is a small synchronous trait. The kiosk never talks to a concrete driver; it is handed a
//! [`Hardware`] bundle at start-up. [`sim`] provides console drivers for running without a machine attached.
pub mod sim;

use std::{sync::Arc, time::Duration};

use log::*;

use crate::{errors::HardwareError, keypad::KeyEventSink};

/// Characters per display line.
pub const LCD_WIDTH: usize = 16;

pub trait Lcd: Send + Sync {
    fn clear(&self) -> Result<(), HardwareError>;
    /// Writes `text` on `line` (1 or 2). Text longer than [`LCD_WIDTH`] is truncated by the caller.
    fn write_line(&self, text: &str, line: u8) -> Result<(), HardwareError>;
}

pub trait Buzzer: Send + Sync {
    fn set(&self, on: bool) -> Result<(), HardwareError>;
}

pub trait Servo: Send + Sync {
    fn set_angle(&self, degrees: u16) -> Result<(), HardwareError>;
}

pub trait Led: Send + Sync {
    fn set(&self, on: bool) -> Result<(), HardwareError>;
}

pub trait RfidReader: Send + Sync {
    /// Returns the id of a card currently on the reader, without blocking.
    fn read_id_no_block(&self) -> Result<Option<String>, HardwareError>;
}

pub trait QrScanner: Send + Sync {
    /// Tries to decode a QR code from the current camera frame.
    fn try_decode(&self) -> Result<Option<String>, HardwareError>;
}

pub trait Keypad: Send + Sync {
    /// Starts delivering key presses into `sink`. Returns once the driver is running.
    fn start(&self, sink: KeyEventSink) -> Result<(), HardwareError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub distance_cm: f64,
    pub ir_triggered: bool,
    pub acceleration: [f64; 3],
}

pub trait IntrusionSensors: Send + Sync {
    fn sample(&self) -> Result<SensorSample, HardwareError>;
}

/// Every device the kiosk drives, behind shared trait objects.
#[derive(Clone)]
pub struct Hardware {
    pub lcd: Arc<dyn Lcd>,
    pub buzzer: Arc<dyn Buzzer>,
    /// Pours the drink.
    pub dispenser: Arc<dyn Servo>,
    /// Drops the cup.
    pub cup: Arc<dyn Servo>,
    /// The collection door.
    pub door: Arc<dyn Servo>,
    pub led: Arc<dyn Led>,
    pub rfid: Arc<dyn RfidReader>,
    pub camera: Arc<dyn QrScanner>,
}

impl Hardware {
    /// Clears the display and shows up to two lines. Display failures are logged and otherwise ignored.
    pub fn display(&self, line1: &str, line2: &str) {
        let result = self.lcd.clear().and_then(|_| {
            self.lcd.write_line(&fit(line1), 1)?;
            if !line2.is_empty() {
                self.lcd.write_line(&fit(line2), 2)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            error!("🖥️ Could not update the display. {e}");
        }
    }

    /// Rewrites a single line without clearing the display.
    pub fn display_line(&self, text: &str, line: u8) {
        if let Err(e) = self.lcd.write_line(&fit(text), line) {
            error!("🖥️ Could not update the display. {e}");
        }
    }

    /// Sounds the buzzer `repeat` times. Buzzer failures are logged and otherwise ignored.
    pub async fn beep(&self, on: Duration, off: Duration, repeat: u32) {
        for _ in 0..repeat {
            if let Err(e) = self.buzzer.set(true) {
                error!("🖥️ Buzzer failure. {e}");
                return;
            }
            tokio::time::sleep(on).await;
            if let Err(e) = self.buzzer.set(false) {
                error!("🖥️ Buzzer failure. {e}");
                return;
            }
            tokio::time::sleep(off).await;
        }
    }
}

fn fit(text: &str) -> String {
    text.chars().take(LCD_WIDTH).collect()
}
