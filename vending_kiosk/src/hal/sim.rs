//! Console drivers for running the kiosk without a machine attached.
//!
//! The display, buzzer, servos and LED write to the log. The keypad reads stdin: each line is a sequence of key
//! presses, except for lines starting with `rfid:` or `qr:`, which place a card on the reader or a code in front of
//! the camera until it has been read once.
use std::{
    io::BufRead,
    sync::{Arc, Mutex, PoisonError},
};

use log::*;

use crate::{
    errors::HardwareError,
    hal::{Buzzer, Hardware, IntrusionSensors, Keypad, Lcd, Led, QrScanner, RfidReader, SensorSample, Servo},
    keypad::{Key, KeyEventSink},
};

/// Card and QR codes typed into the console, waiting to be picked up by the reader or the camera.
#[derive(Clone, Default)]
pub struct SimConsole {
    rfid: Arc<Mutex<Option<String>>>,
    qr: Arc<Mutex<Option<String>>>,
}

impl SimConsole {
    pub fn tap_card(&self, card_id: &str) {
        *self.rfid.lock().unwrap_or_else(PoisonError::into_inner) = Some(card_id.to_string());
    }

    pub fn show_code(&self, code: &str) {
        *self.qr.lock().unwrap_or_else(PoisonError::into_inner) = Some(code.to_string());
    }

    fn take_card(&self) -> Option<String> {
        self.rfid.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn take_code(&self) -> Option<String> {
        self.qr.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    /// Interprets one console line. Returns the key presses it contains.
    fn handle_line(&self, line: &str) -> Vec<Key> {
        let line = line.trim();
        if let Some(card) = line.strip_prefix("rfid:") {
            info!("⌨️ [sim] Card {} placed on the reader", card.trim());
            self.tap_card(card.trim());
            return Vec::new();
        }
        if let Some(code) = line.strip_prefix("qr:") {
            info!("⌨️ [sim] Code shown to the camera");
            self.show_code(code.trim());
            return Vec::new();
        }
        line.chars().filter_map(Key::from_char).collect()
    }
}

pub struct SimLcd;

impl Lcd for SimLcd {
    fn clear(&self) -> Result<(), HardwareError> {
        trace!("🖥️ [sim] LCD cleared");
        Ok(())
    }

    fn write_line(&self, text: &str, line: u8) -> Result<(), HardwareError> {
        info!("🖥️ [sim] LCD {line}: {text}");
        Ok(())
    }
}

pub struct SimBuzzer;

impl Buzzer for SimBuzzer {
    fn set(&self, on: bool) -> Result<(), HardwareError> {
        if on {
            debug!("🖥️ [sim] Beep");
        }
        Ok(())
    }
}

pub struct SimServo {
    name: &'static str,
}

impl SimServo {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl Servo for SimServo {
    fn set_angle(&self, degrees: u16) -> Result<(), HardwareError> {
        debug!("🖥️ [sim] {} servo moved to {degrees}°", self.name);
        Ok(())
    }
}

pub struct SimLed;

impl Led for SimLed {
    fn set(&self, on: bool) -> Result<(), HardwareError> {
        debug!("🖥️ [sim] LED {}", if on { "on" } else { "off" });
        Ok(())
    }
}

pub struct SimRfid {
    console: SimConsole,
}

impl RfidReader for SimRfid {
    fn read_id_no_block(&self) -> Result<Option<String>, HardwareError> {
        Ok(self.console.take_card())
    }
}

pub struct SimCamera {
    console: SimConsole,
}

impl QrScanner for SimCamera {
    fn try_decode(&self) -> Result<Option<String>, HardwareError> {
        Ok(self.console.take_code())
    }
}

pub struct StdinKeypad {
    console: SimConsole,
}

impl Keypad for StdinKeypad {
    fn start(&self, sink: KeyEventSink) -> Result<(), HardwareError> {
        let console = self.console.clone();
        std::thread::Builder::new()
            .name("stdin-keypad".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    match line {
                        Ok(line) => console.handle_line(&line).into_iter().for_each(|k| sink.push(k)),
                        Err(e) => {
                            error!("⌨️ [sim] Could not read from stdin. {e}");
                            break;
                        },
                    }
                }
                info!("⌨️ [sim] Keypad input has closed");
            })
            .map_err(|e| HardwareError::Unavailable(format!("Could not start the console keypad. {e}")))?;
        info!("⌨️ [sim] Console keypad started. Type keys and press enter.");
        Ok(())
    }
}

/// Sensors that always report a closed, stationary machine.
pub struct CalmSensors;

impl IntrusionSensors for CalmSensors {
    fn sample(&self) -> Result<SensorSample, HardwareError> {
        Ok(SensorSample { distance_cm: 100.0, ir_triggered: false, acceleration: [0.0, 0.0, 1.0] })
    }
}

/// Builds the simulated hardware bundle, along with its keypad and sensors.
pub fn simulated_hardware() -> (Hardware, StdinKeypad, CalmSensors) {
    let console = SimConsole::default();
    let hardware = Hardware {
        lcd: Arc::new(SimLcd),
        buzzer: Arc::new(SimBuzzer),
        dispenser: Arc::new(SimServo::new("dispenser")),
        cup: Arc::new(SimServo::new("cup")),
        door: Arc::new(SimServo::new("door")),
        led: Arc::new(SimLed),
        rfid: Arc::new(SimRfid { console: console.clone() }),
        camera: Arc::new(SimCamera { console: console.clone() }),
    };
    (hardware, StdinKeypad { console }, CalmSensors)
}
