use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use tokio::{task::JoinHandle, time::Instant};
use vending_engine::{
    db_types::RemoteOrder,
    events::{EventHandler, EventHandlers},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_catalog, SeededCatalog},
    },
    RemoteOrderError,
    RemoteOrderSource,
    SqliteDatabase,
};

use crate::{
    config::PaymentMode,
    errors::HardwareError,
    hal::{Buzzer, Hardware, Lcd, Led, QrScanner, RfidReader, Servo},
    keypad::{Key, KeyEventSink},
    kiosk::{Kiosk, KioskSettings},
    notifications::{customer_hooks, Notification, Notifier},
    payment::PaymentSettings,
    preparation::PrepTimings,
    security::SecurityFlags,
};

#[derive(Default)]
pub struct RecordingLcd {
    lines: Mutex<Vec<String>>,
}

impl RecordingLcd {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn saw(&self, text: &str) -> bool {
        self.lines().iter().any(|l| l.contains(text))
    }
}

impl Lcd for RecordingLcd {
    fn clear(&self) -> Result<(), HardwareError> {
        Ok(())
    }

    fn write_line(&self, text: &str, _line: u8) -> Result<(), HardwareError> {
        self.lines.lock().unwrap().push(text.trim_end().to_string());
        Ok(())
    }
}

pub struct QuietBuzzer;

impl Buzzer for QuietBuzzer {
    fn set(&self, _on: bool) -> Result<(), HardwareError> {
        Ok(())
    }
}

pub struct DarkLed;

impl Led for DarkLed {
    fn set(&self, _on: bool) -> Result<(), HardwareError> {
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingServo {
    angles: Mutex<Vec<u16>>,
    jammed: AtomicBool,
}

impl RecordingServo {
    pub fn angles(&self) -> Vec<u16> {
        self.angles.lock().unwrap().clone()
    }

    pub fn jam(&self) {
        self.jammed.store(true, Ordering::SeqCst);
    }
}

impl Servo for RecordingServo {
    fn set_angle(&self, degrees: u16) -> Result<(), HardwareError> {
        if self.jammed.load(Ordering::SeqCst) {
            return Err(HardwareError::Device("servo is jammed".into()));
        }
        self.angles.lock().unwrap().push(degrees);
        Ok(())
    }
}

/// Hands out one queued value per read.
#[derive(Default)]
pub struct ScriptedReader {
    values: Mutex<VecDeque<String>>,
}

impl ScriptedReader {
    pub fn present(&self, value: &str) {
        self.values.lock().unwrap().push_back(value.to_string());
    }

    fn next(&self) -> Option<String> {
        self.values.lock().unwrap().pop_front()
    }
}

impl RfidReader for ScriptedReader {
    fn read_id_no_block(&self) -> Result<Option<String>, HardwareError> {
        Ok(self.next())
    }
}

impl QrScanner for ScriptedReader {
    fn try_decode(&self) -> Result<Option<String>, HardwareError> {
        Ok(self.next())
    }
}

#[derive(Clone, Default)]
pub struct FakeOrderSource {
    orders: Arc<Mutex<Vec<RemoteOrder>>>,
}

impl FakeOrderSource {
    pub fn push(&self, order_id: i64, item_id: i64) {
        self.orders.lock().unwrap().push(RemoteOrder { order_id, item_id, user_id: None });
    }
}

impl RemoteOrderSource for FakeOrderSource {
    async fn fetch_pending_orders(&self) -> Result<Vec<RemoteOrder>, RemoteOrderError> {
        Ok(self.orders.lock().unwrap().clone())
    }
}

pub struct Rig {
    pub lcd: Arc<RecordingLcd>,
    pub dispenser: Arc<RecordingServo>,
    pub door: Arc<RecordingServo>,
    pub rfid: Arc<ScriptedReader>,
    pub camera: Arc<ScriptedReader>,
    pub hardware: Hardware,
}

impl Rig {
    pub fn new() -> Self {
        let lcd = Arc::new(RecordingLcd::default());
        let dispenser = Arc::new(RecordingServo::default());
        let door = Arc::new(RecordingServo::default());
        let rfid = Arc::new(ScriptedReader::default());
        let camera = Arc::new(ScriptedReader::default());
        let hardware = Hardware {
            lcd: lcd.clone(),
            buzzer: Arc::new(QuietBuzzer),
            dispenser: dispenser.clone(),
            cup: Arc::new(RecordingServo::default()),
            door: door.clone(),
            led: Arc::new(DarkLed),
            rfid: rfid.clone(),
            camera: camera.clone(),
        };
        Self { lcd, dispenser, door, rfid, camera, hardware }
    }
}

pub fn test_settings(payment_mode: PaymentMode) -> KioskSettings {
    KioskSettings {
        payment_mode,
        input_timeout: Duration::from_secs(3),
        poll_interval: Duration::from_millis(20),
        payment: PaymentSettings {
            rfid_timeout: Duration::from_millis(500),
            qr_timeout: Duration::from_millis(500),
            scan_interval: Duration::from_millis(5),
            message_pause: Duration::ZERO,
        },
        message_pause: Duration::ZERO,
        intrusion_pause: Duration::from_millis(10),
        ..KioskSettings::default()
    }
}

pub struct Harness {
    pub kiosk: Kiosk<SqliteDatabase, FakeOrderSource>,
    pub db: SqliteDatabase,
    pub catalog: SeededCatalog,
    pub rig: Rig,
    pub remote: FakeOrderSource,
    pub flags: SecurityFlags,
    notifications: Arc<Mutex<Vec<Notification>>>,
}

impl Harness {
    pub async fn new(mode: PaymentMode) -> Self {
        Self::with_settings(test_settings(mode)).await
    }

    pub async fn with_settings(settings: KioskSettings) -> Self {
        let _ = env_logger::try_init();
        let db = prepare_test_env(&random_db_path()).await;
        let catalog = seed_catalog(&db).await;
        let rig = Rig::new();
        let remote = FakeOrderSource::default();
        let notifications = Arc::new(Mutex::new(Vec::new()));
        let notifier = capture_notifications(notifications.clone());
        let handlers = EventHandlers::new(10, customer_hooks(db.clone(), notifier.clone()));
        let producers = handlers.producers();
        handlers.start_handlers().await;
        let flags = SecurityFlags::default();
        let kiosk = Kiosk::new(db.clone(), remote.clone(), producers, rig.hardware.clone(), settings)
            .with_notifier(notifier)
            .with_security_flags(flags.clone())
            .with_prep_timings(PrepTimings::instant());
        Self { kiosk, db, catalog, rig, remote, flags, notifications }
    }

    /// Types `keys` each time the matching prompt appears on the display, in order.
    pub fn type_when_prompted(&self, steps: &[(&'static str, &'static str)]) -> JoinHandle<()> {
        type_when_prompted(self.rig.lcd.clone(), self.kiosk.key_sink(), steps.to_vec())
    }

    /// Waits up to a second for a notification that satisfies `f`.
    pub async fn notified(&self, f: impl Fn(&Notification) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if self.notifications.lock().unwrap().iter().any(&f) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

fn capture_notifications(sink: Arc<Mutex<Vec<Notification>>>) -> Notifier {
    let handler = EventHandler::new(
        25,
        Arc::new(move |n: Notification| {
            let sink = sink.clone();
            Box::pin(async move {
                sink.lock().unwrap().push(n);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        }),
    );
    let notifier = Notifier::new(handler.subscribe());
    tokio::spawn(handler.start_handler());
    notifier
}

pub fn type_when_prompted(
    lcd: Arc<RecordingLcd>,
    sink: KeyEventSink,
    steps: Vec<(&'static str, &'static str)>,
) -> JoinHandle<()> {
    // Only prompts shown from now on count
    let mut cursor = lcd.lines().len();
    tokio::spawn(async move {
        for (prompt, keys) in steps {
            let deadline = Instant::now() + Duration::from_secs(5);
            loop {
                let lines = lcd.lines();
                if let Some(pos) = lines[cursor..].iter().position(|l| l.contains(prompt)) {
                    cursor += pos + 1;
                    break;
                }
                assert!(Instant::now() < deadline, "The prompt '{prompt}' was never shown. Display: {lines:?}");
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            keys.chars().filter_map(Key::from_char).for_each(|k| sink.push(k));
        }
    })
}
