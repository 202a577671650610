//! The kiosk control loop.
//!
//! Each pass of the loop first works through every order that is ready to be made (paid local orders and online
//! orders), and only then offers the keypad to a walk-in customer. While the customer is choosing a drink the
//! remote poller keeps running; a new online order abandons the entry so that it can be made first.
//!
//! In cash mode the customer goes straight to item entry. In account mode there is a main menu for the admin and
//! for customers, who identify themselves with their phone number and pay from their balance.
use std::time::Duration;

use log::*;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use vending_engine::{
    db_types::{NewOrder, PendingWork, User},
    events::EventProducers,
    helpers::{get_initials, parse_collection_code},
    AccountManagement,
    CatalogManagement,
    InventoryGate,
    OrderFlowApi,
    OrderPoller,
    RemoteOrderSource,
    VendingDatabase,
};
use vmc_common::{Cents, Secret};

use crate::{
    config::{KioskConfig, PaymentMode},
    errors::KioskError,
    hal::Hardware,
    keypad::{InputChannel, InputMode, KeyEventSink},
    notifications::Notifier,
    payment::{Decline, PaymentDesk, PaymentOutcome, PaymentSettings},
    preparation::{PrepTimings, Preparer},
    security::SecurityFlags,
};

pub const DOOR_OPEN_ANGLE: u16 = 90;
pub const DOOR_CLOSED_ANGLE: u16 = 0;
const ECHO_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct KioskSettings {
    pub payment_mode: PaymentMode,
    pub input_timeout: Duration,
    /// How often remote orders are checked while waiting for a walk-in customer.
    pub poll_interval: Duration,
    pub admin_passcode: Secret<String>,
    pub max_failed_logins: u32,
    pub payment: PaymentSettings,
    pub message_pause: Duration,
    /// How long to wait before re-checking the sensors while an intrusion is flagged.
    pub intrusion_pause: Duration,
}

impl Default for KioskSettings {
    fn default() -> Self {
        Self::from_config(&KioskConfig::default())
    }
}

impl KioskSettings {
    pub fn from_config(config: &KioskConfig) -> Self {
        let payment = PaymentSettings {
            rfid_timeout: config.rfid_timeout,
            qr_timeout: config.qr_scan_timeout,
            ..PaymentSettings::default()
        };
        Self {
            payment_mode: config.payment_mode,
            input_timeout: config.input_timeout,
            poll_interval: config.remote_poll_interval,
            admin_passcode: config.admin_passcode.clone(),
            max_failed_logins: config.max_failed_logins,
            message_pause: payment.message_pause,
            payment,
            intrusion_pause: Duration::from_secs(5),
        }
    }
}

/// How a pass of the control loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// An intrusion is in progress. No input was offered.
    Paused,
    /// A remote order arrived while the kiosk was waiting for input.
    Preempted,
    TimedOut,
    InvalidInput,
    UnknownCustomer,
    /// The drink is out of stock. No order was created.
    Rejected,
    /// The customer said no at the confirmation prompt. No order was created.
    Cancelled,
    /// The order was created but not paid for. It stays `Pending`.
    PaymentDeclined(Decline),
    Served(i64),
    PreparationFailed(i64),
    Collected(i64),
    CollectionRefused,
    AdminSession,
    AccessDenied,
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Echo {
    Off,
    Plain(&'static str),
    Masked,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    Token(String),
    TimedOut,
    Preempted,
    Interrupted,
}

impl Entry {
    /// The session outcome for an entry that did not produce a token.
    fn outcome(self) -> SessionOutcome {
        match self {
            Entry::Token(_) => SessionOutcome::InvalidInput,
            Entry::TimedOut => SessionOutcome::TimedOut,
            Entry::Preempted => SessionOutcome::Preempted,
            Entry::Interrupted => SessionOutcome::Paused,
        }
    }
}

pub struct Kiosk<B, S> {
    api: OrderFlowApi<B>,
    gate: InventoryGate<B>,
    poller: OrderPoller<B, S>,
    preparer: Preparer<B>,
    input: InputChannel,
    hardware: Hardware,
    notifier: Notifier,
    flags: SecurityFlags,
    settings: KioskSettings,
    failed_logins: u32,
}

impl<B, S> Kiosk<B, S>
where
    B: VendingDatabase,
    S: RemoteOrderSource,
{
    pub fn new(db: B, source: S, producers: EventProducers, hardware: Hardware, settings: KioskSettings) -> Self {
        Self {
            api: OrderFlowApi::new(db.clone(), producers),
            gate: InventoryGate::new(db.clone()),
            poller: OrderPoller::new(db.clone(), source),
            preparer: Preparer::new(db, hardware.clone(), PrepTimings::default()),
            input: InputChannel::default(),
            hardware,
            notifier: Notifier::disabled(),
            flags: SecurityFlags::default(),
            settings,
            failed_logins: 0,
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_security_flags(mut self, flags: SecurityFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_prep_timings(mut self, timings: PrepTimings) -> Self {
        self.preparer = Preparer::new(self.api.db().clone(), self.hardware.clone(), timings);
        self
    }

    /// The sink the keypad driver should push key presses into.
    pub fn key_sink(&self) -> KeyEventSink {
        self.input.sink()
    }

    pub fn api(&self) -> &OrderFlowApi<B> {
        &self.api
    }

    /// Runs the kiosk forever.
    pub async fn run(mut self) {
        info!("🖥️ Kiosk started in {} payment mode", self.settings.payment_mode);
        self.show("Smart Vending", "System Ready").await;
        loop {
            self.run_once().await;
        }
    }

    /// One pass of the control loop: make every order that is ready, then serve one walk-in session.
    pub async fn run_once(&mut self) -> SessionOutcome {
        if self.flags.intrusion() {
            warn!("🖥️ Intrusion in progress. Kiosk is paused.");
            self.hardware.display("Security Alert", "Please Wait");
            sleep(self.settings.intrusion_pause).await;
            return SessionOutcome::Paused;
        }
        let made = self.drain_pending_work().await;
        if made > 0 {
            debug!("🖥️ Made {made} waiting orders");
        }
        let outcome = match self.settings.payment_mode {
            PaymentMode::Cash => self.order_session(None).await,
            PaymentMode::Account => self.main_menu().await,
        };
        info!("🖥️ Session ended: {outcome:?}");
        outcome
    }

    /// Prepares every order that is ready to be made, oldest first. Returns the number of orders handled.
    pub async fn drain_pending_work(&mut self) -> usize {
        let mut handled = 0;
        while let Some(work) = self.poller.poll_and_merge().await {
            match self.process_work(&work).await {
                Ok(_) => handled += 1,
                Err(e) => {
                    error!("🖥️ Could not process order #{}. {e}", work.order_id);
                    break;
                },
            }
        }
        handled
    }

    async fn process_work(&mut self, work: &PendingWork) -> Result<bool, KioskError> {
        info!("🖥️ Making {} order #{} (item {})", work.source, work.order_id, work.item_id);
        let success = self.make_drink(work.order_id, work.item_id).await?;
        if success {
            self.show("Drink Ready!", "").await;
        } else {
            self.show("Prep Failed", "").await;
        }
        Ok(success)
    }

    async fn make_drink(&mut self, order_id: i64, item_id: i64) -> Result<bool, KioskError> {
        self.hardware.display(&format!("Preparing #{item_id}"), "");
        self.api.begin_preparation(order_id).await?;
        let success = self.preparer.prepare(item_id).await;
        self.api.finish_preparation(order_id, success).await?;
        Ok(success)
    }

    async fn main_menu(&mut self) -> SessionOutcome {
        match self.ask(InputMode::SingleDigit, ("1. Admin", "2. Customer"), Echo::Off, None, true).await {
            Entry::Token(t) if t == "1" => self.admin_session().await,
            Entry::Token(t) if t == "2" => self.customer_session().await,
            other => other.outcome(),
        }
    }

    async fn customer_session(&mut self) -> SessionOutcome {
        let timeout = Some(self.settings.input_timeout);
        let phone = match self.ask(InputMode::MultiDigit, ("Enter Phone No:", ""), Echo::Plain(""), timeout, false).await
        {
            Entry::Token(t) => t,
            other => return other.outcome(),
        };
        let user = match self.api.db().fetch_user_by_phone(&phone).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("🖥️ No customer with phone number {phone}");
                self.show("Invalid Number", "").await;
                return SessionOutcome::UnknownCustomer;
            },
            Err(e) => return self.system_error(e).await,
        };
        info!("🖥️ Customer {} logged in", user.user_id);
        self.show("Welcome!", &user.name).await;
        match self.ask(InputMode::SingleDigit, ("1. Collect", "2. Order"), Echo::Off, timeout, false).await {
            Entry::Token(t) if t == "1" => self.collect_session(&user).await,
            Entry::Token(t) if t == "2" => self.order_session(Some(&user)).await,
            other => other.outcome(),
        }
    }

    /// Item entry, confirmation, payment and preparation. Without a customer the order is paid in cash.
    async fn order_session(&mut self, user: Option<&User>) -> SessionOutcome {
        let menu = match self.api.db().fetch_menu().await {
            Ok(menu) => menu,
            Err(e) => return self.system_error(e).await,
        };
        for item in &menu {
            debug!("🖥️ Menu: #{} {} {}", item.id, item.name, item.price);
        }
        let token = match self.ask(InputMode::MultiDigit, ("Enter Item #", ""), Echo::Plain("Input: "), None, true).await
        {
            Entry::Token(t) => t,
            other => return other.outcome(),
        };
        let Ok(item_id) = token.parse::<i64>() else {
            self.show("Invalid Input", "").await;
            return SessionOutcome::InvalidInput;
        };
        let Some(item) = menu.into_iter().find(|m| m.id == item_id) else {
            self.show("Invalid Item", "").await;
            return SessionOutcome::InvalidInput;
        };
        if !self.gate.check_inventory(item_id).await {
            info!("🖥️ Item {item_id} is out of stock");
            self.show("Not enough stock", "").await;
            return SessionOutcome::Rejected;
        }
        self.hardware.display(&format!("Selected: {}", get_initials(&item.name)), &format!("Price: {}", item.price));
        self.hardware.beep(Duration::from_millis(100), Duration::from_millis(100), 1).await;
        sleep(self.settings.message_pause).await;
        let timeout = Some(self.settings.input_timeout);
        match self.ask(InputMode::SingleDigit, ("Confirm?", "1-Yes 2-No"), Echo::Off, timeout, false).await {
            Entry::Token(t) if t == "1" => {},
            Entry::Token(_) => {
                self.show("Cancelled", "").await;
                return SessionOutcome::Cancelled;
            },
            other => return other.outcome(),
        }
        let new_order = match user {
            Some(user) => NewOrder::local(item_id).for_user(user.user_id),
            None => NewOrder::local(item_id),
        };
        let order_id = match self.api.create_order(new_order).await {
            Ok(id) => id,
            Err(e) => return self.system_error(e).await,
        };
        self.show("Proceeding to", "Payment").await;
        let outcome = match user {
            None => self.desk().pay_cash(order_id, item.price).await,
            Some(user) => self.account_payment(order_id, user, item.price).await,
        };
        match outcome {
            PaymentOutcome::Paid(_) => self.serve(order_id, item_id).await,
            PaymentOutcome::Declined(reason) => {
                info!("🖥️ Order #{order_id} was not paid for: {reason:?}");
                SessionOutcome::PaymentDeclined(reason)
            },
        }
    }

    async fn account_payment(&mut self, order_id: i64, user: &User, price: Cents) -> PaymentOutcome {
        let timeout = Some(self.settings.input_timeout);
        match self.ask(InputMode::SingleDigit, ("1. RFID", "2. QR"), Echo::Off, timeout, false).await {
            Entry::Token(t) if t == "1" => self.desk().pay_by_card(order_id, user, price).await,
            Entry::Token(t) if t == "2" => self.desk().pay_by_qr(order_id, user, price).await,
            Entry::Token(_) => PaymentOutcome::Declined(Decline::Cancelled),
            _ => PaymentOutcome::Declined(Decline::TimedOut),
        }
    }

    async fn serve(&mut self, order_id: i64, item_id: i64) -> SessionOutcome {
        match self.make_drink(order_id, item_id).await {
            Ok(true) => {
                self.show("Drink Ready!", "").await;
                SessionOutcome::Served(order_id)
            },
            Ok(false) => {
                self.show("Prep Failed", "").await;
                SessionOutcome::PreparationFailed(order_id)
            },
            Err(e) => {
                error!("🖥️ Order #{order_id} was paid for but could not be made. {e}");
                self.show("System Error", "").await;
                SessionOutcome::Failed(e.to_string())
            },
        }
    }

    /// Scans a collection code and opens the door if it belongs to the customer, its drink has been made, and it has
    /// not been used.
    async fn collect_session(&mut self, user: &User) -> SessionOutcome {
        self.hardware.display("Scan your", "QR code");
        let code = self.desk().scan_code(self.settings.payment.qr_timeout, None).await;
        let Some(code) = code else {
            self.show("No QR Detected", "").await;
            return SessionOutcome::TimedOut;
        };
        let owned_by_user =
            parse_collection_code(&code).map(|(_, phone)| Some(phone) == user.phone_number).unwrap_or(false);
        if !owned_by_user {
            info!("🖥️ Customer {} scanned a code that is not theirs", user.user_id);
            self.show("Invalid QR", "").await;
            return SessionOutcome::CollectionRefused;
        }
        match self.api.redeem_collection_code(&code).await {
            Ok(Some(qr)) => {
                info!("🖥️ Order #{} collected", qr.order_id);
                self.hardware.display("Please Collect", "Your Drink");
                self.move_door(DOOR_OPEN_ANGLE);
                sleep(self.settings.message_pause).await;
                self.move_door(DOOR_CLOSED_ANGLE);
                SessionOutcome::Collected(qr.order_id)
            },
            Ok(None) => {
                self.show("Invalid QR", "Cannot Collect").await;
                SessionOutcome::CollectionRefused
            },
            Err(e) => self.system_error(e).await,
        }
    }

    /// Passcode login. The door stays open until the admin enters the passcode again.
    async fn admin_session(&mut self) -> SessionOutcome {
        let timeout = Some(self.settings.input_timeout);
        let code = match self.ask(InputMode::MultiDigit, ("Enter Passcode:", ""), Echo::Masked, timeout, false).await {
            Entry::Token(t) => t,
            other => return other.outcome(),
        };
        if code != *self.settings.admin_passcode.reveal() {
            self.failed_logins += 1;
            warn!("🛡️ Failed admin login. {} in a row.", self.failed_logins);
            self.hardware.display("Access Denied", "");
            self.hardware.beep(Duration::from_millis(500), Duration::from_millis(500), 2).await;
            if self.failed_logins >= self.settings.max_failed_logins {
                warn!("🛡️ Too many failed admin logins");
                self.hardware.display("Too Many", "Attempts!");
                self.notifier.admin("Security alert: too many failed admin logins at the kiosk");
                self.failed_logins = 0;
            }
            sleep(self.settings.message_pause).await;
            return SessionOutcome::AccessDenied;
        }
        self.failed_logins = 0;
        self.flags.set_admin_logged_in(true);
        info!("🛡️ Admin logged in");
        self.notifier.admin("Admin has logged in");
        self.show("Access Granted", "").await;
        self.move_door(DOOR_OPEN_ANGLE);
        loop {
            match self.ask(InputMode::MultiDigit, ("Admin Mode", ""), Echo::Masked, None, false).await {
                Entry::Token(t) if t == *self.settings.admin_passcode.reveal() => break,
                _ => self.show("Wrong Passcode", "").await,
            }
        }
        self.move_door(DOOR_CLOSED_ANGLE);
        self.flags.set_admin_logged_in(false);
        info!("🛡️ Admin logged out");
        self.notifier.admin("Admin has logged out");
        self.show("Logged Out", "").await;
        SessionOutcome::AdminSession
    }

    fn desk(&self) -> PaymentDesk<'_, B> {
        PaymentDesk::new(&self.api, &self.hardware, &self.notifier, self.settings.payment)
    }

    fn move_door(&self, angle: u16) {
        if let Err(e) = self.hardware.door.set_angle(angle) {
            error!("🖥️ Could not move the door to {angle}°. {e}");
        }
    }

    async fn show(&self, line1: &str, line2: &str) {
        self.hardware.display(line1, line2);
        sleep(self.settings.message_pause).await;
    }

    async fn system_error<E: std::fmt::Display>(&self, e: E) -> SessionOutcome {
        error!("🖥️ {e}");
        self.show("System Error", "Try Again").await;
        SessionOutcome::Failed(e.to_string())
    }

    /// Starts an input phase, shows the prompt and waits for a token.
    async fn ask(
        &mut self,
        mode: InputMode,
        prompt: (&str, &str),
        echo: Echo,
        timeout: Option<Duration>,
        preemptible: bool,
    ) -> Entry {
        self.input.begin_phase(mode);
        self.hardware.display(prompt.0, prompt.1);
        self.wait_for_entry(echo, timeout, preemptible).await
    }

    async fn wait_for_entry(&mut self, echo: Echo, timeout: Option<Duration>, preemptible: bool) -> Entry {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut echo_timer = interval(ECHO_INTERVAL);
        echo_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut poll_timer = interval(self.settings.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The work queue has just been drained, so skip the immediate first tick
        poll_timer.tick().await;
        let mut shown = String::new();
        loop {
            tokio::select! {
                token = self.input.recv() => {
                    return token.map(Entry::Token).unwrap_or(Entry::TimedOut);
                },
                _ = async {
                    match deadline {
                        Some(d) => tokio::time::sleep_until(d).await,
                        None => std::future::pending().await,
                    }
                } => {
                    debug!("⌨️ Input timed out");
                    return Entry::TimedOut;
                },
                _ = echo_timer.tick(), if echo != Echo::Off => {
                    let typed = self.input.buffer_snapshot();
                    if typed != shown {
                        let line = match echo {
                            Echo::Plain(prefix) => format!("{prefix}{typed}"),
                            _ => "*".repeat(typed.len()),
                        };
                        self.hardware.display_line(&format!("{line:<16}"), 2);
                        shown = typed;
                    }
                },
                _ = poll_timer.tick(), if preemptible => {
                    if self.flags.intrusion() {
                        return Entry::Interrupted;
                    }
                    if self.poller.poll_and_merge().await.is_some() {
                        info!("🖥️ A waiting order takes priority over this entry");
                        return Entry::Preempted;
                    }
                },
            }
        }
    }
}
