//! Payment sub-flows for a freshly created local order.
//!
//! Every flow ends in a single call to [`OrderFlowApi::record_payment`], which debits the customer, marks the
//! order paid and books the sale in one transaction. When a flow is abandoned the order stays `Pending`.
use std::time::Duration;

use log::*;
use vending_engine::{
    db_types::{Order, PaymentMethod, PaymentRequest, User},
    OrderFlowApi,
    VendingDatabase,
    VendingDbError,
};
use vmc_common::Cents;

use crate::{hal::Hardware, notifications::Notifier};

#[derive(Debug, Clone, Copy)]
pub struct PaymentSettings {
    pub rfid_timeout: Duration,
    pub qr_timeout: Duration,
    /// How often the RFID reader and the camera are checked.
    pub scan_interval: Duration,
    /// How long a status message stays on screen.
    pub message_pause: Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            rfid_timeout: Duration::from_secs(10),
            qr_timeout: Duration::from_secs(30),
            scan_interval: Duration::from_millis(100),
            message_pause: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decline {
    NoCardLinked,
    /// Nothing acceptable was presented before the timeout.
    TimedOut,
    InsufficientCredit,
    /// The customer did not pick a payment method.
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    Paid(Order),
    Declined(Decline),
}

/// Takes payment for an order, using the kiosk display and readers.
pub struct PaymentDesk<'a, B> {
    api: &'a OrderFlowApi<B>,
    hardware: &'a Hardware,
    notifier: &'a Notifier,
    settings: PaymentSettings,
}

impl<'a, B> PaymentDesk<'a, B>
where B: VendingDatabase
{
    pub fn new(
        api: &'a OrderFlowApi<B>,
        hardware: &'a Hardware,
        notifier: &'a Notifier,
        settings: PaymentSettings,
    ) -> Self {
        Self { api, hardware, notifier, settings }
    }

    /// Cash is collected by the machine before the order is entered, so the payment is recorded straight away.
    pub async fn pay_cash(&self, order_id: i64, price: Cents) -> PaymentOutcome {
        self.commit(PaymentRequest::new(order_id, None, price, PaymentMethod::Cash)).await
    }

    pub async fn pay_by_card(&self, order_id: i64, user: &User, price: Cents) -> PaymentOutcome {
        let Some(card) = user.rfid_card_id.as_deref() else {
            info!("🖥️ User {} has no RFID card linked", user.user_id);
            self.show("No RFID Linked", "Use QR Instead").await;
            return PaymentOutcome::Declined(Decline::NoCardLinked);
        };
        self.hardware.display("Scan RFID Card", &price.to_string());
        if !self.scan_card(card).await {
            info!("🖥️ No matching card was presented for order #{order_id}");
            self.show("Payment Required", "").await;
            return PaymentOutcome::Declined(Decline::TimedOut);
        }
        self.commit(PaymentRequest::new(order_id, Some(user.user_id), price, PaymentMethod::Rfid)).await
    }

    /// Issues the order's QR code, sends it to the customer's chat and waits for it to be shown to the camera.
    pub async fn pay_by_qr(&self, order_id: i64, user: &User, price: Cents) -> PaymentOutcome {
        self.hardware.display("Generating QR", "");
        let qr = match self.api.issue_collection_code(order_id, user).await {
            Ok(qr) => qr,
            Err(e) => {
                error!("🖥️ Could not issue a QR code for order #{order_id}. {e}");
                self.show("QR Failed", "Try Again").await;
                return PaymentOutcome::Declined(Decline::Failed(e.to_string()));
            },
        };
        match user.chat_id.as_deref() {
            Some(chat_id) => self.notifier.customer(
                chat_id,
                format!("Show this code to the kiosk camera to pay {price} for order #{order_id}: {}", qr.code),
            ),
            None => warn!("🖥️ User {} has no chat linked. The QR code cannot be delivered.", user.user_id),
        }
        self.hardware.display("Scan QR to Pay", "Opening Camera");
        if self.scan_code(self.settings.qr_timeout, Some(&qr.code)).await.is_none() {
            info!("🖥️ The QR code for order #{order_id} was not scanned in time");
            self.show("Payment Required", "").await;
            return PaymentOutcome::Declined(Decline::TimedOut);
        }
        self.commit(PaymentRequest::new(order_id, Some(user.user_id), price, PaymentMethod::Qr)).await
    }

    /// Polls the camera until a code is decoded, or `expected` is decoded if given. Returns `None` on timeout.
    pub async fn scan_code(&self, timeout: Duration, expected: Option<&str>) -> Option<String> {
        let scan = async {
            loop {
                match self.hardware.camera.try_decode() {
                    Ok(Some(code)) => match expected {
                        Some(want) if code.trim() != want => debug!("🖥️ Ignoring an unexpected QR code"),
                        _ => return code.trim().to_string(),
                    },
                    Ok(None) => {},
                    Err(e) => warn!("🖥️ Camera error. {e}"),
                }
                tokio::time::sleep(self.settings.scan_interval).await;
            }
        };
        tokio::time::timeout(timeout, scan).await.ok()
    }

    async fn scan_card(&self, expected: &str) -> bool {
        let scan = async {
            loop {
                match self.hardware.rfid.read_id_no_block() {
                    Ok(Some(id)) if id.trim() == expected => return true,
                    Ok(Some(_)) => {
                        debug!("🖥️ A card that does not belong to the customer was presented");
                        self.hardware.display("Invalid Card!", "Try Again");
                        self.hardware.beep(Duration::from_millis(100), Duration::from_millis(100), 2).await;
                        tokio::time::sleep(self.settings.message_pause).await;
                        self.hardware.display("Scan RFID Card", "");
                    },
                    Ok(None) => {},
                    Err(e) => warn!("🖥️ RFID reader error. {e}"),
                }
                tokio::time::sleep(self.settings.scan_interval).await;
            }
        };
        tokio::time::timeout(self.settings.rfid_timeout, scan).await.unwrap_or(false)
    }

    async fn commit(&self, payment: PaymentRequest) -> PaymentOutcome {
        let order_id = payment.order_id;
        match self.api.record_payment(payment).await {
            Ok(order) => {
                self.show("Payment Success", "Enjoy Your Drink!").await;
                PaymentOutcome::Paid(order)
            },
            Err(VendingDbError::InsufficientCredit { user_id, credit, price }) => {
                info!("🖥️ User {user_id} cannot pay {price} for order #{order_id} with {credit}");
                self.show("Insufficient", "Balance!").await;
                self.hardware.beep(Duration::from_millis(100), Duration::from_millis(100), 2).await;
                PaymentOutcome::Declined(Decline::InsufficientCredit)
            },
            Err(e) => {
                error!("🖥️ Could not record the payment for order #{order_id}. {e}");
                self.show("Payment Failed", "").await;
                PaymentOutcome::Declined(Decline::Failed(e.to_string()))
            },
        }
    }

    async fn show(&self, line1: &str, line2: &str) {
        self.hardware.display(line1, line2);
        tokio::time::sleep(self.settings.message_pause).await;
    }
}
