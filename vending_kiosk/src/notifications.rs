//! Customer and admin notifications.
//!
//! Notifications are queued through the engine's bounded event channel and delivered one at a time by a dedicated
//! worker. Queuing never blocks the kiosk. Delivery failures are logged and dropped.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use vending_engine::{
    events::{EventHandler, EventHooks, EventProducer, OrderFinishedEvent, OrderPaidEvent},
    AccountManagement,
    CatalogManagement,
    SqliteDatabase,
};

use crate::integrations::TelegramBot;

pub const NOTIFICATION_QUEUE_SIZE: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// For the machine operator. Logins, security alerts and stale orders.
    Admin(String),
    Customer { chat_id: String, text: String },
}

/// Queues notifications for delivery. A notifier without a queue only logs.
#[derive(Clone, Default)]
pub struct Notifier {
    producer: Option<EventProducer<Notification>>,
}

impl Notifier {
    pub fn new(producer: EventProducer<Notification>) -> Self {
        Self { producer: Some(producer) }
    }

    /// A notifier that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn admin(&self, text: impl Into<String>) {
        self.send(Notification::Admin(text.into()));
    }

    pub fn customer(&self, chat_id: &str, text: impl Into<String>) {
        self.send(Notification::Customer { chat_id: chat_id.to_string(), text: text.into() });
    }

    fn send(&self, notification: Notification) {
        trace!("🔔️ Queuing {notification:?}");
        match &self.producer {
            Some(producer) => {
                if !producer.publish_event(notification) {
                    warn!("🔔️ A notification could not be queued");
                }
            },
            None => debug!("🔔️ Notifications are disabled. Dropping {notification:?}"),
        }
    }
}

/// Creates the worker that delivers notifications through Telegram. Without a bot, notifications are only logged.
/// Admin notifications are dropped if no admin chat is configured.
pub fn notification_handler(bot: Option<TelegramBot>, admin_chat_id: Option<String>) -> EventHandler<Notification> {
    let bot = Arc::new(bot);
    let admin_chat_id = Arc::new(admin_chat_id);
    EventHandler::new(
        NOTIFICATION_QUEUE_SIZE,
        Arc::new(move |notification: Notification| {
            let bot = Arc::clone(&bot);
            let admin_chat_id = Arc::clone(&admin_chat_id);
            Box::pin(async move {
                let (chat_id, text) = match notification {
                    Notification::Admin(text) => match admin_chat_id.as_ref() {
                        Some(chat_id) => (chat_id.clone(), text),
                        None => {
                            info!("🔔️ [admin] {text}");
                            return;
                        },
                    },
                    Notification::Customer { chat_id, text } => (chat_id, text),
                };
                match bot.as_ref() {
                    Some(bot) => {
                        if let Err(e) = bot.send_message(&chat_id, &text).await {
                            warn!("🔔️ Could not deliver a notification to chat {chat_id}. {e}");
                        }
                    },
                    None => info!("🔔️ [chat {chat_id}] {text}"),
                }
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        }),
    )
}

/// Engine hooks that tell customers when their order was paid for and when their drink is ready.
pub fn customer_hooks(db: SqliteDatabase, notifier: Notifier) -> EventHooks {
    let mut hooks = EventHooks::default();
    let paid_db = db.clone();
    let paid_notifier = notifier.clone();
    hooks.on_order_paid(move |ev: OrderPaidEvent| {
        let db = paid_db.clone();
        let notifier = paid_notifier.clone();
        Box::pin(async move {
            let Some(chat_id) = customer_chat(&db, ev.order.user_id).await else {
                return;
            };
            let text = format!(
                "Payment of {} received for order #{} by {}. Thank you!",
                ev.sale.price, ev.order.order_id, ev.sale.payment_method
            );
            notifier.customer(&chat_id, text);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks.on_order_finished(move |ev: OrderFinishedEvent| {
        let db = db.clone();
        let notifier = notifier.clone();
        Box::pin(async move {
            let Some(chat_id) = customer_chat(&db, ev.order.user_id).await else {
                return;
            };
            let drink = match db.fetch_menu_item(ev.order.item_id).await {
                Ok(Some(item)) => item.name,
                _ => "drink".to_string(),
            };
            let text = if ev.success {
                format!("Your {drink} (order #{}) is ready. Enjoy!", ev.order.order_id)
            } else {
                format!("Sorry, we could not prepare your {drink} (order #{}). Please contact staff.", ev.order.order_id)
            };
            notifier.customer(&chat_id, text);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    hooks
}

async fn customer_chat(db: &SqliteDatabase, user_id: Option<i64>) -> Option<String> {
    let user_id = user_id?;
    match db.fetch_user(user_id).await {
        Ok(Some(user)) => user.chat_id,
        Ok(None) => {
            debug!("🔔️ User {user_id} no longer exists. No notification sent.");
            None
        },
        Err(e) => {
            warn!("🔔️ Could not look up user {user_id} for a notification. {e}");
            None
        },
    }
}

#[cfg(test)]
mod test {
    use std::{sync::Mutex, time::Duration};

    use super::*;

    #[tokio::test]
    async fn notifications_are_delivered_in_order() {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let handler = EventHandler::new(
            4,
            Arc::new(move |n: Notification| {
                let sink = Arc::clone(&sink);
                Box::pin(async move {
                    sink.lock().unwrap().push(n);
                }) as Pin<Box<dyn Future<Output = ()> + Send>>
            }),
        );
        let notifier = Notifier::new(handler.subscribe());
        let worker = tokio::spawn(handler.start_handler());
        notifier.admin("Admin has logged in");
        notifier.customer("chat-1", "Your drink is ready");
        drop(notifier);
        tokio::time::timeout(Duration::from_secs(1), worker).await.unwrap().unwrap();
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0], Notification::Admin("Admin has logged in".into()));
        assert_eq!(received[1], Notification::Customer {
            chat_id: "chat-1".into(),
            text: "Your drink is ready".into()
        });
    }

    #[test]
    fn disabled_notifier_is_silent() {
        let notifier = Notifier::disabled();
        notifier.admin("nobody is listening");
    }
}
