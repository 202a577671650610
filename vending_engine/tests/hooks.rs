use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
    Mutex,
};

use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};
use vending_engine::{
    db_types::{NewOrder, OrderStatusType, PaymentMethod, PaymentRequest},
    events::{EventHandlers, EventHooks},
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_catalog, seed_user},
    },
    OrderFlowApi,
    SqliteDatabase,
    VendingDatabase,
};
use vmc_common::Cents;

async fn tear_down(mut db: SqliteDatabase) {
    let url = db.url().to_string();
    if let Err(e) = db.close().await {
        error!("🚀️ Failed to close database: {e}");
    }
    Sqlite::drop_database(&url).await.unwrap();
}

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn paid_and_finished_hooks_fire() {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let catalog = seed_catalog(&db).await;
    let user = seed_user(&db, "Dana", "90001111", Cents::from_dollars(5)).await;

    let paid = HookCalled::default();
    let paid_copy = paid.clone();
    let finished = Arc::new(Mutex::new(Vec::new()));
    let finished_copy = finished.clone();
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(move |ev| {
            info!("🪝️ paid {:?}", ev.order.order_id);
            paid_copy.called();
            Box::pin(async {})
        })
        .on_order_finished(move |ev| {
            let finished = finished_copy.clone();
            Box::pin(async move {
                finished.lock().unwrap().push((ev.order.order_id, ev.order.status, ev.success));
            })
        });
    let handlers = EventHandlers::new(8, hooks);
    let api = OrderFlowApi::new(db.clone(), handlers.producers());
    handlers.start_handlers().await;

    let ok = api.create_order(NewOrder::local(catalog.coffee.id).for_user(user.user_id)).await.unwrap();
    let payment = PaymentRequest::new(ok, Some(user.user_id), catalog.coffee.price, PaymentMethod::Rfid);
    api.record_payment(payment).await.unwrap();
    api.begin_preparation(ok).await.unwrap();
    api.finish_preparation(ok, true).await.unwrap();

    let bad = api.create_order(NewOrder::local(catalog.coffee.id)).await.unwrap();
    api.begin_preparation(bad).await.unwrap();
    api.finish_preparation(bad, false).await.unwrap();

    // let the handler workers drain their queues
    drop(api);
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert_eq!(paid.count(), 1);
    let finished = finished.lock().unwrap().clone();
    assert_eq!(finished, vec![
        (ok, OrderStatusType::Completed, true),
        (bad, OrderStatusType::Failed, false)
    ]);
    tear_down(db).await;
}

#[tokio::test]
async fn failed_payment_fires_nothing() {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    let catalog = seed_catalog(&db).await;
    let user = seed_user(&db, "Eve", "90002222", Cents::from(100)).await;

    let paid = HookCalled::default();
    let paid_copy = paid.clone();
    let mut hooks = EventHooks::default();
    hooks.on_order_paid(move |_| {
        paid_copy.called();
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(8, hooks);
    let api = OrderFlowApi::new(db.clone(), handlers.producers());
    handlers.start_handlers().await;

    let id = api.create_order(NewOrder::local(catalog.milk_tea.id).for_user(user.user_id)).await.unwrap();
    let payment = PaymentRequest::new(id, Some(user.user_id), catalog.milk_tea.price, PaymentMethod::Qr);
    assert!(api.record_payment(payment).await.is_err());
    drop(api);
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    assert_eq!(paid.count(), 0);
    tear_down(db).await;
}
