use std::str::FromStr;

use cucumber::{then, when};
use vending_engine::{
    db_types::{NewOrder, OrderSource, OrderStatusType, PaymentMethod, PaymentRequest, RemoteOrder},
    AccountManagement,
    CatalogManagement,
    VendingDatabase,
};
use vmc_common::Cents;

use crate::cucumber::VendingWorld;

fn payment_method(s: &str) -> PaymentMethod {
    match s {
        "Cash" => PaymentMethod::Cash,
        "RFID" => PaymentMethod::Rfid,
        "QR" => PaymentMethod::Qr,
        "Card" => PaymentMethod::Card,
        _ => panic!("Unknown payment method {s}"),
    }
}

//------------------------------------------  Remote orders  ----------------------------------------------------------

#[when(expr = "the remote service reports order {int} for drink {int}")]
async fn remote_reports(world: &mut VendingWorld, order_id: i64, item_id: i64) {
    world.system().remote.push(RemoteOrder { order_id, item_id, user_id: None });
}

#[when(expr = "the remote service reports order {int} for drink {int} for {word}")]
async fn remote_reports_for_user(world: &mut VendingWorld, order_id: i64, item_id: i64, name: String) {
    let user_id = world.system().user(&name).user_id;
    world.system().remote.push(RemoteOrder { order_id, item_id, user_id: Some(user_id) });
}

#[when("the remote service goes offline")]
async fn remote_offline(world: &mut VendingWorld) {
    world.system().remote.set_offline(true);
}

#[when(expr = "the kiosk polls for remote orders {int} times")]
async fn poll_many(world: &mut VendingWorld, times: usize) {
    let poller = world.system().poller();
    for _ in 0..times {
        let _ = poller.poll_and_merge().await;
    }
}

#[then(expr = "the next unit of work is order {int} from the {word} source")]
async fn next_work(world: &mut VendingWorld, order_id: i64, source: String) {
    let work = world.system().poller().poll_and_merge().await.expect("Expected pending work");
    assert_eq!(work.order_id, order_id);
    let expected = if source == "remote" { OrderSource::Remote } else { OrderSource::Local };
    assert_eq!(work.source, expected);
}

#[then("there is no pending work")]
async fn no_work(world: &mut VendingWorld) {
    let work = world.system().poller().poll_and_merge().await;
    assert!(work.is_none(), "Expected no work, got {work:?}");
}

#[then(expr = "there is exactly {int} order with id {int}")]
async fn exactly_one_order(world: &mut VendingWorld, count: i64, order_id: i64) {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_id = $1")
        .bind(order_id)
        .fetch_one(world.system().db.pool())
        .await
        .unwrap();
    assert_eq!(n, count);
}

#[then(expr = "there are {int} orders in total")]
async fn total_orders(world: &mut VendingWorld, count: i64) {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(world.system().db.pool()).await.unwrap();
    assert_eq!(n, count);
}

//------------------------------------------  Kiosk ordering  ---------------------------------------------------------

#[when(expr = "a cash customer orders drink {int} at the kiosk")]
async fn kiosk_order(world: &mut VendingWorld, item_id: i64) {
    let system = world.system_mut();
    system.rejected = !system.gate().check_inventory(item_id).await;
    if system.rejected {
        return;
    }
    let id = system.api.create_order(NewOrder::local(item_id)).await.expect("Error creating order");
    system.last_order = Some(id);
}

#[when(expr = "{word} orders drink {int} at the kiosk")]
async fn user_kiosk_order(world: &mut VendingWorld, name: String, item_id: i64) {
    let system = world.system_mut();
    let user_id = system.user(&name).user_id;
    system.rejected = !system.gate().check_inventory(item_id).await;
    if system.rejected {
        return;
    }
    let order = NewOrder::local(item_id).for_user(user_id);
    let id = system.api.create_order(order).await.expect("Error creating order");
    system.last_order = Some(id);
}

#[when(expr = "{word} pays for the order by {word}")]
async fn user_pays(world: &mut VendingWorld, name: String, method: String) {
    let system = world.system_mut();
    let order_id = system.last_order();
    let user_id = system.user(&name).user_id;
    let order = system.db.fetch_order(order_id).await.unwrap().expect("Order not found");
    let item = system.db.fetch_menu_item(order.item_id).await.unwrap().expect("Item not found");
    let payment = PaymentRequest::new(order_id, Some(user_id), item.price, payment_method(&method));
    match system.api.record_payment(payment).await {
        Ok(_) => system.last_error = None,
        Err(e) => system.last_error = Some(e),
    }
}

#[when("the order is paid in cash")]
async fn cash_payment(world: &mut VendingWorld) {
    let system = world.system_mut();
    let order_id = system.last_order();
    let order = system.db.fetch_order(order_id).await.unwrap().expect("Order not found");
    let item = system.db.fetch_menu_item(order.item_id).await.unwrap().expect("Item not found");
    let payment = PaymentRequest::new(order_id, None, item.price, PaymentMethod::Cash);
    system.api.record_payment(payment).await.expect("Cash payment failed");
}

#[when(expr = "the dispenser prepares order {int} {word}")]
async fn prepare_order(world: &mut VendingWorld, order_id: i64, outcome: String) {
    prepare(world, order_id, outcome == "successfully").await;
}

#[when(expr = "the dispenser prepares the order {word}")]
async fn prepare_last_order(world: &mut VendingWorld, outcome: String) {
    let order_id = world.system().last_order();
    prepare(world, order_id, outcome == "successfully").await;
}

async fn prepare(world: &mut VendingWorld, order_id: i64, success: bool) {
    let system = world.system();
    system.api.begin_preparation(order_id).await.expect("Error starting preparation");
    let order = system.db.fetch_order(order_id).await.unwrap().expect("Order not found");
    assert_eq!(order.status, OrderStatusType::Preparing);
    if success {
        system.db.consume_ingredients(order.item_id).await.expect("Error consuming ingredients");
    }
    system.api.finish_preparation(order_id, success).await.expect("Error finishing preparation");
}

#[when("a collection code is issued for the order")]
async fn issue_code(world: &mut VendingWorld) {
    let system = world.system();
    let order = system.db.fetch_order(system.last_order()).await.unwrap().expect("Order not found");
    let user_id = order.user_id.expect("Order has no customer");
    let user = system.db.fetch_user(user_id).await.unwrap().expect("User not found");
    system.api.issue_collection_code(order.order_id, &user).await.expect("Error issuing code");
}

//------------------------------------------  Assertions  -------------------------------------------------------------

#[then("no order was created")]
async fn no_order_created(world: &mut VendingWorld) {
    let system = world.system();
    assert!(system.rejected, "The inventory gate accepted the order");
    total_orders(world, 0).await;
}

#[then("the kiosk accepted the order")]
async fn order_accepted(world: &mut VendingWorld) {
    let system = world.system();
    assert!(!system.rejected, "The inventory gate rejected the order");
    assert!(system.last_order.is_some());
}

#[then(expr = "the order status is {word}")]
async fn order_status(world: &mut VendingWorld, status: String) {
    let system = world.system();
    let order = system.db.fetch_order(system.last_order()).await.unwrap().expect("Order not found");
    assert_eq!(order.status, OrderStatusType::from_str(&status).unwrap());
}

#[then(expr = "order {int} has status {word}")]
async fn numbered_order_status(world: &mut VendingWorld, order_id: i64, status: String) {
    let order = world.system().db.fetch_order(order_id).await.unwrap().expect("Order not found");
    assert_eq!(order.status, OrderStatusType::from_str(&status).unwrap());
}

#[then(expr = "{word} has {word} credit")]
async fn user_credit(world: &mut VendingWorld, name: String, credit: String) {
    let system = world.system();
    let user_id = system.user(&name).user_id;
    let user = system.db.fetch_user(user_id).await.unwrap().expect("User not found");
    assert_eq!(user.credit, credit.parse::<Cents>().unwrap());
}

#[then(expr = "the order has {int} sale(s)")]
async fn order_sales(world: &mut VendingWorld, count: usize) {
    let system = world.system();
    let sales = system.db.fetch_sales_for_order(system.last_order()).await.unwrap();
    assert_eq!(sales.len(), count);
}

#[then(expr = "order {int} has {int} sale(s)")]
async fn numbered_order_sales(world: &mut VendingWorld, order_id: i64, count: usize) {
    let sales = world.system().db.fetch_sales_for_order(order_id).await.unwrap();
    assert_eq!(sales.len(), count);
}

#[then(expr = "the sale was for {word} by {word}")]
async fn sale_details(world: &mut VendingWorld, price: String, method: String) {
    let system = world.system();
    let sales = system.db.fetch_sales_for_order(system.last_order()).await.unwrap();
    let sale = sales.first().expect("No sale recorded");
    assert_eq!(sale.price, price.parse::<Cents>().unwrap());
    assert_eq!(sale.payment_method, payment_method(&method));
}

#[then(expr = "the payment was refused for insufficient credit")]
async fn insufficient_credit(world: &mut VendingWorld) {
    let err = world.system().last_error.as_ref().expect("Payment did not fail");
    assert!(
        matches!(err, vending_engine::VendingDbError::InsufficientCredit { .. }),
        "Unexpected error: {err}"
    );
}

#[then(expr = "the stock of {string} is {int}")]
async fn check_stock(world: &mut VendingWorld, name: String, amount: i64) {
    let inventory = world.system().db.fetch_inventory().await.unwrap();
    let item = inventory.iter().find(|i| i.name == name).unwrap_or_else(|| panic!("No inventory called {name}"));
    assert_eq!(item.amount, amount);
}

#[then(expr = "drink {int} costs {word}")]
async fn check_price(world: &mut VendingWorld, item_id: i64, price: String) {
    let item = world.system().db.fetch_menu_item(item_id).await.unwrap().expect("Item not found");
    assert_eq!(item.price, price.parse::<Cents>().unwrap());
}

#[then(expr = "the collection code {string} can be redeemed {int} time(s)")]
async fn redeem_code(world: &mut VendingWorld, code: String, times: usize) {
    let api = &world.system().api;
    let mut redeemed = 0;
    for _ in 0..3 {
        if api.redeem_collection_code(&code).await.unwrap().is_some() {
            redeemed += 1;
        }
    }
    assert_eq!(redeemed, times);
}
