//! A small fixture catalogue used throughout the tests.
//!
//! | id | drink           | price | ingredients          |
//! |----|-----------------|-------|----------------------|
//! | 1  | Classic Coffee  | $2.50 | Coffee Beans, Milk   |
//! | 2  | Lychee Milk Tea | $3.00 | Tea Leaves, Milk, Lychee Syrup |
//! | 3  | Hot Water       | $0.50 | (none)               |
//!
//! Every ingredient starts with 100 units.
use vmc_common::Cents;

use crate::{
    db_types::{MenuItem, NewMenuItem, NewUser, User},
    SqliteDatabase,
};

#[derive(Debug, Clone)]
pub struct SeededCatalog {
    pub coffee: MenuItem,
    pub milk_tea: MenuItem,
    pub hot_water: MenuItem,
}

pub async fn seed_catalog(db: &SqliteDatabase) -> SeededCatalog {
    let coffee = db.insert_menu_item(NewMenuItem::new("Classic Coffee", "Coffee", Cents::from(250))).await.unwrap();
    let milk_tea = db.insert_menu_item(NewMenuItem::new("Lychee Milk Tea", "Tea", Cents::from(300))).await.unwrap();
    let hot_water = db.insert_menu_item(NewMenuItem::new("Hot Water", "Other", Cents::from(50))).await.unwrap();
    let beans = db.insert_inventory_item("Coffee Beans", 100).await.unwrap();
    let milk = db.insert_inventory_item("Milk", 100).await.unwrap();
    let tea = db.insert_inventory_item("Tea Leaves", 100).await.unwrap();
    let syrup = db.insert_inventory_item("Lychee Syrup", 100).await.unwrap();
    for inv in [&beans, &milk] {
        db.link_ingredient(coffee.id, inv.id).await.unwrap();
    }
    for inv in [&tea, &milk, &syrup] {
        db.link_ingredient(milk_tea.id, inv.id).await.unwrap();
    }
    SeededCatalog { coffee, milk_tea, hot_water }
}

/// Inserts a customer with a phone number, chat id and RFID card derived from the name.
pub async fn seed_user(db: &SqliteDatabase, name: &str, phone: &str, credit: Cents) -> User {
    let user = NewUser::new(name, credit)
        .with_phone(phone)
        .with_chat_id(format!("chat-{phone}"))
        .with_rfid(format!("card-{phone}"));
    db.insert_user(user).await.unwrap()
}

pub async fn set_stock(db: &SqliteDatabase, name: &str, amount: i64) {
    sqlx::query("UPDATE inventory_list SET amount = $1 WHERE inventory_name = $2")
        .bind(amount)
        .bind(name)
        .execute(db.pool())
        .await
        .unwrap();
}
