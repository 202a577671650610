use log::{trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{InventoryItem, MenuItem, NewMenuItem, RecipeLine},
    traits::VendingDbError,
};

pub async fn insert_menu_item(item: NewMenuItem, conn: &mut SqliteConnection) -> Result<MenuItem, VendingDbError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO menu (name, category, price, availability)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(item.name)
    .bind(item.category)
    .bind(item.price)
    .bind(item.availability)
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn insert_inventory_item(
    name: &str,
    amount: i64,
    conn: &mut SqliteConnection,
) -> Result<InventoryItem, VendingDbError> {
    let item = sqlx::query_as("INSERT INTO inventory_list (inventory_name, amount) VALUES ($1, $2) RETURNING *")
        .bind(name)
        .bind(amount)
        .fetch_one(conn)
        .await?;
    Ok(item)
}

pub async fn link_ingredient(item_id: i64, inventory_id: i64, conn: &mut SqliteConnection) -> Result<(), VendingDbError> {
    sqlx::query("INSERT OR IGNORE INTO menu_inventory (id, inventory_id) VALUES ($1, $2)")
        .bind(item_id)
        .bind(inventory_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_menu(conn: &mut SqliteConnection) -> Result<Vec<MenuItem>, VendingDbError> {
    let items = sqlx::query_as("SELECT * FROM menu WHERE availability = TRUE ORDER BY id").fetch_all(conn).await?;
    Ok(items)
}

pub async fn fetch_menu_item(item_id: i64, conn: &mut SqliteConnection) -> Result<Option<MenuItem>, VendingDbError> {
    let item = sqlx::query_as("SELECT * FROM menu WHERE id = $1").bind(item_id).fetch_optional(conn).await?;
    Ok(item)
}

pub async fn fetch_recipe(item_id: i64, conn: &mut SqliteConnection) -> Result<Vec<RecipeLine>, VendingDbError> {
    let lines = sqlx::query_as(
        r#"
            SELECT mi.inventory_id, il.inventory_name, il.amount
            FROM menu_inventory mi
            LEFT JOIN inventory_list il ON il.inventory_id = mi.inventory_id
            WHERE mi.id = $1
            ORDER BY mi.inventory_id;
        "#,
    )
    .bind(item_id)
    .fetch_all(conn)
    .await?;
    Ok(lines)
}

pub async fn fetch_inventory(conn: &mut SqliteConnection) -> Result<Vec<InventoryItem>, VendingDbError> {
    let items = sqlx::query_as("SELECT * FROM inventory_list ORDER BY inventory_id").fetch_all(conn).await?;
    Ok(items)
}

/// Takes `units` out of every ingredient linked to the drink. The decrement is not bounded below; a negative amount is
/// logged and left for an operator to correct.
pub async fn consume_ingredients(
    item_id: i64,
    units: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryItem>, VendingDbError> {
    let items: Vec<InventoryItem> = sqlx::query_as(
        r#"
            UPDATE inventory_list SET amount = amount - $1
            WHERE inventory_id IN (SELECT inventory_id FROM menu_inventory WHERE id = $2)
            RETURNING *;
        "#,
    )
    .bind(units)
    .bind(item_id)
    .fetch_all(conn)
    .await?;
    for item in items.iter().filter(|i| i.amount < 0) {
        warn!("🗃️ Stock of {} (#{}) is now negative: {}", item.name, item.id, item.amount);
    }
    trace!("🗃️ Consumed {units} units of {} ingredients for item {item_id}", items.len());
    Ok(items)
}
