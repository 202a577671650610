use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;
use vmc_common::Cents;

use crate::{
    db_types::{Order, PaymentMethod, Sale},
    traits::VendingDbError,
};

/// Appends a sale for the order. The `sales.order_id` unique constraint guarantees there is never a second one.
pub async fn insert_sale(
    order: &Order,
    price: Cents,
    method: PaymentMethod,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Sale, VendingDbError> {
    let sale: Sale = sqlx::query_as(
        r#"
            INSERT INTO sales (order_id, item_id, timestamp, price, source, payment_source)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.item_id)
    .bind(created_at)
    .bind(price)
    .bind(order.source)
    .bind(method)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Sale #{} of {price} recorded for order #{}", sale.sale_id, order.order_id);
    Ok(sale)
}

pub async fn fetch_sales_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Sale>, VendingDbError> {
    let sales = sqlx::query_as("SELECT * FROM sales WHERE order_id = $1 ORDER BY sale_id")
        .bind(order_id)
        .fetch_all(conn)
        .await?;
    Ok(sales)
}

pub async fn sale_exists(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, VendingDbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sales WHERE order_id = $1").bind(order_id).fetch_one(conn).await?;
    Ok(count > 0)
}

pub async fn count_sales(conn: &mut SqliteConnection) -> Result<i64, VendingDbError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales").fetch_one(conn).await?;
    Ok(count)
}
