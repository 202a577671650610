use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{InsertOrderResult, NewOrder, Order, OrderSource, OrderStatusType, PaymentMethod, PendingWork, RemoteOrder},
    traits::VendingDbError,
};

/// Inserts a new local or remote order with status `Pending`. The database assigns the order id.
pub async fn insert_order(
    order: NewOrder,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, VendingDbError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO orders (item_id, user_id, source, status, timestamp, payment_source)
            VALUES ($1, $2, $3, 'Pending', $4, $5)
            RETURNING order_id;
        "#,
    )
    .bind(order.item_id)
    .bind(order.user_id)
    .bind(order.source)
    .bind(created_at)
    .bind(order.payment_method)
    .fetch_one(conn)
    .await?;
    trace!("🗃️ Order #{id} for item {} inserted", order.item_id);
    Ok(id)
}

/// Inserts the remote order under its upstream id, unless an order with that id already exists.
pub async fn idempotent_insert_remote(
    order: RemoteOrder,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<InsertOrderResult, VendingDbError> {
    if order_exists(order.order_id, conn).await? {
        trace!("🗃️ Remote order #{} is already known", order.order_id);
        return Ok(InsertOrderResult::AlreadyExists(order.order_id));
    }
    sqlx::query(
        r#"
            INSERT INTO orders (order_id, item_id, user_id, source, status, timestamp)
            VALUES ($1, $2, $3, $4, 'Pending', $5);
        "#,
    )
    .bind(order.order_id)
    .bind(order.item_id)
    .bind(order.user_id)
    .bind(OrderSource::Remote)
    .bind(created_at)
    .execute(conn)
    .await?;
    debug!("🗃️ Remote order #{} for item {} inserted", order.order_id, order.item_id);
    Ok(InsertOrderResult::Inserted(order.order_id))
}

pub async fn order_exists(order_id: i64, conn: &mut SqliteConnection) -> Result<bool, VendingDbError> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE order_id = $1").bind(order_id).fetch_one(conn).await?;
    Ok(count > 0)
}

pub async fn fetch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, VendingDbError> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(order)
}

/// The oldest remote order still `Pending`, or paid order not yet prepared, whichever came first.
pub async fn fetch_next_work(conn: &mut SqliteConnection) -> Result<Option<PendingWork>, VendingDbError> {
    let work = sqlx::query_as(
        r#"
            SELECT o.order_id, o.item_id, o.source, o.user_id FROM orders o
            WHERE o.status = 'Paid' OR (o.status = 'Pending' AND o.source = 'remote')
            ORDER BY o.timestamp ASC, o.order_id ASC
            LIMIT 1;
        "#,
    )
    .fetch_optional(conn)
    .await?;
    Ok(work)
}

/// Overwrites the order status and returns the old one, or `None` if the order does not exist.
pub async fn update_order_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderStatusType>, VendingDbError> {
    let old = match fetch_order(order_id, &mut *conn).await? {
        Some(order) => order.status,
        None => return Ok(None),
    };
    sqlx::query("UPDATE orders SET status = $1 WHERE order_id = $2")
        .bind(status)
        .bind(order_id)
        .execute(conn)
        .await?;
    trace!("🗃️ Order #{order_id} status {old} -> {status}");
    Ok(Some(old))
}

pub async fn mark_paid(
    order_id: i64,
    method: PaymentMethod,
    transaction_id: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Order, VendingDbError> {
    let order = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Paid', payment_source = $1, transaction_id = COALESCE($2, transaction_id)
            WHERE order_id = $3
            RETURNING *;
        "#,
    )
    .bind(method)
    .bind(transaction_id)
    .bind(order_id)
    .fetch_optional(conn)
    .await?;
    order.ok_or(VendingDbError::OrderNotFound(order_id))
}

pub async fn fetch_stale_unpaid_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, VendingDbError> {
    let orders = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'Pending' AND source = 'local' AND timestamp < $1
            ORDER BY timestamp ASC, order_id ASC;
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
