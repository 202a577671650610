use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CollectionQr, NewCollectionQr},
    traits::VendingDbError,
};

pub async fn insert_code(
    code: NewCollectionQr,
    created_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<CollectionQr, VendingDbError> {
    let qr: CollectionQr = sqlx::query_as(
        r#"
            INSERT INTO collection_qr_codes (order_id, phone_number, chat_id, qr_code, status, timestamp)
            VALUES ($1, $2, $3, $4, 'Pending', $5)
            RETURNING *;
        "#,
    )
    .bind(code.order_id)
    .bind(code.phone_number)
    .bind(code.chat_id)
    .bind(code.code)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Collection code {} issued for order #{}", qr.code, qr.order_id);
    Ok(qr)
}

pub async fn fetch_code_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<CollectionQr>, VendingDbError> {
    let qr = sqlx::query_as("SELECT * FROM collection_qr_codes WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(conn)
        .await?;
    Ok(qr)
}

/// Flips the code from `Pending` to `Collected`, provided its order has been prepared. Only one caller can ever win
/// this update.
pub async fn mark_collected(code: &str, conn: &mut SqliteConnection) -> Result<Option<CollectionQr>, VendingDbError> {
    let qr = sqlx::query_as(
        r#"
            UPDATE collection_qr_codes SET status = 'Collected'
            WHERE qr_code = $1 AND status = 'Pending'
              AND order_id IN (SELECT order_id FROM orders WHERE status = 'Completed')
            RETURNING *;
        "#,
    )
    .bind(code)
    .fetch_optional(conn)
    .await?;
    Ok(qr)
}
