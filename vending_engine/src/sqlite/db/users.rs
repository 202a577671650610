use log::trace;
use sqlx::SqliteConnection;
use vmc_common::Cents;

use crate::{
    db_types::{NewUser, User},
    traits::VendingDbError,
};

pub async fn insert_user(user: NewUser, conn: &mut SqliteConnection) -> Result<User, VendingDbError> {
    let user = sqlx::query_as(
        r#"
            INSERT INTO users (name, phone_number, chat_id, rfid_card_id, credit)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(user.name)
    .bind(user.phone_number)
    .bind(user.chat_id)
    .bind(user.rfid_card_id)
    .bind(user.credit)
    .fetch_one(conn)
    .await?;
    Ok(user)
}

pub async fn fetch_user(user_id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, VendingDbError> {
    let user = sqlx::query_as("SELECT * FROM users WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(user)
}

pub async fn fetch_user_by_phone(phone: &str, conn: &mut SqliteConnection) -> Result<Option<User>, VendingDbError> {
    let user =
        sqlx::query_as("SELECT * FROM users WHERE phone_number = $1").bind(phone).fetch_optional(conn).await?;
    Ok(user)
}

/// Debits `amount` from the user's credit, provided the credit covers it. The check and the debit are a single
/// statement. Returns the new credit, or `None` if the credit was insufficient (or the user does not exist).
pub async fn debit_credit(
    user_id: i64,
    amount: Cents,
    conn: &mut SqliteConnection,
) -> Result<Option<Cents>, VendingDbError> {
    let credit: Option<Cents> = sqlx::query_scalar(
        r#"
            UPDATE users SET credit = credit - $1
            WHERE user_id = $2 AND credit >= $1
            RETURNING credit;
        "#,
    )
    .bind(amount)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    trace!("🗃️ Debit of {amount} from user #{user_id}: new credit {credit:?}");
    Ok(credit)
}
