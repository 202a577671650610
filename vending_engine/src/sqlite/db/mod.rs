//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interactions are simple functions that accept a `&mut SqliteConnection` argument. Callers can obtain a
//! connection from a pool, or open a transaction when several of them must succeed or fail together, and pass
//! `&mut tx` through without any other changes.
use std::{env, str::FromStr};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod catalog;
pub mod collection;
pub mod orders;
pub mod sales;
pub mod users;

const SQLITE_DB_URL: &str = "sqlite://data/vending_machine.db";

pub fn db_url() -> String {
    let result = env::var("VMC_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ VMC_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
