//! `SqliteDatabase` is the concrete backend of the vending engine.
//!
//! It uses SQLite as the system of record and implements all the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{catalog, collection, db_url, new_pool, orders, sales, users};
use crate::{
    db_types::{
        CollectionQr,
        InsertOrderResult,
        InventoryItem,
        MenuItem,
        NewCollectionQr,
        NewMenuItem,
        NewOrder,
        NewUser,
        Order,
        OrderStatusType,
        PaymentMethod,
        PaymentRequest,
        PendingWork,
        RecipeLine,
        RemoteOrder,
        Sale,
        User,
        INGREDIENT_UNITS_PER_DRINK,
    },
    traits::{AccountManagement, CatalogManagement, VendingDatabase, VendingDbError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl VendingDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<i64, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        let source = order.source;
        let id = orders::insert_order(order, Utc::now(), &mut conn).await?;
        debug!("🗃️ New {source} order #{id} saved");
        Ok(id)
    }

    async fn insert_remote_order(&self, order: RemoteOrder) -> Result<InsertOrderResult, VendingDbError> {
        let mut tx = self.pool.begin().await?;
        let result = orders::idempotent_insert_remote(order, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order(order_id, &mut conn).await
    }

    async fn fetch_next_work(&self) -> Result<Option<PendingWork>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_next_work(&mut conn).await
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatusType,
    ) -> Result<OrderStatusType, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, &mut conn).await?.ok_or(VendingDbError::OrderNotFound(order_id))
    }

    async fn record_payment(&self, payment: PaymentRequest) -> Result<(Order, Sale), VendingDbError> {
        let PaymentRequest { order_id, user_id, price, method } = payment;
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(VendingDbError::OrderNotFound(order_id))?;
        if order.status != OrderStatusType::Pending || sales::sale_exists(order_id, &mut tx).await? {
            return Err(VendingDbError::OrderAlreadyPaid(order_id));
        }
        if let Some(user_id) = user_id {
            let user = users::fetch_user(user_id, &mut tx).await?.ok_or(VendingDbError::UserNotFound(user_id))?;
            match users::debit_credit(user_id, price, &mut tx).await? {
                Some(credit) => trace!("🗃️ User #{user_id} debited {price}. Credit is now {credit}"),
                None => {
                    return Err(VendingDbError::InsufficientCredit { user_id, credit: user.credit, price });
                },
            }
        }
        let order = orders::mark_paid(order_id, method, None, &mut tx).await?;
        let sale = sales::insert_sale(&order, price, method, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order #{order_id} paid by {method}. Sale #{} recorded", sale.sale_id);
        Ok((order, sale))
    }

    async fn complete_order(&self, order_id: i64) -> Result<Order, VendingDbError> {
        let mut tx = self.pool.begin().await?;
        orders::update_order_status(order_id, OrderStatusType::Completed, &mut tx)
            .await?
            .ok_or(VendingDbError::OrderNotFound(order_id))?;
        let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(VendingDbError::OrderNotFound(order_id))?;
        if !sales::sale_exists(order_id, &mut tx).await? {
            let item = catalog::fetch_menu_item(order.item_id, &mut tx)
                .await?
                .ok_or(VendingDbError::MenuItemNotFound(order.item_id))?;
            let method = order.payment_method.unwrap_or(PaymentMethod::Remote);
            let sale = sales::insert_sale(&order, item.price, method, Utc::now(), &mut tx).await?;
            debug!("🗃️ Order #{order_id} completed without a prior sale. Sale #{} appended", sale.sale_id);
        }
        tx.commit().await?;
        Ok(order)
    }

    async fn consume_ingredients(&self, item_id: i64) -> Result<Vec<InventoryItem>, VendingDbError> {
        let mut tx = self.pool.begin().await?;
        let items = catalog::consume_ingredients(item_id, INGREDIENT_UNITS_PER_DRINK, &mut tx).await?;
        tx.commit().await?;
        Ok(items)
    }

    async fn fetch_stale_unpaid_orders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_stale_unpaid_orders(cutoff, &mut conn).await
    }

    async fn issue_collection_code(&self, code: NewCollectionQr) -> Result<CollectionQr, VendingDbError> {
        let mut tx = self.pool.begin().await?;
        let order_id = code.order_id;
        if !orders::order_exists(order_id, &mut tx).await? {
            return Err(VendingDbError::OrderNotFound(order_id));
        }
        if collection::fetch_code_for_order(order_id, &mut tx).await?.is_some() {
            return Err(VendingDbError::CodeAlreadyIssued(order_id));
        }
        let qr = collection::insert_code(code, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(qr)
    }

    async fn redeem_collection_code(&self, code: &str) -> Result<Option<CollectionQr>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        let result = collection::mark_collected(code, &mut conn).await?;
        match &result {
            Some(qr) => debug!("🗃️ Collection code for order #{} redeemed", qr.order_id),
            None => debug!("🗃️ Collection code {code} is unknown or already collected"),
        }
        Ok(result)
    }

    async fn fetch_collection_code(&self, order_id: i64) -> Result<Option<CollectionQr>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        collection::fetch_code_for_order(order_id, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), VendingDbError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CatalogManagement for SqliteDatabase {
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_menu(&mut conn).await
    }

    async fn fetch_menu_item(&self, item_id: i64) -> Result<Option<MenuItem>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_menu_item(item_id, &mut conn).await
    }

    async fn fetch_recipe(&self, item_id: i64) -> Result<Vec<RecipeLine>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_recipe(item_id, &mut conn).await
    }

    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::fetch_inventory(&mut conn).await
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user(user_id, &mut conn).await
    }

    async fn fetch_user_by_phone(&self, phone_number: &str) -> Result<Option<User>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_phone(phone_number, &mut conn).await
    }

    async fn fetch_sales_for_order(&self, order_id: i64) -> Result<Vec<Sale>, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        sales::fetch_sales_for_order(order_id, &mut conn).await
    }

    async fn count_sales(&self) -> Result<i64, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        sales::count_sales(&mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the `VMC_DATABASE_URL` environment variable (or the default).
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    /// Applies any outstanding schema migrations.
    pub async fn migrate(&self) -> Result<(), VendingDbError> {
        migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| VendingDbError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Catalogue and customer bootstrap. The admin service owns these tables in production; the kiosk only needs
    // them for seeding a fresh database.

    pub async fn insert_menu_item(&self, item: NewMenuItem) -> Result<MenuItem, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_menu_item(item, &mut conn).await
    }

    pub async fn insert_inventory_item(&self, name: &str, amount: i64) -> Result<InventoryItem, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::insert_inventory_item(name, amount, &mut conn).await
    }

    pub async fn link_ingredient(&self, item_id: i64, inventory_id: i64) -> Result<(), VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        catalog::link_ingredient(item_id, inventory_id, &mut conn).await
    }

    pub async fn insert_user(&self, user: NewUser) -> Result<User, VendingDbError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(user, &mut conn).await
    }
}
