use crate::{
    db_types::{Sale, User},
    traits::VendingDbError,
};

/// Read-only queries over customers and the sales ledger.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    async fn fetch_user(&self, user_id: i64) -> Result<Option<User>, VendingDbError>;

    /// Looks a customer up by the phone number they type on the keypad.
    async fn fetch_user_by_phone(&self, phone_number: &str) -> Result<Option<User>, VendingDbError>;

    /// All sales recorded against the order. There is at most one.
    async fn fetch_sales_for_order(&self, order_id: i64) -> Result<Vec<Sale>, VendingDbError>;

    async fn count_sales(&self) -> Result<i64, VendingDbError>;
}
