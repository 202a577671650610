use crate::{
    db_types::{InventoryItem, MenuItem, RecipeLine},
    traits::VendingDbError,
};

/// Read-only queries over the menu and the ingredient stock.
#[allow(async_fn_in_trait)]
pub trait CatalogManagement {
    /// Returns the menu items that are currently available, ordered by id.
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, VendingDbError>;

    async fn fetch_menu_item(&self, item_id: i64) -> Result<Option<MenuItem>, VendingDbError>;

    /// Returns every ingredient link of the drink. Links to missing inventory rows are included, with `None` for the
    /// name and amount.
    async fn fetch_recipe(&self, item_id: i64) -> Result<Vec<RecipeLine>, VendingDbError>;

    async fn fetch_inventory(&self) -> Result<Vec<InventoryItem>, VendingDbError>;
}
