use log::*;

use crate::{db_types::INGREDIENT_UNITS_PER_DRINK, traits::CatalogManagement};

/// Read-only check that a drink can be prepared from the current stock.
#[derive(Clone)]
pub struct InventoryGate<B> {
    db: B,
}

impl<B> InventoryGate<B>
where B: CatalogManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Returns `true` only if the drink has at least one linked ingredient, every linked ingredient exists, and each
    /// has at least [`INGREDIENT_UNITS_PER_DRINK`] units in stock.
    ///
    /// Fails closed: a storage error is logged and treated as insufficient stock.
    pub async fn check_inventory(&self, item_id: i64) -> bool {
        let recipe = match self.db.fetch_recipe(item_id).await {
            Ok(recipe) => recipe,
            Err(e) => {
                error!("🔄️ Could not read the recipe for item {item_id}: {e}");
                return false;
            },
        };
        if recipe.is_empty() {
            debug!("🔄️ Item {item_id} has no linked ingredients");
            return false;
        }
        for line in &recipe {
            match line.amount {
                None => {
                    warn!("🔄️ Item {item_id} links to inventory #{} which does not exist", line.inventory_id);
                    return false;
                },
                Some(amount) if amount < INGREDIENT_UNITS_PER_DRINK => {
                    let name = line.inventory_name.as_deref().unwrap_or("?");
                    debug!("🔄️ Not enough {name} for item {item_id}: {amount} left");
                    return false;
                },
                Some(_) => {},
            }
        }
        true
    }
}
