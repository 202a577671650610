use cucumber::given;
use vending_engine::test_utils::seed::{seed_user, set_stock};
use vmc_common::Cents;

use crate::cucumber::{vending_world::VendingSystem, VendingWorld};

#[given("a freshly stocked machine")]
async fn fresh_machine(world: &mut VendingWorld) {
    let system = VendingSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "a customer {word} with phone {word} and {word} credit")]
async fn customer(world: &mut VendingWorld, name: String, phone: String, credit: String) {
    let credit = credit.parse::<Cents>().expect("Invalid credit amount");
    let system = world.system_mut();
    let user = seed_user(&system.db, &name, &phone, credit).await;
    system.users.insert(name, user);
}

#[given(expr = "the stock of {string} is {int}")]
async fn stock_level(world: &mut VendingWorld, name: String, amount: i64) {
    set_stock(&world.system().db, &name, amount).await;
}

#[given(expr = "drink {int} links to an ingredient that does not exist")]
async fn dangling_link(world: &mut VendingWorld, item_id: i64) {
    world.system().db.link_ingredient(item_id, 9_999).await.expect("Error linking ingredient");
}
