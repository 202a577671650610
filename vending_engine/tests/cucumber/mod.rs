pub mod setups;
pub mod steps;
pub mod vending_world;

pub use vending_world::VendingWorld;
