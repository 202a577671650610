use crate::db_types::{Order, Sale};

/// Published once an order's payment has been committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPaidEvent {
    pub order: Order,
    pub sale: Sale,
}

impl OrderPaidEvent {
    pub fn new(order: Order, sale: Sale) -> Self {
        Self { order, sale }
    }
}

/// Published when the dispenser is done with an order, successfully or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFinishedEvent {
    pub order: Order,
    pub success: bool,
}

impl OrderFinishedEvent {
    pub fn new(order: Order, success: bool) -> Self {
        Self { order, success }
    }
}
