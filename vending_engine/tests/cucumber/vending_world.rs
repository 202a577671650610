use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use cucumber::World;
use log::*;
use vending_engine::{
    db_types::{RemoteOrder, User},
    events::EventProducers,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_catalog, SeededCatalog},
    },
    InventoryGate,
    OrderFlowApi,
    OrderPoller,
    RemoteOrderError,
    RemoteOrderSource,
    SqliteDatabase,
    VendingDbError,
};

#[derive(Default, Debug, World)]
pub struct VendingWorld {
    pub system: Option<VendingSystem>,
}

impl VendingWorld {
    pub fn system(&self) -> &VendingSystem {
        self.system.as_ref().expect("Vending system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut VendingSystem {
        self.system.as_mut().expect("Vending system not initialised")
    }
}

#[derive(Debug)]
pub struct VendingSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub api: OrderFlowApi<SqliteDatabase>,
    pub catalog: SeededCatalog,
    pub remote: FakeOrderSource,
    pub users: HashMap<String, User>,
    pub last_order: Option<i64>,
    pub last_error: Option<VendingDbError>,
    pub rejected: bool,
}

impl VendingSystem {
    pub async fn new() -> Self {
        let db_path = random_db_path();
        let db = prepare_test_env(&db_path).await;
        debug!("Created database: {db_path}");
        let catalog = seed_catalog(&db).await;
        let api = OrderFlowApi::new(db.clone(), EventProducers::default());
        Self {
            db_path,
            db,
            api,
            catalog,
            remote: FakeOrderSource::default(),
            users: HashMap::new(),
            last_order: None,
            last_error: None,
            rejected: false,
        }
    }

    pub fn gate(&self) -> InventoryGate<SqliteDatabase> {
        InventoryGate::new(self.db.clone())
    }

    pub fn poller(&self) -> OrderPoller<SqliteDatabase, FakeOrderSource> {
        OrderPoller::new(self.db.clone(), self.remote.clone())
    }

    pub fn user(&self, name: &str) -> &User {
        self.users.get(name).unwrap_or_else(|| panic!("No user called {name}"))
    }

    pub fn last_order(&self) -> i64 {
        self.last_order.expect("No order has been created")
    }
}

/// A remote order service whose pending list the scenario controls.
#[derive(Debug, Clone, Default)]
pub struct FakeOrderSource {
    orders: Arc<Mutex<Vec<RemoteOrder>>>,
    offline: Arc<Mutex<bool>>,
}

impl FakeOrderSource {
    pub fn push(&self, order: RemoteOrder) {
        self.orders.lock().unwrap().push(order);
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }
}

impl RemoteOrderSource for FakeOrderSource {
    async fn fetch_pending_orders(&self) -> Result<Vec<RemoteOrder>, RemoteOrderError> {
        if *self.offline.lock().unwrap() {
            return Err(RemoteOrderError::Network("connection refused".into()));
        }
        Ok(self.orders.lock().unwrap().clone())
    }
}
