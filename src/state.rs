//! Shared application state passed to every handler.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::inventory::Inventory;

/// Shared state for the netfleet server. Cheap to clone; handlers receive it
/// via Axum's `State` extractor, the stdio loop holds one directly.
#[derive(Clone)]
pub struct AppState {
    /// Immutable configuration loaded at startup.
    pub config: Arc<Config>,
    /// Monotonic instant when the server started (for uptime calculation).
    pub start_time: Instant,
    /// Fan-out engine; holds the driver factory and command filter.
    pub dispatcher: Arc<Dispatcher>,
    /// Current inventory snapshot. Swapped wholesale on reload; dispatches
    /// clone the inner Arc and keep their snapshot.
    inventory: Arc<RwLock<Arc<Inventory>>>,
}

impl AppState {
    pub fn new(config: Arc<Config>, inventory: Inventory, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            start_time: Instant::now(),
            dispatcher: Arc::new(dispatcher),
            inventory: Arc::new(RwLock::new(Arc::new(inventory))),
        }
    }

    /// The current inventory snapshot.
    pub async fn inventory(&self) -> Arc<Inventory> {
        Arc::clone(&*self.inventory.read().await)
    }

    /// Atomically replace the inventory. In-flight dispatches keep the
    /// snapshot they started with.
    pub async fn replace_inventory(&self, inventory: Inventory) {
        *self.inventory.write().await = Arc::new(inventory);
    }
}
