//! Order and Product Stores
//!
//! Persistence seams for the reconciliation core. The in-memory
//! implementations back development and tests; a database-backed store
//! only has to honor the same version and uniqueness rules.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Result, ShopError};
use crate::model::{Order, OrderId, OrderItem, Product, ProductId, UserId};

/// Order storage trait
pub trait OrderStore: Send + Sync {
    /// Persist a new order together with its items, atomically
    fn create(&self, order: &Order, items: &[OrderItem]) -> Result<Order>;

    /// Get order by local id
    fn get(&self, id: &OrderId) -> Result<Option<Order>>;

    /// Get order by provider-side order id
    fn get_by_remote_id(&self, remote_order_id: &str) -> Result<Option<Order>>;

    /// All orders owned by a user, newest first
    fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>>;

    /// Compare-and-swap update.
    ///
    /// Succeeds only when `order.version` matches the stored version; the
    /// returned order carries the bumped version and `updated_at`. A stale
    /// version or a `remote_order_id` already owned by another order yields
    /// `ShopError::Conflict`.
    fn update(&self, order: &Order) -> Result<Order>;

    /// Items of an order
    fn items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>>;

    /// Insert items only if the order has none yet (atomic check + insert).
    /// Returns whether the items were written.
    fn add_items_if_empty(&self, order_id: &OrderId, items: &[OrderItem]) -> Result<bool>;
}

/// Product storage trait (read side of the catalog)
pub trait ProductStore: Send + Sync {
    fn get(&self, id: &ProductId) -> Result<Option<Product>>;

    fn list(&self) -> Result<Vec<Product>>;

    /// Insert or replace a product (seeding)
    fn insert(&self, product: Product) -> Result<()>;
}

#[derive(Default)]
struct OrderTables {
    orders: HashMap<OrderId, Order>,
    by_remote: HashMap<String, OrderId>,
    items: HashMap<OrderId, Vec<OrderItem>>,
}

/// In-memory order store
#[derive(Default)]
pub struct MemoryOrderStore {
    tables: RwLock<OrderTables>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, OrderTables>> {
        self.tables
            .read()
            .map_err(|_| ShopError::Storage("order store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, OrderTables>> {
        self.tables
            .write()
            .map_err(|_| ShopError::Storage("order store lock poisoned".into()))
    }
}

impl OrderStore for MemoryOrderStore {
    fn create(&self, order: &Order, items: &[OrderItem]) -> Result<Order> {
        if items.iter().any(|item| item.order_id != order.id) {
            return Err(ShopError::Validation(
                "order items must reference the order being created".into(),
            ));
        }

        let mut tables = self.write()?;

        if tables.orders.contains_key(&order.id) {
            return Err(ShopError::Conflict(format!("order {} already exists", order.id)));
        }
        if let Some(remote_id) = &order.remote_order_id {
            if tables.by_remote.contains_key(remote_id) {
                return Err(ShopError::Conflict(format!(
                    "remote order {} already linked",
                    remote_id
                )));
            }
            tables.by_remote.insert(remote_id.clone(), order.id);
        }

        tables.orders.insert(order.id, order.clone());
        tables.items.insert(order.id, items.to_vec());

        Ok(order.clone())
    }

    fn get(&self, id: &OrderId) -> Result<Option<Order>> {
        Ok(self.read()?.orders.get(id).cloned())
    }

    fn get_by_remote_id(&self, remote_order_id: &str) -> Result<Option<Order>> {
        let tables = self.read()?;
        Ok(tables
            .by_remote
            .get(remote_order_id)
            .and_then(|id| tables.orders.get(id))
            .cloned())
    }

    fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Order>> {
        let tables = self.read()?;
        let mut result: Vec<_> = tables
            .orders
            .values()
            .filter(|o| &o.user_id == user_id)
            .cloned()
            .collect();

        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    fn update(&self, order: &Order) -> Result<Order> {
        let mut tables = self.write()?;

        let (stored_version, stored_remote) = match tables.orders.get(&order.id) {
            Some(stored) => (stored.version, stored.remote_order_id.clone()),
            None => return Err(ShopError::NotFound(format!("order {}", order.id))),
        };

        if stored_version != order.version {
            return Err(ShopError::Conflict(format!(
                "order {} changed concurrently (expected version {}, found {})",
                order.id, order.version, stored_version
            )));
        }

        if order.remote_order_id != stored_remote {
            if let Some(remote_id) = &order.remote_order_id {
                match tables.by_remote.get(remote_id) {
                    Some(owner) if *owner != order.id => {
                        return Err(ShopError::Conflict(format!(
                            "remote order {} already linked",
                            remote_id
                        )));
                    }
                    _ => {}
                }
                tables.by_remote.insert(remote_id.clone(), order.id);
            }
            if let Some(old) = stored_remote {
                tables.by_remote.remove(&old);
            }
        }

        let mut updated = order.clone();
        updated.version = stored_version + 1;
        updated.updated_at = Utc::now();
        tables.orders.insert(updated.id, updated.clone());

        Ok(updated)
    }

    fn items(&self, order_id: &OrderId) -> Result<Vec<OrderItem>> {
        Ok(self
            .read()?
            .items
            .get(order_id)
            .cloned()
            .unwrap_or_default())
    }

    fn add_items_if_empty(&self, order_id: &OrderId, items: &[OrderItem]) -> Result<bool> {
        let mut tables = self.write()?;

        if !tables.orders.contains_key(order_id) {
            return Err(ShopError::NotFound(format!("order {}", order_id)));
        }

        let existing = tables.items.entry(*order_id).or_default();
        if !existing.is_empty() {
            return Ok(false);
        }
        existing.extend(items.iter().cloned());

        Ok(true)
    }
}

/// In-memory product store
#[derive(Default)]
pub struct MemoryProductStore {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl MemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-seeded with `products`
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let map = products.into_iter().map(|p| (p.id.clone(), p)).collect();
        Self {
            products: RwLock::new(map),
        }
    }
}

impl ProductStore for MemoryProductStore {
    fn get(&self, id: &ProductId) -> Result<Option<Product>> {
        let products = self
            .products
            .read()
            .map_err(|_| ShopError::Storage("product store lock poisoned".into()))?;
        Ok(products.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Product>> {
        let products = self
            .products
            .read()
            .map_err(|_| ShopError::Storage("product store lock poisoned".into()))?;
        let mut result: Vec<_> = products.values().cloned().collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }

    fn insert(&self, product: Product) -> Result<()> {
        let mut products = self
            .products
            .write()
            .map_err(|_| ShopError::Storage("product store lock poisoned".into()))?;
        products.insert(product.id.clone(), product);
        Ok(())
    }
}
