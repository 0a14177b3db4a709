//! In-memory item store.
//!
//! All mutations go through a single `RwLock`, so concurrent requests cannot
//! interleave an id allocation with an append. The id counter belongs to the
//! store instance: separate stores never share identifiers, and ids are not
//! reused after deletion.

use crate::models::{Item, ItemBase};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(i64),
}

#[derive(Debug)]
struct Inventory {
    items: Vec<Item>,
    next_id: i64,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }
}

impl Inventory {
    fn position(&self, id: i64) -> Result<usize, StoreError> {
        self.items
            .iter()
            .position(|item| item.id == id)
            .ok_or(StoreError::NotFound(id))
    }
}

/// Cheaply cloneable handle to a shared item collection.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    inner: Arc<RwLock<Inventory>>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next id, append, and return a copy of the stored item.
    pub async fn create(&self, fields: ItemBase) -> Item {
        let mut inventory = self.inner.write().await;
        let item = Item::from_base(inventory.next_id, fields);
        inventory.next_id += 1;
        inventory.items.push(item.clone());

        tracing::debug!(item_id = item.id, "Item created");
        item
    }

    /// Current contents in insertion order.
    pub async fn list(&self) -> Vec<Item> {
        self.inner.read().await.items.clone()
    }

    pub async fn get(&self, id: i64) -> Result<Item, StoreError> {
        let inventory = self.inner.read().await;
        let index = inventory.position(id)?;
        Ok(inventory.items[index].clone())
    }

    /// Replace every field of an existing item, keeping its id and position.
    pub async fn replace(&self, id: i64, fields: ItemBase) -> Result<Item, StoreError> {
        let mut inventory = self.inner.write().await;
        let index = inventory.position(id)?;
        let item = Item::from_base(id, fields);
        inventory.items[index] = item.clone();

        tracing::debug!(item_id = id, "Item replaced");
        Ok(item)
    }

    pub async fn delete(&self, id: i64) -> Result<(), StoreError> {
        let mut inventory = self.inner.write().await;
        let index = inventory.position(id)?;
        inventory.items.remove(index);

        tracing::debug!(item_id = id, "Item deleted");
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
