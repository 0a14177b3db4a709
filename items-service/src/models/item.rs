use serde::{Deserialize, Serialize};
use validator::Validate;

/// Client-supplied fields of an item, used for both create and full replacement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ItemBase {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
}

fn default_in_stock() -> bool {
    true
}

/// A stored item. `description` serializes as `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub in_stock: bool,
}

impl Item {
    pub fn from_base(id: i64, base: ItemBase) -> Self {
        Self {
            id,
            name: base.name,
            description: base.description,
            price: base.price,
            in_stock: base.in_stock,
        }
    }
}
