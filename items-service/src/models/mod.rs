//! Domain models for the items service.

pub mod item;

pub use item::{Item, ItemBase};
