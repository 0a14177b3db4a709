//! HTTP handlers for the items service.

pub mod health;
pub mod items;
