pub mod store;

pub use store::{ItemStore, StoreError};
