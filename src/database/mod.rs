pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{open_stores, Stores};
pub use memory::MemoryStore;
pub use store::{CatalogStore, StoreError, UserOrder, UserStore};
