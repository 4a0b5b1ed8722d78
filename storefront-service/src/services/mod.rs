pub mod catalog;
pub mod inventory;
pub mod order;

pub use catalog::CatalogService;
pub use inventory::InventoryLedger;
pub use order::OrderService;
