pub mod customer_repository;
pub mod inventory_repository;
pub mod order_repository;
pub mod product_repository;

pub use customer_repository::{CustomerRepository, MySqlCustomerRepository};
pub use inventory_repository::{InventoryRepository, MySqlInventoryRepository};
pub use order_repository::{MySqlOrderRepository, OrderFilter, OrderRepository};
pub use product_repository::{MySqlProductRepository, ProductFilter, ProductRepository};
