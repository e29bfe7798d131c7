pub mod aggregate;
pub mod metrics;
pub mod narrator;
pub mod ngd;
pub mod providers;
pub mod warehouse;

pub use narrator::Narrator;
pub use ngd::NgdClient;
pub use warehouse::{DuckDbWarehouse, Warehouse};
