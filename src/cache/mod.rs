pub mod catalog;
pub mod shared;

pub use catalog::{AnyCache, Catalog};
pub use shared::{LoadStats, SharedCache};
