pub mod cache;
pub mod config;
pub mod core;
pub mod index;
pub mod source;
pub mod stats;
