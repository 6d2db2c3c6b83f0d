//! Dedup index housekeeping

pub mod errors;
pub mod store;
pub mod sweeper;

pub use errors::DedupError;
pub use store::{DedupStore, Durability, SqliteDedupStore, format_date};
pub use sweeper::DedupSweeper;
