pub mod catalog;
pub mod errors;
pub mod query;
pub mod records;
pub mod store;
pub mod types;

pub use errors::*;
