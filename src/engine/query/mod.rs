pub mod aggregate;
pub mod executor;
pub mod filter;
pub mod filter_compiler;
pub mod pagination;
pub mod predicate;
pub mod result;
pub mod sort;
pub mod sort_compiler;

pub use executor::{QueryExecutor, QueryRequest};
pub use filter::FilterNode;
pub use predicate::Predicate;
pub use result::QueryResult;
pub use sort::{Ordering, SortSpec};
