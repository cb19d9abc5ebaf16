pub mod table;
pub mod field;
pub mod memory;

pub use table::{FieldCatalog, TableCatalog};
pub use field::{FieldDescriptor, NewField};
pub use memory::MemoryFieldCatalog;
