pub mod evaluator;
pub mod memory;
pub mod record;
pub mod record_store;

pub use memory::MemoryRecordStore;
pub use record::Record;
pub use record_store::RecordStore;
