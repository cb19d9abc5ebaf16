pub mod catalog_factory;
pub mod field_factory;
pub mod filter_factory;
pub mod record_factory;

pub use catalog_factory::CatalogFactory;
pub use field_factory::FieldFactory;
pub use filter_factory::FilterFactory;
pub use record_factory::RecordFactory;
