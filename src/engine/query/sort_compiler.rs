use crate::engine::catalog::TableCatalog;
use crate::engine::errors::QueryError;
use crate::engine::query::predicate::Accessor;
use crate::engine::query::sort::{OrderKey, Ordering, SortSpec};

/// Compiles sort specs into a composite ordering, in input order. Each key
/// uses the same cast as the filter compiler for its field type.
pub fn compile_sort(catalog: &TableCatalog, specs: &[SortSpec]) -> Result<Ordering, QueryError> {
    let mut keys = Vec::with_capacity(specs.len());
    for spec in specs {
        let field = catalog
            .resolve(&spec.field_id)
            .ok_or_else(|| QueryError::UnknownField {
                field_id: spec.field_id.clone(),
            })?;
        keys.push(OrderKey {
            accessor: Accessor::new(field.storage_key.clone(), field.field_type.cast()),
            direction: spec.direction,
            nulls: spec.direction.nulls(),
        });
    }
    Ok(Ordering::new(keys))
}
