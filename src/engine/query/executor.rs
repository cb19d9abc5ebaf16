use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::engine::catalog::FieldCatalog;
use crate::engine::errors::QueryError;
use crate::engine::query::aggregate::compile_aggregates;
use crate::engine::query::filter::FilterNode;
use crate::engine::query::filter_compiler::compile_filter;
use crate::engine::query::pagination::Page;
use crate::engine::query::predicate::Predicate;
use crate::engine::query::result::QueryResult;
use crate::engine::query::sort::SortSpec;
use crate::engine::query::sort_compiler::compile_sort;
use crate::engine::store::RecordStore;

const LOG_TARGET: &str = "engine::query::executor";

/// Everything a caller may ask of a record query.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub filter: Option<FilterNode>,
    #[serde(default)]
    pub sort: Vec<SortSpec>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
    /// `"<fn>:<fieldId>"` entries, fn in count/sum/avg/min/max.
    #[serde(default)]
    pub aggregates: Vec<String>,
}

pub struct QueryExecutor {
    catalog: Arc<dyn FieldCatalog>,
    store: Arc<dyn RecordStore>,
    max_page_size: Option<usize>,
}

impl QueryExecutor {
    pub fn new(catalog: Arc<dyn FieldCatalog>, store: Arc<dyn RecordStore>) -> Self {
        Self {
            catalog,
            store,
            max_page_size: None,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = Some(max_page_size).filter(|m| *m > 0);
        self
    }

    /// Compiles the request against the table's catalog, then counts,
    /// fetches and aggregates. Compilation happens before any store access,
    /// so a bad request never touches the store.
    pub async fn execute(
        &self,
        table_id: Uuid,
        request: &QueryRequest,
    ) -> Result<QueryResult, QueryError> {
        let catalog = self.catalog.table_catalog(table_id).await?;

        let predicate = match &request.filter {
            Some(filter) => compile_filter(&catalog, filter)?,
            None => Predicate::none(),
        };
        let ordering = compile_sort(&catalog, &request.sort)?;
        let aggregate_specs = compile_aggregates(&catalog, &request.aggregates)?;

        debug!(
            target: LOG_TARGET,
            %table_id,
            filter = predicate.to_sql().as_deref().unwrap_or("<none>"),
            args = predicate.args().len(),
            order_by = ordering.to_sql().as_deref().unwrap_or("<default>"),
            "Compiled query"
        );

        let total = self.store.count(table_id, &predicate).await?;

        let page = Page::from_request(request.page, request.page_size, self.max_page_size);
        let records = self.store.fetch(table_id, &predicate, &ordering, page).await?;

        let aggregates = if aggregate_specs.is_empty() {
            None
        } else {
            let values = self
                .store
                .aggregate(table_id, &predicate, &aggregate_specs)
                .await?;
            Some(
                aggregate_specs
                    .iter()
                    .map(|spec| spec.label.clone())
                    .zip(values)
                    .collect(),
            )
        };

        debug!(
            target: LOG_TARGET,
            %table_id,
            total,
            returned = records.len(),
            "Query executed"
        );

        Ok(QueryResult {
            records,
            total,
            page: page.and(request.page),
            page_size: page.map(|p| p.limit as i64),
            aggregates,
        })
    }
}
