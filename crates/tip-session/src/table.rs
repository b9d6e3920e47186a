use std::sync::Arc;

use datafusion::arrow::array::{Array, AsArray};
use datafusion::arrow::compute::cast;
use datafusion::arrow::datatypes::{DataType, Float64Type, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::DataFrame;

use crate::error::{SessionError, SessionResult};
use crate::session::Session;

/// A lazily evaluated table in a session.
#[derive(Debug, Clone)]
pub struct Table {
    name: Option<String>,
    df: DataFrame,
}

impl Table {
    pub(crate) fn new(name: Option<String>, df: DataFrame) -> Self {
        Self { name, df }
    }

    /// The name the table is registered under, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn schema(&self) -> &Schema {
        self.df.schema().as_arrow()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub(crate) fn data_type(&self, column: &str) -> SessionResult<&DataType> {
        self.schema()
            .field_with_name(column)
            .map(|f| f.data_type())
            .map_err(|_| {
                SessionError::invalid(format!(
                    "column {column} does not exist, available columns: {}",
                    self.column_names().join(", ")
                ))
            })
    }
}

impl Session {
    pub async fn count(&self, table: &Table) -> SessionResult<usize> {
        self.context()?;
        Ok(table.df.clone().count().await?)
    }

    /// Collects the table as record batches, grouped by partition in scan order.
    pub async fn collect(&self, table: &Table) -> SessionResult<Vec<Vec<RecordBatch>>> {
        self.context()?;
        Ok(table.df.clone().collect_partitioned().await?)
    }

    /// Collects the given columns as batches in scan order.
    pub(crate) async fn collect_columns(
        &self,
        table: &Table,
        columns: &[&str],
    ) -> SessionResult<Vec<RecordBatch>> {
        self.context()?;
        let partitions = table
            .df
            .clone()
            .select_columns(columns)?
            .collect_partitioned()
            .await?;
        Ok(partitions.into_iter().flatten().collect())
    }

    /// Wraps batches in an unregistered in-memory table.
    pub(crate) fn memory_table(
        &self,
        schema: SchemaRef,
        mut partitions: Vec<Vec<RecordBatch>>,
    ) -> SessionResult<Table> {
        let ctx = self.context()?;
        if partitions.is_empty() {
            partitions.push(vec![]);
        }
        let provider = MemTable::try_new(schema, partitions)?;
        Ok(Table::new(None, ctx.read_table(Arc::new(provider))?))
    }
}

/// The schema shared by the batches, falling back to the given schema when there are none.
pub(crate) fn batches_schema(fallback: &Schema, partitions: &[Vec<RecordBatch>]) -> SchemaRef {
    partitions
        .iter()
        .flatten()
        .next()
        .map(|b| b.schema())
        .unwrap_or_else(|| Arc::new(fallback.clone()))
}

/// Reads a numeric column as `f64` values, failing on nulls.
pub(crate) fn float_values(batch: &RecordBatch, column: &str) -> SessionResult<Vec<f64>> {
    let array = column_as(batch, column, &DataType::Float64)?;
    if array.null_count() > 0 {
        return Err(SessionError::invalid(format!(
            "column {column} contains null values"
        )));
    }
    Ok(array.as_primitive::<Float64Type>().values().to_vec())
}

pub(crate) fn column_as(
    batch: &RecordBatch,
    column: &str,
    data_type: &DataType,
) -> SessionResult<Arc<dyn Array>> {
    let array = batch
        .column_by_name(column)
        .ok_or_else(|| SessionError::invalid(format!("column {column} does not exist")))?;
    Ok(cast(array, data_type)?)
}
