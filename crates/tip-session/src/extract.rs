use tip_ml::dataset::{Dataset, FeatureSpec};

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::table::{float_values, Table};

impl Session {
    /// Checks that every column of the feature specification exists and is numeric.
    pub fn validate_features(&self, table: &Table, spec: &FeatureSpec) -> SessionResult<()> {
        self.context()?;
        for (column, role) in spec.columns() {
            let data_type = table.data_type(column)?;
            if !data_type.is_numeric() {
                return Err(SessionError::invalid(format!(
                    "{role:?} column {column} must be numeric, found {data_type}"
                )));
            }
        }
        Ok(())
    }

    /// Pulls the label and feature columns into local memory for training.
    pub async fn dataset(&self, table: &Table, spec: &FeatureSpec) -> SessionResult<Dataset> {
        self.validate_features(table, spec)?;
        let feature_names = spec.feature_names();
        let batches = self.collect_columns(table, &column_refs(spec)).await?;
        let mut features: Vec<Vec<f64>> = vec![];
        let mut labels = vec![];
        for batch in &batches {
            labels.extend(float_values(batch, spec.label())?);
            let columns = feature_names
                .iter()
                .map(|name| float_values(batch, name))
                .collect::<SessionResult<Vec<_>>>()?;
            features.extend(
                (0..batch.num_rows()).map(|i| columns.iter().map(|c| c[i]).collect::<Vec<_>>()),
            );
        }
        Ok(Dataset::try_new(feature_names, features, labels)?)
    }
}

pub(crate) fn column_refs(spec: &FeatureSpec) -> Vec<&str> {
    spec.columns().iter().map(|(name, _)| name.as_str()).collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion::arrow::array::{Float64Array, Int64Array, StringArray};
    use datafusion::arrow::datatypes::{DataType, Field, Schema};
    use datafusion::arrow::record_batch::RecordBatch;

    use super::*;
    use crate::session::test_config;

    fn table(session: &Session) -> SessionResult<Table> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("tip_amount", DataType::Float64, true),
            Field::new("passenger_count", DataType::Int64, true),
            Field::new("payment_type", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![1.0, 0.0, 2.5])),
                Arc::new(Int64Array::from(vec![1, 2, 3])),
                Arc::new(StringArray::from(vec!["CRD", "CSH", "CRD"])),
            ],
        )?;
        session.memory_table(schema, vec![vec![batch]])
    }

    #[tokio::test]
    async fn test_dataset_from_table() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = table(&session)?;
        let spec =
            FeatureSpec::from_label_and_features("tip_amount", &["passenger_count".to_string()])?;
        let dataset = session.dataset(&table, &spec).await?;
        assert_eq!(dataset.labels(), &[1.0, 0.0, 2.5]);
        assert_eq!(dataset.features(), &[vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(dataset.feature_names(), &["passenger_count".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_feature_validation() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = table(&session)?;
        let missing =
            FeatureSpec::from_label_and_features("tip_amount", &["fare_amount".to_string()])?;
        assert!(session.validate_features(&table, &missing).is_err());
        let not_numeric =
            FeatureSpec::from_label_and_features("tip_amount", &["payment_type".to_string()])?;
        let result = session.dataset(&table, &not_numeric).await;
        assert!(matches!(result, Err(SessionError::InvalidArgument(m)) if m.contains("numeric")));
        Ok(())
    }
}
