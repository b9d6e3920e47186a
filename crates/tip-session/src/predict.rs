use std::sync::Arc;

use datafusion::arrow::array::Float64Array;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use log::info;
use tip_ml::dataset::FeatureSpec;
use tip_ml::evaluation::Evaluation;
use tip_ml::model::RegressionModel;

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::table::{batches_schema, float_values, Table};

/// The column that holds model predictions.
pub const PREDICTION_COLUMN: &str = "prediction";

impl Session {
    /// Appends a `prediction` column computed by the model from the feature columns.
    pub async fn predict(
        &self,
        table: &Table,
        spec: &FeatureSpec,
        model: &dyn RegressionModel,
    ) -> SessionResult<Table> {
        self.validate_features(table, spec)?;
        let feature_names = spec.feature_names();
        if feature_names.len() != model.num_features() {
            return Err(SessionError::invalid(format!(
                "{} expects {} features but {} were given",
                model.name(),
                model.num_features(),
                feature_names.len()
            )));
        }
        if table.data_type(PREDICTION_COLUMN).is_ok() {
            return Err(SessionError::invalid(format!(
                "column {PREDICTION_COLUMN} already exists"
            )));
        }
        let partitions = self.collect(table).await?;
        let input_schema = batches_schema(table.schema(), &partitions);
        let mut fields = input_schema.fields().iter().cloned().collect::<Vec<_>>();
        fields.push(Arc::new(Field::new(PREDICTION_COLUMN, DataType::Float64, false)));
        let schema = Arc::new(Schema::new_with_metadata(
            fields,
            input_schema.metadata().clone(),
        ));

        let partitions = partitions
            .into_iter()
            .map(|batches| {
                batches
                    .into_iter()
                    .map(|batch| {
                        let columns = feature_names
                            .iter()
                            .map(|name| float_values(&batch, name))
                            .collect::<SessionResult<Vec<_>>>()?;
                        let predictions: Float64Array = (0..batch.num_rows())
                            .map(|i| {
                                let row: Vec<f64> = columns.iter().map(|c| c[i]).collect();
                                model.predict(&row)
                            })
                            .collect::<Vec<_>>()
                            .into();
                        let mut columns = batch.columns().to_vec();
                        columns.push(Arc::new(predictions));
                        Ok(RecordBatch::try_new(schema.clone(), columns)?)
                    })
                    .collect::<SessionResult<Vec<_>>>()
            })
            .collect::<SessionResult<Vec<_>>>()?;
        info!("predicted with {}", model.name());
        self.memory_table(schema, partitions)
    }

    /// Scores the predictions against the label and draws a seeded sample for plotting.
    ///
    /// Fails when the table has fewer rows than `sample_size`.
    pub async fn evaluate(
        &self,
        predictions: &Table,
        label: &str,
        sample_size: usize,
        seed: u64,
    ) -> SessionResult<Evaluation> {
        let batches = self
            .collect_columns(predictions, &[label, PREDICTION_COLUMN])
            .await?;
        let mut actual = vec![];
        let mut predicted = vec![];
        for batch in &batches {
            actual.extend(float_values(batch, label)?);
            predicted.extend(float_values(batch, PREDICTION_COLUMN)?);
        }
        let evaluation = Evaluation::compute(&actual, &predicted, sample_size, seed)?;
        info!(
            "evaluated {} rows: r2={:.4} rmse={:.4}",
            evaluation.metrics.count, evaluation.metrics.r2, evaluation.metrics.rmse
        );
        Ok(evaluation)
    }
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::array::AsArray;
    use datafusion::arrow::datatypes::Float64Type;
    use tip_common::error::CommonError;
    use tip_ml::model::LinearRegressionModel;

    use super::*;
    use crate::session::test_config;

    fn table(session: &Session, rows: usize) -> SessionResult<Table> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("x", DataType::Float64, false),
            Field::new("y", DataType::Float64, false),
        ]));
        let x: Vec<f64> = (0..rows).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v + 1.0).collect();
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(x)),
                Arc::new(Float64Array::from(y)),
            ],
        )?;
        session.memory_table(schema, vec![vec![batch]])
    }

    #[tokio::test]
    async fn test_predict_and_evaluate() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = table(&session, 20)?;
        let spec = FeatureSpec::from_label_and_features("y", &["x".to_string()])?;
        let model = LinearRegressionModel::new(vec![3.0], 1.0);
        let predictions = session.predict(&table, &spec, &model).await?;
        assert_eq!(predictions.column_names(), vec!["x", "y", "prediction"]);

        let batches = session.collect(&predictions).await?;
        let batch = &batches[0][0];
        let values = batch.column(2).as_primitive::<Float64Type>();
        assert_eq!(values.value(2), 7.0);

        let evaluation = session.evaluate(&predictions, "y", 10, 1099).await?;
        assert!((evaluation.metrics.r2 - 1.0).abs() < 1e-12);
        assert_eq!(evaluation.sample.len(), 10);
        assert!((evaluation.line.slope - 1.0).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test]
    async fn test_evaluate_needs_enough_rows() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = table(&session, 5)?;
        let spec = FeatureSpec::from_label_and_features("y", &["x".to_string()])?;
        let model = LinearRegressionModel::new(vec![1.0], 0.0);
        let predictions = session.predict(&table, &spec, &model).await?;
        let result = session.evaluate(&predictions, "y", 1000, 1).await;
        assert!(matches!(
            result,
            Err(SessionError::CommonError(CommonError::InvalidData(_)))
        ));

        let wrong = LinearRegressionModel::new(vec![1.0, 2.0], 0.0);
        assert!(session.predict(&table, &spec, &wrong).await.is_err());
        Ok(())
    }
}
