use std::sync::Arc;

use datafusion::arrow::array::{ArrayRef, AsArray, BooleanArray, Float64Array};
use datafusion::arrow::compute::filter_record_batch;
use datafusion::arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use datafusion::arrow::record_batch::RecordBatch;
use log::{debug, info};
use tip_common::config::FeatureStepConfig;
use tip_ml::feature::{Binarizer, Bucketizer, StringIndexer, StringIndexerModel};

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::table::{batches_schema, column_as, Table};

/// A feature step whose state has been fitted on the whole table.
enum FittedStep {
    StringIndex(StringIndexerModel),
    Binarize(Binarizer),
    Bucketize(Bucketizer),
}

/// The values of an output column, and which rows to keep when some are skipped.
struct StepOutput {
    values: ArrayRef,
    keep: Option<BooleanArray>,
}

fn step_columns(step: &FeatureStepConfig) -> (&str, &str) {
    match step {
        FeatureStepConfig::StringIndex { input, output, .. }
        | FeatureStepConfig::Binarize { input, output, .. }
        | FeatureStepConfig::Bucketize { input, output, .. } => {
            (input.as_str(), output.as_str())
        }
    }
}

impl FittedStep {
    fn fit(
        step: &FeatureStepConfig,
        schema: &Schema,
        partitions: &[Vec<RecordBatch>],
    ) -> SessionResult<Self> {
        let (input, output) = step_columns(step);
        let data_type = schema
            .field_with_name(input)
            .map_err(|_| {
                SessionError::invalid(format!("feature step input column {input} does not exist"))
            })?
            .data_type();
        if schema.field_with_name(output).is_ok() {
            return Err(SessionError::invalid(format!(
                "feature step output column {output} already exists"
            )));
        }
        match step {
            FeatureStepConfig::StringIndex { handle_invalid, .. } => {
                let arrays = partitions
                    .iter()
                    .flatten()
                    .map(|b| column_as(b, input, &DataType::Utf8))
                    .collect::<SessionResult<Vec<_>>>()?;
                let values = arrays.iter().flat_map(|a| a.as_string::<i32>().iter());
                let model = StringIndexer::new()
                    .with_handle_invalid(*handle_invalid)
                    .fit(values)?;
                debug!("indexed {input} with labels {:?}", model.labels());
                Ok(FittedStep::StringIndex(model))
            }
            FeatureStepConfig::Binarize { threshold, .. } => {
                require_numeric(input, data_type)?;
                Ok(FittedStep::Binarize(Binarizer::new(*threshold)))
            }
            FeatureStepConfig::Bucketize {
                splits,
                handle_invalid,
                ..
            } => {
                require_numeric(input, data_type)?;
                let bucketizer =
                    Bucketizer::try_new(splits.clone())?.with_handle_invalid(*handle_invalid);
                Ok(FittedStep::Bucketize(bucketizer))
            }
        }
    }

    fn apply(&self, batch: &RecordBatch, input: &str) -> SessionResult<StepOutput> {
        match self {
            FittedStep::StringIndex(model) => {
                let array = column_as(batch, input, &DataType::Utf8)?;
                let codes = array
                    .as_string::<i32>()
                    .iter()
                    .map(|v| model.transform(v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StepOutput::with_skipped(codes))
            }
            FittedStep::Binarize(binarizer) => {
                let array = column_as(batch, input, &DataType::Float64)?;
                let values: Float64Array = array
                    .as_primitive::<Float64Type>()
                    .iter()
                    .map(|v| v.map(|v| binarizer.transform(v)))
                    .collect();
                Ok(StepOutput {
                    values: Arc::new(values),
                    keep: None,
                })
            }
            FittedStep::Bucketize(bucketizer) => {
                let array = column_as(batch, input, &DataType::Float64)?;
                let buckets = array
                    .as_primitive::<Float64Type>()
                    .iter()
                    .map(|v| bucketizer.transform(v.unwrap_or(f64::NAN)))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(StepOutput::with_skipped(buckets))
            }
        }
    }
}

impl StepOutput {
    /// `None` marks a skipped row.
    fn with_skipped(values: Vec<Option<f64>>) -> Self {
        let keep = values
            .iter()
            .any(|v| v.is_none())
            .then(|| values.iter().map(|v| Some(v.is_some())).collect());
        Self {
            values: Arc::new(Float64Array::from(values)),
            keep,
        }
    }
}

fn require_numeric(column: &str, data_type: &DataType) -> SessionResult<()> {
    if data_type.is_numeric() {
        Ok(())
    } else {
        Err(SessionError::invalid(format!(
            "column {column} must be numeric, found {data_type}"
        )))
    }
}

fn append_column(schema: &Schema, name: &str) -> SchemaRef {
    let mut fields = schema.fields().iter().cloned().collect::<Vec<_>>();
    fields.push(Arc::new(Field::new(name, DataType::Float64, true)));
    Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()))
}

impl Session {
    /// Runs the feature steps in order, each appending one `Double` column.
    ///
    /// String indexers are fitted on the whole table before any row is mapped.
    pub async fn transform(
        &self,
        table: &Table,
        steps: &[FeatureStepConfig],
    ) -> SessionResult<Table> {
        let mut partitions = self.collect(table).await?;
        let mut schema = batches_schema(table.schema(), &partitions);
        for step in steps {
            let (input, output) = step_columns(step);
            let fitted = FittedStep::fit(step, &schema, &partitions)?;
            let next_schema = append_column(&schema, output);
            partitions = partitions
                .into_iter()
                .map(|batches| {
                    batches
                        .iter()
                        .map(|batch| {
                            let StepOutput { values, keep } = fitted.apply(batch, input)?;
                            let mut columns = batch.columns().to_vec();
                            columns.push(values);
                            let batch = RecordBatch::try_new(next_schema.clone(), columns)?;
                            match keep {
                                Some(keep) => Ok(filter_record_batch(&batch, &keep)?),
                                None => Ok(batch),
                            }
                        })
                        .collect::<SessionResult<Vec<_>>>()
                })
                .collect::<SessionResult<Vec<_>>>()?;
            schema = next_schema;
            info!("feature step {input} -> {output} done");
        }
        self.memory_table(schema, partitions)
    }
}

#[cfg(test)]
mod tests {
    use datafusion::arrow::array::StringArray;
    use tip_common::config::HandleInvalid;

    use super::*;
    use crate::session::test_config;

    fn trips(session: &Session) -> SessionResult<Table> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("payment_type", DataType::Utf8, true),
            Field::new("TrafficTimeBins", DataType::Utf8, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(vec!["CSH", "CRD", "CSH", "CSH"])),
                Arc::new(StringArray::from(vec!["AMRush", "Night", "PMRush", "AMRush"])),
            ],
        )?;
        session.memory_table(schema, vec![vec![batch]])
    }

    fn steps() -> Vec<FeatureStepConfig> {
        vec![
            FeatureStepConfig::StringIndex {
                input: "payment_type".to_string(),
                output: "pt_ind".to_string(),
                handle_invalid: HandleInvalid::Error,
            },
            FeatureStepConfig::Binarize {
                input: "pt_ind".to_string(),
                output: "pt_bin".to_string(),
                threshold: 0.5,
            },
            FeatureStepConfig::StringIndex {
                input: "TrafficTimeBins".to_string(),
                output: "TrafficTimeInd".to_string(),
                handle_invalid: HandleInvalid::Error,
            },
            FeatureStepConfig::Bucketize {
                input: "TrafficTimeInd".to_string(),
                output: "TrafficTimeBuc".to_string(),
                splits: vec![-1.0, 0.5, 1.5, 2.5, 3.5],
                handle_invalid: HandleInvalid::Error,
            },
        ]
    }

    async fn column(session: &Session, table: &Table, name: &str) -> SessionResult<Vec<f64>> {
        let batches = session.collect_columns(table, &[name]).await?;
        let mut values = vec![];
        for batch in &batches {
            let array = batch.column(0).as_primitive::<Float64Type>();
            values.extend(array.iter().map(|v| v.unwrap_or(f64::NAN)));
        }
        Ok(values)
    }

    #[tokio::test]
    async fn test_transform_is_deterministic() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = trips(&session)?;
        for _ in 0..2 {
            let transformed = session.transform(&table, &steps()).await?;
            assert_eq!(
                transformed.column_names(),
                vec![
                    "payment_type",
                    "TrafficTimeBins",
                    "pt_ind",
                    "pt_bin",
                    "TrafficTimeInd",
                    "TrafficTimeBuc"
                ]
            );
            assert_eq!(
                column(&session, &transformed, "pt_ind").await?,
                vec![0.0, 1.0, 0.0, 0.0]
            );
            assert_eq!(
                column(&session, &transformed, "pt_bin").await?,
                vec![0.0, 1.0, 0.0, 0.0]
            );
            assert_eq!(
                column(&session, &transformed, "TrafficTimeBuc").await?,
                vec![0.0, 1.0, 2.0, 0.0]
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_skip_drops_rows() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let schema = Arc::new(Schema::new(vec![Field::new("x", DataType::Float64, true)]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Float64Array::from(vec![0.0, 5.0, 1.0, -3.0]))],
        )?;
        let table = session.memory_table(schema, vec![vec![batch]])?;
        let mut step = FeatureStepConfig::Bucketize {
            input: "x".to_string(),
            output: "x_buc".to_string(),
            splits: vec![-1.0, 0.5, 1.5, 2.5],
            handle_invalid: HandleInvalid::Skip,
        };
        let transformed = session.transform(&table, &[step.clone()]).await?;
        assert_eq!(column(&session, &transformed, "x").await?, vec![0.0, 1.0]);
        assert_eq!(
            column(&session, &transformed, "x_buc").await?,
            vec![0.0, 1.0]
        );

        if let FeatureStepConfig::Bucketize { handle_invalid, .. } = &mut step {
            *handle_invalid = HandleInvalid::Error;
        }
        assert!(session.transform(&table, &[step]).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_steps() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = trips(&session)?;
        let overwrite = FeatureStepConfig::Binarize {
            input: "payment_type".to_string(),
            output: "TrafficTimeBins".to_string(),
            threshold: 0.5,
        };
        assert!(session.transform(&table, &[overwrite]).await.is_err());
        let not_numeric = FeatureStepConfig::Binarize {
            input: "payment_type".to_string(),
            output: "pt_bin".to_string(),
            threshold: 0.5,
        };
        assert!(session.transform(&table, &[not_numeric]).await.is_err());
        Ok(())
    }
}
