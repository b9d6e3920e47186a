use std::collections::HashSet;

use datafusion::arrow::array::BooleanArray;
use datafusion::arrow::compute::filter_record_batch;
use datafusion::arrow::record_batch::RecordBatch;
use log::info;
use tip_spark_random::RandomSplit;

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::table::{batches_schema, Table};

impl Session {
    /// Splits a table into disjoint named subsets, in the order of `weights`.
    ///
    /// Batches are numbered in scan order and the rows of batch `i` are sampled with
    /// seed `seed + i`, so the same table, weights and seed give the same membership.
    pub async fn random_split(
        &self,
        table: &Table,
        weights: &[(String, f64)],
        seed: i64,
    ) -> SessionResult<Vec<(String, Table)>> {
        let mut names = HashSet::new();
        for (name, _) in weights {
            if name.is_empty() || !names.insert(name.as_str()) {
                return Err(SessionError::invalid(format!(
                    "invalid or duplicate split name '{name}'"
                )));
            }
        }
        let split = RandomSplit::try_new(
            &weights.iter().map(|(_, w)| *w).collect::<Vec<_>>(),
            seed,
        )?;
        let partitions = self.collect(table).await?;
        let schema = batches_schema(table.schema(), &partitions);

        let mut outputs: Vec<Vec<Vec<RecordBatch>>> = vec![vec![]; split.num_splits()];
        let mut batch_index = 0;
        for batches in partitions {
            let mut split_batches: Vec<Vec<RecordBatch>> = vec![vec![]; split.num_splits()];
            for batch in batches {
                let assignment = split.assign(batch_index, batch.num_rows());
                batch_index += 1;
                for (i, output) in split_batches.iter_mut().enumerate() {
                    let mask: BooleanArray =
                        assignment.iter().map(|a| Some(*a == Some(i))).collect();
                    output.push(filter_record_batch(&batch, &mask)?);
                }
            }
            for (output, batches) in outputs.iter_mut().zip(split_batches) {
                output.push(batches);
            }
        }

        let result = weights
            .iter()
            .zip(outputs)
            .map(|((name, _), partitions)| {
                let rows: usize = partitions.iter().flatten().map(|b| b.num_rows()).sum();
                info!("split {name} has {rows} rows");
                Ok((name.clone(), self.memory_table(schema.clone(), partitions)?))
            })
            .collect::<SessionResult<Vec<_>>>()?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion::arrow::array::{AsArray, Int64Array};
    use datafusion::arrow::datatypes::{DataType, Field, Int64Type, Schema};

    use super::*;
    use crate::session::test_config;

    fn ids(session: &Session) -> SessionResult<Table> {
        let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, false)]));
        let partitions = (0..3)
            .map(|p| {
                (0..4)
                    .map(|b| {
                        let start = (p * 4 + b) * 25;
                        RecordBatch::try_new(
                            schema.clone(),
                            vec![Arc::new(Int64Array::from_iter_values(start..start + 25))],
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;
        session.memory_table(schema, partitions)
    }

    async fn members(session: &Session, table: &Table) -> SessionResult<Vec<i64>> {
        let mut values = vec![];
        for batch in session.collect(table).await?.iter().flatten() {
            values.extend(batch.column(0).as_primitive::<Int64Type>().values().iter());
        }
        Ok(values)
    }

    fn weights(values: &[(&str, f64)]) -> Vec<(String, f64)> {
        values.iter().map(|(n, w)| (n.to_string(), *w)).collect()
    }

    #[tokio::test]
    async fn test_split_is_disjoint_and_exhaustive() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = ids(&session)?;
        let weights = weights(&[("training", 0.75), ("test", 0.25)]);
        let splits = session.random_split(&table, &weights, 1099).await?;
        assert_eq!(splits[0].0, "training");
        assert_eq!(splits[1].0, "test");

        let training = members(&session, &splits[0].1).await?;
        let test = members(&session, &splits[1].1).await?;
        assert_eq!(training.len() + test.len(), 300);
        let training_set: HashSet<_> = training.iter().collect();
        assert!(test.iter().all(|id| !training_set.contains(id)));
        assert!(training.len() > test.len());

        let again = session.random_split(&table, &weights, 1099).await?;
        assert_eq!(members(&session, &again[0].1).await?, training);
        assert_eq!(members(&session, &again[1].1).await?, test);
        Ok(())
    }

    #[tokio::test]
    async fn test_split_remainder_is_dropped() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = ids(&session)?;
        let splits = session
            .random_split(&table, &weights(&[("a", 0.3), ("b", 0.3)]), 7)
            .await?;
        let a = members(&session, &splits[0].1).await?;
        let b = members(&session, &splits[1].1).await?;
        assert!(a.len() + b.len() < 300);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_split() -> SessionResult<()> {
        let session = Session::open(&test_config())?;
        let table = ids(&session)?;
        let too_large = weights(&[("a", 0.8), ("b", 0.3)]);
        assert!(session.random_split(&table, &too_large, 0).await.is_err());
        let duplicate = weights(&[("a", 0.5), ("a", 0.5)]);
        assert!(session.random_split(&table, &duplicate, 0).await.is_err());
        Ok(())
    }
}
