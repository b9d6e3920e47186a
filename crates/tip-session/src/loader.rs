use std::path::Path;
use std::sync::Arc;

use datafusion::datasource::MemTable;
use datafusion::prelude::{CsvReadOptions, DataFrame, ParquetReadOptions};
use log::info;
use tip_common::config::{DataConfig, DataFormat};

use crate::error::{SessionError, SessionResult};
use crate::session::Session;
use crate::table::{batches_schema, Table};

#[derive(Debug, Clone)]
pub struct ReadOptions {
    pub name: String,
    pub format: DataFormat,
    /// Materializes the table once and keeps it in memory until the session closes.
    pub memory: bool,
    pub overwrite: bool,
    pub required_columns: Vec<String>,
}

impl From<&DataConfig> for ReadOptions {
    fn from(config: &DataConfig) -> Self {
        Self {
            name: config.table_name.clone(),
            format: config.format,
            memory: config.memory,
            overwrite: config.overwrite,
            required_columns: config.required_columns.clone(),
        }
    }
}

impl Session {
    /// Reads a file into a table registered under `options.name`.
    pub async fn read_table(&self, path: &str, options: &ReadOptions) -> SessionResult<Table> {
        let ctx = self.context()?;
        // URLs such as `file:///...` or `s3://...` are resolved by the object store.
        if !path.contains("://") && !Path::new(path).exists() {
            return Err(SessionError::invalid(format!("data path does not exist: {path}")));
        }
        let df: DataFrame = match options.format {
            DataFormat::Parquet => ctx.read_parquet(path, ParquetReadOptions::default()).await?,
            DataFormat::Csv => {
                let extension = Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| format!(".{e}"))
                    .unwrap_or_default();
                let csv_options = CsvReadOptions::new()
                    .has_header(true)
                    .file_extension(&extension);
                ctx.read_csv(path, csv_options).await?
            }
        };
        let schema = df.schema().as_arrow();
        let missing: Vec<&str> = options
            .required_columns
            .iter()
            .filter(|c| schema.field_with_name(c).is_err())
            .map(|c| c.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(SessionError::invalid(format!(
                "{path} is missing required columns: {}",
                missing.join(", ")
            )));
        }

        if ctx.table_exist(options.name.as_str())? {
            if !options.overwrite {
                return Err(SessionError::invalid(format!(
                    "table {} already exists",
                    options.name
                )));
            }
            ctx.deregister_table(options.name.as_str())?;
        }
        if options.memory {
            let partitions = df.clone().collect_partitioned().await?;
            let schema = batches_schema(df.schema().as_arrow(), &partitions);
            let provider = MemTable::try_new(schema, partitions)?;
            ctx.register_table(options.name.as_str(), Arc::new(provider))?;
        } else {
            ctx.register_table(options.name.as_str(), df.into_view())?;
        }
        self.track_table(&options.name)?;
        let df = ctx.table(options.name.as_str()).await?;
        info!("loaded {path} as table {}", options.name);
        Ok(Table::new(Some(options.name.clone()), df))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::session::test_config;

    fn write_csv(dir: &Path) -> std::io::Result<String> {
        let path = dir.join("trips.csv");
        let mut file = std::fs::File::create(&path)?;
        writeln!(file, "payment_type,tip_amount,trip_distance")?;
        writeln!(file, "CSH,0.0,1.5")?;
        writeln!(file, "CRD,2.5,3.0")?;
        writeln!(file, "CSH,0.0,0.7")?;
        Ok(path.to_string_lossy().to_string())
    }

    fn options(memory: bool, overwrite: bool) -> ReadOptions {
        ReadOptions {
            name: "trips".to_string(),
            format: DataFormat::Csv,
            memory,
            overwrite,
            required_columns: vec!["payment_type".to_string(), "tip_amount".to_string()],
        }
    }

    #[tokio::test]
    async fn test_read_cached_table() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = write_csv(dir.path())?;
        let session = Session::open(&test_config())?;
        let table = session.read_table(&path, &options(true, false)).await?;
        assert_eq!(table.name(), Some("trips"));
        assert_eq!(session.count(&table).await?, 3);

        let result = session.read_table(&path, &options(true, false)).await;
        assert!(matches!(result, Err(SessionError::InvalidArgument(_))));
        let table = session.read_table(&path, &options(false, true)).await?;
        assert_eq!(session.count(&table).await?, 3);

        session.close()?;
        assert!(matches!(
            session.count(&table).await,
            Err(SessionError::SessionClosed)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_failures() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let session = Session::open(&test_config())?;
        let missing = dir.path().join("missing.csv");
        let result = session
            .read_table(&missing.to_string_lossy(), &options(true, true))
            .await;
        assert!(result.is_err());

        let path = write_csv(dir.path())?;
        let mut options = options(true, true);
        options.required_columns.push("fare_amount".to_string());
        let result = session.read_table(&path, &options).await;
        assert!(matches!(result, Err(SessionError::InvalidArgument(m)) if m.contains("fare_amount")));
        Ok(())
    }

    #[tokio::test]
    async fn test_read_file_url() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = write_csv(dir.path())?;
        let session = Session::open(&test_config())?;
        let table = session
            .read_table(&format!("file://{path}"), &options(true, false))
            .await?;
        assert_eq!(session.count(&table).await?, 3);

        let missing = dir.path().join("missing.csv");
        let result = session
            .read_table(
                &format!("file://{}", missing.to_string_lossy()),
                &options(true, true),
            )
            .await;
        assert!(result.is_err());
        Ok(())
    }
}
