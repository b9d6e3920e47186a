use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use datafusion::execution::runtime_env::RuntimeEnvBuilder;
use datafusion::prelude::{SessionConfig as DataFusionSessionConfig, SessionContext};
use log::{debug, info, warn};
use tip_common::config::{parse_byte_size, SessionConfig};

use crate::error::{SessionError, SessionResult};
use crate::package::PackageCoordinate;

/// Validated settings of a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub app_name: String,
    pub executor_instances: usize,
    pub executor_memory_overhead: usize,
    pub batch_size: usize,
    pub packages: Vec<PackageCoordinate>,
}

impl SessionOptions {
    pub fn try_new(config: &SessionConfig) -> SessionResult<Self> {
        if config.executor_instances == 0 {
            return Err(SessionError::invalid(
                "executor instances must be greater than zero",
            ));
        }
        if config.batch_size == 0 {
            return Err(SessionError::invalid("batch size must be greater than zero"));
        }
        let executor_memory_overhead = parse_byte_size(&config.executor_memory_overhead)?;
        let packages = config
            .packages
            .iter()
            .map(|p| p.parse())
            .collect::<SessionResult<Vec<PackageCoordinate>>>()?;
        Ok(Self {
            app_name: config.app_name.clone(),
            executor_instances: config.executor_instances,
            executor_memory_overhead,
            batch_size: config.batch_size,
            packages,
        })
    }

    /// The memory pool limit shared by all executors.
    pub fn memory_limit(&self) -> SessionResult<usize> {
        self.executor_instances
            .checked_mul(self.executor_memory_overhead)
            .ok_or_else(|| SessionError::invalid("executor memory limit overflows"))
    }
}

/// A handle to the compute session shared by every pipeline stage.
///
/// Closing deregisters all tables registered through the session. It is idempotent,
/// and dropping an open session closes it.
pub struct Session {
    options: SessionOptions,
    context: SessionContext,
    registered_tables: Mutex<Vec<String>>,
    closed: AtomicBool,
}

impl Session {
    pub fn open(config: &SessionConfig) -> SessionResult<Self> {
        let options = SessionOptions::try_new(config)?;
        let runtime = RuntimeEnvBuilder::new()
            .with_memory_limit(options.memory_limit()?, 1.0)
            .build_arc()?;
        // Batches keep their scan order so that seeded splits are reproducible.
        let config = DataFusionSessionConfig::new()
            .with_target_partitions(options.executor_instances)
            .with_batch_size(options.batch_size)
            .with_round_robin_repartition(false);
        let context = SessionContext::new_with_config_rt(config, runtime);
        for package in &options.packages {
            debug!("attached package {package}");
        }
        info!(
            "opened session {} with {} executors and a {} byte memory limit",
            options.app_name,
            options.executor_instances,
            options.memory_limit()?
        );
        Ok(Self {
            options,
            context,
            registered_tables: Mutex::new(vec![]),
            closed: AtomicBool::new(false),
        })
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns the DataFusion context, or an error if the session has been closed.
    pub(crate) fn context(&self) -> SessionResult<&SessionContext> {
        if self.is_closed() {
            return Err(SessionError::SessionClosed);
        }
        Ok(&self.context)
    }

    pub(crate) fn track_table(&self, name: &str) -> SessionResult<()> {
        let mut tables = self.registered_tables.lock()?;
        if !tables.iter().any(|t| t == name) {
            tables.push(name.to_string());
        }
        Ok(())
    }

    pub fn close(&self) -> SessionResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let tables = std::mem::take(&mut *self.registered_tables.lock()?);
        for name in tables {
            self.context.deregister_table(name.as_str())?;
            debug!("deregistered table {name}");
        }
        info!("closed session {}", self.options.app_name);
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close session: {e}");
        }
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> SessionConfig {
    SessionConfig {
        app_name: "test".to_string(),
        executor_instances: 2,
        executor_memory_overhead: "64m".to_string(),
        batch_size: 4,
        packages: vec!["com.example:tools:1.0.0".to_string()],
    }
}
