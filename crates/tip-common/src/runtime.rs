use tokio::runtime::{Handle, Runtime};

use crate::config::RuntimeConfig;
use crate::error::{CommonError, CommonResult};

/// Owns the tokio runtime that drives the pipeline.
///
/// The runtime must outlive every session created on it, so it is held by the
/// entrypoint rather than by the session.
#[derive(Debug)]
pub struct RuntimeManager {
    runtime: Runtime,
}

impl RuntimeManager {
    pub fn try_new(config: &RuntimeConfig) -> CommonResult<Self> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.thread_stack_size(config.stack_size).enable_all();
        if let Some(n) = config.worker_threads {
            builder.worker_threads(n);
        }
        let runtime = builder
            .build()
            .map_err(|e| CommonError::internal(e.to_string()))?;
        Ok(Self { runtime })
    }

    pub fn handle(&self) -> Handle {
        self.runtime.handle().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_block_on() -> CommonResult<()> {
        let runtime = RuntimeManager::try_new(&RuntimeConfig {
            stack_size: 2 * 1024 * 1024,
            worker_threads: Some(1),
        })?;
        let value = runtime.handle().block_on(async { 40 + 2 });
        assert_eq!(value, 42);
        Ok(())
    }
}
