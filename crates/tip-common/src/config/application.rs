use std::path::Path;

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::config::loader::deserialize_non_zero;
use crate::error::CommonResult;

const DEFAULT_CONFIG: &str = include_str!("default.toml");

/// The prefix of environment variables that override configuration.
/// Nested keys are separated by `__`, e.g. `TIP__SPLIT__SEED`.
pub const CONFIG_ENV_PREFIX: &str = "TIP__";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub runtime: RuntimeConfig,
    pub telemetry: TelemetryConfig,
    pub session: SessionConfig,
    pub data: DataConfig,
    pub features: FeaturesConfig,
    pub split: SplitConfig,
    pub models: ModelsConfig,
    pub evaluation: EvaluationConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    pub fn load() -> CommonResult<Self> {
        Self::load_with_file(None)
    }

    /// Loads the configuration from the built-in defaults, an optional TOML file,
    /// and the environment, in increasing order of precedence.
    pub fn load_with_file(path: Option<&Path>) -> CommonResult<Self> {
        let mut figment = Figment::from(Toml::string(DEFAULT_CONFIG));
        if let Some(path) = path {
            figment = figment.merge(Toml::file_exact(path));
        }
        Ok(figment
            .merge(Env::prefixed(CONFIG_ENV_PREFIX).map(|p| p.as_str().replace("__", ".").into()))
            .extract()?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub stack_size: usize,
    #[serde(deserialize_with = "deserialize_non_zero")]
    pub worker_threads: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub default_log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub app_name: String,
    pub executor_instances: usize,
    /// Memory reserved per executor, e.g. `"512m"` or `"2g"`.
    /// A plain number is interpreted as MiB.
    pub executor_memory_overhead: String,
    pub batch_size: usize,
    /// Package coordinates in the form `group:artifact:version`.
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataFormat {
    Parquet,
    Csv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: String,
    pub format: DataFormat,
    pub table_name: String,
    pub memory: bool,
    pub overwrite: bool,
    #[serde(default)]
    pub required_columns: Vec<String>,
}

/// How a transformer treats values it cannot map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandleInvalid {
    #[default]
    Error,
    Skip,
    Keep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    pub steps: Vec<FeatureStepConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FeatureStepConfig {
    StringIndex {
        input: String,
        output: String,
        #[serde(default)]
        handle_invalid: HandleInvalid,
    },
    Binarize {
        input: String,
        output: String,
        threshold: f64,
    },
    Bucketize {
        input: String,
        output: String,
        splits: Vec<f64>,
        #[serde(default)]
        handle_invalid: HandleInvalid,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub training: f64,
    pub test: f64,
    pub seed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub label: String,
    pub features: Vec<String>,
    pub elastic_net: ElasticNetConfig,
    pub random_forest: RandomForestConfig,
    pub gbt: GbtConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetConfig {
    pub enabled: bool,
    /// Overrides `models.features` for this model.
    #[serde(default)]
    pub features: Option<Vec<String>>,
    pub alpha: f64,
    pub lambda: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestConfig {
    pub enabled: bool,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    pub num_trees: usize,
    pub max_depth: usize,
    pub max_bins: usize,
    pub feature_subset_strategy: String,
    pub subsampling_rate: f64,
    pub min_instances_per_node: usize,
    pub min_info_gain: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GbtConfig {
    pub enabled: bool,
    #[serde(default)]
    pub features: Option<Vec<String>>,
    pub max_iter: usize,
    pub max_depth: usize,
    pub max_bins: usize,
    pub step_size: f64,
    pub min_instances_per_node: usize,
    pub min_info_gain: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    pub sample_size: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_dir: String,
    pub plot_width: u32,
    pub plot_height: u32,
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn test_default_config() -> Result<(), Box<dyn std::error::Error>> {
        let config = AppConfig::load()?;
        assert_eq!(config.split.training, 0.75);
        assert_eq!(config.split.test, 0.25);
        assert_eq!(config.evaluation.sample_size, 1000);
        assert_eq!(config.runtime.worker_threads, None);
        assert_eq!(config.data.format, DataFormat::Parquet);
        assert_eq!(config.features.steps.len(), 4);
        assert_eq!(
            config.features.steps[3],
            FeatureStepConfig::Bucketize {
                input: "TrafficTimeInd".to_string(),
                output: "TrafficTimeBuc".to_string(),
                splits: vec![-1.0, 0.5, 1.5, 2.5, 3.5],
                handle_invalid: HandleInvalid::Error,
            }
        );
        assert!(!config.models.features.contains(&"fare_amount".to_string()));
        Ok(())
    }

    #[test]
    fn test_env_and_file_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tip.toml",
                r#"
                [data]
                path = "trips.csv"
                format = "csv"
                table_name = "trips"
                memory = false
                overwrite = false
                required_columns = []

                [models.elastic_net]
                enabled = true
                features = ["pt_bin", "fare_amount"]
                alpha = 0.5
                lambda = 0.01
                max_iter = 50
                tol = 1e-6
                fit_intercept = true
                "#,
            )?;
            jail.set_env("TIP__SPLIT__SEED", "7");
            jail.set_env("TIP__RUNTIME__WORKER_THREADS", "2");
            let config = AppConfig::load_with_file(Some(Path::new("tip.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.split.seed, 7);
            assert_eq!(config.runtime.worker_threads, Some(2));
            assert_eq!(config.data.format, DataFormat::Csv);
            assert!(config.data.required_columns.is_empty());
            assert_eq!(config.models.elastic_net.max_iter, 50);
            assert_eq!(
                config.models.elastic_net.features,
                Some(vec!["pt_bin".to_string(), "fare_amount".to_string()])
            );
            Ok(())
        });
    }
    #[test]
    fn test_file_table_keeps_omitted_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "tip.toml",
                r#"
                [data]
                path = "trips.csv"
                format = "csv"
                "#,
            )?;
            let config = AppConfig::load_with_file(Some(Path::new("tip.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.data.path, "trips.csv");
            assert_eq!(config.data.format, DataFormat::Csv);
            assert_eq!(config.data.required_columns.len(), 7);
            Ok(())
        });
    }
}
