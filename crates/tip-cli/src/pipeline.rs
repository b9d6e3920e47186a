//! The end-to-end pipeline: load, transform, split, train, evaluate and report.

use std::path::{Path, PathBuf};

use log::{info, warn};
use thiserror::Error;
use tip_common::config::AppConfig;
use tip_common::error::CommonError;
use tip_common::runtime::RuntimeManager;
use tip_ml::dataset::FeatureSpec;
use tip_ml::estimator::{
    Estimator, FeatureSubsetStrategy, GBTRegressor, LinearRegression, RandomForestRegressor,
};
use tip_ml::model::RegressionModel;
use tip_report::error::ReportError;
use tip_report::{ModelReport, Report, ScatterPlot};
use tip_session::error::SessionError;
use tip_session::{ReadOptions, Session, Table};

const TRAINING_SPLIT: &str = "training";
const TEST_SPLIT: &str = "test";

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    SessionError(#[from] SessionError),
    #[error(transparent)]
    ReportError(#[from] ReportError),
    #[error(transparent)]
    CommonError(#[from] CommonError),
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub report: Report,
    /// The path of the written `report.md`.
    pub path: PathBuf,
}

/// Runs the pipeline on a dedicated runtime.
///
/// The session is closed whether or not the stages succeed, and the report is
/// written only after a successful run.
pub fn run_pipeline(config: &AppConfig) -> PipelineResult<PipelineOutput> {
    let plot = ScatterPlot::try_new(config.report.plot_width, config.report.plot_height)?;
    let runtime = RuntimeManager::try_new(&config.runtime)?;
    let session = Session::open(&config.session)?;

    let result = runtime.handle().block_on(run_stages(&session, config));
    let closed = session.close();
    let report = result?;
    closed?;

    let path = report.write(Path::new(&config.report.output_dir), &plot)?;
    info!("report:\n{}", report.to_markdown());
    Ok(PipelineOutput { report, path })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelKind {
    ElasticNet,
    RandomForest,
    Gbt,
}

impl ModelKind {
    fn name(&self) -> &'static str {
        match self {
            ModelKind::ElasticNet => "elastic_net",
            ModelKind::RandomForest => "random_forest",
            ModelKind::Gbt => "gbt",
        }
    }
}

/// A model to train, with the columns it reads.
struct ModelJob {
    kind: ModelKind,
    spec: FeatureSpec,
}

fn model_jobs(config: &AppConfig) -> PipelineResult<Vec<ModelJob>> {
    let models = &config.models;
    let candidates = [
        (
            ModelKind::ElasticNet,
            models.elastic_net.enabled,
            &models.elastic_net.features,
        ),
        (
            ModelKind::RandomForest,
            models.random_forest.enabled,
            &models.random_forest.features,
        ),
        (ModelKind::Gbt, models.gbt.enabled, &models.gbt.features),
    ];
    let mut jobs = vec![];
    for (kind, enabled, features) in candidates {
        if !enabled {
            info!("model {} is disabled", kind.name());
            continue;
        }
        let features = features.as_deref().unwrap_or(&models.features);
        let spec = FeatureSpec::from_label_and_features(&models.label, features)?;
        jobs.push(ModelJob { kind, spec });
    }
    if jobs.is_empty() {
        warn!("no model is enabled");
    }
    Ok(jobs)
}

async fn run_stages(session: &Session, config: &AppConfig) -> PipelineResult<Report> {
    let table = session
        .read_table(&config.data.path, &ReadOptions::from(&config.data))
        .await?;
    let row_count = session.count(&table).await?;
    info!("loaded {row_count} rows");

    let transformed = session.transform(&table, &config.features.steps).await?;
    let weights = vec![
        (TRAINING_SPLIT.to_string(), config.split.training),
        (TEST_SPLIT.to_string(), config.split.test),
    ];
    let mut partitions = vec![];
    let mut splits = session
        .random_split(&transformed, &weights, config.split.seed)
        .await?;
    for (name, split) in &splits {
        partitions.push((name.clone(), session.count(split).await?));
    }
    let test = take_split(&mut splits, TEST_SPLIT)?;
    let training = take_split(&mut splits, TRAINING_SPLIT)?;

    let jobs = model_jobs(config)?;
    // Every specification is checked before any model is trained.
    for job in &jobs {
        session.validate_features(&training, &job.spec)?;
    }

    let mut models = vec![];
    for job in &jobs {
        let stage = Stage {
            session,
            config,
            job,
            training: &training,
            test: &test,
        };
        let report = match job.kind {
            ModelKind::ElasticNet => {
                let c = &config.models.elastic_net;
                let estimator = LinearRegression::new()
                    .with_reg_param(c.lambda)
                    .with_elastic_net_param(c.alpha)
                    .with_max_iter(c.max_iter)
                    .with_tolerance(c.tol)
                    .with_fit_intercept(c.fit_intercept);
                stage.run(estimator).await?
            }
            ModelKind::RandomForest => {
                let c = &config.models.random_forest;
                let strategy: FeatureSubsetStrategy = c.feature_subset_strategy.parse()?;
                let estimator = RandomForestRegressor::new()
                    .with_num_trees(c.num_trees)
                    .with_max_depth(c.max_depth)
                    .with_max_bins(c.max_bins)
                    .with_feature_subset_strategy(strategy)
                    .with_subsampling_rate(c.subsampling_rate)
                    .with_min_instances_per_node(c.min_instances_per_node)
                    .with_min_info_gain(c.min_info_gain)
                    .with_seed(c.seed);
                stage.run(estimator).await?
            }
            ModelKind::Gbt => {
                let c = &config.models.gbt;
                let estimator = GBTRegressor::new()
                    .with_max_iter(c.max_iter)
                    .with_max_depth(c.max_depth)
                    .with_max_bins(c.max_bins)
                    .with_step_size(c.step_size)
                    .with_min_instances_per_node(c.min_instances_per_node)
                    .with_min_info_gain(c.min_info_gain);
                stage.run(estimator).await?
            }
        };
        models.push(report);
    }

    Ok(Report {
        title: format!("Taxi tip regression: {}", config.session.app_name),
        row_count,
        partitions,
        models,
    })
}

fn take_split(splits: &mut Vec<(String, Table)>, name: &str) -> PipelineResult<Table> {
    let index = splits
        .iter()
        .position(|(n, _)| n == name)
        .ok_or_else(|| CommonError::internal(format!("missing split {name}")))?;
    Ok(splits.swap_remove(index).1)
}

/// Trains one model on the training split and evaluates it on the test split.
struct Stage<'a> {
    session: &'a Session,
    config: &'a AppConfig,
    job: &'a ModelJob,
    training: &'a Table,
    test: &'a Table,
}

impl Stage<'_> {
    async fn run<E: Estimator>(&self, estimator: E) -> PipelineResult<ModelReport> {
        let name = self.job.kind.name();
        let dataset = self.session.dataset(self.training, &self.job.spec).await?;
        info!(
            "training {name} on {} rows with features {:?}",
            dataset.num_rows(),
            dataset.feature_names()
        );
        let model = estimator.fit(&dataset)?;
        let predictions = self
            .session
            .predict(self.test, &self.job.spec, &model)
            .await?;
        let evaluation = self
            .session
            .evaluate(
                &predictions,
                self.job.spec.label(),
                self.config.evaluation.sample_size,
                self.config.evaluation.seed,
            )
            .await?;
        info!("{name}: r2={:.4}", evaluation.metrics.r2);
        Ok(ModelReport {
            name: name.to_string(),
            summary: model.summary(dataset.feature_names()),
            evaluation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_jobs_exclude_fare_amount_by_default() -> PipelineResult<()> {
        let config = AppConfig::load()?;
        let jobs = model_jobs(&config)?;
        let names: Vec<_> = jobs.iter().map(|j| j.kind.name()).collect();
        assert_eq!(names, vec!["elastic_net", "random_forest", "gbt"]);
        for job in &jobs {
            assert_eq!(job.spec.label(), "tip_amount");
            assert!(!job.spec.feature_names().contains(&"fare_amount".to_string()));
        }
        Ok(())
    }

    #[test]
    fn test_model_features_override() -> PipelineResult<()> {
        let mut config = AppConfig::load()?;
        config.models.gbt.enabled = false;
        config.models.elastic_net.features =
            Some(vec!["pt_bin".to_string(), "fare_amount".to_string()]);
        let jobs = model_jobs(&config)?;
        assert_eq!(jobs.len(), 2);
        assert_eq!(
            jobs[0].spec.feature_names(),
            vec!["pt_bin".to_string(), "fare_amount".to_string()]
        );
        Ok(())
    }

    #[test]
    fn test_label_cannot_be_a_feature() -> PipelineResult<()> {
        let mut config = AppConfig::load()?;
        config.models.features.push("tip_amount".to_string());
        assert!(model_jobs(&config).is_err());
        Ok(())
    }
}
