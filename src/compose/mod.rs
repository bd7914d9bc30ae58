//! Task composition.
//!
//! A [`Step`] tree runs on tokio: every task is a `spawn_blocking` job,
//! series steps run in order, parallel steps run on a `JoinSet`.
//!
//! ```text
//! series(clean, images, assets, pages, parallel(scripts, vendor, styles))
//! ```
//!
//! The composer never recovers: the first error ends the run. Compile
//! diagnostics are not errors and are carried in the reports.

mod entry;

pub use entry::{EntryPoint, run_build, run_dev};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use crate::compiler::Diagnostic;
use crate::config::PipelineConfig;
use crate::core::{Environment, Profile};
use crate::registry::PathRegistry;
use crate::task::{Artifact, TaskContext, TaskId, TaskReport, run_task};

// ============================================================================
// Steps
// ============================================================================

/// A composition of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Task(TaskId),
    /// Children run one after another; the first error stops the series.
    Series(Vec<Step>),
    /// Children start together; all are awaited, the first error is returned.
    Parallel(Vec<Step>),
}

impl Step {
    pub fn series(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::Series(steps.into_iter().collect())
    }

    pub fn parallel(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::Parallel(steps.into_iter().collect())
    }

    /// Series of single tasks.
    pub fn tasks(ids: &[TaskId]) -> Self {
        Self::series(ids.iter().copied().map(Self::Task))
    }

    /// Every task in the tree, depth first.
    #[cfg(test)]
    pub fn task_ids(&self) -> Vec<TaskId> {
        match self {
            Self::Task(id) => vec![*id],
            Self::Series(steps) | Self::Parallel(steps) => {
                steps.iter().flat_map(Self::task_ids).collect()
            }
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (name, steps) = match self {
            Self::Task(id) => return f.write_str(id.name()),
            Self::Series(steps) => ("series", steps),
            Self::Parallel(steps) => ("parallel", steps),
        };
        write!(f, "{name}(")?;
        for (i, step) in steps.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{step}")?;
        }
        f.write_str(")")
    }
}

// ============================================================================
// Running
// ============================================================================

type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<TaskReport>>> + Send + 'a>>;

/// Run `step` with `ctx`, returning reports in step order.
pub fn run_step<'a>(step: &'a Step, ctx: &'a TaskContext) -> StepFuture<'a> {
    Box::pin(async move {
        match step {
            Step::Task(id) => {
                let id = *id;
                let task_ctx = ctx.clone();
                let report = tokio::task::spawn_blocking(move || run_task(id, &task_ctx))
                    .await
                    .with_context(|| format!("{id} task panicked"))?
                    .with_context(|| format!("{id} task failed"))?;
                Ok(vec![report])
            }
            Step::Series(steps) => {
                let mut reports = Vec::new();
                for step in steps {
                    reports.extend(run_step(step, ctx).await?);
                }
                Ok(reports)
            }
            Step::Parallel(steps) => {
                let mut set = JoinSet::new();
                for (index, step) in steps.iter().enumerate() {
                    let step = step.clone();
                    let ctx = ctx.clone();
                    set.spawn(async move { (index, run_step(&step, &ctx).await) });
                }

                let mut slots: Vec<Option<Vec<TaskReport>>> = vec![None; steps.len()];
                let mut first_error = None;
                while let Some(joined) = set.join_next().await {
                    let (index, result) = joined.context("parallel step panicked")?;
                    match result {
                        Ok(reports) => slots[index] = Some(reports),
                        Err(err) => {
                            first_error.get_or_insert(err);
                        }
                    }
                }

                match first_error {
                    Some(err) => Err(err),
                    None => Ok(slots.into_iter().flatten().flatten().collect()),
                }
            }
        }
    })
}

/// Reports of one composed run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<TaskReport>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.reports.iter().flat_map(|r| r.artifacts.iter())
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.reports.iter().flat_map(|r| r.diagnostics.iter())
    }

    #[cfg(test)]
    pub fn has_diagnostics(&self) -> bool {
        self.reports.iter().any(TaskReport::has_diagnostics)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Loaded configuration plus the path registry built from it.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    registry: Arc<PathRegistry>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let registry = PathRegistry::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        })
    }

    pub fn config(&self) -> &Arc<PipelineConfig> {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PathRegistry> {
        &self.registry
    }

    pub fn profile(&self, env: Environment) -> Profile {
        Profile::new(env, self.config.output_root(env))
    }

    pub fn context(&self, env: Environment) -> TaskContext {
        TaskContext::new(
            self.profile(env),
            Arc::clone(&self.registry),
            Arc::clone(&self.config),
        )
    }

    /// Run `step` for `env`.
    pub async fn run(&self, step: &Step, env: Environment) -> Result<RunSummary> {
        let ctx = self.context(env);
        let started = Instant::now();
        let reports = run_step(step, &ctx).await?;
        Ok(RunSummary {
            reports,
            duration: started.elapsed(),
        })
    }
}
