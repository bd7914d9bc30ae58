//! Named entry points: `dev`, `prod`, `default`.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use crossbeam::channel;

use super::{Pipeline, RunSummary, Step};
use crate::core::{Environment, register_server, register_shutdown};
use crate::reload::ReloadHub;
use crate::serve::{DevServer, ServeSettings};
use crate::task::TaskId;
use crate::utils::plural_count;
use crate::watch::WatchRegistrar;
use crate::{debug, log};

/// A named composition selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    /// Development build, then serve and watch until interrupted.
    Dev,
    /// Production build.
    Prod,
    /// Same as `Prod`.
    Default,
}

impl EntryPoint {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Dev => "dev",
            Self::Prod => "prod",
            Self::Default => "default",
        }
    }

    pub const fn env(self) -> Environment {
        match self {
            Self::Dev => Environment::Development,
            Self::Prod | Self::Default => Environment::Production,
        }
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntryPoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            "default" => Ok(Self::Default),
            other => Err(format!("unknown entry point `{other}`")),
        }
    }
}

/// `series(clean, images, assets, pages, parallel(scripts, vendor, styles))`
///
/// Clean is first so it finishes before anything writes.
pub fn build_plan() -> Step {
    Step::series([
        Step::Task(TaskId::Clean),
        Step::Task(TaskId::Images),
        Step::Task(TaskId::Assets),
        Step::Task(TaskId::Pages),
        Step::parallel([
            Step::Task(TaskId::Scripts),
            Step::Task(TaskId::Vendor),
            Step::Task(TaskId::Styles),
        ]),
    ])
}

/// Run the full build for `env`.
///
/// With `strict`, compile diagnostics fail the run after it completes.
pub async fn run_build(pipeline: &Pipeline, env: Environment, strict: bool) -> Result<RunSummary> {
    let plan = build_plan();
    debug!("build"; "{} plan: {}", env, plan);

    let summary = pipeline.run(&plan, env).await?;
    let errors = summary.diagnostics().count();
    log!(
        "build";
        "{}: {} in {:.2?}{}",
        env,
        plural_count(summary.artifacts().count(), "file"),
        summary.duration,
        if errors > 0 {
            format!(", {}", plural_count(errors, "error"))
        } else {
            String::new()
        }
    );

    if strict && errors > 0 {
        bail!("build finished with {}", plural_count(errors, "compile error"));
    }
    Ok(summary)
}

/// Development session: build, serve, watch, wait for Ctrl+C.
pub async fn run_dev(pipeline: &Pipeline, watch: bool) -> Result<()> {
    let config = pipeline.config();
    let hub = ReloadHub::new();

    // Registered first so Ctrl+C during the initial build is not lost.
    let (tx, rx) = channel::bounded::<()>(1);
    register_shutdown(tx);

    let summary = run_build(pipeline, Environment::Development, false).await?;
    if let Some(diag) = summary.diagnostics().next() {
        // Clients connecting now see the overlay.
        hub.error(&diag.location(&config.root), &diag.overlay_text());
    }

    let mut server = DevServer::new(ServeSettings::from_config(config), hub.clone());
    server.start()?;
    if let Some(handle) = server.server_handle() {
        register_server(handle);
    }

    let session = if watch {
        let registrar = WatchRegistrar::from_registry(pipeline.registry(), &config.watch);
        let mut session = registrar.start(pipeline.context(Environment::Development), hub);
        session.watch(pipeline.registry().source_root())?;
        debug!("watch"; "{}", plural_count(session.binding_count(), "binding"));
        Some(session)
    } else {
        None
    };

    tokio::task::spawn_blocking(move || rx.recv())
        .await
        .context("shutdown wait panicked")?
        .ok();

    if let Some(session) = session {
        session.stop().await;
    }
    server.stop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_shape() {
        assert_eq!(
            build_plan().to_string(),
            "series(clean, images, assets, pages, parallel(scripts, vendor, styles))"
        );
        assert_eq!(build_plan().task_ids()[0], TaskId::Clean);
    }

    #[test]
    fn test_entry_points() {
        assert_eq!("default".parse(), Ok(EntryPoint::Default));
        assert_eq!(EntryPoint::Default.env(), EntryPoint::Prod.env());
        assert_eq!(EntryPoint::Dev.env(), Environment::Development);
        assert!("staging".parse::<EntryPoint>().is_err());
    }
}
