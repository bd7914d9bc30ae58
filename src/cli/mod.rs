//! Command-line interface module.

mod args;

pub use args::{Cli, Commands};

use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use crate::compose::{EntryPoint, Pipeline, Step, run_build, run_dev};
use crate::config::PipelineConfig;
use crate::core::Environment;
use crate::{debug, log};
use crate::task::{TaskId, TaskSpec};
use crate::utils::plural_count;
use crate::watch::default_bindings;

/// Fold command-line overrides into the loaded configuration.
pub fn apply_overrides(cli: &Cli, config: &mut PipelineConfig) {
    if let Some(Commands::Dev {
        interface,
        port,
        no_watch,
    }) = &cli.command
    {
        if let Some(interface) = interface {
            config.serve.interface = *interface;
        }
        if let Some(port) = port {
            config.serve.port = *port;
        }
        if *no_watch {
            config.serve.watch = false;
        }
    }
}

/// Execute the selected command.
pub async fn dispatch(cli: &Cli, pipeline: &Pipeline) -> Result<()> {
    if let Some(entry) = cli.entry_point() {
        debug!("cli"; "entry point {}", entry);
        return match entry {
            EntryPoint::Dev => run_dev(pipeline, pipeline.config().serve.watch).await,
            EntryPoint::Prod | EntryPoint::Default => {
                run_build(pipeline, entry.env(), cli.strict).await.map(|_| ())
            }
        };
    }

    match &cli.command {
        Some(Commands::Run { task, env }) => run_single(pipeline, *task, *env, cli.strict).await,
        Some(Commands::List { env }) => {
            print_list(pipeline, *env);
            Ok(())
        }
        _ => Ok(()),
    }
}

/// `assetline run <TASK>`
async fn run_single(pipeline: &Pipeline, task: TaskId, env: Environment, strict: bool) -> Result<()> {
    let summary = pipeline.run(&Step::Task(task), env).await?;
    let errors = summary.diagnostics().count();
    if strict && errors > 0 {
        bail!("{} finished with {}", task, plural_count(errors, "compile error"));
    }
    Ok(())
}

/// `assetline list`
fn print_list(pipeline: &Pipeline, env: Environment) {
    let profile = pipeline.profile(env);
    let config = pipeline.config();
    log!("list"; "tasks ({})", env);
    for id in TaskId::ALL {
        let spec = TaskSpec::for_profile(id, &profile);
        println!("  {:<8} {}", id.name().bold(), spec.chain());
    }

    log!("list"; "watch bindings");
    for binding in default_bindings(pipeline.registry()) {
        let tasks = if binding.tasks.is_empty() {
            "reload".to_string()
        } else {
            binding
                .tasks
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("  {:<9} -> {}", binding.name.bold(), tasks);
        for pattern in binding.patterns() {
            let shown = config.root_relative(&pattern);
            println!("    {}", shown.display().dimmed());
        }
    }
}
