//! Command-line interface definitions.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand};

use crate::compose::EntryPoint;
use crate::core::Environment;
use crate::task::TaskId;

/// Front-end asset pipeline: bundle, compile, optimize, serve.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, disable_version_flag = true)]
pub struct Cli {
    /// Print version
    #[arg(long, action = clap::ArgAction::Version)]
    version: (),

    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: assetline.toml, searched upward)
    #[arg(short = 'C', long, global = true, value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// Treat compile diagnostics as a failed build
    #[arg(long, global = true)]
    pub strict: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Development build, then serve with live reload and watch
    #[command(visible_alias = "d")]
    Dev {
        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve only, without rebuilding on changes
        #[arg(long)]
        no_watch: bool,
    },

    /// Clean production build
    #[command(visible_alias = "p")]
    Prod,

    /// Same as `prod`
    Default,

    /// Run a single task
    #[command(visible_alias = "r")]
    Run {
        /// clean, scripts, vendor, styles, images, assets or pages
        task: TaskId,

        /// Environment to build for
        #[arg(short, long, default_value = "dev")]
        env: Environment,
    },

    /// Print tasks with their transform chains, and the watch bindings
    #[command(visible_alias = "l")]
    List {
        /// Environment whose transform chains are shown
        #[arg(short, long, default_value = "dev")]
        env: Environment,
    },
}

impl Cli {
    /// Entry point for build commands; `None` for `run` and `list`.
    pub fn entry_point(&self) -> Option<EntryPoint> {
        match &self.command {
            None | Some(Commands::Default) => Some(EntryPoint::Default),
            Some(Commands::Prod) => Some(EntryPoint::Prod),
            Some(Commands::Dev { .. }) => Some(EntryPoint::Dev),
            Some(Commands::Run { .. } | Commands::List { .. }) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("assetline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_command_is_default() {
        let cli = parse(&[]);
        assert!(cli.command.is_none());
        assert_eq!(cli.entry_point(), Some(EntryPoint::Default));
    }

    #[test]
    fn test_dev_overrides() {
        let cli = parse(&["dev", "-p", "8080", "-i", "0.0.0.0", "--no-watch", "-V"]);
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Dev {
                interface,
                port,
                no_watch,
            }) => {
                assert_eq!(port, Some(8080));
                assert_eq!(interface, Some("0.0.0.0".parse().unwrap()));
                assert!(no_watch);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_parses_task_and_env() {
        let cli = parse(&["--strict", "run", "Styles", "--env", "prod"]);
        assert!(cli.strict);
        assert!(cli.entry_point().is_none());
        match cli.command {
            Some(Commands::Run { task, env }) => {
                assert_eq!(task, TaskId::Styles);
                assert_eq!(env, Environment::Production);
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["assetline", "run", "fonts"]).is_err());
    }
}
