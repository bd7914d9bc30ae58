//! Remove the profile's output root.

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};

use super::{TaskContext, TaskReport};
use crate::log;

pub fn run(ctx: &TaskContext, _report: &mut TaskReport) -> Result<()> {
    let destinations = ctx.destinations();
    let root = destinations.root();
    match fs::remove_dir_all(root) {
        Ok(()) => {
            log!("clean"; "removed {}", ctx.display_path(root));
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("Failed to remove {}", root.display())),
    }
}
