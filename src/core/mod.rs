//! Core types shared across the pipeline.

mod driver;
mod state;

pub use driver::{Environment, Profile};
pub use state::{is_shutdown, register_server, register_shutdown, setup_shutdown_handler};
