//! Configuration section definitions.
//!
//! Each submodule corresponds to a `[section]` in `assetline.toml`.

mod compile;
mod paths;
mod serve;

pub use compile::{ImagesConfig, ScriptsConfig, StylesConfig};
pub use paths::{OutputConfig, PathsConfig, SourceOverride};
pub use serve::{ServeConfig, WatchConfig};
