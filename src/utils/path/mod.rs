//! Path helpers.
//!
//! - [`fs`]: normalization and relative paths (`normalize_path`, `normalize_lexical`, `relative_to`)

pub mod fs;

pub use fs::{normalize_lexical, normalize_path, relative_to, to_slash};
