//! Patito project configuration: the `patito.toml` manifest.

mod manifest;

pub use manifest::*;
