// src/config/mod.rs

//! Configuration for dagrun.
//!
//! - [`executor`]: worker pool settings ([`ExecutorConfig`]), with
//!   environment overrides.
//! - [`model`]: the TOML graph file data model.
//! - [`loader`]: reading a graph file from disk.
//! - [`validate`]: turning a raw graph file into a validated [`GraphFile`].

pub mod executor;
pub mod loader;
pub mod model;
pub mod validate;

pub use executor::ExecutorConfig;
pub use loader::{default_config_path, load_and_validate, load_from_path, parse_str};
pub use model::{GraphFile, RawGraphFile, TaskConfig};
