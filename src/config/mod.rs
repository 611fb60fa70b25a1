//! Configuration loaded from `.fieldvault.toml` and the process environment.

pub mod settings;

pub use settings::{Environment, Settings};
