//! Shared test fixtures for JobForge crates.
//!
//! This crate provides solution types only. It depends on `jobforge-core`
//! alone so that any crate can take it as a dev-dependency.
//!
//! - [`counter`] - Single-valued solution scored by its value
//! - [`task`] - Task assignment solution with a hard/soft score
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! jobforge-test = { workspace = true }
//! ```

pub mod counter;
pub mod task;

pub use counter::CounterSolution;
pub use task::{Task, TaskSolution};
