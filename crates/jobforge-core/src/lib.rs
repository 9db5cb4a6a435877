//! JobForge Core - Core types and traits for solver job management
//!
//! This crate provides the fundamental abstractions shared by the
//! JobForge crates:
//! - Score types for comparing candidate solutions
//! - The [`PlanningSolution`] trait implemented by solved problems
//! - The [`ProblemId`] bound for caller-chosen job keys
//! - [`SolvingFault`], the error a solving run can end with

pub mod domain;
pub mod error;
pub mod score;

pub use domain::{PlanningSolution, ProblemId};
pub use error::SolvingFault;
pub use score::{HardSoftScore, Score, SimpleScore};
