//! Score types for representing solution quality
//!
//! Scores are used to compare solutions. The job manager relies on the
//! total ordering to keep a job's best solution monotonically improving.

mod hard_soft;
mod simple;
mod traits;


pub use hard_soft::HardSoftScore;
pub use simple::SimpleScore;
pub use traits::Score;
