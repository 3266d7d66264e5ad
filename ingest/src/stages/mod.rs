//! Transform stages and the stage chain that runs them.

mod base;
mod chain;
pub mod dedup;
pub mod normalize;
pub mod parallel;
pub mod writer;

pub use base::{BatchTransform, FnTransform, RecordTransform, Stage};
pub use chain::StageChain;
