//! Audio compositing: command graphs, the engine runner and the synthesizers
//! built on them. No samples are processed in-process.

pub mod background;
pub mod cmd;
pub mod effects;
pub mod graph;
pub mod mix;
pub mod overlay;

#[cfg(test)]
mod functional_tests;
