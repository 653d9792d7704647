//! Ports - Trait definitions for every external seam.

pub mod collaborators;
pub mod queue;
pub mod repository;
pub mod storage;
