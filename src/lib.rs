//! Foley - background music and sound effects for narrated audiobooks
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (chunks, units, jobs, segments, av)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (filesystem, Redis, HTTP collaborators)
//! - application/: Use cases (queue, resolver, orchestrator, narration)
//! - config: Environment configuration
//!
//! # Features
//! - `local`: Redis-backed store and the worker / merge binaries

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

pub use config::{FoleyConfig, PipelineSettings};
pub use error::{Error, Result};
