//! Core types, errors, and utilities for the harbor tool.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Error types for consistent error handling
//! - Configuration structures (validated CLI options, watch and restart tuning)
//! - Child command tokenization (`CommandLine`, `ChildKind`)
//! - Path normalization helpers
//! - Type aliases for `FxHashMap`/`FxHashSet` (faster than std)

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod error;
pub mod paths;

pub use command::{ChildKind, CommandLine};
pub use config::{Options, RestartConfig, WatchConfig};
pub use error::ConfigError;
pub use paths::{absolutize, normalize};

/// A hash map using the `FxHash` algorithm.
///
/// Faster than the std default hasher for the short path and command keys
/// used throughout the workspace.
pub type FxHashMap<K, V> = rustc_hash::FxHashMap<K, V>;

/// A hash set using the `FxHash` algorithm.
pub type FxHashSet<T> = rustc_hash::FxHashSet<T>;
