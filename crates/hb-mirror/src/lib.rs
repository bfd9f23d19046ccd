//! Incremental mirror pipeline.
//!
//! This crate maps each accepted source path to its output path and applies
//! copy-or-transform:
//!
//! - [`mapper`] - source path to output path mapping
//! - [`transform`] - per-file transform gating (globs) and the transformer
//!   hook contract
//! - [`pipeline`] - the serialized copy/transform/unlink pipeline and the
//!   initial tree scan
//!
//! # Event Flow
//!
//! ```text
//! Initial scan / watch event
//!        │
//!        ▼
//!   MirrorPipeline::process(path)
//!        │
//!        ├── directory or symlink ──► create output directory
//!        ├── gated regular file ────► read → transformer hook → atomic write
//!        ├── plain regular file ────► byte-for-byte copy
//!        └── vanished source ───────► remove output entry
//!        │
//!        ▼ (successful write or file removal)
//!   restart notification → debouncer → supervisor
//! ```
//!
//! Per-file operations are serialized at the input side; the restart
//! notification never fires before the write completes.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod mapper;
pub mod pipeline;
pub mod transform;

pub use error::MirrorError;
pub use mapper::PathMapper;
pub use pipeline::MirrorPipeline;
pub use transform::{TransformGate, Transformer};
