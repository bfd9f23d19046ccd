//! File watching and path filtering for the harbor tool.
//!
//! This crate bridges the synchronous `notify` file watcher to the async
//! tokio runtime and decides, per path, whether a change participates in the
//! mirror at all.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Blocking Thread (spawn_blocking)             │
//! │  ┌──────────────────┐    ┌────────────────┐    ┌────────────┐  │
//! │  │ RecommendedWatcher│ -> │ Debouncer      │ -> │ Callback   │  │
//! │  │ (notify)         │    │ (100ms window) │    │ (filtering)│  │
//! │  └──────────────────┘    └────────────────┘    └─────┬──────┘  │
//! └──────────────────────────────────────────────────────│─────────┘
//! │                                        blocking_send │
//! │                                                      ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                        │
//! │  ┌──────────────────┐    ┌────────────────┐                     │
//! │  │ FileWatcher      │    │ mpsc::Receiver │ -> Mirror Pipeline  │
//! │  │ (shutdown ctrl)  │    │ (events)       │                     │
//! │  └──────────────────┘    └────────────────┘                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Filtering happens in the blocking thread, before events reach the
//! channel, so vendor noise never crosses into async processing. The same
//! [`FileFilter`] implementation drives the initial scan in `hb-mirror`.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod filter;
pub mod watcher;

pub use error::WatchError;
pub use events::FileEvent;
pub use filter::{AcceptAllFilter, FileFilter, MirrorFilter};
pub use watcher::FileWatcher;
