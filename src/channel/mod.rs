// src/channel/mod.rs

//! The two detection channels.
//!
//! Both are thin adapters: they normalize what their source reports and hand
//! it to the [`Coordinator`](crate::engine::Coordinator), which owns dedup,
//! filtering and scheduling.

pub mod file;
pub mod live;

pub use file::FileWatchChannel;
pub use live::LiveRedefinitionChannel;
