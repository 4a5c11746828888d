//! # Stream read coordinator
//!
//! Batches access units from a demuxer for a remote player. The player asks
//! for a batch of one stream type; the coordinator reads units one after the
//! other from that stream and acknowledges once, when the batch is full or a
//! terminal unit (end of stream, config change) arrives.
//!
//! Seeks supersede every read in flight. Reads aborted by a seek, and reads
//! that complete after a seek started, are dropped without an
//! acknowledgement; the player is expected to re-request with the
//! [`SeekGeneration`] returned by the seek.
//!
//! The coordinator runs as an actor: [`spawn_coordinator`] moves the state
//! into a tokio task and returns a [`CoordinatorHandle`].

mod actor;
mod batch;
mod commands;
mod core;
mod handle;
mod padding;
mod ready;
mod stats;

pub use actor::{spawn_coordinator, CoordinatorOptions};
pub use batch::ReadAck;
pub use commands::SeekGeneration;
pub use handle::CoordinatorHandle;
pub use padding::{AudioPaddingPolicy, NoPadding, VorbisPadding};
pub use ready::DemuxerReadyParams;
pub use stats::Statistics;
