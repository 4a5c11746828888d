#![doc(html_root_url = "https://docs.rs/msebridge/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

//! # msebridge - media source bridge
//!
//! `msebridge` sits between a streaming demuxer and a remote media player.
//! The player asks for access units one stream at a time; the bridge reads
//! them from the demuxer, batches them, and acknowledges each request once.
//! Seeks cancel reads in flight, and decode statistics and buffered ranges are
//! tracked along the way.
//!
//! ## Features
//!
//! - Batched access unit delivery (16 units per ack for MediaSource playback,
//!   1 for live streams)
//! - Seek generations that silently drop stale and aborted reads
//! - Readiness descriptors built from the demuxer's decoder configs, held
//!   back for encrypted content until a key system is known
//! - Pluggable audio padding policy for platform quirks
//! - Decode statistics and merged buffered time ranges
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use msebridge::av::{StreamType, VideoCodec, VideoDecoderConfig, Size};
//! use msebridge::consumer::{ChannelConsumer, ConsumerEvent};
//! use msebridge::coordinator::{spawn_coordinator, CoordinatorOptions, SeekGeneration};
//! use msebridge::demuxer::mock::MockDemuxer;
//! use msebridge::demuxer::DemuxerSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let demuxer = Arc::new(
//!         MockDemuxer::new()
//!             .with_video(VideoDecoderConfig::new(VideoCodec::H264, Size::new(1280, 720)))
//!             .chunked(120.0),
//!     );
//!     let (consumer, mut events) = ChannelConsumer::unbounded();
//!     let handle = spawn_coordinator(
//!         DemuxerSource::MediaSource(demuxer),
//!         Box::new(consumer),
//!         CoordinatorOptions::new(1),
//!     );
//!
//!     handle.request_batch(StreamType::Video, SeekGeneration::default()).await?;
//!     while let Some(event) = events.recv().await {
//!         if let ConsumerEvent::BatchReady { ack, .. } = event {
//!             println!("{} units of {}", ack.access_units.len(), ack.stream_type);
//!         }
//!     }
//!
//!     handle.destroy().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: access units, decoder buffers, decoder configs, buffered ranges
//! - `demuxer`: the demuxer contract and a scripted in-memory demuxer
//! - `coordinator`: the batching state machine and its actor handle
//! - `consumer`: the remote player contract and network state mapping
//! - `config`: configuration loading
//! - `error`: error types and pipeline statuses

/// Access units, decoder configuration and buffered ranges
pub mod av;

/// Configuration module
pub mod config;

/// Remote player contract
pub mod consumer;

/// Demuxer read coordination
pub mod coordinator;

/// Demuxer contract
pub mod demuxer;

/// Error types and utilities
pub mod error;

pub use coordinator::{spawn_coordinator, CoordinatorHandle, CoordinatorOptions};
pub use error::{BridgeError, PipelineStatus, Result};
