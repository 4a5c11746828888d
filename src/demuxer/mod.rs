//! # Demuxer contract
//!
//! The coordinator never owns a demuxer implementation; it drives one through
//! the traits in this module. A [`Demuxer`] exposes an audio and a video
//! [`DemuxerStream`], each of which hands out one [`DecoderBuffer`] per read.
//! Chunked sources (fed by externally appended data) additionally expose a
//! [`ChunkControl`] for seek bookkeeping and duration.
//!
//! Demuxers report asynchronous facts (buffered ranges, errors, key needs)
//! through the [`DemuxerHost`] passed to [`Demuxer::initialize`]. Every call on
//! the host is queued onto the coordinator's task; nothing is applied from the
//! demuxer's own context.

use crate::av::{
    AudioDecoderConfig, DecoderBuffer, DemuxerStatus, StreamType, VideoDecoderConfig,
};
use crate::error::PipelineStatus;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// In-memory demuxer with scripted reads
pub mod mock;

/// A single elementary stream of a demuxer.
#[async_trait]
pub trait DemuxerStream: Send + Sync {
    /// Which stream this is.
    fn stream_type(&self) -> StreamType;

    /// Resolves exactly once per call. `Ok` reads carry a buffer (possibly the
    /// end-of-stream marker); `Aborted` and `ConfigChanged` carry none.
    async fn read(&self) -> (DemuxerStatus, Option<DecoderBuffer>);

    /// Current audio configuration; meaningful for audio streams only.
    fn audio_decoder_config(&self) -> AudioDecoderConfig;

    /// Current video configuration; meaningful for video streams only.
    fn video_decoder_config(&self) -> VideoDecoderConfig;
}

/// Seek and duration control available only on chunked sources.
pub trait ChunkControl: Send + Sync {
    /// A seek is about to start; pending reads resolve as `Aborted`.
    fn start_waiting_for_seek(&self);
    /// Abandons a seek that has not been issued yet.
    fn cancel_pending_seek(&self);
    /// Total duration in seconds; infinite when unknown
    fn duration_secs(&self) -> f64;
}

#[async_trait]
/// A source of audio and video elementary streams.
pub trait Demuxer: Send + Sync {
    /// Opens the source. `host` receives every later asynchronous report.
    async fn initialize(&self, host: DemuxerHost) -> PipelineStatus;

    /// The stream of `stream_type`, if the source has one.
    fn stream(&self, stream_type: StreamType) -> Option<Arc<dyn DemuxerStream>>;

    /// Moves every stream to `time`.
    async fn seek(&self, time: Duration) -> PipelineStatus;

    /// Releases demuxer resources. Resolves once stopped.
    async fn stop(&self);

    /// Present on chunked sources only.
    fn chunk_control(&self) -> Option<&dyn ChunkControl> {
        None
    }
}

/// Where the demuxer comes from, which decides batching behavior.
#[derive(Clone)]
pub enum DemuxerSource {
    /// A chunked MediaSource demuxer, batched per configuration
    MediaSource(Arc<dyn Demuxer>),
    /// A live media stream, forwarded one unit at a time without padding
    MediaStream(Arc<dyn Demuxer>),
}

impl DemuxerSource {
    /// The wrapped demuxer.
    pub fn demuxer(&self) -> &Arc<dyn Demuxer> {
        match self {
            DemuxerSource::MediaSource(demuxer) | DemuxerSource::MediaStream(demuxer) => demuxer,
        }
    }

    /// Whether this is a live stream.
    pub fn is_live(&self) -> bool {
        matches!(self, DemuxerSource::MediaStream(_))
    }
}

/// Key request raised by the demuxer when it meets encrypted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeedKey {
    /// Key system, empty when the demuxer does not know it
    pub key_system: String,
    /// Session id, empty when the demuxer does not know it
    pub session_id: String,
    /// Format of `init_data`, e.g. `cenc` or `webm`
    pub init_data_type: String,
    /// Initialization data for the license request
    pub init_data: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostEvent {
    BufferedTimeRange { start: Duration, end: Duration },
    Duration(Duration),
    Error(PipelineStatus),
    NeedKey(NeedKey),
}

/// Callback surface handed to a demuxer. Cloneable and usable from any task.
#[derive(Clone, Debug)]
pub struct DemuxerHost {
    sender: mpsc::UnboundedSender<HostEvent>,
}

impl DemuxerHost {
    pub(crate) fn new(sender: mpsc::UnboundedSender<HostEvent>) -> Self {
        Self { sender }
    }

    /// Reports `[start, end)` as buffered.
    pub fn add_buffered_time_range(&self, start: Duration, end: Duration) {
        self.post(HostEvent::BufferedTimeRange { start, end });
    }

    /// Reports the duration. The coordinator reads duration from
    /// [`ChunkControl::duration_secs`] instead, so this is only logged.
    pub fn set_duration(&self, duration: Duration) {
        self.post(HostEvent::Duration(duration));
    }

    /// Reports a runtime failure.
    pub fn on_demuxer_error(&self, status: PipelineStatus) {
        self.post(HostEvent::Error(status));
    }

    /// Chunked demuxers do not know the key system or session, so those are
    /// left empty.
    pub fn need_key(&self, init_data_type: &str, init_data: impl Into<Bytes>) {
        self.post(HostEvent::NeedKey(NeedKey {
            key_system: String::new(),
            session_id: String::new(),
            init_data_type: init_data_type.to_string(),
            init_data: init_data.into(),
        }));
    }

    /// Forwards a key request verbatim, for demuxers that know the key
    /// system and session.
    pub fn forward_need_key(&self, need_key: NeedKey) {
        self.post(HostEvent::NeedKey(need_key));
    }

    fn post(&self, event: HostEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Demuxer host event dropped: coordinator is gone");
        }
    }
}
