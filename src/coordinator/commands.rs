//! Messages consumed by the coordinator actor.

use super::Statistics;
use crate::av::{DecoderBuffer, DemuxerStatus, StreamType};
use crate::error::PipelineStatus;
use std::fmt;
use std::ops::Range;
use std::time::Duration;
use tokio::sync::oneshot;

/// Identifies a seek epoch.
///
/// Every seek yields a new generation. A read request carrying the generation
/// of the seek in flight tells the coordinator that seek has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeekGeneration(
    /// Number of seeks issued so far; `0` before the first seek
    pub u64,
);

impl fmt::Display for SeekGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requests sent from a [`CoordinatorHandle`](super::CoordinatorHandle).
#[derive(Debug)]
pub(crate) enum CoordinatorCommand {
    RequestBatch {
        stream_type: StreamType,
        seek_generation: SeekGeneration,
    },
    Seek {
        time: Duration,
        responder: oneshot::Sender<SeekGeneration>,
    },
    CancelPendingSeek,
    NotifyReady {
        key_system: String,
    },
    MediaConfigRequest,
    GetBuffered {
        responder: oneshot::Sender<Vec<Range<Duration>>>,
    },
    GetStatistics {
        responder: oneshot::Sender<Statistics>,
    },
    GetDurationMs {
        responder: oneshot::Sender<Option<i32>>,
    },
    Destroy,
}

/// Completions of demuxer operations, posted back from pipeline tasks.
#[derive(Debug)]
pub(crate) enum PipelineEvent {
    InitDone(PipelineStatus),
    BufferReady {
        stream_type: StreamType,
        token: u64,
        index: usize,
        status: DemuxerStatus,
        buffer: Option<DecoderBuffer>,
    },
    SeekDone(PipelineStatus),
    StopDone,
}
