//! # Consumer side
//!
//! The remote player the bridge feeds is represented by a [`Consumer`]. The
//! coordinator calls it from its own task, so implementations must not block;
//! typically they serialize the call onto an IPC channel. [`ChannelConsumer`]
//! is a ready-made implementation that forwards every call as a
//! [`ConsumerEvent`] over a tokio channel.

use crate::coordinator::{DemuxerReadyParams, ReadAck};
use crate::demuxer::NeedKey;
use crate::error::PipelineStatus;
use tokio::sync::mpsc;

/// Network state reported to the player when the pipeline fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    /// The source could not be fetched
    NetworkError,
    /// The media could not be opened or parsed
    FormatError,
    /// The media could not be decoded or decrypted
    DecodeError,
}

impl NetworkState {
    /// Maps a failed pipeline status. `Ok` has no network state.
    pub fn from_pipeline_error(status: PipelineStatus) -> Option<Self> {
        match status {
            PipelineStatus::Ok => None,
            PipelineStatus::ErrorNetwork | PipelineStatus::ErrorRead => {
                Some(NetworkState::NetworkError)
            }
            PipelineStatus::ErrorInitializationFailed
            | PipelineStatus::ErrorCouldNotRender
            | PipelineStatus::ErrorUrlNotFound
            | PipelineStatus::DemuxerErrorCouldNotOpen
            | PipelineStatus::DemuxerErrorCouldNotParse
            | PipelineStatus::DemuxerErrorNoSupportedStreams
            | PipelineStatus::DecoderErrorNotSupported => Some(NetworkState::FormatError),
            PipelineStatus::ErrorDecode
            | PipelineStatus::ErrorDecrypt
            | PipelineStatus::ErrorAbort
            | PipelineStatus::ErrorOperationPending
            | PipelineStatus::ErrorInvalidState => Some(NetworkState::DecodeError),
        }
    }
}

/// Receiver of acknowledgements, readiness and error state.
pub trait Consumer: Send {
    /// A requested batch is complete.
    fn on_batch_ready(&self, player_id: i32, ack: ReadAck);

    /// The stream configuration is known, or has changed.
    fn on_ready(&self, player_id: i32, params: DemuxerReadyParams);

    /// The pipeline failed.
    fn on_network_state_change(&self, state: NetworkState);
}

/// Callback receiving key requests from the demuxer.
pub type NeedKeyCallback = Box<dyn Fn(NeedKey) + Send + Sync>;

/// A [`Consumer`] call, as forwarded by [`ChannelConsumer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerEvent {
    /// [`Consumer::on_batch_ready`]
    BatchReady {
        /// Player the batch belongs to
        player_id: i32,
        /// The completed batch
        ack: ReadAck,
    },
    /// [`Consumer::on_ready`]
    Ready {
        /// Player the descriptor belongs to
        player_id: i32,
        /// Current stream configuration
        params: DemuxerReadyParams,
    },
    /// [`Consumer::on_network_state_change`]
    NetworkStateChange(NetworkState),
}

/// Forwards consumer calls over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelConsumer {
    sender: mpsc::UnboundedSender<ConsumerEvent>,
}

impl ChannelConsumer {
    /// Creates the consumer and the receiving end of its events.
    pub fn unbounded() -> (Self, mpsc::UnboundedReceiver<ConsumerEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn send(&self, event: ConsumerEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("Consumer event dropped: receiver is gone");
        }
    }
}

impl Consumer for ChannelConsumer {
    fn on_batch_ready(&self, player_id: i32, ack: ReadAck) {
        self.send(ConsumerEvent::BatchReady { player_id, ack });
    }

    fn on_ready(&self, player_id: i32, params: DemuxerReadyParams) {
        self.send(ConsumerEvent::Ready { player_id, params });
    }

    fn on_network_state_change(&self, state: NetworkState) {
        self.send(ConsumerEvent::NetworkStateChange(state));
    }
}
