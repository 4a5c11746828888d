//! Handle for communicating with the coordinator actor.

use std::ops::Range;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use super::commands::{CoordinatorCommand, SeekGeneration};
use super::Statistics;
use crate::av::StreamType;
use crate::error::{BridgeError, Result};

/// Cloneable front end of a running coordinator.
///
/// Every method fails with [`BridgeError::Shutdown`] once the coordinator has
/// finished tearing down.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    pub(crate) fn new(sender: mpsc::Sender<CoordinatorCommand>) -> Self {
        Self { sender }
    }

    async fn send(&self, command: CoordinatorCommand) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| BridgeError::Shutdown)
    }

    async fn query<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> CoordinatorCommand,
    ) -> Result<T> {
        let (responder, rx) = oneshot::channel();
        self.send(command(responder)).await?;
        rx.await.map_err(|_| BridgeError::Shutdown)
    }

    /// Asks for the next batch of `stream_type`.
    ///
    /// The batch arrives through the consumer. While a seek is in flight a
    /// request is only served if it carries that seek's generation; other
    /// requests are dropped without any answer.
    pub async fn request_batch(
        &self,
        stream_type: StreamType,
        seek_generation: SeekGeneration,
    ) -> Result<()> {
        self.send(CoordinatorCommand::RequestBatch {
            stream_type,
            seek_generation,
        })
        .await
    }

    /// Seeks the demuxer. Failures surface through the consumer's network
    /// state channel.
    pub async fn seek(&self, time: Duration) -> Result<SeekGeneration> {
        self.query(|responder| CoordinatorCommand::Seek { time, responder })
            .await
    }

    /// Abandons a seek that has not been issued to the demuxer yet.
    pub async fn cancel_pending_seek(&self) -> Result<()> {
        self.send(CoordinatorCommand::CancelPendingSeek).await
    }

    /// Sends the readiness descriptor if the content is clear or `key_system`
    /// is non-empty.
    pub async fn notify_ready(&self, key_system: &str) -> Result<()> {
        self.send(CoordinatorCommand::NotifyReady {
            key_system: key_system.to_string(),
        })
        .await
    }

    /// The player asking for the current configuration again, e.g. after a
    /// config change.
    pub async fn media_config_request(&self) -> Result<()> {
        self.send(CoordinatorCommand::MediaConfigRequest).await
    }

    /// Buffered ranges reported by the demuxer, merged.
    pub async fn buffered(&self) -> Result<Vec<Range<Duration>>> {
        self.query(|responder| CoordinatorCommand::GetBuffered { responder })
            .await
    }

    /// Totals over every acknowledged batch.
    pub async fn statistics(&self) -> Result<Statistics> {
        self.query(|responder| CoordinatorCommand::GetStatistics { responder })
            .await
    }

    /// Video data units acknowledged.
    pub async fn decoded_frame_count(&self) -> Result<u64> {
        Ok(self.statistics().await?.decoded_frame_count())
    }

    /// Always zero; frames are never dropped here.
    pub async fn dropped_frame_count(&self) -> Result<u64> {
        Ok(self.statistics().await?.dropped_frame_count())
    }

    /// Audio payload bytes acknowledged.
    pub async fn audio_decoded_byte_count(&self) -> Result<u64> {
        Ok(self.statistics().await?.audio_bytes_decoded)
    }

    /// Video payload bytes acknowledged.
    pub async fn video_decoded_byte_count(&self) -> Result<u64> {
        Ok(self.statistics().await?.video_bytes_decoded)
    }

    /// Duration in milliseconds; `None` when the source is not chunked.
    pub async fn duration_ms(&self) -> Result<Option<i32>> {
        self.query(|responder| CoordinatorCommand::GetDurationMs { responder })
            .await
    }

    /// Starts teardown. Must be called at most once per coordinator; a second
    /// call while the demuxer is still stopping aborts the process.
    pub async fn destroy(&self) -> Result<()> {
        self.send(CoordinatorCommand::Destroy).await
    }

    /// Whether the coordinator has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
