use super::{ChunkControl, Demuxer, DemuxerHost, DemuxerStream};
use crate::av::{
    AudioDecoderConfig, DecoderBuffer, DemuxerStatus, StreamType, VideoDecoderConfig,
};
use crate::error::PipelineStatus;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

type ScriptedRead = (DemuxerStatus, Option<DecoderBuffer>);

/// Calls observed by a [`MockDemuxer`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum DemuxerCall {
    /// `Demuxer::initialize`
    Initialize,
    /// `ChunkControl::start_waiting_for_seek`
    StartWaitingForSeek,
    /// `Demuxer::seek`
    Seek(Duration),
    /// `ChunkControl::cancel_pending_seek`
    CancelPendingSeek,
    /// `Demuxer::stop`
    Stop,
}

/// A stream whose reads resolve with whatever the test pushes.
///
/// A read started before anything is pushed stays pending until the next
/// push. Starting a seek resolves every pending read with
/// [`DemuxerStatus::Aborted`]. Once the stream is closed, pending and future
/// reads never resolve.
pub struct MockStream {
    stream_type: StreamType,
    aborts: Arc<watch::Sender<u64>>,
    audio_config: Mutex<AudioDecoderConfig>,
    video_config: Mutex<VideoDecoderConfig>,
    feeder: Mutex<Option<mpsc::UnboundedSender<ScriptedRead>>>,
    reads: tokio::sync::Mutex<mpsc::UnboundedReceiver<ScriptedRead>>,
    reads_started: AtomicUsize,
}

impl MockStream {
    fn new(stream_type: StreamType, aborts: Arc<watch::Sender<u64>>) -> Self {
        let (feeder, reads) = mpsc::unbounded_channel();
        Self {
            stream_type,
            aborts,
            audio_config: Mutex::new(AudioDecoderConfig::default()),
            video_config: Mutex::new(VideoDecoderConfig::default()),
            feeder: Mutex::new(Some(feeder)),
            reads: tokio::sync::Mutex::new(reads),
            reads_started: AtomicUsize::new(0),
        }
    }

    /// Queues the result of one read.
    pub fn push(&self, status: DemuxerStatus, buffer: Option<DecoderBuffer>) {
        if let Some(feeder) = self.feeder.lock().as_ref() {
            let _ = feeder.send((status, buffer));
        }
    }

    /// Queues a data unit.
    pub fn push_buffer(&self, buffer: DecoderBuffer) {
        self.push(DemuxerStatus::Ok, Some(buffer));
    }

    /// Queues the end of the stream.
    pub fn push_end_of_stream(&self) {
        self.push(DemuxerStatus::Ok, Some(DecoderBuffer::end_of_stream()));
    }

    /// Queues an `Aborted` result.
    pub fn push_aborted(&self) {
        self.push(DemuxerStatus::Aborted, None);
    }

    /// Queues a configuration change.
    pub fn push_config_changed(&self) {
        self.push(DemuxerStatus::ConfigChanged, None);
    }

    /// Stops feeding the stream, stalling every outstanding read.
    pub fn close(&self) {
        self.feeder.lock().take();
    }

    /// Number of reads issued against this stream so far
    pub fn reads_started(&self) -> usize {
        self.reads_started.load(Ordering::SeqCst)
    }

    /// Changes what `audio_decoder_config` reports.
    pub fn set_audio_config(&self, config: AudioDecoderConfig) {
        *self.audio_config.lock() = config;
    }

    /// Changes what `video_decoder_config` reports.
    pub fn set_video_config(&self, config: VideoDecoderConfig) {
        *self.video_config.lock() = config;
    }
}

#[async_trait]
impl DemuxerStream for MockStream {
    fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    async fn read(&self) -> (DemuxerStatus, Option<DecoderBuffer>) {
        let mut aborted = self.aborts.subscribe();
        self.reads_started.fetch_add(1, Ordering::SeqCst);
        let next = async {
            let mut reads = self.reads.lock().await;
            reads.recv().await
        };
        // An abort wins over data that was pushed after the seek started.
        tokio::select! {
            biased;
            _ = aborted.changed() => (DemuxerStatus::Aborted, None),
            next = next => match next {
                Some(read) => read,
                None => futures::future::pending().await,
            },
        }
    }

    fn audio_decoder_config(&self) -> AudioDecoderConfig {
        self.audio_config.lock().clone()
    }

    fn video_decoder_config(&self) -> VideoDecoderConfig {
        self.video_config.lock().clone()
    }
}

fn abort_pending_reads(aborts: &watch::Sender<u64>) {
    aborts.send_modify(|epoch| *epoch += 1);
}

struct MockChunkControl {
    duration_secs: Mutex<f64>,
    calls: Arc<Mutex<Vec<DemuxerCall>>>,
    aborts: Arc<watch::Sender<u64>>,
}

impl ChunkControl for MockChunkControl {
    fn start_waiting_for_seek(&self) {
        self.calls.lock().push(DemuxerCall::StartWaitingForSeek);
        abort_pending_reads(&self.aborts);
    }

    fn cancel_pending_seek(&self) {
        self.calls.lock().push(DemuxerCall::CancelPendingSeek);
    }

    fn duration_secs(&self) -> f64 {
        *self.duration_secs.lock()
    }
}

/// Demuxer double used by tests and demos.
///
/// ```rust
/// use msebridge::av::{AudioCodec, AudioDecoderConfig, ChannelLayout};
/// use msebridge::demuxer::mock::MockDemuxer;
///
/// let demuxer = MockDemuxer::new()
///     .with_audio(AudioDecoderConfig::new(AudioCodec::AAC, ChannelLayout::Stereo, 44100))
///     .chunked(30.0);
/// assert!(demuxer.audio().is_some());
/// assert!(demuxer.video().is_none());
/// ```
pub struct MockDemuxer {
    audio: Option<Arc<MockStream>>,
    video: Option<Arc<MockStream>>,
    chunk: Option<MockChunkControl>,
    init_status: PipelineStatus,
    seek_status: Mutex<PipelineStatus>,
    calls: Arc<Mutex<Vec<DemuxerCall>>>,
    host: Mutex<Option<DemuxerHost>>,
    aborts: Arc<watch::Sender<u64>>,
}

impl Default for MockDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDemuxer {
    /// A demuxer with no streams that initializes successfully.
    pub fn new() -> Self {
        Self {
            audio: None,
            video: None,
            chunk: None,
            init_status: PipelineStatus::Ok,
            seek_status: Mutex::new(PipelineStatus::Ok),
            calls: Arc::new(Mutex::new(Vec::new())),
            host: Mutex::new(None),
            aborts: Arc::new(watch::channel(0).0),
        }
    }

    /// Adds an audio stream.
    pub fn with_audio(mut self, config: AudioDecoderConfig) -> Self {
        let stream = MockStream::new(StreamType::Audio, Arc::clone(&self.aborts));
        stream.set_audio_config(config);
        self.audio = Some(Arc::new(stream));
        self
    }

    /// Adds a video stream.
    pub fn with_video(mut self, config: VideoDecoderConfig) -> Self {
        let stream = MockStream::new(StreamType::Video, Arc::clone(&self.aborts));
        stream.set_video_config(config);
        self.video = Some(Arc::new(stream));
        self
    }

    /// Makes this a chunked source reporting `duration_secs`.
    pub fn chunked(mut self, duration_secs: f64) -> Self {
        self.chunk = Some(MockChunkControl {
            duration_secs: Mutex::new(duration_secs),
            calls: Arc::clone(&self.calls),
            aborts: Arc::clone(&self.aborts),
        });
        self
    }

    /// Status `initialize` resolves with.
    pub fn with_init_status(mut self, status: PipelineStatus) -> Self {
        self.init_status = status;
        self
    }

    /// Status later seeks resolve with.
    pub fn set_seek_status(&self, status: PipelineStatus) {
        *self.seek_status.lock() = status;
    }

    /// Changes the duration of a chunked source.
    pub fn set_duration_secs(&self, duration_secs: f64) {
        if let Some(chunk) = &self.chunk {
            *chunk.duration_secs.lock() = duration_secs;
        }
    }

    /// The audio stream, if any.
    pub fn audio(&self) -> Option<&Arc<MockStream>> {
        self.audio.as_ref()
    }

    /// The video stream, if any.
    pub fn video(&self) -> Option<&Arc<MockStream>> {
        self.video.as_ref()
    }

    /// The host received in `initialize`, if initialization has run.
    pub fn host(&self) -> Option<DemuxerHost> {
        self.host.lock().clone()
    }

    /// Calls seen so far.
    pub fn calls(&self) -> Vec<DemuxerCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Demuxer for MockDemuxer {
    async fn initialize(&self, host: DemuxerHost) -> PipelineStatus {
        self.calls.lock().push(DemuxerCall::Initialize);
        *self.host.lock() = Some(host);
        self.init_status
    }

    fn stream(&self, stream_type: StreamType) -> Option<Arc<dyn DemuxerStream>> {
        let stream = match stream_type {
            StreamType::Audio => self.audio.as_ref(),
            StreamType::Video => self.video.as_ref(),
        }?;
        Some(Arc::clone(stream) as Arc<dyn DemuxerStream>)
    }

    /// Chunked sources already aborted their reads in `start_waiting_for_seek`.
    async fn seek(&self, time: Duration) -> PipelineStatus {
        self.calls.lock().push(DemuxerCall::Seek(time));
        if self.chunk.is_none() {
            abort_pending_reads(&self.aborts);
        }
        *self.seek_status.lock()
    }

    async fn stop(&self) {
        self.calls.lock().push(DemuxerCall::Stop);
        for stream in [&self.audio, &self.video].into_iter().flatten() {
            stream.close();
        }
    }

    fn chunk_control(&self) -> Option<&dyn ChunkControl> {
        self.chunk.as_ref().map(|chunk| chunk as &dyn ChunkControl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{AudioCodec, ChannelLayout};

    #[tokio::test]
    async fn test_reads_resolve_in_push_order() {
        let demuxer = MockDemuxer::new()
            .with_audio(AudioDecoderConfig::new(AudioCodec::Opus, ChannelLayout::Stereo, 48000));
        let audio = demuxer.audio().unwrap().clone();

        audio.push_buffer(DecoderBuffer::new(vec![1u8]));
        audio.push_aborted();

        let stream = demuxer.stream(StreamType::Audio).unwrap();
        let (status, buffer) = stream.read().await;
        assert_eq!(status, DemuxerStatus::Ok);
        assert_eq!(&buffer.unwrap().data[..], &[1]);

        let (status, buffer) = stream.read().await;
        assert_eq!(status, DemuxerStatus::Aborted);
        assert!(buffer.is_none());
        assert_eq!(audio.reads_started(), 2);
        assert!(demuxer.stream(StreamType::Video).is_none());
    }

    #[tokio::test]
    async fn test_closed_stream_stalls() {
        let demuxer = MockDemuxer::new().with_video(VideoDecoderConfig::default());
        let stream = demuxer.stream(StreamType::Video).unwrap();
        demuxer.stop().await;

        let stalled = tokio::time::timeout(Duration::from_millis(20), stream.read()).await;
        assert!(stalled.is_err());
        assert_eq!(demuxer.calls(), vec![DemuxerCall::Stop]);
    }

    #[tokio::test]
    async fn test_seek_aborts_pending_reads() {
        let demuxer = MockDemuxer::new()
            .with_audio(AudioDecoderConfig::default())
            .with_video(VideoDecoderConfig::default())
            .chunked(5.0);
        let audio = demuxer.stream(StreamType::Audio).unwrap();
        let video = demuxer.stream(StreamType::Video).unwrap();

        let pending = tokio::spawn(async move { audio.read().await });
        while demuxer.audio().unwrap().reads_started() == 0 {
            tokio::task::yield_now().await;
        }
        demuxer.chunk_control().unwrap().start_waiting_for_seek();

        let (status, buffer) = pending.await.unwrap();
        assert_eq!(status, DemuxerStatus::Aborted);
        assert!(buffer.is_none());

        // Data pushed after the seek goes to the next read.
        demuxer.video().unwrap().push_buffer(DecoderBuffer::new(vec![9u8]));
        let (status, buffer) = video.read().await;
        assert_eq!(status, DemuxerStatus::Ok);
        assert_eq!(&buffer.unwrap().data[..], &[9]);
    }

    #[tokio::test]
    async fn test_live_seek_aborts_pending_reads() {
        let demuxer = Arc::new(MockDemuxer::new().with_video(VideoDecoderConfig::default()));
        let video = demuxer.stream(StreamType::Video).unwrap();

        let pending = tokio::spawn(async move { video.read().await });
        while demuxer.video().unwrap().reads_started() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(demuxer.seek(Duration::from_secs(1)).await, PipelineStatus::Ok);
        assert_eq!(pending.await.unwrap().0, DemuxerStatus::Aborted);
    }

    #[test]
    fn test_chunk_control_records_calls() {
        let demuxer = MockDemuxer::new().chunked(12.5);
        let chunk = demuxer.chunk_control().unwrap();
        chunk.start_waiting_for_seek();
        chunk.cancel_pending_seek();
        assert_eq!(chunk.duration_secs(), 12.5);
        assert_eq!(
            demuxer.calls(),
            vec![DemuxerCall::StartWaitingForSeek, DemuxerCall::CancelPendingSeek]
        );
        assert!(MockDemuxer::new().chunk_control().is_none());
    }
}
