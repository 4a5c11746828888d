//! State owned by the coordinator task.
//!
//! Every method here runs on the coordinator's task. Demuxer operations are
//! spawned as separate tasks whose completions come back as
//! [`PipelineEvent`]s; each completion carries the batch token it was issued
//! for and is checked against current state before anything is applied.

use super::batch::{BatchSlots, BatchStep, ReadBatch};
use super::commands::{PipelineEvent, SeekGeneration};
use super::padding::{AudioPaddingPolicy, NoPadding, VorbisPadding};
use super::ready::DemuxerReadyParams;
use super::Statistics;
use crate::av::{AccessUnit, BufferedRanges, DecoderBuffer, DemuxerStatus, StreamType};
use crate::config::{BridgeConfig, LIVE_ACCESS_UNIT_SIZE};
use crate::consumer::{Consumer, NeedKeyCallback, NetworkState};
use crate::demuxer::{Demuxer, DemuxerHost, DemuxerSource, DemuxerStream, HostEvent};
use crate::error::{BridgeError, PipelineStatus, Result};
use log::{debug, error, warn};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Outcome of a teardown request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Teardown {
    /// Nothing left to release; the coordinator can go away now
    Finished,
    /// The demuxer is stopping; wait for its completion
    Pending,
}

#[derive(Debug, Clone, Copy, Default)]
struct SeekState {
    seeking: bool,
    generation: u64,
}

/// Converts a duration in seconds to whole milliseconds, clamped to `i32`.
pub(crate) fn clamp_duration_ms(duration_secs: f64) -> i32 {
    let duration_ms = duration_secs * 1000.0;
    if duration_ms > i32::MAX as f64 {
        warn!("Duration from demuxer is too large; probably something has gone wrong");
        return i32::MAX;
    }
    duration_ms as i32
}

pub(crate) struct StreamReadCoordinator {
    player_id: i32,
    demuxer: Option<Arc<dyn Demuxer>>,
    /// Demuxer being stopped during teardown
    stopping: Option<Arc<dyn Demuxer>>,
    consumer: Option<Box<dyn Consumer>>,
    need_key: Option<NeedKeyCallback>,
    padding: Box<dyn AudioPaddingPolicy>,
    access_unit_size: usize,
    batches: BatchSlots,
    next_token: u64,
    seek: SeekState,
    statistics: Statistics,
    buffered: BufferedRanges,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl StreamReadCoordinator {
    pub(crate) fn new(
        player_id: i32,
        source: DemuxerSource,
        consumer: Box<dyn Consumer>,
        config: &BridgeConfig,
        events: mpsc::UnboundedSender<PipelineEvent>,
    ) -> Self {
        // Live streams don't wait to accumulate several units per ack.
        let (access_unit_size, padding): (usize, Box<dyn AudioPaddingPolicy>) = if source.is_live()
        {
            (LIVE_ACCESS_UNIT_SIZE, Box::new(NoPadding))
        } else if config.audio_padding {
            (config.access_unit_size.max(1), Box::new(VorbisPadding))
        } else {
            (config.access_unit_size.max(1), Box::new(NoPadding))
        };

        Self {
            player_id,
            demuxer: Some(Arc::clone(source.demuxer())),
            stopping: None,
            consumer: Some(consumer),
            need_key: None,
            padding,
            access_unit_size,
            batches: BatchSlots::default(),
            next_token: 0,
            seek: SeekState::default(),
            statistics: Statistics::default(),
            buffered: BufferedRanges::new(),
            events,
        }
    }

    pub(crate) fn set_need_key_callback(&mut self, callback: NeedKeyCallback) {
        self.need_key = Some(callback);
    }

    pub(crate) fn set_padding_policy(&mut self, policy: Box<dyn AudioPaddingPolicy>) {
        self.padding = policy;
    }

    pub(crate) fn access_unit_size(&self) -> usize {
        self.access_unit_size
    }

    #[cfg(test)]
    pub(crate) fn is_seeking(&self) -> bool {
        self.seek.seeking
    }

    #[cfg(test)]
    pub(crate) fn seek_generation(&self) -> SeekGeneration {
        SeekGeneration(self.seek.generation)
    }

    pub(crate) fn statistics(&self) -> Statistics {
        self.statistics
    }

    pub(crate) fn buffered(&self) -> Vec<Range<Duration>> {
        self.buffered.to_vec()
    }

    /// Starts demuxer initialization; readiness follows on success.
    pub(crate) fn initialize(&self, host: DemuxerHost) {
        debug!("initialize() : {}", self.player_id);
        let Some(demuxer) = self.demuxer.clone() else {
            return;
        };
        let events = self.events.clone();
        tokio::spawn(async move {
            let status = demuxer.initialize(host).await;
            let _ = events.send(PipelineEvent::InitDone(status));
        });
    }

    /// Applies a pipeline completion. Returns `false` once the coordinator is
    /// finished and must be dropped.
    pub(crate) fn on_event(&mut self, event: PipelineEvent) -> bool {
        match event {
            PipelineEvent::InitDone(status) => self.on_init_done(status),
            PipelineEvent::BufferReady {
                stream_type,
                token,
                index,
                status,
                buffer,
            } => self.on_buffer_ready(stream_type, token, index, status, buffer),
            PipelineEvent::SeekDone(status) => self.on_demuxer_error(status),
            PipelineEvent::StopDone => {
                self.on_stop_done();
                return false;
            }
        }
        true
    }

    pub(crate) fn on_host_event(&mut self, event: HostEvent) {
        match event {
            HostEvent::BufferedTimeRange { start, end } => self.buffered.add(start, end),
            HostEvent::Duration(duration) => {
                // Duration is always read back from the chunked source.
                debug!("set_duration({:?}) : {}", duration, self.player_id);
            }
            HostEvent::Error(status) => self.on_demuxer_error(status),
            HostEvent::NeedKey(need_key) => {
                if let Some(callback) = &self.need_key {
                    callback(need_key);
                }
            }
        }
    }

    /// Starts accumulating a batch for `stream_type`.
    ///
    /// While a seek is in flight only a request carrying that seek's
    /// generation is served, and it ends the seek. Other requests get no
    /// answer at all.
    ///
    /// A stream never has more than one read outstanding. If the read of a
    /// batch from before the seek has not come back yet, the new batch starts
    /// once it does.
    pub(crate) fn request_batch(
        &mut self,
        stream_type: StreamType,
        seek_generation: SeekGeneration,
    ) {
        debug!(
            "request_batch({}, {}) : {}",
            stream_type, seek_generation, self.player_id
        );
        if self.seek.seeking && seek_generation.0 != self.seek.generation {
            debug!("Dropping {} read request during seek : {}", stream_type, self.player_id);
            return;
        }
        self.seek.seeking = false;

        let generation = self.seek.generation;
        if let Some(pending) = self.batches.get_mut(stream_type) {
            if pending.seek_generation() == generation || pending.restart() == Some(generation) {
                error!(
                    "{} read requested while {} units are still accumulating : {}",
                    stream_type,
                    pending.len(),
                    self.player_id
                );
                return;
            }
            debug!(
                "Deferring {} read until the read from before seek returns : {}",
                stream_type, self.player_id
            );
            pending.defer_restart(generation);
            return;
        }

        self.start_batch(stream_type);
    }

    fn start_batch(&mut self, stream_type: StreamType) {
        let Some(demuxer) = &self.demuxer else {
            warn!("{} read requested without a demuxer : {}", stream_type, self.player_id);
            return;
        };
        let Some(stream) = demuxer.stream(stream_type) else {
            error!("Demuxer has no {} stream : {}", stream_type, self.player_id);
            return;
        };

        let batch = ReadBatch::new(
            stream,
            self.access_unit_size,
            self.next_token,
            self.seek.generation,
        );
        self.next_token += 1;
        self.read_from_stream(&batch, 0);
        self.batches.put(batch);
    }

    fn read_from_stream(&self, batch: &ReadBatch, index: usize) {
        let stream = Arc::clone(batch.stream());
        let stream_type = batch.stream_type();
        let token = batch.token();
        let events = self.events.clone();
        tokio::spawn(async move {
            let (status, buffer) = stream.read().await;
            let _ = events.send(PipelineEvent::BufferReady {
                stream_type,
                token,
                index,
                status,
                buffer,
            });
        });
    }

    pub(crate) fn on_buffer_ready(
        &mut self,
        stream_type: StreamType,
        token: u64,
        index: usize,
        status: DemuxerStatus,
        buffer: Option<DecoderBuffer>,
    ) {
        debug!(
            "on_buffer_ready({}, {}, {:?}) : {}",
            stream_type, index, status, self.player_id
        );
        let Some(batch) = self.batches.take_matching(stream_type, token) else {
            debug!("Dropping stale {} read {} : {}", stream_type, index, self.player_id);
            return;
        };

        let restart = batch.restart();
        match status {
            // Reads are only aborted by a seek, which is never acknowledged.
            DemuxerStatus::Aborted => {
                debug!("{} read {} aborted : {}", stream_type, index, self.player_id);
            }
            _ if batch.seek_generation() != self.seek.generation => {
                debug!(
                    "Dropping {} read {} superseded by seek {} : {}",
                    stream_type, index, self.seek.generation, self.player_id
                );
            }
            _ => {
                self.accept(batch, index, status, buffer);
                return;
            }
        }

        // A request deferred behind this read is void if another seek began.
        if restart.is_some_and(|generation| generation == self.seek.generation)
            && !self.seek.seeking
        {
            self.start_batch(stream_type);
        }
    }

    fn accept(
        &mut self,
        mut batch: ReadBatch,
        index: usize,
        status: DemuxerStatus,
        buffer: Option<DecoderBuffer>,
    ) {
        if let Err(e) = batch.check_index(index, status) {
            error!("The internal state inconsistency on_buffer_ready: {} : {}", e, self.player_id);
            return;
        }

        let unit = match (status, buffer) {
            (DemuxerStatus::ConfigChanged, _) => {
                // The new config must be read before any further unit is meaningful.
                log_config_change(batch.stream().as_ref());
                AccessUnit::with_status(DemuxerStatus::ConfigChanged)
            }
            (DemuxerStatus::Ok, Some(buffer)) if buffer.is_end_of_stream() => {
                AccessUnit::end_of_stream()
            }
            (DemuxerStatus::Ok, Some(buffer)) => self.accept_buffer(&mut batch, &buffer),
            (status, _) => {
                error!(
                    "{} read {} completed with {:?} and no buffer : {}",
                    batch.stream_type(),
                    index,
                    status,
                    self.player_id
                );
                return;
            }
        };

        match batch.push(unit) {
            BatchStep::Fetch(next) => {
                self.read_from_stream(&batch, next);
                self.batches.put(batch);
            }
            BatchStep::Complete => self.finish_batch(batch),
        }
    }

    fn accept_buffer(&self, batch: &mut ReadBatch, buffer: &DecoderBuffer) -> AccessUnit {
        batch.record_decoded(buffer.data_size());
        let data = match batch.stream_type() {
            StreamType::Audio => {
                let codec = batch.stream().audio_decoder_config().codec;
                self.padding.pad(codec, &buffer.data)
            }
            StreamType::Video => buffer.data.clone(),
        };
        AccessUnit::from_buffer(buffer, data)
    }

    fn finish_batch(&mut self, batch: ReadBatch) {
        let (ack, decoded) = batch.into_parts();
        self.statistics.merge(&decoded);
        debug!(
            "Acknowledging {} units for {} : {}",
            ack.access_units.len(),
            ack.stream_type,
            self.player_id
        );
        if let Some(consumer) = &self.consumer {
            consumer.on_batch_ready(self.player_id, ack);
        }
    }

    /// Starts a seek and returns its generation. Every batch started before
    /// it is stale from now on.
    pub(crate) fn seek(&mut self, time: Duration) -> SeekGeneration {
        debug!("seek({}) : {}", time.as_secs_f64(), self.player_id);
        self.seek.seeking = true;
        self.seek.generation += 1;
        let generation = SeekGeneration(self.seek.generation);

        let Some(demuxer) = self.demuxer.clone() else {
            warn!("Seek requested without a demuxer : {}", self.player_id);
            return generation;
        };
        if let Some(chunk) = demuxer.chunk_control() {
            chunk.start_waiting_for_seek();
        }
        let events = self.events.clone();
        tokio::spawn(async move {
            let status = demuxer.seek(time).await;
            let _ = events.send(PipelineEvent::SeekDone(status));
        });
        generation
    }

    /// Local seek bookkeeping is left alone; the demuxer decides which reads
    /// to release.
    pub(crate) fn cancel_pending_seek(&self) {
        if let Some(chunk) = self.demuxer.as_ref().and_then(|d| d.chunk_control()) {
            chunk.cancel_pending_seek();
        }
    }

    pub(crate) fn notify_ready(&self, key_system: &str) {
        let Some(demuxer) = &self.demuxer else {
            return;
        };
        let params =
            DemuxerReadyParams::from_demuxer(demuxer.as_ref(), self.duration_ms(), key_system);
        if !params.is_ready_to_send() {
            debug!("Encrypted content waits for a key system : {}", self.player_id);
            return;
        }
        if let Some(consumer) = &self.consumer {
            consumer.on_ready(self.player_id, params);
        }
    }

    pub(crate) fn on_media_config_request(&self) {
        self.notify_ready("");
    }

    /// Duration in milliseconds, or `None` when the source is not chunked.
    pub(crate) fn duration_ms(&self) -> Option<i32> {
        let demuxer = self.demuxer.as_ref().or(self.stopping.as_ref())?;
        let chunk = demuxer.chunk_control()?;
        Some(clamp_duration_ms(chunk.duration_secs()))
    }

    fn on_init_done(&mut self, status: PipelineStatus) {
        debug!("on_init_done({}) : {}", status, self.player_id);
        if let Err(e) = status.into_result() {
            warn!("Demuxer initialization failed: {}", e);
            self.on_demuxer_error(status);
            return;
        }
        self.notify_ready("");
    }

    fn on_demuxer_error(&self, status: PipelineStatus) {
        debug!("on_demuxer_error({}) : {}", status, self.player_id);
        let Some(state) = NetworkState::from_pipeline_error(status) else {
            return;
        };
        if let Some(consumer) = &self.consumer {
            consumer.on_network_state_change(state);
        }
    }

    /// Detaches the consumer and stops the demuxer.
    ///
    /// Calling this again while the stop is still pending is a lifecycle
    /// violation.
    pub(crate) fn destroy(&mut self) -> Result<Teardown> {
        debug!("destroy() : {}", self.player_id);
        let Some(demuxer) = self.demuxer.take() else {
            if self.stopping.is_some() {
                return Err(BridgeError::DoubleTeardown);
            }
            return Ok(Teardown::Finished);
        };

        self.consumer = None;
        self.need_key = None;
        self.batches.clear();
        self.stopping = Some(Arc::clone(&demuxer));

        let events = self.events.clone();
        tokio::spawn(async move {
            demuxer.stop().await;
            let _ = events.send(PipelineEvent::StopDone);
        });
        Ok(Teardown::Pending)
    }

    fn on_stop_done(&mut self) {
        debug!("on_stop_done() : {}", self.player_id);
        self.stopping = None;
    }
}

fn log_config_change(stream: &dyn DemuxerStream) {
    match stream.stream_type() {
        StreamType::Audio => {
            let config = stream.audio_decoder_config();
            debug!(
                "Audio config is changed: {:?} {}Hz",
                config.codec, config.samples_per_second
            );
        }
        StreamType::Video => {
            let size = stream.video_decoder_config().coded_size;
            debug!("Video config is changed: {}x{}", size.width, size.height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::av::{
        AudioCodec, AudioDecoderConfig, ChannelLayout, DecryptConfig, Size, VideoCodec,
        VideoDecoderConfig,
    };
    use crate::consumer::{ChannelConsumer, ConsumerEvent};
    use crate::coordinator::ReadAck;
    use crate::demuxer::mock::{DemuxerCall, MockDemuxer, MockStream};
    use crate::demuxer::NeedKey;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    struct Harness {
        coordinator: StreamReadCoordinator,
        demuxer: Arc<MockDemuxer>,
        events: mpsc::UnboundedReceiver<PipelineEvent>,
        consumer: mpsc::UnboundedReceiver<ConsumerEvent>,
    }

    impl Harness {
        fn with_source(demuxer: MockDemuxer, live: bool, config: BridgeConfig) -> Self {
            let demuxer = Arc::new(demuxer);
            let shared: Arc<dyn Demuxer> = demuxer.clone();
            let source = if live {
                DemuxerSource::MediaStream(shared)
            } else {
                DemuxerSource::MediaSource(shared)
            };
            let (consumer, consumer_rx) = ChannelConsumer::unbounded();
            let (tx, events) = mpsc::unbounded_channel();
            let coordinator =
                StreamReadCoordinator::new(1, source, Box::new(consumer), &config, tx);
            Self {
                coordinator,
                demuxer,
                events,
                consumer: consumer_rx,
            }
        }

        fn new(demuxer: MockDemuxer) -> Self {
            Self::with_source(demuxer, false, BridgeConfig::default())
        }

        async fn pump(&mut self) -> bool {
            let event = tokio::time::timeout(Duration::from_secs(1), self.events.recv())
                .await
                .expect("pipeline event")
                .expect("event channel open");
            self.coordinator.on_event(event)
        }

        async fn pump_n(&mut self, n: usize) {
            for _ in 0..n {
                self.pump().await;
            }
        }

        fn drain(&mut self) -> Vec<ConsumerEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.consumer.try_recv() {
                events.push(event);
            }
            events
        }

        fn acks(&mut self) -> Vec<ReadAck> {
            self.drain()
                .into_iter()
                .filter_map(|event| match event {
                    ConsumerEvent::BatchReady { ack, .. } => Some(ack),
                    _ => None,
                })
                .collect()
        }

        fn video(&self) -> Arc<MockStream> {
            self.demuxer.video().unwrap().clone()
        }

        fn audio(&self) -> Arc<MockStream> {
            self.demuxer.audio().unwrap().clone()
        }
    }

    /// Lets spawned reads run until `n` of them have reached the stream.
    async fn wait_for_reads(stream: &MockStream, n: usize) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while stream.reads_started() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("reads started");
    }

    fn av_demuxer() -> MockDemuxer {
        MockDemuxer::new()
            .with_audio(AudioDecoderConfig::new(AudioCodec::AAC, ChannelLayout::Stereo, 44100))
            .with_video(VideoDecoderConfig::new(VideoCodec::H264, Size::new(1280, 720)))
            .chunked(60.0)
    }

    fn frame(ms: u64, len: usize) -> DecoderBuffer {
        DecoderBuffer::new(vec![ms as u8; len]).with_timestamp(Duration::from_millis(ms))
    }

    #[tokio::test]
    async fn test_full_batch_single_ack() {
        let mut h = Harness::new(av_demuxer());
        let video = h.video();
        for i in 0..16 {
            video.push_buffer(frame(i, 10 + i as usize));
        }

        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        h.pump_n(16).await;

        let acks = h.acks();
        assert_eq!(acks.len(), 1);
        let units = &acks[0].access_units;
        assert_eq!(units.len(), 16);
        for (i, unit) in units.iter().enumerate() {
            assert_eq!(unit.timestamp, Duration::from_millis(i as u64));
            assert_eq!(unit.status, DemuxerStatus::Ok);
        }

        let stats = h.coordinator.statistics();
        assert_eq!(stats.video_bytes_decoded, (0..16).map(|i| 10 + i).sum::<u64>());
        assert_eq!(stats.video_frames_decoded, 16);
        assert_eq!(stats.audio_bytes_decoded, 0);
    }

    #[tokio::test]
    async fn test_config_change_truncates_batch() {
        let mut h = Harness::new(av_demuxer());
        let video = h.video();
        for i in 0..4 {
            video.push_buffer(frame(i, 8));
        }
        video.push_config_changed();

        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        h.pump_n(5).await;

        let acks = h.acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].access_units.len(), 5);
        assert_eq!(acks[0].access_units[4].status, DemuxerStatus::ConfigChanged);
        assert!(h.events.try_recv().is_err());
        assert_eq!(video.reads_started(), 5);
        assert_eq!(h.coordinator.statistics().video_frames_decoded, 4);
    }

    #[tokio::test]
    async fn test_end_of_stream_truncates_batch() {
        let mut h = Harness::new(av_demuxer());
        let audio = h.audio();
        audio.push_buffer(frame(0, 4));
        audio.push_end_of_stream();

        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        h.pump_n(2).await;

        let acks = h.acks();
        assert_eq!(acks.len(), 1);
        let units = &acks[0].access_units;
        assert_eq!(units.len(), 2);
        assert!(!units[0].end_of_stream);
        assert!(units[1].end_of_stream);
        assert_eq!(h.coordinator.statistics().audio_bytes_decoded, 4);
    }

    #[tokio::test]
    async fn test_abort_during_seek_is_not_acknowledged() {
        let mut h = Harness::new(av_demuxer());
        let video = h.video();
        video.push_buffer(frame(0, 8));
        video.push_buffer(frame(1, 8));

        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        h.pump_n(2).await;
        wait_for_reads(&video, 3).await;

        let generation = h.coordinator.seek(Duration::from_secs(5));
        assert_eq!(generation, SeekGeneration(1));
        // Seek completion and the aborted read, in either order.
        h.pump_n(2).await;

        assert!(h.drain().is_empty());
        assert!(h.coordinator.is_seeking());
        assert_eq!(h.coordinator.statistics(), Statistics::default());
        assert_eq!(
            h.demuxer.calls(),
            vec![
                DemuxerCall::StartWaitingForSeek,
                DemuxerCall::Seek(Duration::from_secs(5))
            ]
        );
    }

    #[tokio::test]
    async fn test_requests_during_seek() {
        let mut h = Harness::new(av_demuxer());
        let generation = h.coordinator.seek(Duration::from_secs(1));
        h.pump().await;

        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        assert!(h.coordinator.is_seeking());
        assert_eq!(h.audio().reads_started(), 0);

        h.coordinator.request_batch(StreamType::Audio, generation);
        assert!(!h.coordinator.is_seeking());
        assert_eq!(h.coordinator.seek_generation(), generation);

        h.audio().push_end_of_stream();
        h.pump().await;
        assert_eq!(h.acks().len(), 1);
    }

    #[tokio::test]
    async fn test_late_data_after_seek_is_dropped() {
        let mut h = Harness::new(av_demuxer());
        let video = h.video();
        video.push_buffer(frame(0, 100));
        video.push_buffer(frame(1, 100));

        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        h.pump().await;
        // The second read completes before the seek but is handled after it.
        wait_for_reads(&video, 2).await;

        let generation = h.coordinator.seek(Duration::from_secs(2));
        h.pump_n(2).await;
        assert!(h.acks().is_empty());

        // The first request after the seek starts over.
        h.coordinator.request_batch(StreamType::Video, generation);
        video.push_end_of_stream();
        h.pump().await;

        let acks = h.acks();
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].access_units.len(), 1);
        assert!(acks[0].access_units[0].end_of_stream);
        assert_eq!(h.coordinator.statistics().video_bytes_decoded, 0);
    }

    #[tokio::test]
    async fn test_request_after_seek_waits_for_stale_read() {
        let mut h = Harness::new(av_demuxer());
        let video = h.video();
        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        wait_for_reads(&video, 1).await;

        let generation = h.coordinator.seek(Duration::from_secs(5));
        h.coordinator.request_batch(StreamType::Video, generation);
        // The read from before the seek is still outstanding.
        assert_eq!(video.reads_started(), 1);

        video.push_buffer(frame(5000, 12));
        video.push_end_of_stream();
        // Aborted read, seek completion, then the two new units.
        h.pump_n(4).await;

        let acks = h.acks();
        assert_eq!(acks.len(), 1);
        let units = &acks[0].access_units;
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].timestamp, Duration::from_millis(5000));
        assert!(units[1].end_of_stream);
        assert_eq!(video.reads_started(), 3);
        assert_eq!(h.coordinator.statistics().video_bytes_decoded, 12);
    }

    #[tokio::test]
    async fn test_deferred_request_is_void_after_another_seek() {
        let mut h = Harness::new(av_demuxer());
        let video = h.video();
        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        wait_for_reads(&video, 1).await;

        let first = h.coordinator.seek(Duration::from_secs(1));
        h.coordinator.request_batch(StreamType::Video, first);
        let second = h.coordinator.seek(Duration::from_secs(2));
        // One aborted read and two seek completions.
        h.pump_n(3).await;
        assert_eq!(video.reads_started(), 1);
        assert!(h.coordinator.batches.get(StreamType::Video).is_none());

        h.coordinator.request_batch(StreamType::Video, second);
        video.push_end_of_stream();
        h.pump().await;
        assert_eq!(h.acks().len(), 1);
        assert_eq!(video.reads_started(), 2);
    }

    #[tokio::test]
    async fn test_overlapping_request_is_rejected() {
        let mut h = Harness::new(av_demuxer());
        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));
        tokio::task::yield_now().await;

        let video = h.video();
        video.push_end_of_stream();
        h.pump().await;
        assert_eq!(h.acks().len(), 1);
        assert_eq!(video.reads_started(), 1);
    }

    #[tokio::test]
    async fn test_inconsistent_index_drops_read() {
        let mut h = Harness::new(av_demuxer());
        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        let token = h.coordinator.batches.get(StreamType::Audio).unwrap().token();

        h.coordinator.on_buffer_ready(
            StreamType::Audio,
            token,
            16,
            DemuxerStatus::Ok,
            Some(frame(0, 10)),
        );

        assert!(h.coordinator.batches.get(StreamType::Audio).is_none());
        assert!(h.drain().is_empty());
        assert_eq!(h.coordinator.statistics(), Statistics::default());
    }

    #[tokio::test]
    async fn test_aborted_at_any_index_is_dropped() {
        let mut h = Harness::new(av_demuxer());
        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        let token = h.coordinator.batches.get(StreamType::Audio).unwrap().token();

        h.coordinator
            .on_buffer_ready(StreamType::Audio, token, 16, DemuxerStatus::Aborted, None);

        assert!(h.coordinator.batches.get(StreamType::Audio).is_none());
        assert!(h.drain().is_empty());
        assert_eq!(h.coordinator.statistics(), Statistics::default());
    }

    #[tokio::test]
    async fn test_aborted_beyond_capacity_releases_deferred_request() {
        let mut h = Harness::new(av_demuxer());
        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        let stale = h.coordinator.batches.get(StreamType::Audio).unwrap().token();
        let generation = h.coordinator.seek(Duration::from_secs(1));
        h.coordinator.request_batch(StreamType::Audio, generation);

        // Unlike an inconsistent index, an abort is accepted at any index, so
        // the request waiting behind it goes ahead.
        h.coordinator
            .on_buffer_ready(StreamType::Audio, stale, 99, DemuxerStatus::Aborted, None);

        let batch = h.coordinator.batches.get(StreamType::Audio).unwrap();
        assert_ne!(batch.token(), stale);
        assert_eq!(batch.seek_generation(), generation.0);
        assert!(h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_vorbis_padding_and_encryption() {
        let demuxer = MockDemuxer::new()
            .with_audio(AudioDecoderConfig::new(AudioCodec::Vorbis, ChannelLayout::Stereo, 48000))
            .chunked(10.0);
        let mut h = Harness::new(demuxer);
        let audio = h.audio();
        audio.push_buffer(
            DecoderBuffer::new(vec![1u8, 2, 3])
                .with_decrypt_config(DecryptConfig::new(vec![7u8; 16], vec![8u8; 16])),
        );
        audio.push_end_of_stream();

        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        h.pump_n(2).await;

        let acks = h.acks();
        let unit = &acks[0].access_units[0];
        assert_eq!(&unit.data[..], &[1, 2, 3, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(unit.key_id.as_deref(), Some(&[7u8; 16][..]));
        assert_eq!(unit.iv.as_deref(), Some(&[8u8; 16][..]));
        // Padding is not counted as decoded data.
        assert_eq!(h.coordinator.statistics().audio_bytes_decoded, 3);
    }

    #[tokio::test]
    async fn test_padding_disabled_by_config() {
        let demuxer = MockDemuxer::new()
            .with_audio(AudioDecoderConfig::new(AudioCodec::Vorbis, ChannelLayout::Mono, 22050));
        let config = BridgeConfig {
            audio_padding: false,
            ..BridgeConfig::default()
        };
        let mut h = Harness::with_source(demuxer, false, config);
        h.audio().push_buffer(DecoderBuffer::new(vec![5u8]));
        h.audio().push_end_of_stream();

        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        h.pump_n(2).await;
        assert_eq!(&h.acks()[0].access_units[0].data[..], &[5]);
    }

    #[tokio::test]
    async fn test_live_source_sends_single_units() {
        let demuxer = MockDemuxer::new()
            .with_audio(AudioDecoderConfig::new(AudioCodec::Vorbis, ChannelLayout::Stereo, 48000));
        let mut h = Harness::with_source(demuxer, true, BridgeConfig::default());
        assert_eq!(h.coordinator.access_unit_size(), 1);

        let audio = h.audio();
        audio.push_buffer(DecoderBuffer::new(vec![1u8, 2]));
        audio.push_buffer(DecoderBuffer::new(vec![3u8]));

        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        h.pump().await;
        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        h.pump().await;

        let acks = h.acks();
        assert_eq!(acks.len(), 2);
        assert_eq!(&acks[0].access_units[0].data[..], &[1, 2]);
        assert_eq!(&acks[1].access_units[0].data[..], &[3]);
        assert_eq!(h.coordinator.duration_ms(), None);
    }

    #[tokio::test]
    async fn test_init_done_notifies_ready() {
        let mut h = Harness::new(av_demuxer());
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        h.coordinator.initialize(DemuxerHost::new(host_tx));
        h.pump().await;

        match h.drain().as_slice() {
            [ConsumerEvent::Ready { player_id, params }] => {
                assert_eq!(*player_id, 1);
                assert_eq!(params.audio_channels, 2);
                assert_eq!(params.video_size, Size::new(1280, 720));
                assert_eq!(params.duration_ms, Some(60_000));
                assert!(params.key_system.is_empty());
            }
            other => panic!("Expected a single Ready, got {:?}", other),
        }
        assert_eq!(h.demuxer.calls(), vec![DemuxerCall::Initialize]);
    }

    #[tokio::test]
    async fn test_init_failure_reports_network_state() {
        let demuxer = av_demuxer().with_init_status(PipelineStatus::DemuxerErrorCouldNotOpen);
        let mut h = Harness::new(demuxer);
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        h.coordinator.initialize(DemuxerHost::new(host_tx));
        h.pump().await;

        assert_eq!(
            h.drain(),
            vec![ConsumerEvent::NetworkStateChange(NetworkState::FormatError)]
        );
    }

    #[tokio::test]
    async fn test_seek_failure_reports_network_state() {
        let mut h = Harness::new(av_demuxer());
        h.demuxer.set_seek_status(PipelineStatus::ErrorRead);
        h.coordinator.seek(Duration::from_secs(3));
        h.pump().await;

        assert_eq!(
            h.drain(),
            vec![ConsumerEvent::NetworkStateChange(NetworkState::NetworkError)]
        );
    }

    #[tokio::test]
    async fn test_encrypted_ready_waits_for_key_system() {
        let demuxer = MockDemuxer::new()
            .with_video(
                VideoDecoderConfig::new(VideoCodec::VP9, Size::new(640, 360)).with_encryption(true),
            )
            .chunked(1.0);
        let mut h = Harness::new(demuxer);

        h.coordinator.on_media_config_request();
        assert!(h.drain().is_empty());

        h.coordinator.notify_ready("com.widevine.alpha");
        match h.drain().as_slice() {
            [ConsumerEvent::Ready { params, .. }] => {
                assert!(params.is_video_encrypted);
                assert_eq!(params.key_system, "com.widevine.alpha");
            }
            other => panic!("Expected a single Ready, got {:?}", other),
        }
    }

    #[test]
    fn test_duration_clamping() {
        assert_eq!(clamp_duration_ms(123.4567), 123456);
        assert_eq!(clamp_duration_ms(0.0), 0);
        assert_eq!(clamp_duration_ms(3_000_000.0), i32::MAX);
        assert_eq!(clamp_duration_ms(f64::INFINITY), i32::MAX);
    }

    #[tokio::test]
    async fn test_cancel_pending_seek_only_for_chunked() {
        let h = Harness::new(av_demuxer());
        h.coordinator.cancel_pending_seek();
        assert_eq!(h.demuxer.calls(), vec![DemuxerCall::CancelPendingSeek]);

        let h = Harness::new(MockDemuxer::new().with_video(VideoDecoderConfig::default()));
        h.coordinator.cancel_pending_seek();
        assert!(h.demuxer.calls().is_empty());
        assert_eq!(h.coordinator.duration_ms(), None);
    }

    #[tokio::test]
    async fn test_host_events() {
        let mut h = Harness::new(av_demuxer());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        h.coordinator
            .set_need_key_callback(Box::new(move |need_key: NeedKey| sink.lock().push(need_key)));

        h.coordinator.on_host_event(HostEvent::BufferedTimeRange {
            start: Duration::from_secs(0),
            end: Duration::from_secs(4),
        });
        h.coordinator.on_host_event(HostEvent::BufferedTimeRange {
            start: Duration::from_secs(4),
            end: Duration::from_secs(6),
        });
        h.coordinator.on_host_event(HostEvent::NeedKey(NeedKey {
            key_system: String::new(),
            session_id: String::new(),
            init_data_type: "cenc".to_string(),
            init_data: vec![1u8, 2, 3].into(),
        }));
        h.coordinator.on_host_event(HostEvent::Error(PipelineStatus::ErrorDecode));

        assert_eq!(
            h.coordinator.buffered(),
            vec![Duration::from_secs(0)..Duration::from_secs(6)]
        );
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].init_data_type, "cenc");
        assert_eq!(
            h.drain(),
            vec![ConsumerEvent::NetworkStateChange(NetworkState::DecodeError)]
        );
    }

    #[tokio::test]
    async fn test_teardown_is_two_phase() {
        let mut h = Harness::new(av_demuxer());
        h.coordinator.request_batch(StreamType::Video, SeekGeneration(0));

        assert_eq!(h.coordinator.destroy().unwrap(), Teardown::Pending);
        assert!(matches!(h.coordinator.destroy(), Err(BridgeError::DoubleTeardown)));

        // The outstanding read stalls once the demuxer stops.
        assert!(!h.pump().await);
        assert!(h.demuxer.calls().contains(&DemuxerCall::Stop));
        assert_eq!(h.coordinator.destroy().unwrap(), Teardown::Finished);
        assert!(h.drain().is_empty());
    }

    #[tokio::test]
    async fn test_completions_after_teardown_are_ignored() {
        let mut h = Harness::new(av_demuxer());
        let audio = h.audio();
        audio.push_buffer(frame(0, 3));
        h.coordinator.request_batch(StreamType::Audio, SeekGeneration(0));
        let token = h.coordinator.batches.get(StreamType::Audio).unwrap().token();

        h.coordinator.destroy().unwrap();
        h.coordinator
            .on_buffer_ready(StreamType::Audio, token, 0, DemuxerStatus::Ok, Some(frame(0, 3)));
        h.coordinator.notify_ready("");
        h.coordinator.on_host_event(HostEvent::Error(PipelineStatus::ErrorNetwork));

        assert!(h.drain().is_empty());
        assert_eq!(h.coordinator.statistics(), Statistics::default());
    }
}
