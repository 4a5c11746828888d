use crate::av::{AudioCodec, Size, StreamType, VideoCodec};
use crate::demuxer::Demuxer;
use bytes::Bytes;

/// Track configuration sent to the remote player once the demuxer is ready.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DemuxerReadyParams {
    /// Audio codec, `Unknown` without an audio stream
    pub audio_codec: AudioCodec,
    /// Channel count of the audio layout
    pub audio_channels: u32,
    /// Samples per second
    pub audio_sampling_rate: u32,
    /// Whether audio units carry decrypt configs
    pub is_audio_encrypted: bool,
    /// Codec-specific audio setup data
    pub audio_extra_data: Bytes,
    /// Video codec, `Unknown` without a video stream
    pub video_codec: VideoCodec,
    /// Natural video size
    pub video_size: Size,
    /// Whether video units carry decrypt configs
    pub is_video_encrypted: bool,
    /// Codec-specific video setup data
    pub video_extra_data: Bytes,
    /// `None` when the source cannot report a duration
    pub duration_ms: Option<i32>,
    /// Negotiated key system, empty for clear content
    pub key_system: String,
}

impl DemuxerReadyParams {
    pub(crate) fn from_demuxer(
        demuxer: &dyn Demuxer,
        duration_ms: Option<i32>,
        key_system: &str,
    ) -> Self {
        let mut params = DemuxerReadyParams {
            duration_ms,
            key_system: key_system.to_string(),
            ..Default::default()
        };

        if let Some(stream) = demuxer.stream(StreamType::Audio) {
            let config = stream.audio_decoder_config();
            params.audio_codec = config.codec;
            params.audio_channels = config.channel_layout.channel_count();
            params.audio_sampling_rate = config.samples_per_second;
            params.is_audio_encrypted = config.is_encrypted;
            params.audio_extra_data = config.extra_data;
        }

        if let Some(stream) = demuxer.stream(StreamType::Video) {
            let config = stream.video_decoder_config();
            params.video_codec = config.codec;
            params.video_size = config.natural_size;
            params.is_video_encrypted = config.is_encrypted;
            params.video_extra_data = config.extra_data;
        }

        params
    }

    /// Clear content is ready at once; encrypted content waits until a key
    /// system has been negotiated.
    pub fn is_ready_to_send(&self) -> bool {
        (!self.is_audio_encrypted && !self.is_video_encrypted) || !self.key_system.is_empty()
    }
}
