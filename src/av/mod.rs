//! Media types shared by the demuxer contract and the coordinator.

use bytes::Bytes;
use std::fmt;

mod packet;
mod ranges;

pub use packet::*;
pub use ranges::BufferedRanges;

/// The two independent elementary streams a demuxer exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamType {
    /// Audio elementary stream
    Audio,
    /// Video elementary stream
    Video,
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamType::Audio => write!(f, "Audio"),
            StreamType::Video => write!(f, "Video"),
        }
    }
}

/// Audio codec of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioCodec {
    /// Not reported by the demuxer
    #[default]
    Unknown,
    /// MPEG-4 AAC
    AAC,
    /// MPEG-1/2 Layer III
    MP3,
    /// Uncompressed PCM
    PCM,
    /// Vorbis, which some players expect padded
    Vorbis,
    /// Opus
    Opus,
    /// FLAC
    FLAC,
}

/// Video codec of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoCodec {
    /// Not reported by the demuxer
    #[default]
    Unknown,
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    H265,
    /// VP8
    VP8,
    /// VP9
    VP9,
    /// Theora
    Theora,
}

/// Speaker arrangement of an audio track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelLayout {
    /// No channels
    #[default]
    None,
    /// One channel
    Mono,
    /// Left and right
    Stereo,
    /// Stereo plus LFE
    TwoPointOne,
    /// Left, right and center
    Surround,
    /// Front and back pairs
    Quad,
    /// 5.0
    FivePointZero,
    /// 5.1
    FivePointOne,
    /// 6.1
    SixPointOne,
    /// 7.1
    SevenPointOne,
    /// Layout without speaker positions, carrying only a channel count
    Discrete(u8),
}

impl ChannelLayout {
    /// Number of channels the layout carries.
    pub fn channel_count(&self) -> u32 {
        match self {
            ChannelLayout::None => 0,
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
            ChannelLayout::TwoPointOne | ChannelLayout::Surround => 3,
            ChannelLayout::Quad => 4,
            ChannelLayout::FivePointZero => 5,
            ChannelLayout::FivePointOne => 6,
            ChannelLayout::SixPointOne => 7,
            ChannelLayout::SevenPointOne => 8,
            ChannelLayout::Discrete(n) => *n as u32,
        }
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Size {
    /// Creates a size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Decoder configuration of an audio stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AudioDecoderConfig {
    /// Codec
    pub codec: AudioCodec,
    /// Speaker layout
    pub channel_layout: ChannelLayout,
    /// Sample rate in Hz
    pub samples_per_second: u32,
    /// Codec-specific initialization data
    pub extra_data: Bytes,
    /// Whether units of this stream are encrypted
    pub is_encrypted: bool,
}

impl AudioDecoderConfig {
    /// Clear config without extra data.
    pub fn new(codec: AudioCodec, channel_layout: ChannelLayout, samples_per_second: u32) -> Self {
        Self {
            codec,
            channel_layout,
            samples_per_second,
            ..Default::default()
        }
    }

    /// Sets the codec-specific initialization data.
    pub fn with_extra_data(mut self, extra_data: impl Into<Bytes>) -> Self {
        self.extra_data = extra_data.into();
        self
    }

    /// Marks the stream as encrypted or clear.
    pub fn with_encryption(mut self, is_encrypted: bool) -> Self {
        self.is_encrypted = is_encrypted;
        self
    }
}

/// Decoder configuration of a video stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VideoDecoderConfig {
    /// Codec
    pub codec: VideoCodec,
    /// Size of the decoded frames
    pub coded_size: Size,
    /// Display size, reported to the player
    pub natural_size: Size,
    /// Codec-specific initialization data
    pub extra_data: Bytes,
    /// Whether units of this stream are encrypted
    pub is_encrypted: bool,
}

impl VideoDecoderConfig {
    /// Clear config whose coded and natural sizes are both `size`.
    pub fn new(codec: VideoCodec, size: Size) -> Self {
        Self {
            codec,
            coded_size: size,
            natural_size: size,
            ..Default::default()
        }
    }

    /// Overrides the display size.
    pub fn with_natural_size(mut self, natural_size: Size) -> Self {
        self.natural_size = natural_size;
        self
    }

    /// Sets the codec-specific initialization data.
    pub fn with_extra_data(mut self, extra_data: impl Into<Bytes>) -> Self {
        self.extra_data = extra_data.into();
        self
    }

    /// Marks the stream as encrypted or clear.
    pub fn with_encryption(mut self, is_encrypted: bool) -> Self {
        self.is_encrypted = is_encrypted;
        self
    }
}
