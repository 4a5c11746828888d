use crate::av::StreamType;

/// Cumulative decode statistics.
///
/// Counters only grow. Units are counted once their batch is acknowledged, on
/// the assumption that the remote player decodes them right away.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    /// Audio payload bytes, padding excluded
    pub audio_bytes_decoded: u64,
    /// Video payload bytes
    pub video_bytes_decoded: u64,
    /// Video data units
    pub video_frames_decoded: u64,
    /// Never incremented by the bridge; nothing reports drops back to it
    pub video_frames_dropped: u64,
}

impl Statistics {
    pub(crate) fn record(&mut self, stream_type: StreamType, bytes: usize) {
        match stream_type {
            StreamType::Audio => {
                self.audio_bytes_decoded += bytes as u64;
            }
            StreamType::Video => {
                self.video_bytes_decoded += bytes as u64;
                self.video_frames_decoded += 1;
            }
        }
    }

    pub(crate) fn merge(&mut self, other: &Statistics) {
        self.audio_bytes_decoded += other.audio_bytes_decoded;
        self.video_bytes_decoded += other.video_bytes_decoded;
        self.video_frames_decoded += other.video_frames_decoded;
        self.video_frames_dropped += other.video_frames_dropped;
    }

    /// Same as `video_frames_decoded`.
    pub fn decoded_frame_count(&self) -> u64 {
        self.video_frames_decoded
    }

    /// Same as `video_frames_dropped`.
    pub fn dropped_frame_count(&self) -> u64 {
        self.video_frames_dropped
    }
}
