use bytes::Bytes;
use std::time::Duration;

/// Outcome of a single demuxer stream read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemuxerStatus {
    /// A buffer or end-of-stream marker was read
    Ok,
    /// The read was cancelled, which only happens when a seek is in flight
    Aborted,
    /// The decoder configuration changed; it must be re-read before the next
    /// unit is meaningful
    ConfigChanged,
}

/// One clear/encrypted byte run within an encrypted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubsampleEntry {
    /// Bytes left in the clear
    pub clear_bytes: u32,
    /// Encrypted bytes following the clear run
    pub cypher_bytes: u32,
}

/// Encryption metadata attached to a demuxed buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecryptConfig {
    /// Key identifier
    pub key_id: Bytes,
    /// Initialization vector
    pub iv: Bytes,
    /// Clear/encrypted layout; empty means fully encrypted
    pub subsamples: Vec<SubsampleEntry>,
}

impl DecryptConfig {
    /// Fully encrypted sample.
    pub fn new(key_id: impl Into<Bytes>, iv: impl Into<Bytes>) -> Self {
        Self {
            key_id: key_id.into(),
            iv: iv.into(),
            subsamples: Vec::new(),
        }
    }

    /// Sets the subsample layout.
    pub fn with_subsamples(mut self, subsamples: Vec<SubsampleEntry>) -> Self {
        self.subsamples = subsamples;
        self
    }
}

/// A buffer as produced by a demuxer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderBuffer {
    /// Payload
    pub data: Bytes,
    /// Presentation timestamp
    pub timestamp: Duration,
    /// Present for encrypted buffers
    pub decrypt_config: Option<DecryptConfig>,
    end_of_stream: bool,
}

impl DecoderBuffer {
    /// Clear buffer at timestamp zero.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            timestamp: Duration::ZERO,
            decrypt_config: None,
            end_of_stream: false,
        }
    }

    /// Creates the marker buffer that terminates a stream.
    pub fn end_of_stream() -> Self {
        Self {
            data: Bytes::new(),
            timestamp: Duration::ZERO,
            decrypt_config: None,
            end_of_stream: true,
        }
    }

    /// Sets the presentation timestamp.
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Attaches encryption metadata.
    pub fn with_decrypt_config(mut self, config: DecryptConfig) -> Self {
        self.decrypt_config = Some(config);
        self
    }

    /// Whether this is the end-of-stream marker.
    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// Payload length in bytes.
    pub fn data_size(&self) -> usize {
        self.data.len()
    }
}

/// One access unit as acknowledged to the remote player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessUnit {
    /// Read status the unit was produced from
    pub status: DemuxerStatus,
    /// Set on the unit that terminates the stream
    pub end_of_stream: bool,
    /// Presentation timestamp
    pub timestamp: Duration,
    /// Payload, possibly padded
    pub data: Bytes,
    /// Key identifier of an encrypted unit
    pub key_id: Option<Bytes>,
    /// Initialization vector of an encrypted unit
    pub iv: Option<Bytes>,
    /// Subsample layout of an encrypted unit
    pub subsamples: Vec<SubsampleEntry>,
}

impl AccessUnit {
    /// Empty unit carrying only `status`.
    pub fn with_status(status: DemuxerStatus) -> Self {
        Self {
            status,
            end_of_stream: false,
            timestamp: Duration::ZERO,
            data: Bytes::new(),
            key_id: None,
            iv: None,
            subsamples: Vec::new(),
        }
    }

    /// The unit terminating a stream.
    pub fn end_of_stream() -> Self {
        Self {
            end_of_stream: true,
            ..Self::with_status(DemuxerStatus::Ok)
        }
    }

    /// Builds a data unit from a demuxed buffer, copying any encryption
    /// metadata. `data` is passed separately so callers can substitute a
    /// padded payload.
    pub fn from_buffer(buffer: &DecoderBuffer, data: Bytes) -> Self {
        let mut unit = Self::with_status(DemuxerStatus::Ok);
        unit.timestamp = buffer.timestamp;
        unit.data = data;
        if let Some(ref decrypt) = buffer.decrypt_config {
            unit.key_id = Some(decrypt.key_id.clone());
            unit.iv = Some(decrypt.iv.clone());
            unit.subsamples = decrypt.subsamples.clone();
        }
        unit
    }

    /// Whether decrypt metadata was copied into the unit.
    pub fn is_encrypted(&self) -> bool {
        self.key_id.is_some()
    }
}
