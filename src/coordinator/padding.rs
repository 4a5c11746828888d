use crate::av::AudioCodec;
use bytes::{Bytes, BytesMut};

const VORBIS_PADDING: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// Per-platform suffix appended to audio payloads before they leave the
/// bridge.
pub trait AudioPaddingPolicy: Send + Sync {
    /// Suffix for units of `codec`, or `None` to forward them untouched.
    fn padding(&self, codec: AudioCodec) -> Option<&'static [u8]>;

    /// `data` followed by the suffix for `codec`.
    fn pad(&self, codec: AudioCodec, data: &Bytes) -> Bytes {
        match self.padding(codec) {
            Some(suffix) => {
                let mut padded = BytesMut::with_capacity(data.len() + suffix.len());
                padded.extend_from_slice(data);
                padded.extend_from_slice(suffix);
                padded.freeze()
            }
            None => data.clone(),
        }
    }
}

/// Android's extractor expects four trailing bytes on every Vorbis packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct VorbisPadding;

impl AudioPaddingPolicy for VorbisPadding {
    fn padding(&self, codec: AudioCodec) -> Option<&'static [u8]> {
        (codec == AudioCodec::Vorbis).then_some(&VORBIS_PADDING[..])
    }
}

/// Forwards every payload untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPadding;

impl AudioPaddingPolicy for NoPadding {
    fn padding(&self, _codec: AudioCodec) -> Option<&'static [u8]> {
        None
    }
}
