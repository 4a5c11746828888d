use super::Statistics;
use crate::av::{AccessUnit, DemuxerStatus, StreamType};
use crate::demuxer::DemuxerStream;
use crate::error::{BridgeError, Result};
use std::sync::Arc;

/// A finished batch, as acknowledged to the remote player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadAck {
    /// Stream the units were read from
    pub stream_type: StreamType,
    /// Units in read order; a terminal unit is always last
    pub access_units: Vec<AccessUnit>,
}

/// What to do after a unit has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BatchStep {
    /// Fetch the unit at this index next
    Fetch(usize),
    /// The batch is final and must be acknowledged
    Complete,
}

/// Units accumulated for one read request.
pub(crate) struct ReadBatch {
    stream_type: StreamType,
    stream: Arc<dyn DemuxerStream>,
    capacity: usize,
    token: u64,
    seek_generation: u64,
    units: Vec<AccessUnit>,
    decoded: Statistics,
    /// Seek generation of a request waiting for this batch's read to return
    restart: Option<u64>,
}

impl ReadBatch {
    pub(crate) fn new(
        stream: Arc<dyn DemuxerStream>,
        capacity: usize,
        token: u64,
        seek_generation: u64,
    ) -> Self {
        Self {
            stream_type: stream.stream_type(),
            stream,
            capacity,
            token,
            seek_generation,
            units: Vec::with_capacity(capacity),
            decoded: Statistics::default(),
            restart: None,
        }
    }

    pub(crate) fn stream(&self) -> &Arc<dyn DemuxerStream> {
        &self.stream
    }

    pub(crate) fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub(crate) fn token(&self) -> u64 {
        self.token
    }

    pub(crate) fn seek_generation(&self) -> u64 {
        self.seek_generation
    }

    pub(crate) fn len(&self) -> usize {
        self.units.len()
    }

    /// Queues a fresh batch for `seek_generation`, started once the read in
    /// flight comes back.
    pub(crate) fn defer_restart(&mut self, seek_generation: u64) {
        self.restart = Some(seek_generation);
    }

    pub(crate) fn restart(&self) -> Option<u64> {
        self.restart
    }

    /// A completion for `index` is consistent only if it fills the next free
    /// slot below capacity.
    pub(crate) fn check_index(&self, index: usize, status: DemuxerStatus) -> Result<()> {
        if index >= self.capacity || index != self.units.len() {
            return Err(BridgeError::Protocol(format!(
                "{} index {}, size {}, capacity {}, status {:?}",
                self.stream_type,
                index,
                self.units.len(),
                self.capacity,
                status
            )));
        }
        Ok(())
    }

    /// Accepts a unit and reports whether more should be fetched. Terminal
    /// units end the batch even when capacity remains.
    pub(crate) fn push(&mut self, unit: AccessUnit) -> BatchStep {
        let terminal = unit.end_of_stream || unit.status == DemuxerStatus::ConfigChanged;
        self.units.push(unit);
        if terminal || self.units.len() >= self.capacity {
            BatchStep::Complete
        } else {
            BatchStep::Fetch(self.units.len())
        }
    }

    /// Counts a data unit. Held back until the batch is acknowledged so that
    /// dropped batches never reach the totals.
    pub(crate) fn record_decoded(&mut self, bytes: usize) {
        self.decoded.record(self.stream_type, bytes);
    }

    pub(crate) fn into_parts(self) -> (ReadAck, Statistics) {
        let ack = ReadAck {
            stream_type: self.stream_type,
            access_units: self.units,
        };
        (ack, self.decoded)
    }
}

/// One optional in-flight batch per stream type.
#[derive(Default)]
pub(crate) struct BatchSlots {
    audio: Option<ReadBatch>,
    video: Option<ReadBatch>,
}

impl BatchSlots {
    fn slot_mut(&mut self, stream_type: StreamType) -> &mut Option<ReadBatch> {
        match stream_type {
            StreamType::Audio => &mut self.audio,
            StreamType::Video => &mut self.video,
        }
    }

    pub(crate) fn get(&self, stream_type: StreamType) -> Option<&ReadBatch> {
        match stream_type {
            StreamType::Audio => self.audio.as_ref(),
            StreamType::Video => self.video.as_ref(),
        }
    }

    pub(crate) fn put(&mut self, batch: ReadBatch) {
        let stream_type = batch.stream_type;
        *self.slot_mut(stream_type) = Some(batch);
    }

    pub(crate) fn get_mut(&mut self, stream_type: StreamType) -> Option<&mut ReadBatch> {
        self.slot_mut(stream_type).as_mut()
    }

    /// Takes the batch for `stream_type` only if it is the one `token` was
    /// issued for.
    pub(crate) fn take_matching(
        &mut self,
        stream_type: StreamType,
        token: u64,
    ) -> Option<ReadBatch> {
        let slot = self.slot_mut(stream_type);
        if slot.as_ref().is_some_and(|batch| batch.token == token) {
            slot.take()
        } else {
            None
        }
    }

    pub(crate) fn clear(&mut self) {
        self.audio = None;
        self.video = None;
    }
}
