use std::fmt;
use std::num::ParseIntError;
use thiserror::Error;

/// Status reported by the demuxer for initialization, seeks and runtime
/// failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStatus {
    /// Success
    Ok,
    /// Source URL could not be resolved
    ErrorUrlNotFound,
    /// Network failure while fetching media
    ErrorNetwork,
    /// Media could not be decoded
    ErrorDecode,
    /// Media could not be decrypted
    ErrorDecrypt,
    /// Operation aborted
    ErrorAbort,
    /// Pipeline initialization failed
    ErrorInitializationFailed,
    /// No renderer for the media
    ErrorCouldNotRender,
    /// Reading from the source failed
    ErrorRead,
    /// Another operation is still running
    ErrorOperationPending,
    /// Operation not allowed in the current state
    ErrorInvalidState,
    /// Demuxer could not open the source
    DemuxerErrorCouldNotOpen,
    /// Demuxer could not parse the container
    DemuxerErrorCouldNotParse,
    /// Container has no playable stream
    DemuxerErrorNoSupportedStreams,
    /// Codec not supported
    DecoderErrorNotSupported,
}

impl PipelineStatus {
    /// Whether this is [`PipelineStatus::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, PipelineStatus::Ok)
    }

    /// `Ok(())` for [`PipelineStatus::Ok`], [`BridgeError::Pipeline`]
    /// otherwise.
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(BridgeError::Pipeline(self))
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors produced by the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// I/O failure, e.g. while reading a config file
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Read completion inconsistent with the batch it belongs to
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A demuxer operation failed
    #[error("pipeline error: {0}")]
    Pipeline(PipelineStatus),

    /// Invalid configuration value
    #[error("config error: {0}")]
    Config(String),

    /// The coordinator task is gone
    #[error("coordinator has shut down")]
    Shutdown,

    /// Teardown requested again before the first one completed
    #[error("coordinator torn down twice while the demuxer stop is pending")]
    DoubleTeardown,

    /// Malformed integer in the configuration
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
