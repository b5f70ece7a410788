//! Error types for the ingest pipeline.

use std::fmt;

use crate::media::Codec;

/// Errors that can occur while ingesting and decoding a live video stream.
///
/// Variants map to specific failure modes across the pipeline:
///
/// - **Bitstream**: [`Parse`](Self::Parse): unparsable SPS/VPS or JPEG header.
/// - **Decoder**: [`Init`](Self::Init), [`Decode`](Self::Decode),
///   [`NoDecoder`](Self::NoDecoder), [`InlineDecode`](Self::InlineDecode).
/// - **Transport**: [`UnknownSession`](Self::UnknownSession),
///   [`UnsupportedCodec`](Self::UnsupportedCodec),
///   [`UnsupportedMedia`](Self::UnsupportedMedia).
/// - **Lifecycle**: [`Stopped`](Self::Stopped).
///
/// None of these is fatal to the process. The transport-facing boundary
/// ([`LiveVideoSource`](crate::LiveVideoSource)) logs them and keeps going.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A parameter set or picture header could not be parsed.
    #[error("parse error: {kind}")]
    Parse { kind: ParseErrorKind },

    /// The decode engine refused to create or configure a decoder.
    #[error("cannot create {codec} decoder: {reason}")]
    Init { codec: Codec, reason: String },

    /// The decode engine rejected a coded frame.
    #[error("decode failed: {reason}")]
    Decode { reason: String },

    /// A frame was submitted while no decoder instance is live.
    #[error("no decoder")]
    NoDecoder,

    /// Inline (JPEG) conversion to a picture buffer failed.
    #[error("inline decode failed: {0}")]
    InlineDecode(String),

    /// The transport delivered data for a session id that was never announced.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The negotiated codec name is not one this pipeline handles.
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The negotiated media kind is not video.
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    /// The pipeline has been stopped; the ingest queue no longer accepts events.
    #[error("pipeline stopped")]
    Stopped,
}

/// Specific kind of bitstream parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The SPS could not be read (short, malformed or unsupported).
    InvalidSps(String),
    /// A syntax element carried a value outside its legal range.
    OutOfRange(&'static str),
    /// The JPEG buffer does not start with an SOI marker.
    NotJpeg,
    /// The JPEG header could not be read.
    JpegHeader(String),
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSps(reason) => write!(f, "invalid SPS: {reason}"),
            Self::OutOfRange(field) => write!(f, "{field} out of range"),
            Self::NotJpeg => write!(f, "missing JPEG SOI marker"),
            Self::JpegHeader(reason) => write!(f, "bad JPEG header: {reason}"),
        }
    }
}

impl From<ParseErrorKind> for IngestError {
    fn from(kind: ParseErrorKind) -> Self {
        IngestError::Parse { kind }
    }
}

/// Convenience alias for `Result<T, IngestError>`.
pub type Result<T> = std::result::Result<T, IngestError>;
