//! Codec-specific bitstream handling.
//!
//! This module provides the [`FrameAssembler`] trait and one implementation
//! per supported codec. An assembler turns one transport chunk into zero or
//! more [`Assembled`] items that the pipeline then routes to the ingest
//! queue (format changes and coded frames) or straight to playout (pictures
//! decoded inline).
//!
//! ## Supported codecs
//!
//! | Codec | Module | Framing | Decode path |
//! |-------|--------|---------|-------------|
//! | H.264 | [`h264`] | Annex B, one coded frame per slice NALU | decode engine |
//! | H.265 | [`h265`] | Annex B, one coded frame per slice NALU | decode engine |
//! | MJPEG | [`mjpeg`] | whole chunk is one picture | inline ([`mjpeg::InlineDecoder`]) |
//! | VP9 | [`vp9`] | whole chunk is one key frame | decode engine, self-describing |
//!
//! Annex B scanning lives in [`nal`], the shared H.264/H.265 assembly in
//! [`annexb`], parameter-set storage in
//! [`param_sets`], and out-of-band parameter sets carried by the session
//! description in [`sprop`].

pub mod annexb;
#[cfg(test)]
mod bitwriter;
pub mod h264;
pub mod h265;
pub mod mjpeg;
pub mod nal;
pub mod param_sets;
pub mod sprop;
pub mod vp9;

use std::fmt;

use bytes::Bytes;

use crate::error::Result;
use crate::picture::DecodedPicture;

/// Video codecs accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    H264,
    H265,
    Jpeg,
    Vp9,
}

impl Codec {
    /// Map a negotiated codec name (SDP `rtpmap` encoding name) to a codec.
    ///
    /// Matching is case-insensitive. `HEVC` and `MJPEG` are accepted as
    /// aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        [
            ("H264", Codec::H264),
            ("H265", Codec::H265),
            ("HEVC", Codec::H265),
            ("JPEG", Codec::Jpeg),
            ("MJPEG", Codec::Jpeg),
            ("VP9", Codec::Vp9),
        ]
        .into_iter()
        .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
        .map(|(_, codec)| codec)
    }

    /// Canonical codec name.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::H264 => "H264",
            Codec::H265 => "H265",
            Codec::Jpeg => "JPEG",
            Codec::Vp9 => "VP9",
        }
    }

    /// Whether a decoder for this codec can be created without knowing the
    /// picture dimensions up front (the bitstream describes itself).
    pub fn is_self_describing(&self) -> bool {
        matches!(self, Codec::Vp9)
    }

    /// Whether frames of this codec go through the asynchronous decode engine.
    ///
    /// JPEG pictures are decoded inline by the assembler instead.
    pub fn uses_decode_engine(&self) -> bool {
        !matches!(self, Codec::Jpeg)
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a coded frame can be decoded on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Key,
    Delta,
}

/// A decode-ready unit produced by a [`FrameAssembler`].
///
/// The payload is immutable and cheaply cloneable; the decode worker
/// consumes each frame exactly once.
#[derive(Debug, Clone)]
pub struct CodedFrame {
    pub data: Bytes,
    /// Presentation timestamp in milliseconds, derived from transport wall time.
    pub timestamp_ms: u64,
    pub kind: FrameKind,
}

impl CodedFrame {
    pub fn new(data: impl Into<Bytes>, timestamp_ms: u64, kind: FrameKind) -> Self {
        Self {
            data: data.into(),
            timestamp_ms,
            kind,
        }
    }

    pub fn is_key(&self) -> bool {
        self.kind == FrameKind::Key
    }
}

/// Codec and picture dimensions announced to the decode worker.
///
/// `0x0` means "unknown, deferred": either the SPS could not be parsed or
/// the codec describes itself in-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub codec: Codec,
    pub width: u32,
    pub height: u32,
}

impl FormatDescriptor {
    pub fn new(codec: Codec, width: u32, height: u32) -> Self {
        Self {
            codec,
            width,
            height,
        }
    }

    /// A descriptor with unknown dimensions.
    pub fn unknown(codec: Codec) -> Self {
        Self::new(codec, 0, 0)
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether a decoder may be created from this descriptor.
    pub fn is_actionable(&self) -> bool {
        !self.is_degenerate() || self.codec.is_self_describing()
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}x{}", self.codec, self.width, self.height)
    }
}

/// One output item of [`FrameAssembler::assemble`].
#[derive(Debug)]
pub enum Assembled {
    /// New (or first) format for the session; must reach the decode worker
    /// before any frame that follows it.
    Format(FormatDescriptor),
    /// A coded frame for the decode engine.
    Frame(CodedFrame),
    /// A picture already decoded inline (JPEG path), bypassing the engine.
    Picture(DecodedPicture),
}

/// Codec-specific demultiplexer for one session.
///
/// Implementations keep whatever per-session state the codec needs (the
/// parameter-set cache and active format for H.264/H.265) and are only ever
/// driven from the transport thread that owns the session.
///
/// ## Implementing a new codec
///
/// 1. Create a new module (e.g. `media/av1.rs`)
/// 2. Implement `FrameAssembler` for your type
/// 3. Add a [`Codec`] variant and wire it into [`new_assembler`]
pub trait FrameAssembler: Send {
    /// The codec this assembler handles.
    fn codec(&self) -> Codec;

    /// Split one transport chunk into pipeline items, in stream order.
    ///
    /// Errors are non-fatal: the caller logs them and rejects the chunk.
    fn assemble(&mut self, data: &[u8], timestamp_ms: u64) -> Result<Vec<Assembled>>;
}

/// Create the assembler for `codec` with the default inline JPEG decoder.
pub fn new_assembler(codec: Codec) -> Box<dyn FrameAssembler> {
    match codec {
        Codec::H264 => Box::new(h264::H264Assembler::new()),
        Codec::H265 => Box::new(h265::H265Assembler::new()),
        Codec::Jpeg => Box::new(mjpeg::JpegAssembler::new(Box::new(
            mjpeg::ImageJpegDecoder,
        ))),
        Codec::Vp9 => Box::new(vp9::Vp9Assembler::new()),
    }
}
