//! VP9: opaque, self-describing frames.
//!
//! No parameter sets and no header parsing. Every chunk is preceded by a
//! `0x0` format so the worker creates, or after a failed creation retries,
//! a decoder that reads the picture size from the bitstream itself.

use crate::error::Result;

use super::{Assembled, Codec, CodedFrame, FormatDescriptor, FrameAssembler, FrameKind};

#[derive(Debug, Default)]
pub struct Vp9Assembler;

impl Vp9Assembler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameAssembler for Vp9Assembler {
    fn codec(&self) -> Codec {
        Codec::Vp9
    }

    fn assemble(&mut self, data: &[u8], timestamp_ms: u64) -> Result<Vec<Assembled>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        tracing::trace!(ts = timestamp_ms, bytes = data.len(), "VP9 frame");
        Ok(vec![
            Assembled::Format(FormatDescriptor::unknown(Codec::Vp9)),
            Assembled::Frame(CodedFrame::new(data.to_vec(), timestamp_ms, FrameKind::Key)),
        ])
    }
}
