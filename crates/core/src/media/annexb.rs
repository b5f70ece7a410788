//! Frame assembly shared by the NALU-based codecs (H.264, H.265).
//!
//! Both codecs use the same Annex B framing and the same parameter-set
//! dance; they differ only in NAL header layout and SPS syntax. Those
//! differences are captured by [`NaluSyntax`], and [`AnnexBAssembler`]
//! does the rest:
//!
//! ```text
//! VPS/SPS/PPS  -> parameter-set cache (SPS also yields a FormatDescriptor)
//! IDR / IRAP   -> Key frame   = cache snapshot + NALU
//! other slices -> Delta frame = NALU
//! SEI/AUD/...  -> skipped
//! ```

use std::marker::PhantomData;

use crate::error::{ParseErrorKind, Result};

use super::nal::{NaluIndex, find_nalu_indices};
use super::param_sets::{ParameterSetCache, ParameterSetKind};
use super::{Assembled, Codec, CodedFrame, FormatDescriptor, FrameAssembler, FrameKind};

/// What a NAL unit means to the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NaluRole {
    ParameterSet(ParameterSetKind),
    Key,
    Delta,
    Skip,
}

/// Codec-specific NAL syntax.
pub trait NaluSyntax: Send + 'static {
    const CODEC: Codec;
    /// NAL header length in bytes (1 for H.264, 2 for H.265).
    const HEADER_LEN: usize;

    /// Classify a NAL unit from the first byte of its header.
    fn classify(header: u8) -> NaluRole;

    /// Picture dimensions from a whole SPS NAL unit, header included.
    fn sps_dimensions(nalu: &[u8]) -> std::result::Result<(u32, u32), ParseErrorKind>;

    /// An empty cache with this codec's completeness rule.
    fn new_cache() -> ParameterSetCache;
}

/// Per-session assembler for an Annex B codec.
pub struct AnnexBAssembler<S: NaluSyntax> {
    cache: ParameterSetCache,
    /// Last successfully parsed format, used to detect resolution changes.
    active: Option<FormatDescriptor>,
    _syntax: PhantomData<S>,
}

impl<S: NaluSyntax> AnnexBAssembler<S> {
    pub fn new() -> Self {
        Self {
            cache: S::new_cache(),
            active: None,
            _syntax: PhantomData,
        }
    }

    /// Current parameter-set cache (for inspection and tests).
    pub fn cache(&self) -> &ParameterSetCache {
        &self.cache
    }

    /// Format announced by the last parsable SPS.
    pub fn active_format(&self) -> Option<FormatDescriptor> {
        self.active
    }

    /// Every parsable SPS re-announces its format. The consumer collapses
    /// repeats, so a decoder whose creation failed is retried on the next
    /// SPS even when the resolution is unchanged.
    fn on_sps(
        &mut self,
        nalu: &[u8],
        vps_in_chunk: Option<&[u8]>,
        out: &mut Vec<Assembled>,
    ) {
        match S::sps_dimensions(nalu) {
            Ok((width, height)) => {
                let format = FormatDescriptor::new(S::CODEC, width, height);
                if self.active != Some(format) {
                    if let Some(previous) = self.active {
                        tracing::info!(
                            codec = %S::CODEC,
                            from = %previous,
                            to = %format,
                            "resolution changed, resetting parameter sets"
                        );
                        self.cache.clear();
                        if let Some(vps) = vps_in_chunk {
                            self.cache.observe(ParameterSetKind::Vps, vps);
                        }
                    } else {
                        tracing::info!(codec = %S::CODEC, width, height, "SPS set format");
                    }
                    self.active = Some(format);
                }
                out.push(Assembled::Format(format));
            }
            Err(kind) => {
                tracing::warn!(codec = %S::CODEC, error = %kind, "cannot parse SPS");
                out.push(Assembled::Format(FormatDescriptor::unknown(S::CODEC)));
            }
        }
        self.cache.observe(ParameterSetKind::Sps, nalu);
    }

    fn frame(&self, data: &[u8], index: &NaluIndex, timestamp_ms: u64, kind: FrameKind) -> CodedFrame {
        let nalu = index.with_start_code(data);
        let content = match kind {
            FrameKind::Key => match self.cache.snapshot() {
                Some(mut content) => {
                    content.extend_from_slice(nalu);
                    content
                }
                None => {
                    tracing::debug!(
                        codec = %S::CODEC,
                        "incomplete parameter sets, forwarding key frame undecorated"
                    );
                    nalu.to_vec()
                }
            },
            FrameKind::Delta => nalu.to_vec(),
        };
        CodedFrame::new(content, timestamp_ms, kind)
    }
}

impl<S: NaluSyntax> Default for AnnexBAssembler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: NaluSyntax> FrameAssembler for AnnexBAssembler<S> {
    fn codec(&self) -> Codec {
        S::CODEC
    }

    fn assemble(&mut self, data: &[u8], timestamp_ms: u64) -> Result<Vec<Assembled>> {
        let indices = find_nalu_indices(data);
        let mut out = Vec::new();
        let mut vps_in_chunk: Option<&[u8]> = None;

        for index in &indices {
            let nalu = index.payload(data);
            if nalu.len() < S::HEADER_LEN {
                continue;
            }
            let role = S::classify(nalu[0]);
            tracing::trace!(codec = %S::CODEC, ?role, size = nalu.len(), ts = timestamp_ms, "NALU");

            match role {
                NaluRole::ParameterSet(ParameterSetKind::Sps) => {
                    self.on_sps(nalu, vps_in_chunk, &mut out);
                }
                NaluRole::ParameterSet(ParameterSetKind::Vps) => {
                    vps_in_chunk = Some(nalu);
                    self.cache.observe(ParameterSetKind::Vps, nalu);
                }
                NaluRole::ParameterSet(kind) => self.cache.observe(kind, nalu),
                NaluRole::Key => {
                    let frame = self.frame(data, index, timestamp_ms, FrameKind::Key);
                    out.push(Assembled::Frame(frame));
                }
                NaluRole::Delta => {
                    let frame = self.frame(data, index, timestamp_ms, FrameKind::Delta);
                    out.push(Assembled::Frame(frame));
                }
                NaluRole::Skip => {}
            }
        }

        Ok(out)
    }
}
