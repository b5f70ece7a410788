//! H.264 (AVC) NAL syntax and SPS parsing.
//!
//! The SPS itself is decoded by `h264_reader`; only the fields needed for
//! decoder setup are kept.

use h264_reader::nal::sps::SeqParameterSet;
use h264_reader::rbsp::{BitReader, decode_nal};

use crate::error::ParseErrorKind;

use super::annexb::{AnnexBAssembler, NaluRole, NaluSyntax};
use super::nal::H264NaluType;
use super::param_sets::{ParameterSetCache, ParameterSetKind};
use super::Codec;

/// Frame assembler for H.264 Annex B streams.
pub type H264Assembler = AnnexBAssembler<H264Syntax>;

/// Fields of an H.264 SPS relevant to decoder setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H264Sps {
    pub profile_idc: u8,
    pub level_idc: u8,
    pub sps_id: u8,
    /// Picture width in pixels, after frame cropping.
    pub width: u32,
    /// Picture height in pixels, after frame cropping.
    pub height: u32,
}

/// Parse an H.264 SPS.
///
/// `nalu` is the whole NAL unit (header included), still carrying
/// emulation-prevention bytes.
pub fn parse_sps(nalu: &[u8]) -> Result<H264Sps, ParseErrorKind> {
    if nalu.len() < 2 {
        return Err(ParseErrorKind::InvalidSps("empty NAL unit".to_string()));
    }
    let rbsp = decode_nal(nalu).map_err(|e| ParseErrorKind::InvalidSps(e.to_string()))?;
    if rbsp.len() < 4 {
        return Err(ParseErrorKind::InvalidSps(format!("{} byte RBSP", rbsp.len())));
    }
    let sps = SeqParameterSet::from_bits(BitReader::new(&*rbsp))
        .map_err(|e| ParseErrorKind::InvalidSps(format!("{e:?}")))?;
    let (width, height) = sps
        .pixel_dimensions()
        .map_err(|e| ParseErrorKind::InvalidSps(format!("{e:?}")))?;
    if width == 0 || height == 0 {
        return Err(ParseErrorKind::OutOfRange("picture size"));
    }

    Ok(H264Sps {
        profile_idc: rbsp[0],
        level_idc: rbsp[2],
        sps_id: sps.seq_parameter_set_id.id(),
        width,
        height,
    })
}

/// H.264 flavour of [`NaluSyntax`].
pub struct H264Syntax;

impl NaluSyntax for H264Syntax {
    const CODEC: Codec = Codec::H264;
    const HEADER_LEN: usize = 1;

    fn classify(header: u8) -> NaluRole {
        match H264NaluType::from_header(header) {
            H264NaluType::Sps => NaluRole::ParameterSet(ParameterSetKind::Sps),
            H264NaluType::Pps => NaluRole::ParameterSet(ParameterSetKind::Pps),
            H264NaluType::Idr => NaluRole::Key,
            H264NaluType::Slice => NaluRole::Delta,
            H264NaluType::Sei | H264NaluType::Aud | H264NaluType::Other(_) => NaluRole::Skip,
        }
    }

    fn sps_dimensions(nalu: &[u8]) -> Result<(u32, u32), ParseErrorKind> {
        parse_sps(nalu).map(|sps| (sps.width, sps.height))
    }

    fn new_cache() -> ParameterSetCache {
        ParameterSetCache::h264()
    }
}
