//! H.265 (HEVC) NAL syntax and SPS parsing (ITU-T H.265 §7.3.2.2).
//!
//! Emulation prevention and bit access come from `h264_reader::rbsp`; the
//! SPS walk stops once the conformance window has been read.

use std::fmt::Debug;

use h264_reader::rbsp::{BitRead, BitReader, decode_nal};

use crate::error::ParseErrorKind;

use super::annexb::{AnnexBAssembler, NaluRole, NaluSyntax};
use super::nal::H265NaluType;
use super::param_sets::{ParameterSetCache, ParameterSetKind};
use super::Codec;

/// Frame assembler for H.265 Annex B streams.
pub type H265Assembler = AnnexBAssembler<H265Syntax>;

/// Fields of an H.265 SPS relevant to decoder setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct H265Sps {
    pub vps_id: u8,
    pub max_sub_layers: u8,
    pub general_profile_idc: u8,
    pub general_level_idc: u8,
    pub sps_id: u32,
    pub chroma_format_idc: u32,
    /// Picture width in luma samples, after the conformance window.
    pub width: u32,
    /// Picture height in luma samples, after the conformance window.
    pub height: u32,
}

fn invalid(e: impl Debug) -> ParseErrorKind {
    ParseErrorKind::InvalidSps(format!("{e:?}"))
}

fn skip(br: &mut impl BitRead, mut bits: u32, name: &'static str) -> Result<(), ParseErrorKind> {
    while bits > 0 {
        let n = bits.min(32);
        br.read::<u32>(n, name).map_err(invalid)?;
        bits -= n;
    }
    Ok(())
}

/// Skip `profile_tier_level(1, max_sub_layers_minus1)`, returning the
/// general profile and level.
fn read_profile_tier_level(
    br: &mut impl BitRead,
    max_sub_layers_minus1: u8,
) -> Result<(u8, u8), ParseErrorKind> {
    skip(br, 3, "general_profile_space")?;
    let profile_idc = br.read::<u8>(5, "general_profile_idc").map_err(invalid)?;
    skip(br, 32, "general_profile_compatibility_flag")?;
    skip(br, 4, "general_source_flags")?;
    skip(br, 44, "general_constraint_flags")?;
    let level_idc = br.read::<u8>(8, "general_level_idc").map_err(invalid)?;

    let sub_layers = usize::from(max_sub_layers_minus1);
    let mut profile_present = [false; 8];
    let mut level_present = [false; 8];
    for i in 0..sub_layers {
        profile_present[i] = br.read_bool("sub_layer_profile_present_flag").map_err(invalid)?;
        level_present[i] = br.read_bool("sub_layer_level_present_flag").map_err(invalid)?;
    }
    if sub_layers > 0 {
        for _ in sub_layers..8 {
            skip(br, 2, "reserved_zero_2bits")?;
        }
    }
    for i in 0..sub_layers {
        if profile_present[i] {
            skip(br, 88, "sub_layer_profile")?;
        }
        if level_present[i] {
            skip(br, 8, "sub_layer_level_idc")?;
        }
    }
    Ok((profile_idc, level_idc))
}

/// Parse an H.265 SPS.
///
/// `nalu` is the whole NAL unit (two-byte header included), still carrying
/// emulation-prevention bytes.
pub fn parse_sps(nalu: &[u8]) -> Result<H265Sps, ParseErrorKind> {
    if nalu.len() < 3 {
        return Err(ParseErrorKind::InvalidSps("empty NAL unit".to_string()));
    }
    // decode_nal drops one header byte, the H.264 header length.
    let rbsp = decode_nal(&nalu[1..]).map_err(invalid)?;
    let mut br = BitReader::new(&*rbsp);

    let vps_id = br.read::<u8>(4, "sps_video_parameter_set_id").map_err(invalid)?;
    let max_sub_layers_minus1 = br.read::<u8>(3, "sps_max_sub_layers_minus1").map_err(invalid)?;
    if max_sub_layers_minus1 > 6 {
        return Err(ParseErrorKind::OutOfRange("sps_max_sub_layers_minus1"));
    }
    skip(&mut br, 1, "sps_temporal_id_nesting_flag")?;

    let (general_profile_idc, general_level_idc) =
        read_profile_tier_level(&mut br, max_sub_layers_minus1)?;

    let sps_id = br.read_ue("sps_seq_parameter_set_id").map_err(invalid)?;
    if sps_id > 15 {
        return Err(ParseErrorKind::OutOfRange("sps_seq_parameter_set_id"));
    }
    let chroma_format_idc = br.read_ue("chroma_format_idc").map_err(invalid)?;
    if chroma_format_idc > 3 {
        return Err(ParseErrorKind::OutOfRange("chroma_format_idc"));
    }
    let separate_colour_plane =
        chroma_format_idc == 3 && br.read_bool("separate_colour_plane_flag").map_err(invalid)?;

    let pic_width = u64::from(br.read_ue("pic_width_in_luma_samples").map_err(invalid)?);
    let pic_height = u64::from(br.read_ue("pic_height_in_luma_samples").map_err(invalid)?);

    let (mut left, mut right, mut top, mut bottom) = (0u64, 0u64, 0u64, 0u64);
    if br.read_bool("conformance_window_flag").map_err(invalid)? {
        left = u64::from(br.read_ue("conf_win_left_offset").map_err(invalid)?);
        right = u64::from(br.read_ue("conf_win_right_offset").map_err(invalid)?);
        top = u64::from(br.read_ue("conf_win_top_offset").map_err(invalid)?);
        bottom = u64::from(br.read_ue("conf_win_bottom_offset").map_err(invalid)?);
    }

    let chroma_array_type = if separate_colour_plane { 0 } else { chroma_format_idc };
    let (sub_width, sub_height) = match chroma_array_type {
        1 => (2, 2),
        2 => (2, 1),
        _ => (1, 1),
    };

    let width = pic_width
        .checked_sub(sub_width * (left + right))
        .ok_or(ParseErrorKind::OutOfRange("conf_win_offset"))?;
    let height = pic_height
        .checked_sub(sub_height * (top + bottom))
        .ok_or(ParseErrorKind::OutOfRange("conf_win_offset"))?;

    let width = u32::try_from(width).map_err(|_| ParseErrorKind::OutOfRange("pic_width"))?;
    let height = u32::try_from(height).map_err(|_| ParseErrorKind::OutOfRange("pic_height"))?;
    if width == 0 || height == 0 {
        return Err(ParseErrorKind::OutOfRange("picture size"));
    }

    Ok(H265Sps {
        vps_id,
        max_sub_layers: max_sub_layers_minus1 + 1,
        general_profile_idc,
        general_level_idc,
        sps_id,
        chroma_format_idc,
        width,
        height,
    })
}

/// H.265 flavour of [`NaluSyntax`].
pub struct H265Syntax;

impl NaluSyntax for H265Syntax {
    const CODEC: Codec = Codec::H265;
    const HEADER_LEN: usize = 2;

    fn classify(header: u8) -> NaluRole {
        match H265NaluType::from_header(header) {
            H265NaluType::Vps => NaluRole::ParameterSet(ParameterSetKind::Vps),
            H265NaluType::Sps => NaluRole::ParameterSet(ParameterSetKind::Sps),
            H265NaluType::Pps => NaluRole::ParameterSet(ParameterSetKind::Pps),
            H265NaluType::Irap => NaluRole::Key,
            H265NaluType::Slice => NaluRole::Delta,
            H265NaluType::Sei | H265NaluType::Aud | H265NaluType::Other(_) => NaluRole::Skip,
        }
    }

    fn sps_dimensions(nalu: &[u8]) -> Result<(u32, u32), ParseErrorKind> {
        parse_sps(nalu).map(|sps| (sps.width, sps.height))
    }

    fn new_cache() -> ParameterSetCache {
        ParameterSetCache::h265()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::media::bitwriter::BitWriter;
    use crate::media::h264::tests::annexb;
    use crate::media::{Assembled, FormatDescriptor, FrameAssembler, FrameKind};

    pub(crate) const VPS: [u8; 6] = [0x40, 0x01, 0x0c, 0x01, 0xff, 0xff];
    pub(crate) const PPS: [u8; 4] = [0x44, 0x01, 0xc1, 0x72];
    pub(crate) const IDR: [u8; 5] = [0x26, 0x01, 0xaf, 0x09, 0x40];
    const TRAIL: [u8; 4] = [0x02, 0x01, 0xd0, 0x2c];
    const PREFIX_SEI: [u8; 4] = [0x4e, 0x01, 0x05, 0x10];

    /// Build an SPS NALU (two-byte header included) for Main profile 4:2:0.
    fn sps_nalu(width: u32, height: u32, conf_bottom: Option<u32>, sub_layers_minus1: u32) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.bits(4, 0).bits(3, u64::from(sub_layers_minus1)).flag(true);
        // profile_tier_level
        w.bits(2, 0).flag(false).bits(5, 1);
        w.bits(32, 0x6000_0000);
        w.flag(true).flag(false).flag(false).flag(true);
        w.bits(43, 0).bits(1, 0);
        w.bits(8, 93);
        for _ in 0..sub_layers_minus1 {
            w.flag(true).flag(true);
        }
        if sub_layers_minus1 > 0 {
            for _ in sub_layers_minus1..8 {
                w.bits(2, 0);
            }
        }
        for _ in 0..sub_layers_minus1 {
            w.bits(2, 0).flag(false).bits(5, 1).bits(32, 0x6000_0000);
            w.bits(4, 0b1001).bits(43, 0).bits(1, 0);
            w.bits(8, 90);
        }
        w.ue(0).ue(1).ue(width).ue(height);
        match conf_bottom {
            Some(bottom) => {
                w.flag(true).ue(0).ue(0).ue(0).ue(bottom);
            }
            None => {
                w.flag(false);
            }
        }
        // Trailing fields are not read by the parser.
        w.ue(0).ue(0).ue(4);

        let mut nalu = vec![0x42, 0x01];
        nalu.extend_from_slice(&w.finish());
        nalu
    }

    #[test]
    fn parses_sps_with_conformance_window() {
        let nalu = sps_nalu(1920, 1088, Some(4), 0);
        let sps = parse_sps(&nalu).unwrap();
        assert_eq!((sps.width, sps.height), (1920, 1080));
        assert_eq!(sps.general_profile_idc, 1);
        assert_eq!(sps.general_level_idc, 93);
        assert_eq!(sps.chroma_format_idc, 1);
    }

    #[test]
    fn parses_sps_with_sub_layers() {
        let nalu = sps_nalu(1280, 720, None, 2);
        let sps = parse_sps(&nalu).unwrap();
        assert_eq!(sps.max_sub_layers, 3);
        assert_eq!((sps.width, sps.height), (1280, 720));
    }

    #[test]
    fn truncated_sps_fails() {
        let nalu = sps_nalu(1920, 1080, None, 0);
        assert!(matches!(
            parse_sps(&nalu[..10]),
            Err(ParseErrorKind::InvalidSps(_))
        ));
    }

    #[test]
    fn oversized_conformance_window_fails() {
        let nalu = sps_nalu(16, 16, Some(9), 0);
        assert!(matches!(parse_sps(&nalu), Err(ParseErrorKind::OutOfRange(_))));
    }

    #[test]
    fn key_frame_carries_vps_sps_pps() {
        let sps = sps_nalu(1920, 1088, Some(4), 0);
        let chunk = annexb(&[&VPS, &sps, &PPS, &IDR]);
        let mut asm = H265Assembler::new();
        let events = asm.assemble(&chunk, 0).unwrap();

        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (Assembled::Format(format), Assembled::Frame(frame)) => {
                assert_eq!(*format, FormatDescriptor::new(Codec::H265, 1920, 1080));
                assert_eq!(frame.kind, FrameKind::Key);
                assert_eq!(frame.data.as_ref(), chunk.as_slice());
            }
            other => panic!("unexpected events {other:?}"),
        }
    }

    #[test]
    fn key_frame_without_vps_is_undecorated() {
        let sps = sps_nalu(1280, 720, None, 0);
        let chunk = annexb(&[&sps, &PPS, &IDR]);
        let mut asm = H265Assembler::new();
        let events = asm.assemble(&chunk, 0).unwrap();
        let frame = events
            .iter()
            .find_map(|e| match e {
                Assembled::Frame(f) => Some(f),
                _ => None,
            })
            .unwrap();
        assert_eq!(frame.data.as_ref(), &chunk[chunk.len() - 9..]);
    }

    #[test]
    fn resolution_change_keeps_vps_from_same_chunk() {
        let mut asm = H265Assembler::new();
        let first = sps_nalu(1280, 720, None, 0);
        asm.assemble(&annexb(&[&VPS, &first, &PPS]), 0).unwrap();

        let second = sps_nalu(1920, 1088, Some(4), 0);
        let chunk = annexb(&[&VPS, &second, &PPS, &IDR]);
        let events = asm.assemble(&chunk, 40).unwrap();

        assert!(matches!(
            events[0],
            Assembled::Format(f) if f == FormatDescriptor::new(Codec::H265, 1920, 1080)
        ));
        match &events[1] {
            Assembled::Frame(frame) => assert_eq!(frame.data.as_ref(), chunk.as_slice()),
            other => panic!("expected key frame, got {other:?}"),
        }
    }

    #[test]
    fn trailing_pictures_are_delta_and_sei_is_skipped() {
        let mut asm = H265Assembler::new();
        let events = asm.assemble(&annexb(&[&PREFIX_SEI, &TRAIL]), 5).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], Assembled::Frame(f) if f.kind == FrameKind::Delta));
    }
}
