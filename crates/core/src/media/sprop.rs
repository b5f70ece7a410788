//! Out-of-band parameter sets carried in the session description.
//!
//! RTSP sources usually announce their parameter sets in the SDP `fmtp`
//! line (RFC 6184 `sprop-parameter-sets`, RFC 7798 `sprop-vps/sps/pps`).
//! [`init_frames`] turns them into Annex B units that are fed through the
//! assembler before any live data, so the first IDR can be decorated and
//! the first format announced even if the stream never repeats them.

use base64::prelude::{BASE64_STANDARD, BASE64_STANDARD_NO_PAD, Engine as _};

use super::Codec;
use super::nal::START_CODE;

/// Raw value of `name=` in `sdp`, up to the next space, `;`, CR or LF.
fn attribute<'a>(sdp: &'a str, name: &str) -> Option<&'a str> {
    let pattern = format!("{name}=");
    let start = sdp.find(&pattern)? + pattern.len();
    let rest = &sdp[start..];
    let end = rest
        .find([' ', ';', '\r', '\n'])
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn decode_unit(b64: &str) -> Option<Vec<u8>> {
    let b64 = b64.trim();
    let nalu = BASE64_STANDARD
        .decode(b64)
        .or_else(|_| BASE64_STANDARD_NO_PAD.decode(b64))
        .ok()?;
    if nalu.is_empty() {
        return None;
    }
    let mut unit = Vec::with_capacity(START_CODE.len() + nalu.len());
    unit.extend_from_slice(&START_CODE);
    unit.extend_from_slice(&nalu);
    Some(unit)
}

/// Annex B parameter-set units announced by `sdp` for `codec`, in feed order.
///
/// Returns nothing for codecs without out-of-band parameter sets, when the
/// attributes are absent, or when any of them fails to decode.
pub fn init_frames(codec: Codec, sdp: &str) -> Vec<Vec<u8>> {
    let encoded: Vec<&str> = match codec {
        Codec::H264 => match attribute(sdp, "sprop-parameter-sets") {
            Some(value) => value.split(',').filter(|s| !s.is_empty()).collect(),
            None => return Vec::new(),
        },
        Codec::H265 => {
            let sets: Option<Vec<&str>> = ["sprop-vps", "sprop-sps", "sprop-pps"]
                .iter()
                .map(|name| attribute(sdp, name))
                .collect();
            match sets {
                Some(sets) => sets,
                None => return Vec::new(),
            }
        }
        Codec::Jpeg | Codec::Vp9 => return Vec::new(),
    };

    let decoded: Option<Vec<Vec<u8>>> = encoded.iter().map(|b64| decode_unit(b64)).collect();
    match decoded {
        Some(units) if codec != Codec::H264 || units.len() >= 2 => {
            tracing::debug!(%codec, units = units.len(), "parameter sets from session description");
            units
        }
        _ => {
            tracing::warn!(%codec, value = ?encoded, "cannot decode sprop parameter sets");
            Vec::new()
        }
    }
}
