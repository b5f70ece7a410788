//! Splits an elementary-stream file into transport-sized chunks.

use std::io;

use livesource::Codec;
use livesource::media::nal::{H264NaluType, H265NaluType, find_nalu_indices};

const IVF_SIGNATURE: &[u8; 4] = b"DKIF";
const IVF_FRAME_HEADER_LEN: usize = 12;

/// One chunk per picture, in file order.
pub fn split(codec: Codec, data: &[u8]) -> io::Result<Vec<Vec<u8>>> {
    match codec {
        Codec::H264 => Ok(access_units(data, |h| {
            matches!(
                H264NaluType::from_header(h),
                H264NaluType::Slice | H264NaluType::Idr
            )
        })),
        Codec::H265 => Ok(access_units(data, |h| {
            matches!(
                H265NaluType::from_header(h),
                H265NaluType::Slice | H265NaluType::Irap
            )
        })),
        Codec::Jpeg => Ok(jpeg_pictures(data)),
        Codec::Vp9 => ivf_frames(data),
    }
}

/// Group NAL units so each chunk ends with a coded slice. Parameter sets
/// and SEI travel with the slice that follows them.
fn access_units(data: &[u8], is_slice: impl Fn(u8) -> bool) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let mut pending: Vec<u8> = Vec::new();
    for index in find_nalu_indices(data) {
        if index.payload(data).is_empty() {
            continue;
        }
        pending.extend_from_slice(index.with_start_code(data));
        if is_slice(index.header_byte(data)) {
            chunks.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        chunks.push(pending);
    }
    chunks
}

/// Concatenated JPEG files, SOI to EOI.
fn jpeg_pictures(data: &[u8]) -> Vec<Vec<u8>> {
    let mut pictures = Vec::new();
    let mut pos = 0;
    while let Some(start) = find(data, pos, &[0xff, 0xd8]) {
        let Some(end) = find(data, start + 2, &[0xff, 0xd9]) else {
            tracing::warn!(offset = start, "truncated JPEG at end of input");
            break;
        };
        pictures.push(data[start..end + 2].to_vec());
        pos = end + 2;
    }
    pictures
}

fn find(data: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    data.get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Frames of an IVF container.
fn ivf_frames(data: &[u8]) -> io::Result<Vec<Vec<u8>>> {
    if data.len() < 32 || &data[..4] != IVF_SIGNATURE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "not an IVF file",
        ));
    }
    let header_len = u16::from_le_bytes([data[6], data[7]]) as usize;
    let mut pos = header_len.max(32);
    let mut frames = Vec::new();
    while pos + IVF_FRAME_HEADER_LEN <= data.len() {
        let size =
            u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        let start = pos + IVF_FRAME_HEADER_LEN;
        let Some(frame) = data.get(start..start + size) else {
            tracing::warn!(offset = pos, size, "truncated IVF frame at end of input");
            break;
        };
        frames.push(frame.to_vec());
        pos = start + size;
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn annexb(units: &[&[u8]]) -> Vec<u8> {
        units
            .iter()
            .flat_map(|u| [0u8, 0, 0, 1].iter().chain(u.iter()).copied())
            .collect()
    }

    #[test]
    fn h264_parameter_sets_ride_with_next_slice() {
        let sps: &[u8] = &[0x67, 0x42];
        let pps: &[u8] = &[0x68, 0xce];
        let idr: &[u8] = &[0x65, 0x88];
        let slice: &[u8] = &[0x41, 0x9a];
        let data = annexb(&[sps, pps, idr, slice, slice]);

        let chunks = split(Codec::H264, &data).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], annexb(&[sps, pps, idr]));
        assert_eq!(chunks[2], annexb(&[slice]));
    }

    #[test]
    fn h265_groups_by_slice() {
        let vps: &[u8] = &[0x40, 0x01];
        let idr: &[u8] = &[0x26, 0x01];
        let trail: &[u8] = &[0x02, 0x01];
        let data = annexb(&[vps, idr, trail]);
        let chunks = split(Codec::H265, &data).unwrap();
        assert_eq!(chunks, vec![annexb(&[vps, idr]), annexb(&[trail])]);
    }

    #[test]
    fn jpeg_split_on_markers() {
        let a = [0xff, 0xd8, 1, 2, 0xff, 0xd9];
        let b = [0xff, 0xd8, 3, 0xff, 0xd9];
        let mut data = a.to_vec();
        data.extend_from_slice(&b);
        data.extend_from_slice(&[0xff, 0xd8, 9]);
        assert_eq!(split(Codec::Jpeg, &data).unwrap(), vec![a.to_vec(), b.to_vec()]);
    }

    #[test]
    fn ivf_frames_are_extracted() {
        let mut data = Vec::new();
        data.extend_from_slice(b"DKIF");
        data.extend_from_slice(&0u16.to_le_bytes());
        data.extend_from_slice(&32u16.to_le_bytes());
        data.extend_from_slice(b"VP90");
        data.resize(32, 0);
        for frame in [&[0x82u8, 0x49, 0x83][..], &[0x86, 0x00][..]] {
            data.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            data.extend_from_slice(&[0; 8]);
            data.extend_from_slice(frame);
        }
        let frames = split(Codec::Vp9, &data).unwrap();
        assert_eq!(frames, vec![vec![0x82, 0x49, 0x83], vec![0x86, 0x00]]);
    }

    #[test]
    fn ivf_requires_signature() {
        assert!(split(Codec::Vp9, &[0; 40]).is_err());
    }
}
