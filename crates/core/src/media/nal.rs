//! Annex B bitstream scanning.
//!
//! H.264 and H.265 elementary streams delimit NAL units with start codes:
//! - 4-byte: `0x00 0x00 0x00 0x01`
//! - 3-byte: `0x00 0x00 0x01`
//!
//! [`find_nalu_indices`] locates every unit and returns [`NaluIndex`] views
//! into the caller's buffer. Nothing is copied and the buffer is never
//! mutated. Bytes after the last start code belong to the last unit.

/// Start code prepended to parameter sets and frames handed to decoders.
pub const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// Location of one NAL unit inside an Annex B buffer.
///
/// Only meaningful for the buffer it was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NaluIndex {
    /// Offset of the first start-code byte.
    pub start_offset: usize,
    /// Offset of the NAL header (first byte after the start code).
    pub payload_start_offset: usize,
    /// Length of the NAL unit, header included, start code excluded.
    pub payload_size: usize,
}

impl NaluIndex {
    /// The NAL unit without its start code.
    pub fn payload<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.payload_start_offset..self.payload_end()]
    }

    /// The NAL unit including its start code, as forwarded to decoders.
    pub fn with_start_code<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start_offset..self.payload_end()]
    }

    /// First byte of the NAL header.
    pub fn header_byte(&self, data: &[u8]) -> u8 {
        data[self.payload_start_offset]
    }

    fn payload_end(&self) -> usize {
        self.payload_start_offset + self.payload_size
    }
}

/// Find every start-code-delimited NAL unit in `data`, in stream order.
///
/// The start code length is tracked per unit so that boundaries between
/// adjacent units are computed correctly when 3-byte and 4-byte start codes
/// are mixed. Empty units (two start codes back to back) are skipped.
pub fn find_nalu_indices(data: &[u8]) -> Vec<NaluIndex> {
    // (payload_start_offset, start_code_length)
    let mut starts: Vec<(usize, usize)> = Vec::new();
    let mut i = 0usize;

    while i < data.len() {
        if i + 3 < data.len() && data[i..i + 4] == START_CODE {
            starts.push((i + 4, 4));
            i += 4;
        } else if i + 2 < data.len() && data[i..i + 3] == [0, 0, 1] {
            starts.push((i + 3, 3));
            i += 3;
        } else {
            i += 1;
        }
    }

    let mut indices = Vec::with_capacity(starts.len());
    for (idx, &(payload_start, sc_len)) in starts.iter().enumerate() {
        let end = match starts.get(idx + 1) {
            Some(&(next_start, next_sc_len)) => next_start - next_sc_len,
            None => data.len(),
        };

        if payload_start < end {
            indices.push(NaluIndex {
                start_offset: payload_start - sc_len,
                payload_start_offset: payload_start,
                payload_size: end - payload_start,
            });
        }
    }

    tracing::trace!(bytes = data.len(), nalus = indices.len(), "scanned Annex B buffer");
    indices
}

/// H.264 NAL unit types (ITU-T H.264 Table 7-1) the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H264NaluType {
    /// Coded slice of a non-IDR picture or a data partition (types 1..=4).
    Slice,
    /// Coded slice of an IDR picture (type 5).
    Idr,
    Sei,
    Sps,
    Pps,
    Aud,
    Other(u8),
}

impl H264NaluType {
    /// Classify from the one-byte NAL header (`F|NRI|Type`).
    pub fn from_header(header: u8) -> Self {
        match header & 0x1f {
            1..=4 => Self::Slice,
            5 => Self::Idr,
            6 => Self::Sei,
            7 => Self::Sps,
            8 => Self::Pps,
            9 => Self::Aud,
            other => Self::Other(other),
        }
    }
}

/// H.265 NAL unit types (ITU-T H.265 Table 7-1) the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum H265NaluType {
    /// Non-IRAP VCL NAL unit (types 0..=15).
    Slice,
    /// IRAP picture: BLA, IDR or CRA (types 16..=21).
    Irap,
    Vps,
    Sps,
    Pps,
    Aud,
    /// Prefix or suffix SEI (types 39, 40).
    Sei,
    Other(u8),
}

impl H265NaluType {
    /// Classify from the first byte of the two-byte NAL header
    /// (`F|Type(6)|LayerId high bit`).
    pub fn from_header(header: u8) -> Self {
        match (header >> 1) & 0x3f {
            0..=15 => Self::Slice,
            16..=21 => Self::Irap,
            32 => Self::Vps,
            33 => Self::Sps,
            34 => Self::Pps,
            35 => Self::Aud,
            39 | 40 => Self::Sei,
            other => Self::Other(other),
        }
    }
}
