//! Decoded picture types handed from the decode engine to playout.

use bytes::Bytes;

// BT.601 limited-range coefficients, 8-bit fixed point.
const Y_R: i32 = 66;
const Y_G: i32 = 129;
const Y_B: i32 = 25;
const CB_R: i32 = -38;
const CB_G: i32 = -74;
const CB_B: i32 = 112;
const CR_R: i32 = 112;
const CR_G: i32 = -94;
const CR_B: i32 = -18;

/// Planar 4:2:0 picture with tightly packed rows.
///
/// Chroma planes are `(width + 1) / 2` by `(height + 1) / 2`, so odd sizes
/// keep their last column and row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I420Buffer {
    width: u32,
    height: u32,
    y: Vec<u8>,
    u: Vec<u8>,
    v: Vec<u8>,
}

impl I420Buffer {
    /// A black picture.
    pub fn new(width: u32, height: u32) -> Self {
        let luma = width as usize * height as usize;
        let chroma = Self::chroma_len(width, height);
        Self {
            width,
            height,
            y: vec![16; luma],
            u: vec![128; chroma],
            v: vec![128; chroma],
        }
    }

    /// Convert packed RGB24 (`width * 3` bytes per row) to I420.
    ///
    /// Returns `None` if `rgb` is shorter than the picture requires.
    pub fn from_rgb24(rgb: &[u8], width: u32, height: u32) -> Option<Self> {
        let w = width as usize;
        let h = height as usize;
        if rgb.len() < w * h * 3 {
            return None;
        }

        let mut out = Self::new(width, height);
        let stride = w * 3;

        for row in 0..h {
            for col in 0..w {
                let off = row * stride + col * 3;
                let (r, g, b) = (
                    i32::from(rgb[off]),
                    i32::from(rgb[off + 1]),
                    i32::from(rgb[off + 2]),
                );
                let y = ((Y_R * r + Y_G * g + Y_B * b + 128) >> 8) + 16;
                out.y[row * w + col] = y.clamp(0, 255) as u8;
            }
        }

        let cw = out.chroma_width() as usize;
        let ch = out.chroma_height() as usize;
        for cy in 0..ch {
            for cx in 0..cw {
                let (mut sum_r, mut sum_g, mut sum_b, mut count) = (0i32, 0i32, 0i32, 0i32);
                for dy in 0..2 {
                    for dx in 0..2 {
                        let row = cy * 2 + dy;
                        let col = cx * 2 + dx;
                        if row < h && col < w {
                            let off = row * stride + col * 3;
                            sum_r += i32::from(rgb[off]);
                            sum_g += i32::from(rgb[off + 1]);
                            sum_b += i32::from(rgb[off + 2]);
                            count += 1;
                        }
                    }
                }
                let (r, g, b) = (sum_r / count, sum_g / count, sum_b / count);
                let cb = ((CB_R * r + CB_G * g + CB_B * b + 128) >> 8) + 128;
                let cr = ((CR_R * r + CR_G * g + CR_B * b + 128) >> 8) + 128;
                out.u[cy * cw + cx] = cb.clamp(0, 255) as u8;
                out.v[cy * cw + cx] = cr.clamp(0, 255) as u8;
            }
        }

        Some(out)
    }

    fn chroma_len(width: u32, height: u32) -> usize {
        width.div_ceil(2) as usize * height.div_ceil(2) as usize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn chroma_width(&self) -> u32 {
        self.width.div_ceil(2)
    }

    pub fn chroma_height(&self) -> u32 {
        self.height.div_ceil(2)
    }

    pub fn stride_y(&self) -> usize {
        self.width as usize
    }

    pub fn stride_uv(&self) -> usize {
        self.chroma_width() as usize
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    pub fn u(&self) -> &[u8] {
        &self.u
    }

    pub fn v(&self) -> &[u8] {
        &self.v
    }
}

/// Pixel payload of a [`DecodedPicture`].
#[derive(Debug, Clone)]
pub enum PictureBuffer {
    /// Raw 4:2:0 planes.
    I420(I420Buffer),
    /// Still-encoded bytes, from passthrough engines.
    Encoded(Bytes),
}

impl PictureBuffer {
    pub fn len(&self) -> usize {
        match self {
            PictureBuffer::I420(buf) => buf.y.len() + buf.u.len() + buf.v.len(),
            PictureBuffer::Encoded(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A picture ready for playout.
#[derive(Debug, Clone)]
pub struct DecodedPicture {
    pub buffer: PictureBuffer,
    pub width: u32,
    pub height: u32,
    /// Presentation timestamp in milliseconds, carried from the coded frame.
    pub timestamp_ms: u64,
    /// Capture time in milliseconds. Engines that know the sender's capture
    /// clock set it with [`DecodedPicture::with_capture_time`]; otherwise it
    /// equals `timestamp_ms`.
    pub capture_time_ms: u64,
}

impl DecodedPicture {
    pub fn new(buffer: PictureBuffer, width: u32, height: u32, timestamp_ms: u64) -> Self {
        Self {
            buffer,
            width,
            height,
            timestamp_ms,
            capture_time_ms: timestamp_ms,
        }
    }

    pub fn with_capture_time(mut self, capture_time_ms: u64) -> Self {
        self.capture_time_ms = capture_time_ms;
        self
    }
}
