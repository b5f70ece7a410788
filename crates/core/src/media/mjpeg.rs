//! Motion JPEG: each transport chunk is one complete JPEG picture.
//!
//! JPEG never goes through the decode engine. The assembler reads the
//! picture size from the frame header, hands the bytes to an
//! [`InlineDecoder`] and emits the resulting picture directly.

use std::io::Cursor;

use image::{ImageFormat, ImageReader};

use crate::error::{IngestError, ParseErrorKind, Result};
use crate::picture::{DecodedPicture, I420Buffer, PictureBuffer};

use super::{Assembled, Codec, FrameAssembler};

const SOI: [u8; 2] = [0xff, 0xd8];

/// Picture size from the frame header of a JPEG image.
pub fn jpeg_dimensions(data: &[u8]) -> std::result::Result<(u32, u32), ParseErrorKind> {
    if !data.starts_with(&SOI) {
        return Err(ParseErrorKind::NotJpeg);
    }
    let (width, height) = ImageReader::with_format(Cursor::new(data), ImageFormat::Jpeg)
        .into_dimensions()
        .map_err(|e| ParseErrorKind::JpegHeader(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(ParseErrorKind::OutOfRange("frame size"));
    }
    Ok((width, height))
}

/// Synchronous decoder for codecs that bypass the decode engine.
pub trait InlineDecoder: Send {
    /// Decode one picture whose header announced `width` x `height`.
    fn decode(&mut self, data: &[u8], width: u32, height: u32) -> Result<PictureBuffer>;
}

/// JPEG decoding through the `image` crate, converted to I420.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageJpegDecoder;

impl InlineDecoder for ImageJpegDecoder {
    fn decode(&mut self, data: &[u8], width: u32, height: u32) -> Result<PictureBuffer> {
        let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg)
            .map_err(|e| IngestError::InlineDecode(e.to_string()))?;
        let rgb = image.to_rgb8();
        if rgb.dimensions() != (width, height) {
            return Err(IngestError::InlineDecode(format!(
                "header says {width}x{height}, image is {}x{}",
                rgb.width(),
                rgb.height()
            )));
        }
        I420Buffer::from_rgb24(rgb.as_raw(), width, height)
            .map(PictureBuffer::I420)
            .ok_or_else(|| IngestError::InlineDecode("short RGB buffer".to_string()))
    }
}

/// Frame assembler for MJPEG sessions.
pub struct JpegAssembler {
    decoder: Box<dyn InlineDecoder>,
}

impl JpegAssembler {
    pub fn new(decoder: Box<dyn InlineDecoder>) -> Self {
        Self { decoder }
    }
}

impl FrameAssembler for JpegAssembler {
    fn codec(&self) -> Codec {
        Codec::Jpeg
    }

    fn assemble(&mut self, data: &[u8], timestamp_ms: u64) -> Result<Vec<Assembled>> {
        let (width, height) = jpeg_dimensions(data)?;
        tracing::trace!(width, height, ts = timestamp_ms, bytes = data.len(), "JPEG picture");
        let buffer = self.decoder.decode(data, width, height)?;
        Ok(vec![Assembled::Picture(DecodedPicture::new(
            buffer,
            width,
            height,
            timestamp_ms,
        ))])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::ExtendedColorType;
    use image::codecs::jpeg::JpegEncoder;

    /// Encode a solid grey JPEG.
    pub(crate) fn grey_jpeg(width: u32, height: u32) -> Vec<u8> {
        let rgb = vec![0x80u8; (width * height * 3) as usize];
        let mut out = Vec::new();
        JpegEncoder::new(&mut out)
            .encode(&rgb, width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn rejects_non_jpeg() {
        assert_eq!(jpeg_dimensions(&[0x00, 0x00, 0x00, 0x01]), Err(ParseErrorKind::NotJpeg));
        assert_eq!(jpeg_dimensions(&[0xff]), Err(ParseErrorKind::NotJpeg));
    }

    #[test]
    fn unreadable_header_after_soi_fails() {
        assert!(matches!(
            jpeg_dimensions(&[0xff, 0xd8, 0x00, 0x01, 0x02, 0x03]),
            Err(ParseErrorKind::JpegHeader(_))
        ));
        let jpeg = grey_jpeg(24, 8);
        assert!(matches!(
            jpeg_dimensions(&jpeg[..6]),
            Err(ParseErrorKind::JpegHeader(_))
        ));
    }

    #[test]
    fn encoded_jpeg_dimensions_match() {
        let jpeg = grey_jpeg(24, 8);
        assert_eq!(jpeg_dimensions(&jpeg), Ok((24, 8)));
    }

    #[test]
    fn image_decoder_produces_i420() {
        let jpeg = grey_jpeg(16, 16);
        match ImageJpegDecoder.decode(&jpeg, 16, 16).unwrap() {
            PictureBuffer::I420(buf) => {
                assert_eq!(buf.y().len(), 256);
                assert_eq!(buf.u().len(), 64);
                assert!(buf.u().iter().all(|&u| (120..=136).contains(&u)));
            }
            other => panic!("expected I420, got {other:?}"),
        }
    }

    #[test]
    fn image_decoder_rejects_size_mismatch() {
        let jpeg = grey_jpeg(16, 16);
        assert!(matches!(
            ImageJpegDecoder.decode(&jpeg, 32, 16),
            Err(IngestError::InlineDecode(_))
        ));
    }

    struct RecordingDecoder(Vec<(u32, u32)>);

    impl InlineDecoder for RecordingDecoder {
        fn decode(&mut self, data: &[u8], width: u32, height: u32) -> Result<PictureBuffer> {
            self.0.push((width, height));
            Ok(PictureBuffer::Encoded(bytes::Bytes::copy_from_slice(data)))
        }
    }

    #[test]
    fn assembler_emits_one_picture_per_chunk() {
        let mut asm = JpegAssembler::new(Box::new(RecordingDecoder(Vec::new())));
        let jpeg = grey_jpeg(8, 8);
        let events = asm.assemble(&jpeg, 1234).unwrap();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Assembled::Picture(p) => {
                assert_eq!((p.width, p.height, p.timestamp_ms), (8, 8, 1234));
            }
            other => panic!("expected picture, got {other:?}"),
        }
    }

    #[test]
    fn assembler_rejects_garbage() {
        let mut asm = JpegAssembler::new(Box::new(ImageJpegDecoder));
        assert!(matches!(
            asm.assemble(&[1, 2, 3], 0),
            Err(IngestError::Parse {
                kind: ParseErrorKind::NotJpeg
            })
        ));
    }
}
