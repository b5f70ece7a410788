//! Passthrough decode engine.
//!
//! [`NullDecoder`] does not decode anything: every coded frame comes back
//! immediately, on the calling thread, as a picture whose buffer is the
//! still-encoded payload sized to the configured resolution. Useful to
//! exercise the pipeline without a real engine, and for relaying streams
//! whose consumers decode themselves.

use std::sync::Arc;

use crate::error::{IngestError, Result};
use crate::media::{CodedFrame, FormatDescriptor};
use crate::picture::{DecodedPicture, PictureBuffer};

use super::{
    DecodeCompleteCallback, DecoderCapabilities, DecoderFactory, DecoderSettings, VideoDecoder,
};

const NAME: &str = "NullDecoder";

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDecoderFactory;

impl DecoderFactory for NullDecoderFactory {
    fn create_decoder(&self, format: &FormatDescriptor) -> Result<Box<dyn VideoDecoder>> {
        tracing::debug!(%format, "creating null decoder");
        Ok(Box::new(NullDecoder::default()))
    }

    fn implementation_name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> DecoderCapabilities {
        DecoderCapabilities {
            tolerates_timestamp_regression: true,
        }
    }
}

#[derive(Default)]
pub struct NullDecoder {
    settings: Option<DecoderSettings>,
    callback: Option<Arc<dyn DecodeCompleteCallback>>,
}

impl VideoDecoder for NullDecoder {
    fn configure(&mut self, settings: &DecoderSettings) -> Result<()> {
        self.settings = Some(*settings);
        Ok(())
    }

    fn register_decode_complete_callback(&mut self, callback: Arc<dyn DecodeCompleteCallback>) {
        self.callback = Some(callback);
    }

    fn decode(&mut self, frame: &CodedFrame) -> Result<()> {
        let settings = self.settings.ok_or_else(|| IngestError::Decode {
            reason: "decoder not configured".to_string(),
        })?;
        let callback = self.callback.as_ref().ok_or_else(|| IngestError::Decode {
            reason: "no decode complete callback".to_string(),
        })?;

        callback.decoded(DecodedPicture::new(
            PictureBuffer::Encoded(frame.data.clone()),
            settings.width,
            settings.height,
            frame.timestamp_ms,
        ));
        Ok(())
    }

    fn implementation_name(&self) -> &str {
        NAME
    }
}
