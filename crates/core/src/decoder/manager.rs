use std::sync::Arc;

use crate::error::{IngestError, Result};
use crate::media::{CodedFrame, FormatDescriptor};
use crate::stats::IngestStats;

use super::{DecodeCompleteCallback, DecoderFactory, DecoderSettings, VideoDecoder};

/// Result of [`DecoderManager::apply_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatOutcome {
    /// The live decoder already matches the format.
    Unchanged,
    /// The format cannot drive decoder creation (`0x0` for a codec that
    /// needs explicit dimensions). Nothing was touched.
    Ignored,
    /// Any previous decoder was destroyed and a new one created.
    Created,
}

struct ActiveDecoder {
    format: FormatDescriptor,
    decoder: Box<dyn VideoDecoder>,
}

/// Owns the lifetime of the single live decoder instance.
///
/// At most one decoder exists at any time: a new one is only created after
/// the previous one has been dropped. Only the decode worker touches this.
pub struct DecoderManager {
    factory: Arc<dyn DecoderFactory>,
    callback: Arc<dyn DecodeCompleteCallback>,
    stats: Arc<IngestStats>,
    active: Option<ActiveDecoder>,
}

impl DecoderManager {
    pub fn new(
        factory: Arc<dyn DecoderFactory>,
        callback: Arc<dyn DecodeCompleteCallback>,
        stats: Arc<IngestStats>,
    ) -> Self {
        Self {
            factory,
            callback,
            stats,
            active: None,
        }
    }

    /// Format of the live decoder, if any.
    pub fn active_format(&self) -> Option<FormatDescriptor> {
        self.active.as_ref().map(|a| a.format)
    }

    pub fn has_decoder(&self) -> bool {
        self.active.is_some()
    }

    /// Create and configure a decoder for `format`. Callers destroy the
    /// live decoder first.
    ///
    /// On failure no decoder is live and the error is an
    /// [`IngestError::Init`].
    fn create(&mut self, format: &FormatDescriptor) -> Result<()> {
        debug_assert!(
            self.active.is_none(),
            "decoder created while another one is live"
        );

        let init_error = |e: IngestError| match e {
            IngestError::Init { .. } => e,
            other => IngestError::Init {
                codec: format.codec,
                reason: other.to_string(),
            },
        };

        let mut decoder = self.factory.create_decoder(format).map_err(init_error)?;
        decoder
            .configure(&DecoderSettings::from(format))
            .map_err(init_error)?;
        decoder.register_decode_complete_callback(Arc::clone(&self.callback));

        tracing::info!(
            codec = %format.codec,
            width = format.width,
            height = format.height,
            engine = decoder.implementation_name(),
            "decoder created"
        );
        self.stats.decoder_created();
        self.active = Some(ActiveDecoder {
            format: *format,
            decoder,
        });
        Ok(())
    }

    /// Drop the live decoder. Returns `false` if there was none.
    pub fn destroy(&mut self) -> bool {
        match self.active.take() {
            Some(active) => {
                tracing::info!(format = %active.format, "decoder destroyed");
                drop(active.decoder);
                true
            }
            None => false,
        }
    }

    /// Hand one frame to the live decoder.
    pub fn submit(&mut self, frame: &CodedFrame) -> Result<()> {
        let active = self.active.as_mut().ok_or(IngestError::NoDecoder)?;
        active.decoder.decode(frame).map_err(|e| match e {
            IngestError::Decode { .. } => e,
            other => IngestError::Decode {
                reason: other.to_string(),
            },
        })
    }

    /// React to a format announcement.
    ///
    /// A degenerate format for a codec that needs dimensions is ignored.
    /// A format equal to the live decoder's is a no-op. Anything else
    /// destroys the current decoder (if any) and then creates a new one.
    pub fn apply_format(&mut self, format: &FormatDescriptor) -> Result<FormatOutcome> {
        if !format.is_actionable() {
            tracing::debug!(%format, "ignoring format without dimensions");
            return Ok(FormatOutcome::Ignored);
        }
        if self.active_format().as_ref() == Some(format) {
            return Ok(FormatOutcome::Unchanged);
        }
        self.destroy();
        self.create(format)?;
        Ok(FormatOutcome::Created)
    }
}

impl Drop for DecoderManager {
    fn drop(&mut self) {
        self.destroy();
    }
}
