//! Decode engine capability interfaces.
//!
//! The pipeline never decodes H.264, H.265 or VP9 itself. It drives an
//! external engine through three narrow traits:
//!
//! - [`DecoderFactory`] creates one [`VideoDecoder`] per active format and
//!   advertises [`DecoderCapabilities`].
//! - [`VideoDecoder`] accepts coded frames and reports pictures
//!   asynchronously.
//! - [`DecodeCompleteCallback`] receives those pictures, possibly on a
//!   thread owned by the engine.
//!
//! [`DecoderManager`] owns the single live decoder instance and
//! [`NullDecoderFactory`] is a passthrough engine for tools and tests.

pub mod manager;
pub mod null;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use crate::error::Result;
use crate::media::{Codec, CodedFrame, FormatDescriptor};
use crate::picture::DecodedPicture;

pub use manager::{DecoderManager, FormatOutcome};
pub use null::{NullDecoder, NullDecoderFactory};

/// What an engine can cope with, used to pick pipeline workarounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderCapabilities {
    /// The engine accepts frames whose timestamp is lower than the
    /// previous one. When `false`, the pipeline drops such frames under
    /// [`RegressionPolicy::Auto`](crate::RegressionPolicy::Auto).
    pub tolerates_timestamp_regression: bool,
}

/// Settings passed to [`VideoDecoder::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderSettings {
    pub codec: Codec,
    /// Expected picture width, `0` when the bitstream describes itself.
    pub width: u32,
    /// Expected picture height, `0` when the bitstream describes itself.
    pub height: u32,
}

impl From<&FormatDescriptor> for DecoderSettings {
    fn from(format: &FormatDescriptor) -> Self {
        Self {
            codec: format.codec,
            width: format.width,
            height: format.height,
        }
    }
}

/// Receives decoded pictures from a [`VideoDecoder`].
pub trait DecodeCompleteCallback: Send + Sync {
    fn decoded(&self, picture: DecodedPicture);
}

/// One decoder instance.
///
/// Instances are created, fed and dropped only by the decode worker.
/// Dropping the box releases the engine resources.
pub trait VideoDecoder: Send {
    fn configure(&mut self, settings: &DecoderSettings) -> Result<()>;

    fn register_decode_complete_callback(&mut self, callback: Arc<dyn DecodeCompleteCallback>);

    /// Queue one coded frame. Pictures arrive later through the callback.
    fn decode(&mut self, frame: &CodedFrame) -> Result<()>;

    fn implementation_name(&self) -> &str;
}

/// Creates decoders for a given format.
pub trait DecoderFactory: Send + Sync {
    fn create_decoder(&self, format: &FormatDescriptor) -> Result<Box<dyn VideoDecoder>>;

    /// Human-readable engine name, for logs.
    fn implementation_name(&self) -> &str;

    fn capabilities(&self) -> DecoderCapabilities {
        DecoderCapabilities::default()
    }
}
