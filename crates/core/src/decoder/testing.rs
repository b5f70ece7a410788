//! Recording decode engine for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::error::{IngestError, Result};
use crate::media::{CodedFrame, FormatDescriptor};
use crate::picture::{DecodedPicture, PictureBuffer};

use super::{
    DecodeCompleteCallback, DecoderCapabilities, DecoderFactory, DecoderSettings, VideoDecoder,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EngineEvent {
    Create(FormatDescriptor),
    Configure(DecoderSettings),
    Decode(u64),
    Destroy(FormatDescriptor),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct EngineLog(Arc<Mutex<Vec<EngineEvent>>>);

impl EngineLog {
    fn push(&self, event: EngineEvent) {
        self.0.lock().push(event);
    }

    pub(crate) fn events(&self) -> Vec<EngineEvent> {
        self.0.lock().clone()
    }
}

pub(crate) struct RecordingFactory {
    log: EngineLog,
    failures_left: AtomicUsize,
    capabilities: DecoderCapabilities,
}

impl RecordingFactory {
    pub(crate) fn new(log: EngineLog) -> Self {
        Self::failing(log, 0)
    }

    /// A factory whose first `failures` create calls fail.
    pub(crate) fn failing(log: EngineLog, failures: usize) -> Self {
        Self {
            log,
            failures_left: AtomicUsize::new(failures),
            capabilities: DecoderCapabilities::default(),
        }
    }

    pub(crate) fn with_capabilities(mut self, capabilities: DecoderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl DecoderFactory for RecordingFactory {
    fn create_decoder(&self, format: &FormatDescriptor) -> Result<Box<dyn VideoDecoder>> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(IngestError::Decode {
                reason: "engine unavailable".to_string(),
            });
        }
        self.log.push(EngineEvent::Create(*format));
        Ok(Box::new(RecordingDecoder {
            format: *format,
            log: self.log.clone(),
            callback: None,
        }))
    }

    fn implementation_name(&self) -> &str {
        "RecordingDecoder"
    }

    fn capabilities(&self) -> DecoderCapabilities {
        self.capabilities
    }
}

struct RecordingDecoder {
    format: FormatDescriptor,
    log: EngineLog,
    callback: Option<Arc<dyn DecodeCompleteCallback>>,
}

impl VideoDecoder for RecordingDecoder {
    fn configure(&mut self, settings: &DecoderSettings) -> Result<()> {
        self.log.push(EngineEvent::Configure(*settings));
        Ok(())
    }

    fn register_decode_complete_callback(&mut self, callback: Arc<dyn DecodeCompleteCallback>) {
        self.callback = Some(callback);
    }

    fn decode(&mut self, frame: &CodedFrame) -> Result<()> {
        self.log.push(EngineEvent::Decode(frame.timestamp_ms));
        if let Some(callback) = &self.callback {
            callback.decoded(DecodedPicture::new(
                PictureBuffer::Encoded(frame.data.clone()),
                self.format.width,
                self.format.height,
                frame.timestamp_ms,
            ));
        }
        Ok(())
    }

    fn implementation_name(&self) -> &str {
        "RecordingDecoder"
    }
}

impl Drop for RecordingDecoder {
    fn drop(&mut self) {
        self.log.push(EngineEvent::Destroy(self.format));
    }
}
