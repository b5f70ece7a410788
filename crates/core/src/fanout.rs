use std::sync::Arc;

use parking_lot::RwLock;

use crate::picture::DecodedPicture;

/// A consumer of decoded pictures.
///
/// Called from the decode engine's completion thread (or the transport
/// thread for inline-decoded codecs). Implementations should hand the
/// picture off quickly.
pub trait VideoSink: Send + Sync {
    fn on_frame(&self, picture: &Arc<DecodedPicture>);
}

/// Delivery preferences of one consumer.
///
/// Advisory only: the pipeline records them so a downstream scaler can
/// honour them, it does not resize anything itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkWants {
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    pub max_framerate: Option<u32>,
}

struct Registration {
    sink: Arc<dyn VideoSink>,
    wants: SinkWants,
}

fn same_sink(a: &Arc<dyn VideoSink>, b: &Arc<dyn VideoSink>) -> bool {
    // Compare data pointers only; vtable pointers are not unique.
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// One-to-many delivery of decoded pictures.
///
/// Registration and removal may race with [`deliver`](Self::deliver); a
/// delivery in progress works on the consumer list as it was when it
/// started.
#[derive(Default)]
pub struct FanoutSink {
    sinks: RwLock<Vec<Registration>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sink`, or update its preferences if already registered.
    pub fn add_or_update(&self, sink: Arc<dyn VideoSink>, wants: SinkWants) {
        let mut sinks = self.sinks.write();
        match sinks.iter_mut().find(|r| same_sink(&r.sink, &sink)) {
            Some(existing) => {
                existing.wants = wants;
                tracing::debug!(?wants, "sink preferences updated");
            }
            None => {
                sinks.push(Registration { sink, wants });
                tracing::debug!(?wants, sinks = sinks.len(), "sink added");
            }
        }
    }

    /// Unregister `sink`. Returns `false` if it was not registered.
    pub fn remove(&self, sink: &Arc<dyn VideoSink>) -> bool {
        let mut sinks = self.sinks.write();
        match sinks.iter().position(|r| same_sink(&r.sink, sink)) {
            Some(pos) => {
                sinks.swap_remove(pos);
                tracing::debug!(sinks = sinks.len(), "sink removed");
                true
            }
            None => false,
        }
    }

    /// Preferences recorded for `sink`.
    pub fn wants(&self, sink: &Arc<dyn VideoSink>) -> Option<SinkWants> {
        self.sinks
            .read()
            .iter()
            .find(|r| same_sink(&r.sink, sink))
            .map(|r| r.wants)
    }

    pub fn len(&self) -> usize {
        self.sinks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.read().is_empty()
    }

    /// Forward the same picture to every registered sink.
    ///
    /// The lock is released before any sink runs, so a sink may register
    /// or remove consumers from inside `on_frame`. Returns the number of
    /// sinks reached.
    pub fn deliver(&self, picture: DecodedPicture) -> usize {
        let targets: Vec<Arc<dyn VideoSink>> =
            self.sinks.read().iter().map(|r| Arc::clone(&r.sink)).collect();
        if targets.is_empty() {
            return 0;
        }
        let picture = Arc::new(picture);
        for sink in &targets {
            sink.on_frame(&picture);
        }
        targets.len()
    }
}
