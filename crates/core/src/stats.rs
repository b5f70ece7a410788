//! Pipeline counters shared by the transport side, the decode worker and
//! the playout callback.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct IngestStats {
    frames_enqueued: AtomicU64,
    frames_dropped: AtomicU64,
    decode_errors: AtomicU64,
    decoders_created: AtomicU64,
    pictures_delivered: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_enqueued: u64,
    /// No decoder, timestamp regression or unknown session.
    pub frames_dropped: u64,
    pub decode_errors: u64,
    pub decoders_created: u64,
    pub pictures_delivered: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn frame_enqueued(&self) {
        self.frames_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn frame_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn decoder_created(&self) {
        self.decoders_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn picture_delivered(&self) {
        self.pictures_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_enqueued: self.frames_enqueued.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            decoders_created: self.decoders_created.load(Ordering::Relaxed),
            pictures_delivered: self.pictures_delivered.load(Ordering::Relaxed),
        }
    }
}
