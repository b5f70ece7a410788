use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use crate::decoder::DecodeCompleteCallback;
use crate::fanout::FanoutSink;
use crate::pacer::PlayoutPacer;
use crate::picture::DecodedPicture;
use crate::stats::IngestStats;

/// Decode-completion handler: paces each picture, then fans it out.
///
/// Runs on whatever thread produced the picture (the engine's callback
/// thread, the decode worker for synchronous engines, or the transport
/// thread for inline JPEG). Pacing sleeps block that thread only.
pub struct Playout {
    pacer: Mutex<PlayoutPacer>,
    fanout: FanoutSink,
    stats: Arc<IngestStats>,
}

impl Playout {
    pub fn new(pacer: PlayoutPacer, stats: Arc<IngestStats>) -> Self {
        Self {
            pacer: Mutex::new(pacer),
            fanout: FanoutSink::new(),
            stats,
        }
    }

    pub fn fanout(&self) -> &FanoutSink {
        &self.fanout
    }
}

impl DecodeCompleteCallback for Playout {
    fn decoded(&self, picture: DecodedPicture) {
        let timestamp_ms = picture.timestamp_ms;
        let delay = {
            let pacer = self.pacer.lock();
            pacer.delay_for(timestamp_ms, pacer.now_ms())
        };
        tracing::trace!(
            ts = timestamp_ms,
            width = picture.width,
            height = picture.height,
            delay_ms = delay.as_millis() as u64,
            "picture decoded"
        );
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        self.fanout.deliver(picture);
        self.stats.picture_delivered();

        let mut pacer = self.pacer.lock();
        let now = pacer.now_ms();
        pacer.record(timestamp_ms, now);
    }
}
