//! The decode worker thread.
//!
//! Drains the ingest queue strictly in order and drives the
//! [`DecoderManager`]. The live decoder is created, fed and destroyed only
//! here.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::decoder::{DecoderManager, FormatOutcome};
use crate::error::{IngestError, Result};
use crate::media::{CodedFrame, FormatDescriptor};
use crate::queue::{IngestEvent, IngestReceiver, IngestSender};
use crate::session::{SessionState, SessionTable};
use crate::stats::IngestStats;

const THREAD_NAME: &str = "decode-worker";

/// Handle to a running decode worker.
pub struct DecodeWorker {
    sender: IngestSender,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DecodeWorker {
    /// Start the worker thread on `receiver`.
    pub fn spawn(
        sender: IngestSender,
        receiver: IngestReceiver,
        manager: DecoderManager,
        sessions: SessionTable,
        stats: Arc<IngestStats>,
    ) -> Result<Self> {
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(receiver, manager, sessions, stats))?;
        Ok(Self {
            sender,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Queue the stop sentinel and wait for the worker to exit.
    ///
    /// Events queued before the sentinel are still processed. Calling this
    /// again is a no-op.
    pub fn stop(&self) {
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        // The worker may already have exited on its own.
        let _ = self.sender.send(IngestEvent::Stop);
        if handle.join().is_err() {
            tracing::error!("decode worker panicked");
        }
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    receiver: IngestReceiver,
    mut manager: DecoderManager,
    sessions: SessionTable,
    stats: Arc<IngestStats>,
) {
    tracing::info!("decode worker started");
    loop {
        match receiver.recv() {
            IngestEvent::FormatChange { session_id, format } => {
                on_format(&mut manager, &sessions, &session_id, &format);
            }
            IngestEvent::Frame(frame) => on_frame(&mut manager, &stats, &frame),
            IngestEvent::Stop => break,
        }
    }
    manager.destroy();
    tracing::info!("decode worker stopped");
}

fn on_format(
    manager: &mut DecoderManager,
    sessions: &SessionTable,
    session_id: &str,
    format: &FormatDescriptor,
) {
    match manager.apply_format(format) {
        Ok(FormatOutcome::Created) | Ok(FormatOutcome::Unchanged) => {
            sessions.set_state(session_id, SessionState::Decoding);
        }
        Ok(FormatOutcome::Ignored) => {
            tracing::warn!(session_id, %format, "format without dimensions, decoder unchanged");
        }
        Err(e) => {
            tracing::error!(session_id, %format, error = %e, "cannot create decoder");
            sessions.set_state(session_id, SessionState::AwaitingFormat);
        }
    }
}

fn on_frame(manager: &mut DecoderManager, stats: &IngestStats, frame: &CodedFrame) {
    if frame.data.is_empty() {
        return;
    }
    match manager.submit(frame) {
        Ok(()) => {
            tracing::trace!(ts = frame.timestamp_ms, size = frame.data.len(), key = frame.is_key(), "frame submitted");
        }
        Err(IngestError::NoDecoder) => {
            tracing::warn!(ts = frame.timestamp_ms, "no decoder, frame dropped");
            stats.frame_dropped();
        }
        Err(e) => {
            tracing::error!(ts = frame.timestamp_ms, error = %e, "decode failed");
            stats.decode_error();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecodeCompleteCallback;
    use crate::decoder::testing::{EngineEvent, EngineLog, RecordingFactory};
    use crate::media::{Codec, FrameKind};
    use crate::picture::DecodedPicture;
    use crate::queue::ingest_queue;
    use crate::session::Session;
    use std::time::{Duration, Instant};

    struct Discard;

    impl DecodeCompleteCallback for Discard {
        fn decoded(&self, _picture: DecodedPicture) {}
    }

    struct Harness {
        tx: IngestSender,
        worker: DecodeWorker,
        log: EngineLog,
        sessions: SessionTable,
        stats: Arc<IngestStats>,
    }

    fn harness(factory: RecordingFactory, log: EngineLog) -> Harness {
        let (tx, rx) = ingest_queue();
        let stats = Arc::new(IngestStats::new());
        let sessions = SessionTable::new();
        sessions.insert(Session::new("cam", "video", Codec::H264));
        let manager = DecoderManager::new(Arc::new(factory), Arc::new(Discard), stats.clone());
        let worker =
            DecodeWorker::spawn(tx.clone(), rx, manager, sessions.clone(), stats.clone()).unwrap();
        Harness {
            tx,
            worker,
            log,
            sessions,
            stats,
        }
    }

    fn format(width: u32, height: u32) -> IngestEvent {
        IngestEvent::FormatChange {
            session_id: "cam".to_string(),
            format: FormatDescriptor::new(Codec::H264, width, height),
        }
    }

    fn frame(ts: u64) -> IngestEvent {
        IngestEvent::Frame(CodedFrame::new(vec![0, 0, 0, 1, 0x41], ts, FrameKind::Delta))
    }

    #[test]
    fn frames_reach_decoder_in_arrival_order() {
        let log = EngineLog::default();
        let h = harness(RecordingFactory::new(log.clone()), log);
        h.tx.send(format(320, 240)).unwrap();
        for ts in [100, 110, 105] {
            h.tx.send(frame(ts)).unwrap();
        }
        h.worker.stop();

        let decodes: Vec<_> = h
            .log
            .events()
            .into_iter()
            .filter_map(|e| match e {
                EngineEvent::Decode(ts) => Some(ts),
                _ => None,
            })
            .collect();
        assert_eq!(decodes, vec![100, 110, 105]);
        assert_eq!(h.sessions.state("cam"), Some(SessionState::Decoding));
    }

    #[test]
    fn format_change_destroys_then_creates_before_next_frame() {
        let log = EngineLog::default();
        let h = harness(RecordingFactory::new(log.clone()), log);
        let hd = FormatDescriptor::new(Codec::H264, 1280, 720);
        let fhd = FormatDescriptor::new(Codec::H264, 1920, 1080);

        h.tx.send(format(1280, 720)).unwrap();
        h.tx.send(frame(1)).unwrap();
        h.tx.send(format(1920, 1080)).unwrap();
        h.tx.send(frame(2)).unwrap();
        h.worker.stop();

        let events = h.log.events();
        let tail: Vec<_> = events
            .iter()
            .skip_while(|e| **e != EngineEvent::Decode(1))
            .filter(|e| !matches!(e, EngineEvent::Configure(_)))
            .cloned()
            .collect();
        assert_eq!(
            tail,
            vec![
                EngineEvent::Decode(1),
                EngineEvent::Destroy(hd),
                EngineEvent::Create(fhd),
                EngineEvent::Decode(2),
                EngineEvent::Destroy(fhd),
            ]
        );
    }

    #[test]
    fn frames_without_decoder_are_dropped() {
        let log = EngineLog::default();
        let h = harness(RecordingFactory::failing(log.clone(), 1), log);
        h.tx.send(frame(1)).unwrap();
        h.tx.send(format(640, 480)).unwrap();
        h.tx.send(frame(2)).unwrap();
        h.worker.stop();

        assert_eq!(h.stats.snapshot().frames_dropped, 2);
        assert!(h.log.events().is_empty());
        assert_eq!(h.sessions.state("cam"), Some(SessionState::AwaitingFormat));
    }

    #[test]
    fn stop_unblocks_idle_worker_and_is_idempotent() {
        let log = EngineLog::default();
        let h = harness(RecordingFactory::new(log.clone()), log);
        std::thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        h.worker.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!h.worker.is_running());

        h.worker.stop();
        assert!(matches!(h.tx.send(frame(9)), Err(IngestError::Stopped)));
    }

    #[test]
    fn events_after_stop_are_not_processed() {
        let log = EngineLog::default();
        let h = harness(RecordingFactory::new(log.clone()), log);
        h.tx.send(format(320, 240)).unwrap();
        h.tx.send(IngestEvent::Stop).unwrap();
        let _ = h.tx.send(frame(1));
        h.worker.stop();
        assert!(!h.log.events().contains(&EngineEvent::Decode(1)));
    }
}
