use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::decoder::{DecodeCompleteCallback, DecoderFactory, DecoderManager};
use crate::error::{IngestError, Result};
use crate::fanout::{SinkWants, VideoSink};
use crate::media::{Assembled, Codec, sprop};
use crate::pacer::PlayoutPacer;
use crate::playout::Playout;
use crate::queue::{IngestEvent, IngestSender, ingest_queue};
use crate::session::{Session, SessionState, SessionTable};
use crate::stats::{IngestStats, StatsSnapshot};
use crate::worker::DecodeWorker;

/// What to do with a frame whose timestamp is lower than the previous
/// emitted frame of the same session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RegressionPolicy {
    /// Drop only if the decode engine does not tolerate regressions.
    #[default]
    Auto,
    /// Always drop.
    Drop,
    /// Never drop.
    Forward,
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Reproduce the source frame cadence at playout.
    pub pacing: bool,
    /// Drifts at or above this are forwarded immediately.
    pub max_pacing_delay: Duration,
    /// Pause after each picture when pacing is off or has no reference yet.
    pub idle_yield: Duration,
    pub timestamp_regression: RegressionPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            pacing: false,
            max_pacing_delay: Duration::from_millis(1000),
            idle_yield: Duration::from_millis(1),
            timestamp_regression: RegressionPolicy::Auto,
        }
    }
}

/// Callbacks a transport client drives.
///
/// Return values tell the transport whether the session or chunk was
/// accepted.
pub trait TransportCallback: Send + Sync {
    /// A media sub-session was negotiated.
    fn on_new_session(&self, session_id: &str, media: &str, codec: &str, sdp: &str) -> bool;

    /// One chunk of elementary stream data for `session_id`.
    fn on_data(&self, session_id: &str, data: &[u8], presentation_time: SystemTime) -> bool;

    /// The transport tore the session down.
    fn on_session_closed(&self, _session_id: &str) {}
}

/// Live video ingest pipeline.
///
/// Transport threads push chunks in through [`TransportCallback`]; a
/// dedicated worker thread decodes; decoded pictures are paced and fanned
/// out to registered [`VideoSink`]s.
pub struct LiveVideoSource {
    config: PipelineConfig,
    sessions: SessionTable,
    sender: IngestSender,
    worker: DecodeWorker,
    playout: Arc<Playout>,
    stats: Arc<IngestStats>,
    drop_regressed: bool,
    stopped: AtomicBool,
}

impl LiveVideoSource {
    pub fn new(factory: Arc<dyn DecoderFactory>) -> Result<Self> {
        Self::with_config(factory, PipelineConfig::default())
    }

    /// Create a pipeline and start its decode worker.
    pub fn with_config(factory: Arc<dyn DecoderFactory>, config: PipelineConfig) -> Result<Self> {
        let stats = Arc::new(IngestStats::new());
        let pacer = PlayoutPacer::new(config.pacing, config.max_pacing_delay, config.idle_yield);
        let playout = Arc::new(Playout::new(pacer, Arc::clone(&stats)));

        let capabilities = factory.capabilities();
        let drop_regressed = match config.timestamp_regression {
            RegressionPolicy::Auto => !capabilities.tolerates_timestamp_regression,
            RegressionPolicy::Drop => true,
            RegressionPolicy::Forward => false,
        };
        tracing::info!(
            engine = factory.implementation_name(),
            pacing = config.pacing,
            drop_regressed,
            "starting live video source"
        );

        let sessions = SessionTable::new();
        let (sender, receiver) = ingest_queue();
        let callback: Arc<dyn DecodeCompleteCallback> = playout.clone();
        let manager = DecoderManager::new(factory, callback, Arc::clone(&stats));
        let worker = DecodeWorker::spawn(
            sender.clone(),
            receiver,
            manager,
            sessions.clone(),
            Arc::clone(&stats),
        )?;

        Ok(Self {
            config,
            sessions,
            sender,
            worker,
            playout,
            stats,
            drop_regressed,
            stopped: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Whether frames with regressed timestamps are dropped.
    pub fn drops_regressed_timestamps(&self) -> bool {
        self.drop_regressed
    }

    pub fn add_or_update_sink(&self, sink: Arc<dyn VideoSink>, wants: SinkWants) {
        self.playout.fanout().add_or_update(sink, wants);
    }

    pub fn remove_sink(&self, sink: &Arc<dyn VideoSink>) -> bool {
        self.playout.fanout().remove(sink)
    }

    pub fn session_state(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.state(session_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the pipeline: every session becomes `Stopped`, the worker
    /// drains what was queued before the stop and exits. Idempotent.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!(sessions = self.sessions.len(), "stopping live video source");
        self.sessions.stop_all();
        self.worker.stop();
    }

    /// Admit a new session. Also feeds parameter sets carried in `sdp`.
    pub fn open_session(&self, session_id: &str, media: &str, codec: &str, sdp: &str) -> Result<()> {
        if self.is_stopped() {
            return Err(IngestError::Stopped);
        }
        if !media.eq_ignore_ascii_case("video") {
            return Err(IngestError::UnsupportedMedia(media.to_string()));
        }
        let codec = Codec::from_name(codec)
            .ok_or_else(|| IngestError::UnsupportedCodec(codec.to_string()))?;

        let (session, _) = self.sessions.insert(Session::new(session_id, media, codec));
        for unit in sprop::init_frames(codec, sdp) {
            if let Err(e) = self.ingest(&session, &unit, 0) {
                tracing::warn!(session_id, error = %e, "cannot apply sprop parameter set");
            }
        }
        Ok(())
    }

    /// Push one chunk of `session_id` through the pipeline.
    pub fn push(&self, session_id: &str, data: &[u8], timestamp_ms: u64) -> Result<()> {
        if self.is_stopped() {
            return Err(IngestError::Stopped);
        }
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| IngestError::UnknownSession(session_id.to_string()))?;
        session.transition(SessionState::CodecKnown, SessionState::AwaitingFormat);
        self.ingest(&session, data, timestamp_ms)
    }

    fn ingest(&self, session: &Session, data: &[u8], timestamp_ms: u64) -> Result<()> {
        for item in session.assemble(data, timestamp_ms)? {
            match item {
                Assembled::Format(format) => {
                    tracing::debug!(session_id = %session.id, %format, "format event");
                    self.sender.send(IngestEvent::FormatChange {
                        session_id: session.id.clone(),
                        format,
                    })?;
                }
                Assembled::Frame(frame) => {
                    if !session.admit_timestamp(frame.timestamp_ms, self.drop_regressed) {
                        tracing::warn!(
                            session_id = %session.id,
                            ts = frame.timestamp_ms,
                            "timestamp went backwards, frame dropped"
                        );
                        self.stats.frame_dropped();
                        continue;
                    }
                    self.sender.send(IngestEvent::Frame(frame))?;
                    self.stats.frame_enqueued();
                }
                Assembled::Picture(picture) => {
                    session.set_state(SessionState::Decoding);
                    self.playout.decoded(picture);
                }
            }
        }
        Ok(())
    }
}

fn to_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl TransportCallback for LiveVideoSource {
    fn on_new_session(&self, session_id: &str, media: &str, codec: &str, sdp: &str) -> bool {
        match self.open_session(session_id, media, codec, sdp) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(session_id, media, codec, error = %e, "session rejected");
                false
            }
        }
    }

    fn on_data(&self, session_id: &str, data: &[u8], presentation_time: SystemTime) -> bool {
        match self.push(session_id, data, to_millis(presentation_time)) {
            Ok(()) => true,
            Err(e @ IngestError::UnknownSession(_)) => {
                tracing::warn!(session_id, error = %e, "data for unknown session dropped");
                self.stats.frame_dropped();
                false
            }
            Err(IngestError::Stopped) => false,
            Err(e) => {
                tracing::warn!(session_id, bytes = data.len(), error = %e, "chunk rejected");
                false
            }
        }
    }

    fn on_session_closed(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }
}

impl Drop for LiveVideoSource {
    fn drop(&mut self) {
        self.stop();
    }
}
