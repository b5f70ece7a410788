//! Per-pipeline session table.
//!
//! A session is one negotiated video stream of the transport. It binds a
//! session id to a codec and to that codec's [`FrameAssembler`], and tracks
//! where the stream is in its lifecycle:
//!
//! ```text
//! on_new_session           -> CodecKnown
//! first chunk accepted     -> AwaitingFormat
//! decoder created          -> Decoding
//! decoder creation failed  -> AwaitingFormat
//! FormatChange             -> Decoding (decoder recreated)
//! stop                     -> Stopped   (from any state, terminal)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::media::{self, Assembled, Codec, FrameAssembler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Codec negotiated, no data yet.
    CodecKnown,
    /// Data flowing, waiting for a decoder to be created.
    AwaitingFormat,
    /// A decoder for the session's format is live.
    Decoding,
    /// The pipeline was stopped.
    Stopped,
}

/// One video stream of the transport.
pub struct Session {
    pub id: String,
    /// Media kind announced by the transport (always `video` once admitted).
    pub media: String,
    pub codec: Codec,
    state: RwLock<SessionState>,
    assembler: Mutex<Box<dyn FrameAssembler>>,
    /// Timestamp of the last frame handed to the ingest queue.
    last_emitted_ms: Mutex<Option<u64>>,
}

impl Session {
    /// Create a session with the default assembler for `codec`.
    pub fn new(id: &str, media: &str, codec: Codec) -> Self {
        Self::with_assembler(id, media, media::new_assembler(codec))
    }

    pub fn with_assembler(id: &str, media: &str, assembler: Box<dyn FrameAssembler>) -> Self {
        Self {
            id: id.to_string(),
            media: media.to_string(),
            codec: assembler.codec(),
            state: RwLock::new(SessionState::CodecKnown),
            assembler: Mutex::new(assembler),
            last_emitted_ms: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Move to `next`. `Stopped` is terminal and never left.
    pub fn set_state(&self, next: SessionState) {
        let mut state = self.state.write();
        if *state == SessionState::Stopped || *state == next {
            return;
        }
        tracing::debug!(session_id = %self.id, from = ?*state, to = ?next, "session state");
        *state = next;
    }

    /// Move to `next` only if the session is currently in `from`.
    pub fn transition(&self, from: SessionState, next: SessionState) -> bool {
        let mut state = self.state.write();
        if *state != from {
            return false;
        }
        tracing::debug!(session_id = %self.id, from = ?from, to = ?next, "session state");
        *state = next;
        true
    }

    /// Run one chunk through the session's assembler.
    pub fn assemble(&self, data: &[u8], timestamp_ms: u64) -> Result<Vec<Assembled>> {
        self.assembler.lock().assemble(data, timestamp_ms)
    }

    /// Decide whether a frame with `timestamp_ms` may be emitted.
    ///
    /// With `drop_regressed`, a frame older than the last emitted one is
    /// refused and does not become the new reference.
    pub fn admit_timestamp(&self, timestamp_ms: u64, drop_regressed: bool) -> bool {
        let mut last = self.last_emitted_ms.lock();
        if drop_regressed && last.is_some_and(|prev| timestamp_ms < prev) {
            return false;
        }
        *last = Some(timestamp_ms);
        true
    }
}

/// Sessions of one pipeline, keyed by transport session id.
#[derive(Clone, Default)]
pub struct SessionTable {
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session`, returning the one it replaced, if any.
    pub fn insert(&self, session: Session) -> (Arc<Session>, Option<Arc<Session>>) {
        let session = Arc::new(session);
        let replaced = self
            .sessions
            .write()
            .insert(session.id.clone(), Arc::clone(&session));
        tracing::info!(
            session_id = %session.id,
            media = %session.media,
            codec = %session.codec,
            replaced = replaced.is_some(),
            "session created"
        );
        (session, replaced)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn remove(&self, id: &str) -> Option<Arc<Session>> {
        let removed = self.sessions.write().remove(id);
        if removed.is_some() {
            tracing::info!(session_id = id, "session removed");
        }
        removed
    }

    pub fn state(&self, id: &str) -> Option<SessionState> {
        self.get(id).map(|s| s.state())
    }

    /// Set the state of `id`, if it still exists.
    pub fn set_state(&self, id: &str, state: SessionState) {
        if let Some(session) = self.get(id) {
            session.set_state(state);
        }
    }

    /// Move every session to `Stopped`.
    pub fn stop_all(&self) {
        for session in self.sessions.read().values() {
            session.set_state(SessionState::Stopped);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_knows_its_codec() {
        let session = Session::new("cam1", "video", Codec::H265);
        assert_eq!(session.codec, Codec::H265);
        assert_eq!(session.state(), SessionState::CodecKnown);
    }

    #[test]
    fn stopped_is_terminal() {
        let session = Session::new("cam1", "video", Codec::H264);
        session.set_state(SessionState::AwaitingFormat);
        session.set_state(SessionState::Decoding);
        session.set_state(SessionState::Stopped);
        session.set_state(SessionState::Decoding);
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!session.transition(SessionState::CodecKnown, SessionState::AwaitingFormat));
    }

    #[test]
    fn regression_check_compares_with_last_emitted() {
        let session = Session::new("cam1", "video", Codec::H264);
        assert!(session.admit_timestamp(100, true));
        assert!(session.admit_timestamp(110, true));
        assert!(!session.admit_timestamp(105, true));
        // 105 was refused, so 108 is still behind 110.
        assert!(!session.admit_timestamp(108, true));
        assert!(session.admit_timestamp(110, true), "equal is not a regression");
        assert!(session.admit_timestamp(50, false));
    }

    #[test]
    fn insert_replaces_existing_binding() {
        let table = SessionTable::new();
        let (_, replaced) = table.insert(Session::new("s1", "video", Codec::H264));
        assert!(replaced.is_none());
        let (_, replaced) = table.insert(Session::new("s1", "video", Codec::Vp9));
        assert_eq!(replaced.map(|s| s.codec), Some(Codec::H264));
        assert_eq!(table.get("s1").map(|s| s.codec), Some(Codec::Vp9));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_state_and_removal() {
        let table = SessionTable::new();
        table.insert(Session::new("a", "video", Codec::H264));
        table.insert(Session::new("b", "video", Codec::Jpeg));

        table.set_state("a", SessionState::Decoding);
        table.set_state("missing", SessionState::Decoding);
        assert_eq!(table.state("a"), Some(SessionState::Decoding));

        table.stop_all();
        assert_eq!(table.state("b"), Some(SessionState::Stopped));

        assert!(table.remove("a").is_some());
        assert!(table.remove("a").is_none());
        assert_eq!(table.ids(), vec!["b".to_string()]);
        assert!(!table.is_empty());
    }
}
