//! Ingest queue between transport threads and the decode worker.
//!
//! An unbounded FIFO: producers never block, the single consumer blocks
//! while it is empty. [`IngestEvent::Stop`] is an ordinary element, so
//! everything pushed before it is processed and nothing after it is.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::{IngestError, Result};
use crate::media::{CodedFrame, FormatDescriptor};

/// One unit of work for the decode worker.
#[derive(Debug)]
pub enum IngestEvent {
    /// A session announced a (possibly new) format.
    FormatChange {
        session_id: String,
        format: FormatDescriptor,
    },
    /// A coded frame to submit to the live decoder.
    Frame(CodedFrame),
    /// Terminates the worker loop.
    Stop,
}

/// Producer half. Cheap to clone.
#[derive(Debug, Clone)]
pub struct IngestSender {
    tx: Sender<IngestEvent>,
}

/// Consumer half, owned by the decode worker.
#[derive(Debug)]
pub struct IngestReceiver {
    rx: Receiver<IngestEvent>,
}

pub fn ingest_queue() -> (IngestSender, IngestReceiver) {
    let (tx, rx) = unbounded();
    (IngestSender { tx }, IngestReceiver { rx })
}

impl IngestSender {
    /// Append an event. Fails with [`IngestError::Stopped`] once the
    /// worker is gone.
    pub fn send(&self, event: IngestEvent) -> Result<()> {
        self.tx.send(event).map_err(|_| IngestError::Stopped)
    }

    /// Number of events waiting.
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

impl IngestReceiver {
    /// Block until the next event. A queue with no producers left reads
    /// as [`IngestEvent::Stop`].
    pub fn recv(&self) -> IngestEvent {
        self.rx.recv().unwrap_or(IngestEvent::Stop)
    }
}
