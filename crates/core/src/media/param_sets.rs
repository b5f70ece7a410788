//! Parameter-set cache for H.264 (SPS/PPS) and H.265 (VPS/SPS/PPS).
//!
//! The most recent set of each kind is kept as an Annex B blob
//! (`00 00 00 01` + NAL header + payload) and prepended to key frames so a
//! decoder can start from any IDR, even when the sets were carried in an
//! earlier chunk or in the session description.

use super::nal::START_CODE;

/// Parameter-set kinds, in canonical prepend order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterSetKind {
    Vps,
    Sps,
    Pps,
}

/// Latest parameter sets observed on one session.
#[derive(Debug, Clone, Default)]
pub struct ParameterSetCache {
    requires_vps: bool,
    vps: Option<Vec<u8>>,
    sps: Option<Vec<u8>>,
    pps: Option<Vec<u8>>,
}

impl ParameterSetCache {
    /// Cache for H.264: a snapshot needs SPS and PPS.
    pub fn h264() -> Self {
        Self::default()
    }

    /// Cache for H.265: a snapshot needs VPS, SPS and PPS.
    pub fn h265() -> Self {
        Self {
            requires_vps: true,
            ..Self::default()
        }
    }

    /// Replace the cached blob for `kind` with `nalu` (NAL header + payload,
    /// no start code).
    pub fn observe(&mut self, kind: ParameterSetKind, nalu: &[u8]) {
        let mut blob = Vec::with_capacity(START_CODE.len() + nalu.len());
        blob.extend_from_slice(&START_CODE);
        blob.extend_from_slice(nalu);

        tracing::debug!(?kind, bytes = nalu.len(), "parameter set cached");

        match kind {
            ParameterSetKind::Vps => self.vps = Some(blob),
            ParameterSetKind::Sps => self.sps = Some(blob),
            ParameterSetKind::Pps => self.pps = Some(blob),
        }
    }

    /// Cached blob for `kind`, start code included.
    pub fn get(&self, kind: ParameterSetKind) -> Option<&[u8]> {
        match kind {
            ParameterSetKind::Vps => self.vps.as_deref(),
            ParameterSetKind::Sps => self.sps.as_deref(),
            ParameterSetKind::Pps => self.pps.as_deref(),
        }
    }

    /// Whether every set required by the codec is present.
    pub fn is_complete(&self) -> bool {
        (!self.requires_vps || self.vps.is_some()) && self.sps.is_some() && self.pps.is_some()
    }

    /// Concatenation of all cached sets in VPS, SPS, PPS order.
    ///
    /// Never partial: returns `None` unless [`is_complete`](Self::is_complete).
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        if !self.is_complete() {
            return None;
        }
        let mut out = Vec::new();
        for blob in [&self.vps, &self.sps, &self.pps].into_iter().flatten() {
            out.extend_from_slice(blob);
        }
        Some(out)
    }

    /// Drop every cached set.
    pub fn clear(&mut self) {
        self.vps = None;
        self.sps = None;
        self.pps = None;
    }
}
