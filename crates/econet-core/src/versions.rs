//! Version-triggered re-fetch bookkeeping.
//!
//! The controller bumps a per-frame-type counter whenever the data behind
//! that type changes and embeds the table in its telemetry. The tracker
//! compares each observed table against the versions last requested and
//! yields the types to re-fetch, in a fixed resolution order that puts
//! the regulator-data schema ahead of every schema-dependent payload.
//!
//! The first observation of a type seeds the requested table without
//! triggering: the driver fetches the initial state explicitly when the
//! handshake completes, and from then on only counter bumps re-fetch.

use std::collections::{HashMap, HashSet};

use econet_proto::{FrameType, payloads::FrameVersions};

/// Types the tracker manages, in resolution order.
pub const RESOLUTION_ORDER: [FrameType; 7] = [
    FrameType::Uid,
    FrameType::RegulatorDataSchema,
    FrameType::EcomaxParameters,
    FrameType::MixerParameters,
    FrameType::ThermostatParameters,
    FrameType::Schedules,
    FrameType::Alerts,
];

/// Observed/requested version tables with in-flight suppression.
#[derive(Debug, Default)]
pub struct VersionTracker {
    observed: HashMap<FrameType, u16>,
    requested: HashMap<FrameType, u16>,
    in_flight: HashSet<FrameType>,
    /// Types whose last request failed; they re-trigger on the next
    /// observation even without a counter bump.
    failed: HashSet<FrameType>,
}

impl VersionTracker {
    /// Fresh tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound version table and return the frame types whose
    /// observed version diverges from the last-requested one, skipping
    /// types with a request already in flight.
    pub fn observe(&mut self, versions: &FrameVersions) -> Vec<FrameType> {
        for (code, version) in &versions.entries {
            // Type identifiers are u16 on the wire; every managed code
            // fits a byte, anything else passes through unmanaged.
            let frame_type = u8::try_from(*code).ok().and_then(FrameType::from_code);
            let Some(frame_type) = frame_type else { continue };
            if !RESOLUTION_ORDER.contains(&frame_type) {
                continue;
            }
            self.observed.insert(frame_type, *version);
            // First sight seeds the baseline; only later bumps diverge.
            self.requested.entry(frame_type).or_insert(*version);
        }

        RESOLUTION_ORDER
            .iter()
            .copied()
            .filter(|ft| {
                if self.in_flight.contains(ft) {
                    return false;
                }
                if self.failed.contains(ft) {
                    return true;
                }
                match (self.observed.get(ft), self.requested.get(ft)) {
                    (Some(observed), Some(requested)) => observed != requested,
                    _ => false,
                }
            })
            .collect()
    }

    /// Record that a request for `frame_type` was enqueued at the
    /// currently-observed version.
    pub fn mark_requested(&mut self, frame_type: FrameType) {
        if let Some(version) = self.observed.get(&frame_type) {
            self.requested.insert(frame_type, *version);
        }
        self.failed.remove(&frame_type);
        self.in_flight.insert(frame_type);
    }

    /// Record that the response for `frame_type` arrived.
    pub fn acknowledge(&mut self, frame_type: FrameType) {
        self.in_flight.remove(&frame_type);
    }

    /// Record that the request for `frame_type` failed; the next
    /// observation triggers it again.
    pub fn request_failed(&mut self, frame_type: FrameType) {
        self.in_flight.remove(&frame_type);
        self.failed.insert(frame_type);
    }

    /// True while a request for `frame_type` awaits its response.
    #[must_use]
    pub fn is_in_flight(&self, frame_type: FrameType) -> bool {
        self.in_flight.contains(&frame_type)
    }

    /// Forget everything, e.g. across a reconnect.
    pub fn reset(&mut self) {
        self.observed.clear();
        self.requested.clear();
        self.in_flight.clear();
        self.failed.clear();
    }
}
