//! Session layer state machine.
//!
//! Manages the connection lifecycle against the controller: the passive
//! handshake, keep-alive supervision, and reconnect backoff. Uses the
//! action pattern: methods take time as input and return actions for the
//! driver to execute. This keeps the state machine pure (no I/O) and
//! makes testing straightforward.
//!
//! # State machine
//!
//! ```text
//! ┌──────────────┐ connect ┌────────────┐ transport ┌───────────┐
//! │ Disconnected │────────>│ Connecting │──────────>│ Handshake │
//! └──────────────┘         └────────────┘   open    └───────────┘
//!        ^                       ^                        │
//!        │                       │ transport error   SensorData
//!        │                       │ / keep-alive           │
//!        │                  ┌────┴───┐                ┌───▼───┐
//!        │     close        │ Ready  │<───────────────│ Ready │
//!   ┌────┴────┐<────────────┴────────┘                └───────┘
//!   │ Closed  │   (via Closing)
//!   └─────────┘
//! ```
//!
//! The handshake is passive: the controller sends ProgramVersionRequest,
//! then CheckDeviceRequest; the session answers each and becomes Ready
//! when the first SensorData message arrives.

use std::{ops::Sub, time::Duration};

use econet_proto::{
    Frame, Payload,
    payloads::{NetworkInfo, ProgramVersionInfo},
};

use crate::config::ProtocolConfig;

/// Actions returned by the session state machine.
///
/// The driver executes these: serialize and send a frame, mark the
/// connection ready (reset backoff, record statistics), or tear the
/// transport down.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Send this frame to the peer.
    SendFrame(Frame),

    /// The handshake completed; the connection is live.
    MarkReady,

    /// Drop the transport and reconnect.
    Close {
        /// Reason for closing the connection.
        reason: String,
    },
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport, no reconnect pending.
    Disconnected,
    /// Transport being opened (or backoff running).
    Connecting,
    /// Transport open, waiting for the controller's handshake frames.
    Handshake,
    /// Handshake done; telemetry flowing.
    Ready,
    /// Graceful shutdown in progress.
    Closing,
    /// Fully closed; the session will not reconnect.
    Closed,
}

/// Session state machine.
///
/// Pure: time is passed in, I/O comes out as [`SessionAction`]s. Generic
/// over the instant type so tests can drive it with a virtual clock.
#[derive(Debug, Clone)]
pub struct Session<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    state: SessionState,
    config: ProtocolConfig,
    network_info: NetworkInfo,
    /// Last inbound frame, for keep-alive supervision.
    last_frame: I,
    /// Last handshake progress, for the per-step budget.
    last_progress: I,
}

impl<I> Session<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a session in [`SessionState::Disconnected`].
    pub fn new(now: I, config: ProtocolConfig, network_info: NetworkInfo) -> Self {
        Self {
            state: SessionState::Disconnected,
            config,
            network_info,
            last_frame: now,
            last_progress: now,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// True once the handshake completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// A connection attempt started.
    pub fn begin_connect(&mut self, now: I) {
        self.state = SessionState::Connecting;
        self.last_progress = now;
    }

    /// The transport opened; wait for the controller to talk.
    pub fn transport_opened(&mut self, now: I) {
        self.state = SessionState::Handshake;
        self.last_frame = now;
        self.last_progress = now;
    }

    /// The transport failed; the driver will back off and retry.
    pub fn transport_lost(&mut self, now: I) {
        if self.state != SessionState::Closed {
            self.state = SessionState::Connecting;
            self.last_progress = now;
        }
    }

    /// Begin a graceful shutdown.
    pub fn begin_close(&mut self) {
        self.state = SessionState::Closing;
    }

    /// Shutdown finished; the session stays closed.
    pub fn closed(&mut self) {
        self.state = SessionState::Closed;
    }

    /// Process one inbound frame.
    ///
    /// Handshake requests are answered in any live state: the controller
    /// re-probes after its own restarts, and the answers are idempotent.
    pub fn handle_frame(&mut self, frame: &Frame, now: I) -> Vec<SessionAction> {
        self.last_frame = now;

        match &frame.payload {
            Payload::ProgramVersionRequest => {
                self.last_progress = now;
                let reply = Frame::reply_to(
                    frame.sender,
                    Payload::ProgramVersionResponse(ProgramVersionInfo::library()),
                );
                vec![SessionAction::SendFrame(reply)]
            }
            Payload::CheckDeviceRequest => {
                self.last_progress = now;
                let reply = Frame::reply_to(
                    frame.sender,
                    Payload::DeviceAvailableResponse(self.network_info.clone()),
                );
                vec![SessionAction::SendFrame(reply)]
            }
            Payload::SensorData(_) if self.state == SessionState::Handshake => {
                self.state = SessionState::Ready;
                vec![SessionAction::MarkReady]
            }
            _ => Vec::new(),
        }
    }

    /// Periodic supervision: handshake budget and keep-alive.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        match self.state {
            SessionState::Handshake => {
                let stalled = now - self.last_progress;
                if stalled > self.config.handshake_step_timeout {
                    self.state = SessionState::Connecting;
                    return vec![SessionAction::Close {
                        reason: format!("handshake stalled for {stalled:?}"),
                    }];
                }
            }
            SessionState::Ready => {
                let idle = now - self.last_frame;
                if idle > self.config.keepalive_timeout {
                    self.state = SessionState::Connecting;
                    return vec![SessionAction::Close {
                        reason: format!("no frame for {idle:?}"),
                    }];
                }
            }
            _ => {}
        }
        Vec::new()
    }
}

/// Exponential reconnect backoff: base, 2x, 4x, ... capped.
///
/// Resets after a successful handshake.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    /// Backoff from the configured base and cap.
    #[must_use]
    pub fn new(config: &ProtocolConfig) -> Self {
        Self { base: config.backoff_base, cap: config.backoff_cap, attempt: 0 }
    }

    /// Delay before the next attempt; doubles per call up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32 << self.attempt.min(16);
        self.attempt = self.attempt.saturating_add(1);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Reset after a successful connection.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use econet_proto::{address, payloads::SensorData};

    use super::*;

    fn session(now: Instant) -> Session<Instant> {
        let mut session = Session::new(now, ProtocolConfig::default(), NetworkInfo::default());
        session.begin_connect(now);
        session.transport_opened(now);
        session
    }

    fn sensor_frame() -> Frame {
        Frame::new(
            address::BROADCAST,
            address::ECOMAX,
            Payload::SensorData(Box::new(SensorData::default())),
        )
    }

    #[test]
    fn handshake_answers_and_becomes_ready() {
        let t0 = Instant::now();
        let mut session = session(t0);
        assert_eq!(session.state(), SessionState::Handshake);

        // Controller asks for our program version.
        let request = Frame::new(address::ECONET, address::ECOMAX, Payload::ProgramVersionRequest);
        let actions = session.handle_frame(&request, t0);
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            SessionAction::SendFrame(frame) => {
                assert_eq!(frame.recipient, address::ECOMAX);
                assert!(matches!(frame.payload, Payload::ProgramVersionResponse(_)));
            }
            other => panic!("expected SendFrame, got {other:?}"),
        }

        // Controller probes availability.
        let request = Frame::new(address::ECONET, address::ECOMAX, Payload::CheckDeviceRequest);
        let actions = session.handle_frame(&request, t0);
        match &actions[0] {
            SessionAction::SendFrame(frame) => {
                assert!(matches!(frame.payload, Payload::DeviceAvailableResponse(_)));
            }
            other => panic!("expected SendFrame, got {other:?}"),
        }
        assert_eq!(session.state(), SessionState::Handshake);

        // First sensor snapshot completes the handshake.
        let actions = session.handle_frame(&sensor_frame(), t0);
        assert_eq!(actions, vec![SessionAction::MarkReady]);
        assert!(session.is_ready());
    }

    #[test]
    fn handshake_stall_closes_the_link() {
        let t0 = Instant::now();
        let mut session = session(t0);

        assert!(session.tick(t0 + Duration::from_secs(9)).is_empty());
        let actions = session.tick(t0 + Duration::from_secs(11));
        assert!(matches!(actions.as_slice(), [SessionAction::Close { .. }]));
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn keepalive_closes_an_idle_ready_link() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.handle_frame(&sensor_frame(), t0);
        assert!(session.is_ready());

        // Frames keep the link alive.
        let t1 = t0 + Duration::from_secs(50);
        session.handle_frame(&sensor_frame(), t1);
        assert!(session.tick(t1 + Duration::from_secs(59)).is_empty());

        let actions = session.tick(t1 + Duration::from_secs(61));
        assert!(matches!(actions.as_slice(), [SessionAction::Close { .. }]));
        assert_eq!(session.state(), SessionState::Connecting);
    }

    #[test]
    fn later_sensor_frames_do_not_re_mark_ready() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.handle_frame(&sensor_frame(), t0);
        let actions = session.handle_frame(&sensor_frame(), t0);
        assert!(actions.is_empty());
    }

    #[test]
    fn handshake_requests_are_answered_when_ready() {
        let t0 = Instant::now();
        let mut session = session(t0);
        session.handle_frame(&sensor_frame(), t0);

        let request = Frame::new(address::ECONET, address::ECOMAX, Payload::ProgramVersionRequest);
        let actions = session.handle_frame(&request, t0);
        assert!(matches!(actions.as_slice(), [SessionAction::SendFrame(_)]));
    }

    #[test]
    fn backoff_doubles_to_the_cap_and_resets() {
        let mut backoff = Backoff::new(&ProtocolConfig::default());
        let delays: Vec<u64> =
            (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
