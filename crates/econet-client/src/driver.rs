//! Connection driver: reader task, writer loop, correlation, reconnect.
//!
//! One driver runs per connection. It owns the transport, spawns exactly
//! one reader task per established link, and acts as the single writer:
//! application requests arrive through the write queue, session actions
//! and version-triggered re-fetches are generated inline. A transport
//! error drops back to the reconnect loop with exponential backoff;
//! pending requests survive the blip and resolve through their own
//! retry windows.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    io,
    time::Duration,
};

use econet_core::{
    Backoff, EcoMax, ProtocolConfig, ReplySlot, Session, SessionAction, VersionTracker,
    WriteCommand,
};
use econet_proto::{
    Direction, Frame, FrameType, Payload,
    payloads::{AlertsRange, NetworkInfo, ParameterRange, SubdeviceParameterRange},
};
use tokio::{
    io::AsyncWrite,
    sync::{mpsc, watch},
    time::Instant,
};

use crate::{
    stats::Statistics,
    transport::{ByteStream, Transport, read_frame, write_frame},
};

/// Initial fetch sweep once the handshake completes, in resolution
/// order. Mixer and thermostat parameters join in when their indices
/// become known.
const INITIAL_SWEEP: [FrameType; 5] = [
    FrameType::Uid,
    FrameType::RegulatorDataSchema,
    FrameType::EcomaxParameters,
    FrameType::Schedules,
    FrameType::Alerts,
];

/// Why a connected run ended.
enum ConnectionEnd {
    /// Graceful shutdown requested by the façade.
    Shutdown,
    /// Transport failed; reconnect after backoff.
    Lost(String),
}

enum Event {
    Shutdown,
    Inbound(Option<io::Result<(Frame, u64)>>),
    Command(Option<WriteCommand>),
    Tick,
}

/// Oldest-first correlation store for pending requests.
#[derive(Default)]
struct Correlations {
    pending: VecDeque<ReplySlot>,
}

impl Correlations {
    fn push(&mut self, slot: ReplySlot) {
        self.pending.push_back(slot);
    }

    /// Resolve the oldest waiter for `frame_type`, narrowed by the
    /// sub-device index when the response carries one.
    fn resolve(&mut self, frame_type: FrameType, index: Option<u8>, payload: Payload) -> bool {
        let position = self.pending.iter().position(|slot| {
            if slot.frame_type != frame_type {
                return false;
            }
            match (slot.device_index, index) {
                (Some(want), Some(have)) => want == have,
                _ => true,
            }
        });
        let Some(position) = position else { return false };
        let Some(slot) = self.pending.remove(position) else { return false };
        slot.tx.send(payload).is_ok()
    }

    /// Drop slots whose caller went away (cancellation).
    fn prune(&mut self) {
        self.pending.retain(|slot| !slot.tx.is_closed());
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

pub(crate) struct Driver {
    transport: Box<dyn Transport>,
    queue: mpsc::Receiver<WriteCommand>,
    ecomax: EcoMax,
    config: ProtocolConfig,
    session: Session<Instant>,
    tracker: VersionTracker,
    backoff: Backoff,
    correlations: Correlations,
    stats: Statistics,
    shutdown: watch::Receiver<bool>,
    /// Fire-and-forget re-fetches awaiting their response, with the
    /// enqueue time for expiry.
    refetch_inflight: HashMap<FrameType, Instant>,
    known_mixers: HashSet<u8>,
    known_thermostats: HashSet<u8>,
}

impl Driver {
    pub(crate) fn new(
        transport: Box<dyn Transport>,
        queue: mpsc::Receiver<WriteCommand>,
        ecomax: EcoMax,
        config: ProtocolConfig,
        network_info: NetworkInfo,
        stats: Statistics,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let session = Session::new(Instant::now(), config.clone(), network_info);
        let backoff = Backoff::new(&config);
        Self {
            transport,
            queue,
            ecomax,
            config,
            session,
            tracker: VersionTracker::new(),
            backoff,
            correlations: Correlations::default(),
            stats,
            shutdown,
            refetch_inflight: HashMap::new(),
            known_mixers: HashSet::new(),
            known_thermostats: HashSet::new(),
        }
    }

    /// Run until the façade shuts the connection down.
    pub(crate) async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.session.begin_connect(Instant::now());
            let opened = tokio::select! {
                _ = self.shutdown.changed() => break,
                opened = self.transport.open() => opened,
            };

            let stream = match opened {
                Ok(stream) => stream,
                Err(err) => {
                    tracing::warn!(
                        endpoint = %self.transport.describe(),
                        error = %err,
                        "transport open failed"
                    );
                    if !self.wait_backoff().await {
                        break;
                    }
                    continue;
                }
            };

            tracing::info!(endpoint = %self.transport.describe(), "transport open");
            self.session.transport_opened(Instant::now());

            match self.run_connected(stream).await {
                ConnectionEnd::Shutdown => break,
                ConnectionEnd::Lost(reason) => {
                    tracing::warn!(%reason, "connection lost");
                    self.stats.record_loss();
                    self.session.transport_lost(Instant::now());
                    self.tracker.reset();
                    self.refetch_inflight.clear();
                    if !self.wait_backoff().await {
                        break;
                    }
                }
            }
        }

        self.session.begin_close();
        self.correlations.clear();
        self.ecomax.close();
        self.session.closed();
        tracing::info!("connection closed");
    }

    /// Sleep out the backoff delay; false means shutdown arrived first.
    async fn wait_backoff(&mut self) -> bool {
        let delay = self.backoff.next_delay();
        tracing::info!(?delay, "reconnecting after backoff");
        tokio::select! {
            _ = self.shutdown.changed() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }

    async fn run_connected(&mut self, stream: Box<dyn ByteStream>) -> ConnectionEnd {
        let (read_half, mut write_half) = tokio::io::split(stream);

        // The single reader task for this link; frames flow in through a
        // channel so the main loop stays cancellation-safe.
        let (frame_tx, mut frame_rx) = mpsc::channel::<io::Result<(Frame, u64)>>(16);
        let reader = tokio::spawn(async move {
            let mut read_half = read_half;
            loop {
                match read_frame(&mut read_half).await {
                    Ok(item) => {
                        if frame_tx.send(Ok(item)).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = frame_tx.send(Err(err)).await;
                        break;
                    }
                }
            }
        });

        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let end = loop {
            let event = tokio::select! {
                _ = self.shutdown.changed() => Event::Shutdown,
                inbound = frame_rx.recv() => Event::Inbound(inbound),
                command = self.queue.recv() => Event::Command(command),
                _ = ticker.tick() => Event::Tick,
            };

            let outcome = match event {
                Event::Shutdown => Err(ConnectionEnd::Shutdown),
                Event::Inbound(Some(Ok((frame, bytes)))) => {
                    self.stats.record_frame_received(bytes);
                    self.handle_inbound(frame, &mut write_half).await
                }
                Event::Inbound(Some(Err(err))) => Err(ConnectionEnd::Lost(err.to_string())),
                Event::Inbound(None) => Err(ConnectionEnd::Lost("reader stopped".to_string())),
                Event::Command(Some(command)) => self.handle_command(command, &mut write_half).await,
                Event::Command(None) => Err(ConnectionEnd::Shutdown),
                Event::Tick => self.handle_tick(&mut write_half).await,
            };

            if let Err(end) = outcome {
                break end;
            }
        };

        reader.abort();
        end
    }

    async fn handle_inbound<W>(
        &mut self,
        frame: Frame,
        write_half: &mut W,
    ) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        tracing::trace!(code = frame.wire_code(), sender = frame.sender, "frame received");

        let actions = self.session.handle_frame(&frame, Instant::now());
        self.execute(actions, write_half).await?;

        // Correlate before the model applies the payload, so a waiting
        // `set` observes its confirmation first.
        if frame.payload.direction() == Direction::Response {
            if let Some(frame_type) = frame.payload.frame_type() {
                self.tracker.acknowledge(frame_type);
                self.refetch_inflight.remove(&frame_type);
                let index = response_index(&frame.payload);
                if !self.correlations.resolve(frame_type, index, frame.payload.clone()) {
                    tracing::trace!(?frame_type, "response without a waiter");
                }
            }
        }

        self.ecomax.handle_payload(&frame.payload);
        self.adopt_new_subdevices(write_half).await?;

        let versions = match &frame.payload {
            Payload::SensorData(data) => Some(data.versions.clone()),
            Payload::RegulatorData(data) => Some(data.versions.clone()),
            _ => None,
        };
        if let Some(versions) = versions {
            if self.session.is_ready() {
                let diverged = self.tracker.observe(&versions);
                self.enqueue_refetch(diverged, write_half).await?;
            }
        }

        Ok(())
    }

    async fn handle_command<W>(
        &mut self,
        command: WriteCommand,
        write_half: &mut W,
    ) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let WriteCommand { frame, reply } = command;
        if let Some(slot) = reply {
            // A caller that already gave up does not need a slot.
            if !slot.tx.is_closed() {
                self.correlations.push(slot);
            }
        }
        self.write(&frame, write_half).await
    }

    async fn handle_tick<W>(&mut self, write_half: &mut W) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let actions = self.session.tick(Instant::now());
        self.execute(actions, write_half).await?;
        self.correlations.prune();

        // Expire fire-and-forget re-fetches that never got answered.
        let deadline = self.config.request_timeout;
        let now = Instant::now();
        let expired: Vec<FrameType> = self
            .refetch_inflight
            .iter()
            .filter(|(_, at)| now.saturating_duration_since(**at) > deadline)
            .map(|(ft, _)| *ft)
            .collect();
        for frame_type in expired {
            tracing::debug!(?frame_type, "re-fetch request expired");
            self.refetch_inflight.remove(&frame_type);
            self.tracker.request_failed(frame_type);
        }
        Ok(())
    }

    async fn execute<W>(
        &mut self,
        actions: Vec<SessionAction>,
        write_half: &mut W,
    ) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        for action in actions {
            match action {
                SessionAction::SendFrame(frame) => self.write(&frame, write_half).await?,
                SessionAction::MarkReady => {
                    tracing::info!("handshake complete");
                    self.backoff.reset();
                    self.stats.record_connected();
                    self.initial_sweep(write_half).await?;
                }
                SessionAction::Close { reason } => return Err(ConnectionEnd::Lost(reason)),
            }
        }
        Ok(())
    }

    /// Fetch the whole controller state right after the handshake.
    async fn initial_sweep<W>(&mut self, write_half: &mut W) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        for frame_type in INITIAL_SWEEP {
            self.request_type(frame_type, write_half).await?;
        }
        Ok(())
    }

    async fn enqueue_refetch<W>(
        &mut self,
        diverged: Vec<FrameType>,
        write_half: &mut W,
    ) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        for frame_type in diverged {
            self.request_type(frame_type, write_half).await?;
        }
        Ok(())
    }

    /// Enqueue the request(s) covering one managed frame type and mark
    /// the tracker.
    async fn request_type<W>(
        &mut self,
        frame_type: FrameType,
        write_half: &mut W,
    ) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let payloads: Vec<Payload> = match frame_type {
            FrameType::Uid => vec![Payload::UidRequest],
            FrameType::RegulatorDataSchema => vec![Payload::RegulatorDataSchemaRequest],
            FrameType::EcomaxParameters => {
                vec![Payload::EcomaxParametersRequest(ParameterRange::all())]
            }
            FrameType::Schedules => vec![Payload::SchedulesRequest],
            FrameType::Alerts => vec![Payload::AlertsRequest(AlertsRange::latest())],
            FrameType::MixerParameters => self
                .ecomax
                .mixer_indices()
                .into_iter()
                .map(|index| {
                    Payload::MixerParametersRequest(SubdeviceParameterRange::all(index))
                })
                .collect(),
            FrameType::ThermostatParameters => self
                .ecomax
                .thermostat_indices()
                .into_iter()
                .map(|index| {
                    Payload::ThermostatParametersRequest(SubdeviceParameterRange::all(index))
                })
                .collect(),
            _ => Vec::new(),
        };

        self.tracker.mark_requested(frame_type);
        if payloads.is_empty() {
            // Nothing to ask (e.g. no mixers yet); settle the version.
            self.tracker.acknowledge(frame_type);
            return Ok(());
        }

        self.refetch_inflight.insert(frame_type, Instant::now());
        for payload in payloads {
            let frame = Frame::request(payload);
            self.write(&frame, write_half).await?;
        }
        Ok(())
    }

    /// Request parameters for sub-devices that just appeared.
    async fn adopt_new_subdevices<W>(&mut self, write_half: &mut W) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let mixers: Vec<u8> = self
            .ecomax
            .mixer_indices()
            .into_iter()
            .filter(|index| !self.known_mixers.contains(index))
            .collect();
        for index in mixers {
            self.known_mixers.insert(index);
            let frame =
                Frame::request(Payload::MixerParametersRequest(SubdeviceParameterRange::all(index)));
            self.write(&frame, write_half).await?;
        }

        let thermostats: Vec<u8> = self
            .ecomax
            .thermostat_indices()
            .into_iter()
            .filter(|index| !self.known_thermostats.contains(index))
            .collect();
        for index in thermostats {
            self.known_thermostats.insert(index);
            let frame = Frame::request(Payload::ThermostatParametersRequest(
                SubdeviceParameterRange::all(index),
            ));
            self.write(&frame, write_half).await?;
        }
        Ok(())
    }

    async fn write<W>(&mut self, frame: &Frame, write_half: &mut W) -> Result<(), ConnectionEnd>
    where
        W: AsyncWrite + Send + Unpin,
    {
        match write_frame(write_half, frame).await {
            Ok(bytes) => {
                self.stats.record_frame_sent(bytes);
                tracing::trace!(code = frame.wire_code(), bytes, "frame sent");
                Ok(())
            }
            Err(err) => Err(ConnectionEnd::Lost(format!("write failed: {err}"))),
        }
    }
}

/// Sub-device index carried by a response, when it has one.
fn response_index(payload: &Payload) -> Option<u8> {
    match payload {
        Payload::MixerParametersResponse(batch) | Payload::ThermostatParametersResponse(batch) => {
            Some(batch.device_index)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use econet_proto::payloads::ParameterBatch;
    use tokio::sync::oneshot;

    use super::*;

    fn slot(frame_type: FrameType, device_index: Option<u8>) -> (ReplySlot, oneshot::Receiver<Payload>) {
        let (tx, rx) = oneshot::channel();
        (ReplySlot { frame_type, device_index, tx }, rx)
    }

    #[test]
    fn correlation_resolves_the_oldest_waiter() {
        let mut correlations = Correlations::default();
        let (first, mut first_rx) = slot(FrameType::EcomaxParameters, None);
        let (second, mut second_rx) = slot(FrameType::EcomaxParameters, None);
        correlations.push(first);
        correlations.push(second);

        let payload = Payload::EcomaxParametersResponse(ParameterBatch::default());
        assert!(correlations.resolve(FrameType::EcomaxParameters, None, payload.clone()));
        assert!(first_rx.try_recv().is_ok());
        assert!(second_rx.try_recv().is_err());

        assert!(correlations.resolve(FrameType::EcomaxParameters, None, payload));
        assert!(second_rx.try_recv().is_ok());
    }

    #[test]
    fn correlation_narrows_by_device_index() {
        let mut correlations = Correlations::default();
        let (mixer_two, mut two_rx) = slot(FrameType::MixerParameters, Some(2));
        let (mixer_zero, mut zero_rx) = slot(FrameType::MixerParameters, Some(0));
        correlations.push(mixer_two);
        correlations.push(mixer_zero);

        let payload = Payload::SetMixerParameterResponse;
        assert!(correlations.resolve(FrameType::MixerParameters, Some(0), payload));
        assert!(zero_rx.try_recv().is_ok());
        assert!(two_rx.try_recv().is_err());
    }

    #[test]
    fn unmatched_responses_report_no_waiter() {
        let mut correlations = Correlations::default();
        assert!(!correlations.resolve(
            FrameType::Uid,
            None,
            Payload::SetEcomaxParameterResponse
        ));
    }

    #[test]
    fn prune_drops_cancelled_waiters() {
        let mut correlations = Correlations::default();
        let (cancelled, rx) = slot(FrameType::Uid, None);
        drop(rx);
        correlations.push(cancelled);
        let (alive, _alive_rx) = slot(FrameType::Password, None);
        correlations.push(alive);

        correlations.prune();
        assert_eq!(correlations.pending.len(), 1);
        assert_eq!(correlations.pending[0].frame_type, FrameType::Password);
    }
}
