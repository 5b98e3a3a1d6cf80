//! End-to-end scenarios over an in-memory transport.
//!
//! A scripted controller sits on the other side of a duplex pipe and
//! plays the ecoMAX: it drives the handshake, answers the initial fetch
//! sweep, and then each test exercises one protocol behavior under a
//! paused clock.

use std::time::Duration;

use econet_client::{Connection, DummyTransport, DummyTransportHandle, transport};
use econet_core::{Device, ProtocolConfig};
use econet_proto::{
    Frame, Payload, address,
    payloads::{
        AlertsBatch, NetworkInfo, ParameterBatch, ParameterValues, ProductInfo, RegulatorSchema,
        ScheduleEntry, ScheduleGrid, SchedulesData, SensorData, params,
    },
};
use tokio::{io::DuplexStream, time::Instant};

/// The scripted peer playing the controller.
struct Controller {
    stream: DuplexStream,
}

impl Controller {
    async fn accept(handle: &mut DummyTransportHandle) -> Self {
        Self { stream: handle.accept().await.expect("driver should open the transport") }
    }

    async fn recv(&mut self) -> Frame {
        let (frame, _) = tokio::time::timeout(
            Duration::from_secs(30),
            transport::read_frame(&mut self.stream),
        )
        .await
        .expect("timed out waiting for a frame")
        .expect("stream should stay open");
        frame
    }

    /// Assert that the client stays quiet for `window`.
    async fn expect_silence(&mut self, window: Duration) {
        let result =
            tokio::time::timeout(window, transport::read_frame(&mut self.stream)).await;
        if let Ok(Ok((frame, _))) = result {
            panic!("expected silence, got frame {:?}", frame.payload);
        }
    }

    async fn send(&mut self, payload: Payload) {
        let frame = Frame::new(address::ECONET, address::ECOMAX, payload);
        transport::write_frame(&mut self.stream, &frame).await.expect("send should succeed");
    }

    async fn broadcast(&mut self, payload: Payload) {
        let frame = Frame::new(address::BROADCAST, address::ECOMAX, payload);
        transport::write_frame(&mut self.stream, &frame).await.expect("send should succeed");
    }

    fn sensor_data(versions: &[(u16, u16)]) -> Payload {
        Payload::SensorData(Box::new(SensorData {
            versions: versions.iter().copied().collect(),
            heating_target: 65,
            fuel_level: 72,
            ..SensorData::default()
        }))
    }

    /// Run the controller's side of the handshake.
    async fn handshake(&mut self) {
        self.send(Payload::ProgramVersionRequest).await;
        let reply = self.recv().await;
        assert_eq!(reply.recipient, address::ECOMAX);
        assert!(
            matches!(reply.payload, Payload::ProgramVersionResponse(_)),
            "expected a program version response, got {:?}",
            reply.payload
        );

        self.send(Payload::CheckDeviceRequest).await;
        let reply = self.recv().await;
        assert!(
            matches!(reply.payload, Payload::DeviceAvailableResponse(_)),
            "expected a device available response, got {:?}",
            reply.payload
        );
    }

    /// Answer the five initial-sweep requests that follow readiness.
    async fn serve_initial_sweep(&mut self, parameters: ParameterBatch, schedules: SchedulesData) {
        for _ in 0..5 {
            let request = self.recv().await;
            let response = match &request.payload {
                Payload::UidRequest => Payload::UidResponse(ProductInfo::default()),
                Payload::RegulatorDataSchemaRequest => {
                    Payload::RegulatorDataSchemaResponse(RegulatorSchema::default())
                }
                Payload::EcomaxParametersRequest(_) => {
                    Payload::EcomaxParametersResponse(parameters.clone())
                }
                Payload::SchedulesRequest => Payload::SchedulesResponse(schedules.clone()),
                Payload::AlertsRequest(_) => Payload::AlertsResponse(AlertsBatch::default()),
                other => panic!("unexpected sweep request {other:?}"),
            };
            self.send(response).await;
        }
    }

    /// Handshake, readiness, and a drained sweep in one go.
    async fn bring_up(&mut self, parameters: ParameterBatch, schedules: SchedulesData) {
        self.handshake().await;
        self.broadcast(Self::sensor_data(&[])).await;
        self.serve_initial_sweep(parameters, schedules).await;
    }
}

fn heating_parameters() -> ParameterBatch {
    let index = params::ECOMAX.index_of("heating_target_temp").expect("catalogue entry");
    ParameterBatch {
        start: index,
        count: 1,
        values: vec![(index, ParameterValues { value: 60, min: 0, max: 100 })],
    }
}

fn two_schedules() -> SchedulesData {
    let mut water_grid = ScheduleGrid::new();
    water_grid.set(2, 10, true);
    SchedulesData {
        schedules: vec![
            ScheduleEntry { id: 0, switch: 1, parameter: 40, grid: ScheduleGrid::new() },
            ScheduleEntry { id: 1, switch: 1, parameter: 50, grid: water_grid },
        ],
    }
}

fn start_connection() -> (Connection, DummyTransportHandle) {
    let (dummy, handle) = DummyTransport::new();
    let connection = Connection::with_config(
        Box::new(dummy),
        NetworkInfo::default(),
        ProtocolConfig { request_timeout: Duration::from_secs(5), ..ProtocolConfig::default() },
    );
    connection.connect().expect("first connect");
    (connection, handle)
}

#[tokio::test(start_paused = true)]
async fn handshake_brings_the_device_up() {
    let (connection, mut handle) = start_connection();
    let mut controller = Controller::accept(&mut handle).await;

    controller.handshake().await;

    // Not ready before the first sensor snapshot.
    assert!(connection.ecomax().get_nowait("state").is_none());

    controller.broadcast(Controller::sensor_data(&[])).await;
    controller.serve_initial_sweep(ParameterBatch::default(), SchedulesData::default()).await;

    let ecomax = connection
        .device("ecomax", Duration::from_secs(10))
        .await
        .expect("device should come up");
    assert_eq!(ecomax.get_nowait("fuel_level"), Some(econet_proto::Value::Int(72)));

    connection.close().await;
}

#[tokio::test(start_paused = true)]
async fn handshake_replies_carry_the_configured_network_info() {
    let (dummy, mut handle) = DummyTransport::new();
    let mut network_info = NetworkInfo::default();
    network_info.wlan.ssid = "boiler-room".to_string();
    network_info.wlan.signal_quality = 87;
    let connection = Connection::with_transport(Box::new(dummy), network_info.clone());
    connection.connect().expect("first connect");

    let mut controller = Controller::accept(&mut handle).await;
    controller.send(Payload::ProgramVersionRequest).await;
    let _ = controller.recv().await;

    controller.send(Payload::CheckDeviceRequest).await;
    let reply = controller.recv().await;
    match reply.payload {
        Payload::DeviceAvailableResponse(info) => assert_eq!(info, network_info),
        other => panic!("expected device available, got {other:?}"),
    }

    connection.close().await;
}

#[tokio::test(start_paused = true)]
async fn version_bump_refetches_exactly_the_bumped_type() {
    let (connection, mut handle) = start_connection();
    let mut controller = Controller::accept(&mut handle).await;
    controller.bring_up(ParameterBatch::default(), SchedulesData::default()).await;

    let ecomax_code = u16::from(econet_proto::FrameType::EcomaxParameters.code());
    let mixer_code = u16::from(econet_proto::FrameType::MixerParameters.code());

    // Baseline observation: no requests.
    controller.broadcast(Controller::sensor_data(&[(ecomax_code, 37), (mixer_code, 37)])).await;
    controller.expect_silence(Duration::from_secs(2)).await;

    // Bump the ecoMAX parameter version only.
    controller.broadcast(Controller::sensor_data(&[(ecomax_code, 38), (mixer_code, 37)])).await;
    let request = controller.recv().await;
    assert!(
        matches!(request.payload, Payload::EcomaxParametersRequest(_)),
        "expected an ecoMAX parameters request, got {:?}",
        request.payload
    );
    controller.send(Payload::EcomaxParametersResponse(ParameterBatch::default())).await;

    // No mixer request: that version never moved.
    controller.expect_silence(Duration::from_secs(2)).await;

    connection.close().await;
}

#[tokio::test(start_paused = true)]
async fn parameter_set_validates_range_before_sending() {
    let (connection, mut handle) = start_connection();
    let mut controller = Controller::accept(&mut handle).await;
    controller.bring_up(heating_parameters(), SchedulesData::default()).await;

    let ecomax =
        connection.device("ecomax", Duration::from_secs(10)).await.expect("device up");

    // Out of range: rejected locally, nothing on the wire.
    let result = ecomax.set("heating_target_temp", 150).await;
    assert!(matches!(
        result,
        Err(econet_core::DeviceError::OutOfRange { value: 150, min: 0, max: 100 })
    ));
    controller.expect_silence(Duration::from_secs(2)).await;

    // In range: the write goes out and the ack resolves it.
    let setter = tokio::spawn({
        let ecomax = ecomax.clone();
        async move { ecomax.set("heating_target_temp", 65).await }
    });

    let request = controller.recv().await;
    match &request.payload {
        Payload::SetEcomaxParameterRequest(set) => {
            assert_eq!(set.value, 65);
            assert_eq!(
                Some(set.index),
                params::ECOMAX.index_of("heating_target_temp")
            );
        }
        other => panic!("expected a set request, got {other:?}"),
    }
    controller.send(Payload::SetEcomaxParameterResponse).await;

    assert_eq!(setter.await.expect("task"), Ok(true));
    assert_eq!(
        ecomax.get_nowait("heating_target_temp"),
        Some(econet_proto::Value::Float(65.0))
    );

    connection.close().await;
}

#[tokio::test(start_paused = true)]
async fn schedule_commit_sends_the_full_set() {
    let (connection, mut handle) = start_connection();
    let mut controller = Controller::accept(&mut handle).await;
    controller.bring_up(ParameterBatch::default(), two_schedules()).await;

    let ecomax =
        connection.device("ecomax", Duration::from_secs(10)).await.expect("device up");
    let heating = ecomax.schedule("heating").expect("known schedule");

    let seven = econet_core::ScheduleTime::parse("07:00").expect("time");
    heating.set_off(econet_core::Weekday::Monday, None, Some(seven)).expect("edit");
    heating.set_on(econet_core::Weekday::Monday, Some(seven), None).expect("edit");

    let committer = tokio::spawn({
        let heating = heating.clone();
        async move { heating.commit().await }
    });

    let request = controller.recv().await;
    let Payload::SetScheduleRequest(data) = &request.payload else {
        panic!("expected a set schedule request, got {:?}", request.payload);
    };

    // The full set rides along, unchanged schedules included.
    assert_eq!(data.schedules.len(), 2);
    let monday = &data.schedules[0];
    assert_eq!(monday.id, 0);
    for slot in 0..14 {
        assert!(!monday.grid.get(0, slot), "slot {slot} should be clear");
    }
    for slot in 14..48 {
        assert!(monday.grid.get(0, slot), "slot {slot} should be set");
    }
    // Tuesday through Sunday untouched.
    for day in 1..7 {
        assert_eq!(monday.grid.day_bits(day), 0);
    }
    // The water-heater schedule is re-sent verbatim.
    let water = &data.schedules[1];
    assert_eq!(water.id, 1);
    assert_eq!(water.parameter, 50);
    assert!(water.grid.get(2, 10));

    controller.send(Payload::SetScheduleResponse).await;
    assert_eq!(committer.await.expect("task"), Ok(true));
    assert!(!heating.is_dirty());

    connection.close().await;
}

#[tokio::test(start_paused = true)]
async fn reconnect_backs_off_exponentially_and_resets() {
    let (connection, mut handle) = start_connection();

    // First connection comes up and then drops.
    let mut controller = Controller::accept(&mut handle).await;
    controller.bring_up(ParameterBatch::default(), SchedulesData::default()).await;
    let before_drop = Instant::now();
    drop(controller);

    // The driver retries with doubling delays.
    let mut delays = Vec::new();
    let mut last = before_drop;
    for _ in 0..3 {
        let controller = Controller::accept(&mut handle).await;
        let now = Instant::now();
        delays.push(now.duration_since(last));
        last = now;
        drop(controller);
    }
    assert!(delays[0] >= Duration::from_secs(1) && delays[0] < Duration::from_secs(2));
    assert!(delays[1] >= Duration::from_secs(2) && delays[1] < Duration::from_secs(4));
    assert!(delays[2] >= Duration::from_secs(4) && delays[2] < Duration::from_secs(8));

    assert!(connection.statistics().connection_losses() >= 3);

    // A successful handshake resets the backoff.
    let mut controller = Controller::accept(&mut handle).await;
    controller.bring_up(ParameterBatch::default(), SchedulesData::default()).await;
    let before_drop = Instant::now();
    drop(controller);

    let _controller = Controller::accept(&mut handle).await;
    let delay = Instant::now().duration_since(before_drop);
    assert!(delay < Duration::from_secs(2), "backoff should restart at 1s, got {delay:?}");

    connection.close().await;
}

#[tokio::test(start_paused = true)]
async fn keepalive_drops_an_idle_link() {
    let (connection, mut handle) = start_connection();
    let mut controller = Controller::accept(&mut handle).await;
    controller.bring_up(ParameterBatch::default(), SchedulesData::default()).await;

    // Say nothing for over a minute; the driver must give up on the
    // link and reopen the transport.
    let idle_from = Instant::now();
    let _next = Controller::accept(&mut handle).await;
    let waited = Instant::now().duration_since(idle_from);
    assert!(waited >= Duration::from_secs(60), "dropped too early: {waited:?}");
    assert_eq!(connection.statistics().connection_losses(), 1);

    connection.close().await;
}

#[tokio::test(start_paused = true)]
async fn close_resolves_pending_waiters() {
    let (connection, mut handle) = start_connection();
    let mut controller = Controller::accept(&mut handle).await;
    controller.bring_up(ParameterBatch::default(), SchedulesData::default()).await;

    let ecomax = connection.ecomax();
    let waiter = tokio::spawn({
        let ecomax = ecomax.clone();
        async move { ecomax.get("never_assigned", Duration::from_secs(600)).await }
    });
    tokio::task::yield_now().await;

    connection.close().await;
    assert_eq!(
        waiter.await.expect("task"),
        Err(econet_core::DeviceError::ConnectionClosed)
    );
}
