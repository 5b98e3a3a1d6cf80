//! Typed frame bodies and their per-type codecs.
//!
//! [`Payload`] has one case per known frame type plus [`Payload::Unknown`]
//! for codes outside the registry; the registry is the `match` in
//! [`Payload::decode`], not a runtime table. Encoding serializes only the
//! body; the wire code comes from [`Payload::wire_code`] and the envelope
//! from [`crate::Frame`].
//!
//! # Invariants
//!
//! Each variant maps to exactly one `(frame type, direction)` pair, and
//! decoding what [`Payload::encode_body`] produced yields an equal value.
//! Unknown codes round-trip byte-identically.

pub mod alerts;
pub mod network;
pub mod params;
pub mod product;
pub mod program;
pub mod regdata;
pub mod schedules;
pub mod sensor;
pub mod versions;

use bytes::Bytes;

use crate::{
    codec::{ByteReader, ByteWriter},
    errors::ProtocolError,
    types::{Direction, FrameType},
};

pub use alerts::{Alert, AlertTimestamp, AlertsBatch, AlertsRange};
pub use network::{Encryption, EthernetParameters, NetworkInfo, WirelessParameters};
pub use params::{
    Catalogue, ParameterBatch, ParameterKind, ParameterRange, ParameterSpec, ParameterValues,
    SetParameter, SetSubdeviceParameter, SubdeviceParameterBatch, SubdeviceParameterRange,
};
pub use product::ProductInfo;
pub use program::ProgramVersionInfo;
pub use regdata::{DataType, RegulatorData, RegulatorSchema};
pub use schedules::{ScheduleEntry, ScheduleGrid, SchedulesData, schedule_id, schedule_name};
pub use sensor::{
    DeviceState, MixerSensors, ModuleVersions, OutputStates, SensorData, ThermostatSensors,
    probe_name,
};
pub use versions::FrameVersions;

/// Every frame body the protocol defines.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    // Requests
    /// Ask the controller to stop polling this master.
    StopMasterRequest,
    /// Ask the controller to resume polling this master.
    StartMasterRequest,
    /// Controller probes this device during the handshake.
    CheckDeviceRequest,
    /// Fetch a slice of the ecoMAX parameter catalogue.
    EcomaxParametersRequest(params::ParameterRange),
    /// Fetch a slice of one mixer's parameter catalogue.
    MixerParametersRequest(params::SubdeviceParameterRange),
    /// Write one ecoMAX parameter.
    SetEcomaxParameterRequest(params::SetParameter),
    /// Write one mixer parameter.
    SetMixerParameterRequest(params::SetSubdeviceParameter),
    /// Fetch the product-info block.
    UidRequest,
    /// Fetch the service password.
    PasswordRequest,
    /// Switch the controller on or off.
    EcomaxControlRequest(params::ControlState),
    /// Fetch a slice of the alert log.
    AlertsRequest(alerts::AlertsRange),
    /// Controller asks for our program version during the handshake.
    ProgramVersionRequest,
    /// Fetch every schedule.
    SchedulesRequest,
    /// Replace every schedule.
    SetScheduleRequest(schedules::SchedulesData),
    /// Fetch a slice of one thermostat's parameter catalogue.
    ThermostatParametersRequest(params::SubdeviceParameterRange),
    /// Write one thermostat parameter.
    SetThermostatParameterRequest(params::SetSubdeviceParameter),
    /// Fetch the regulator-data schema.
    RegulatorDataSchemaRequest,

    // Responses
    /// Our reply to CheckDevice, carrying the configured network info.
    DeviceAvailableResponse(network::NetworkInfo),
    /// Slice of the ecoMAX parameter catalogue.
    EcomaxParametersResponse(params::ParameterBatch),
    /// Slice of one mixer's parameter catalogue.
    MixerParametersResponse(params::SubdeviceParameterBatch),
    /// Ack for an ecoMAX parameter write.
    SetEcomaxParameterResponse,
    /// Ack for a mixer parameter write.
    SetMixerParameterResponse,
    /// Product-info block.
    UidResponse(product::ProductInfo),
    /// Service password; `None` when the controller reports an empty one.
    PasswordResponse(Option<String>),
    /// Ack for an EcomaxControl request.
    EcomaxControlResponse,
    /// Slice of the alert log.
    AlertsResponse(alerts::AlertsBatch),
    /// Program version of a peer (ours when answering the controller).
    ProgramVersionResponse(program::ProgramVersionInfo),
    /// Every schedule the controller knows.
    SchedulesResponse(schedules::SchedulesData),
    /// Ack for a SetSchedule request.
    SetScheduleResponse,
    /// Slice of one thermostat's parameter catalogue.
    ThermostatParametersResponse(params::SubdeviceParameterBatch),
    /// Ack for a thermostat parameter write.
    SetThermostatParameterResponse,
    /// Ordered schema for the regulator-data broadcast.
    RegulatorDataSchemaResponse(regdata::RegulatorSchema),

    // Messages
    /// Periodic sensor snapshot.
    SensorData(Box<sensor::SensorData>),
    /// Schema-driven telemetry broadcast.
    RegulatorData(regdata::RegulatorData),

    /// Frame type outside the registry, body kept verbatim.
    Unknown {
        /// Raw wire code.
        code: u8,
        /// Raw body bytes.
        body: Bytes,
    },
}

impl Payload {
    /// Frame type of this body; `None` for [`Payload::Unknown`].
    #[must_use]
    pub fn frame_type(&self) -> Option<FrameType> {
        Some(match self {
            Self::StopMasterRequest => FrameType::StopMaster,
            Self::StartMasterRequest => FrameType::StartMaster,
            Self::CheckDeviceRequest | Self::DeviceAvailableResponse(_) => FrameType::CheckDevice,
            Self::EcomaxParametersRequest(_) | Self::EcomaxParametersResponse(_) => {
                FrameType::EcomaxParameters
            }
            Self::MixerParametersRequest(_) | Self::MixerParametersResponse(_) => {
                FrameType::MixerParameters
            }
            Self::SetEcomaxParameterRequest(_) | Self::SetEcomaxParameterResponse => {
                FrameType::SetEcomaxParameter
            }
            Self::SetMixerParameterRequest(_) | Self::SetMixerParameterResponse => {
                FrameType::SetMixerParameter
            }
            Self::UidRequest | Self::UidResponse(_) => FrameType::Uid,
            Self::PasswordRequest | Self::PasswordResponse(_) => FrameType::Password,
            Self::EcomaxControlRequest(_) | Self::EcomaxControlResponse => {
                FrameType::EcomaxControl
            }
            Self::AlertsRequest(_) | Self::AlertsResponse(_) => FrameType::Alerts,
            Self::ProgramVersionRequest | Self::ProgramVersionResponse(_) => {
                FrameType::ProgramVersion
            }
            Self::SchedulesRequest | Self::SchedulesResponse(_) => FrameType::Schedules,
            Self::SetScheduleRequest(_) | Self::SetScheduleResponse => FrameType::SetSchedule,
            Self::ThermostatParametersRequest(_) | Self::ThermostatParametersResponse(_) => {
                FrameType::ThermostatParameters
            }
            Self::SetThermostatParameterRequest(_) | Self::SetThermostatParameterResponse => {
                FrameType::SetThermostatParameter
            }
            Self::RegulatorDataSchemaRequest | Self::RegulatorDataSchemaResponse(_) => {
                FrameType::RegulatorDataSchema
            }
            Self::SensorData(_) => FrameType::SensorData,
            Self::RegulatorData(_) => FrameType::RegulatorData,
            Self::Unknown { .. } => return None,
        })
    }

    /// Directional category of this body.
    #[must_use]
    pub fn direction(&self) -> Direction {
        match self {
            Self::StopMasterRequest
            | Self::StartMasterRequest
            | Self::CheckDeviceRequest
            | Self::EcomaxParametersRequest(_)
            | Self::MixerParametersRequest(_)
            | Self::SetEcomaxParameterRequest(_)
            | Self::SetMixerParameterRequest(_)
            | Self::UidRequest
            | Self::PasswordRequest
            | Self::EcomaxControlRequest(_)
            | Self::AlertsRequest(_)
            | Self::ProgramVersionRequest
            | Self::SchedulesRequest
            | Self::SetScheduleRequest(_)
            | Self::ThermostatParametersRequest(_)
            | Self::SetThermostatParameterRequest(_)
            | Self::RegulatorDataSchemaRequest => Direction::Request,

            Self::DeviceAvailableResponse(_)
            | Self::EcomaxParametersResponse(_)
            | Self::MixerParametersResponse(_)
            | Self::SetEcomaxParameterResponse
            | Self::SetMixerParameterResponse
            | Self::UidResponse(_)
            | Self::PasswordResponse(_)
            | Self::EcomaxControlResponse
            | Self::AlertsResponse(_)
            | Self::ProgramVersionResponse(_)
            | Self::SchedulesResponse(_)
            | Self::SetScheduleResponse
            | Self::ThermostatParametersResponse(_)
            | Self::SetThermostatParameterResponse
            | Self::RegulatorDataSchemaResponse(_) => Direction::Response,

            Self::SensorData(_) | Self::RegulatorData(_) | Self::Unknown { .. } => {
                Direction::Message
            }
        }
    }

    /// Code this body carries on the wire.
    #[must_use]
    pub fn wire_code(&self) -> u8 {
        match (self.frame_type(), self.direction()) {
            (Some(ft), Direction::Response) => ft.response_code(),
            (Some(ft), _) => ft.request_code(),
            (None, _) => match self {
                Self::Unknown { code, .. } => *code,
                // frame_type() is None only for Unknown.
                _ => 0,
            },
        }
    }

    /// Decode a body from its wire code and raw bytes.
    ///
    /// Codes outside the registry become [`Payload::Unknown`]; trailing
    /// bytes after a known structure are tolerated.
    pub fn decode(code: u8, body: &[u8]) -> Result<Self, ProtocolError> {
        let Some((frame_type, direction)) = FrameType::from_wire(code) else {
            return Ok(Self::Unknown { code, body: Bytes::copy_from_slice(body) });
        };

        let mut r = ByteReader::new(body);
        Ok(match (frame_type, direction) {
            (FrameType::StopMaster, Direction::Request) => Self::StopMasterRequest,
            (FrameType::StartMaster, Direction::Request) => Self::StartMasterRequest,
            (FrameType::CheckDevice, Direction::Request) => Self::CheckDeviceRequest,
            (FrameType::CheckDevice, Direction::Response) => {
                Self::DeviceAvailableResponse(network::NetworkInfo::decode(&mut r)?)
            }
            (FrameType::EcomaxParameters, Direction::Request) => {
                Self::EcomaxParametersRequest(params::ParameterRange::decode(&mut r)?)
            }
            (FrameType::EcomaxParameters, Direction::Response) => Self::EcomaxParametersResponse(
                params::ParameterBatch::decode(&mut r, &params::ECOMAX)?,
            ),
            (FrameType::MixerParameters, Direction::Request) => {
                Self::MixerParametersRequest(params::SubdeviceParameterRange::decode(&mut r)?)
            }
            (FrameType::MixerParameters, Direction::Response) => Self::MixerParametersResponse(
                params::SubdeviceParameterBatch::decode(&mut r, &params::MIXER)?,
            ),
            (FrameType::SetEcomaxParameter, Direction::Request) => Self::SetEcomaxParameterRequest(
                params::SetParameter::decode(&mut r, &params::ECOMAX)?,
            ),
            (FrameType::SetEcomaxParameter, Direction::Response) => {
                Self::SetEcomaxParameterResponse
            }
            (FrameType::SetMixerParameter, Direction::Request) => Self::SetMixerParameterRequest(
                params::SetSubdeviceParameter::decode(&mut r, &params::MIXER)?,
            ),
            (FrameType::SetMixerParameter, Direction::Response) => Self::SetMixerParameterResponse,
            (FrameType::Uid, Direction::Request) => Self::UidRequest,
            (FrameType::Uid, Direction::Response) => {
                Self::UidResponse(product::ProductInfo::decode(&mut r)?)
            }
            (FrameType::Password, Direction::Request) => Self::PasswordRequest,
            (FrameType::Password, Direction::Response) => {
                let password = r.read_string()?;
                Self::PasswordResponse((!password.is_empty()).then_some(password))
            }
            (FrameType::EcomaxControl, Direction::Request) => {
                Self::EcomaxControlRequest(params::ControlState::decode(&mut r)?)
            }
            (FrameType::EcomaxControl, Direction::Response) => Self::EcomaxControlResponse,
            (FrameType::Alerts, Direction::Request) => {
                Self::AlertsRequest(alerts::AlertsRange::decode(&mut r)?)
            }
            (FrameType::Alerts, Direction::Response) => {
                Self::AlertsResponse(alerts::AlertsBatch::decode(&mut r)?)
            }
            (FrameType::ProgramVersion, Direction::Request) => Self::ProgramVersionRequest,
            (FrameType::ProgramVersion, Direction::Response) => {
                Self::ProgramVersionResponse(program::ProgramVersionInfo::decode(&mut r)?)
            }
            (FrameType::Schedules, Direction::Request) => Self::SchedulesRequest,
            (FrameType::Schedules, Direction::Response) => {
                Self::SchedulesResponse(schedules::SchedulesData::decode(&mut r)?)
            }
            (FrameType::SetSchedule, Direction::Request) => {
                Self::SetScheduleRequest(schedules::SchedulesData::decode(&mut r)?)
            }
            (FrameType::SetSchedule, Direction::Response) => Self::SetScheduleResponse,
            (FrameType::ThermostatParameters, Direction::Request) => {
                Self::ThermostatParametersRequest(params::SubdeviceParameterRange::decode(&mut r)?)
            }
            (FrameType::ThermostatParameters, Direction::Response) => {
                Self::ThermostatParametersResponse(params::SubdeviceParameterBatch::decode(
                    &mut r,
                    &params::THERMOSTAT,
                )?)
            }
            (FrameType::SetThermostatParameter, Direction::Request) => {
                Self::SetThermostatParameterRequest(params::SetSubdeviceParameter::decode(
                    &mut r,
                    &params::THERMOSTAT,
                )?)
            }
            (FrameType::SetThermostatParameter, Direction::Response) => {
                Self::SetThermostatParameterResponse
            }
            (FrameType::RegulatorDataSchema, Direction::Request) => {
                Self::RegulatorDataSchemaRequest
            }
            (FrameType::RegulatorDataSchema, Direction::Response) => {
                Self::RegulatorDataSchemaResponse(regdata::RegulatorSchema::decode(&mut r)?)
            }
            (FrameType::SensorData, Direction::Message) => {
                Self::SensorData(Box::new(sensor::SensorData::decode(&mut r)?))
            }
            (FrameType::RegulatorData, Direction::Message) => {
                Self::RegulatorData(regdata::RegulatorData::decode(&mut r)?)
            }
            // The registry never produces other combinations.
            _ => Self::Unknown { code, body: Bytes::copy_from_slice(body) },
        })
    }

    /// Encode the body bytes (envelope excluded).
    pub fn encode_body(&self) -> Result<Bytes, ProtocolError> {
        let mut w = ByteWriter::new();
        match self {
            Self::StopMasterRequest
            | Self::StartMasterRequest
            | Self::CheckDeviceRequest
            | Self::UidRequest
            | Self::PasswordRequest
            | Self::ProgramVersionRequest
            | Self::SchedulesRequest
            | Self::RegulatorDataSchemaRequest
            | Self::SetEcomaxParameterResponse
            | Self::SetMixerParameterResponse
            | Self::EcomaxControlResponse
            | Self::SetScheduleResponse
            | Self::SetThermostatParameterResponse => {}

            Self::EcomaxParametersRequest(range) => range.encode(&mut w),
            Self::MixerParametersRequest(range) => range.encode(&mut w),
            Self::ThermostatParametersRequest(range) => range.encode(&mut w),
            Self::SetEcomaxParameterRequest(set) => set.encode(&mut w, &params::ECOMAX),
            Self::SetMixerParameterRequest(set) => set.encode(&mut w, &params::MIXER),
            Self::SetThermostatParameterRequest(set) => set.encode(&mut w, &params::THERMOSTAT),
            Self::EcomaxControlRequest(state) => state.encode(&mut w),
            Self::AlertsRequest(range) => range.encode(&mut w),
            Self::SetScheduleRequest(data) => data.encode(&mut w),

            Self::DeviceAvailableResponse(info) => info.encode(&mut w),
            Self::EcomaxParametersResponse(batch) => batch.encode(&mut w, &params::ECOMAX),
            Self::MixerParametersResponse(batch) => batch.encode(&mut w, &params::MIXER),
            Self::ThermostatParametersResponse(batch) => {
                batch.encode(&mut w, &params::THERMOSTAT);
            }
            Self::UidResponse(info) => info.encode(&mut w),
            Self::PasswordResponse(password) => {
                w.put_string(password.as_deref().unwrap_or_default());
            }
            Self::AlertsResponse(batch) => batch.encode(&mut w),
            Self::ProgramVersionResponse(info) => info.encode(&mut w),
            Self::SchedulesResponse(data) => data.encode(&mut w),
            Self::RegulatorDataSchemaResponse(schema) => schema.encode(&mut w),

            Self::SensorData(data) => data.encode(&mut w),
            Self::RegulatorData(data) => data.encode(&mut w),

            Self::Unknown { body, .. } => w.put_bytes(body),
        }
        Ok(w.freeze())
    }
}
