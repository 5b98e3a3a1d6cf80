//! The ecoMAX root device and its mixer/thermostat sub-devices.
//!
//! The root device owns everything the controller reports: data cells,
//! editable parameters, schedules, the regulator-data schema, and the
//! sub-device registries. Sub-devices are created lazily when the wire
//! first mentions their index (indices are trusted verbatim and may be
//! sparse) and are destroyed with the root.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use econet_proto::{
    Frame, Payload, Value,
    payloads::{
        Catalogue, ParameterBatch, RegulatorData, RegulatorSchema, SensorData, params, probe_name,
        schedule_id,
    },
};

use crate::{
    command::{self, CommandSink},
    config::ProtocolConfig,
    device::{Device, DeviceData, lock},
    error::DeviceError,
    param::{Parameter, ParameterTarget},
    schedule::{Schedule, ScheduleStore},
};

/// Which sub-device family an index belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubdeviceKind {
    Mixer,
    Thermostat,
}

impl SubdeviceKind {
    fn catalogue(self) -> &'static Catalogue {
        match self {
            Self::Mixer => &params::MIXER,
            Self::Thermostat => &params::THERMOSTAT,
        }
    }

    fn target(self, index: u8) -> ParameterTarget {
        match self {
            Self::Mixer => ParameterTarget::Mixer(index),
            Self::Thermostat => ParameterTarget::Thermostat(index),
        }
    }

    fn device_name(self, index: u8) -> String {
        match self {
            Self::Mixer => format!("mixer_{index}"),
            Self::Thermostat => format!("thermostat_{index}"),
        }
    }
}

struct SubdeviceInner {
    kind: SubdeviceKind,
    index: u8,
    device: Arc<DeviceData>,
    parameters: Mutex<BTreeMap<String, Parameter>>,
    sink: CommandSink,
    config: ProtocolConfig,
}

impl SubdeviceInner {
    fn new(kind: SubdeviceKind, index: u8, sink: CommandSink, config: ProtocolConfig) -> Self {
        Self {
            kind,
            index,
            device: Arc::new(DeviceData::new(kind.device_name(index))),
            parameters: Mutex::new(BTreeMap::new()),
            sink,
            config,
        }
    }

    fn apply_batch(&self, batch: &ParameterBatch) {
        apply_parameter_batch(
            self.kind.catalogue(),
            self.kind.target(self.index),
            &self.device,
            &self.parameters,
            &self.sink,
            &self.config,
            batch,
        );
    }
}

/// A mixer circuit attached to the ecoMAX.
#[derive(Clone)]
pub struct Mixer {
    inner: Arc<SubdeviceInner>,
}

/// A room thermostat attached to the ecoMAX.
#[derive(Clone)]
pub struct Thermostat {
    inner: Arc<SubdeviceInner>,
}

macro_rules! subdevice_api {
    ($ty:ident) => {
        impl $ty {
            /// Zero-based index under the ecoMAX.
            #[must_use]
            pub fn index(&self) -> u8 {
                self.inner.index
            }

            /// Value of a cell, waiting up to `wait` for it to appear.
            pub async fn get(&self, key: &str, wait: Duration) -> Result<Value, DeviceError> {
                self.inner.device.get(key, wait).await
            }

            /// Wait until a cell exists, up to `wait`.
            pub async fn wait_for(&self, key: &str, wait: Duration) -> Result<Value, DeviceError> {
                self.inner.device.wait_for(key, wait).await
            }

            /// Editable parameter by name.
            #[must_use]
            pub fn parameter(&self, name: &str) -> Option<Parameter> {
                lock(&self.inner.parameters).get(name).cloned()
            }

            /// Every parameter the controller reported, by name.
            #[must_use]
            pub fn parameters(&self) -> BTreeMap<String, Parameter> {
                lock(&self.inner.parameters).clone()
            }

            /// Write a parameter by name and await the confirmation.
            pub async fn set(&self, name: &str, raw: u16) -> Result<bool, DeviceError> {
                let Some(parameter) = self.parameter(name) else {
                    return Err(DeviceError::UnknownParameter(name.to_string()));
                };
                parameter.set(raw).await
            }

            /// Write a parameter by name without awaiting confirmation.
            pub fn set_nowait(&self, name: &str, raw: u16) -> Result<(), DeviceError> {
                let Some(parameter) = self.parameter(name) else {
                    return Err(DeviceError::UnknownParameter(name.to_string()));
                };
                parameter.set_nowait(raw)
            }
        }

        impl Device for $ty {
            fn device_data(&self) -> &DeviceData {
                &self.inner.device
            }
        }

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty)).field("index", &self.inner.index).finish()
            }
        }
    };
}

subdevice_api!(Mixer);
subdevice_api!(Thermostat);

struct EcoMaxInner {
    device: Arc<DeviceData>,
    sink: CommandSink,
    config: ProtocolConfig,
    parameters: Mutex<BTreeMap<String, Parameter>>,
    mixers: Mutex<BTreeMap<u8, Mixer>>,
    thermostats: Mutex<BTreeMap<u8, Thermostat>>,
    schedules: Arc<ScheduleStore>,
    schema: Mutex<Option<RegulatorSchema>>,
    /// RegulatorData that arrived before its schema; replayed once the
    /// schema lands.
    pending_regdata: Mutex<Option<RegulatorData>>,
}

/// The ecoMAX controller as seen by application code.
#[derive(Clone)]
pub struct EcoMax {
    inner: Arc<EcoMaxInner>,
}

impl std::fmt::Debug for EcoMax {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcoMax").finish()
    }
}

impl Device for EcoMax {
    fn device_data(&self) -> &DeviceData {
        &self.inner.device
    }
}

impl EcoMax {
    /// Create the root device over a writer-queue handle.
    #[must_use]
    pub fn new(sink: CommandSink, config: ProtocolConfig) -> Self {
        Self {
            inner: Arc::new(EcoMaxInner {
                device: Arc::new(DeviceData::new("ecomax")),
                schedules: Arc::new(ScheduleStore::new(sink.clone(), config.clone())),
                sink,
                config,
                parameters: Mutex::new(BTreeMap::new()),
                mixers: Mutex::new(BTreeMap::new()),
                thermostats: Mutex::new(BTreeMap::new()),
                schema: Mutex::new(None),
                pending_regdata: Mutex::new(None),
            }),
        }
    }

    /// Value of a cell, waiting up to `wait` for it to appear.
    pub async fn get(&self, key: &str, wait: Duration) -> Result<Value, DeviceError> {
        self.inner.device.get(key, wait).await
    }

    /// Wait until a cell exists, up to `wait`.
    pub async fn wait_for(&self, key: &str, wait: Duration) -> Result<Value, DeviceError> {
        self.inner.device.wait_for(key, wait).await
    }

    /// Editable parameter by name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<Parameter> {
        lock(&self.inner.parameters).get(name).cloned()
    }

    /// Every parameter the controller reported, by name.
    #[must_use]
    pub fn parameters(&self) -> BTreeMap<String, Parameter> {
        lock(&self.inner.parameters).clone()
    }

    /// Write a parameter by name and await the confirmation.
    pub async fn set(&self, name: &str, raw: u16) -> Result<bool, DeviceError> {
        let Some(parameter) = self.parameter(name) else {
            return Err(DeviceError::UnknownParameter(name.to_string()));
        };
        parameter.set(raw).await
    }

    /// Write a parameter by name without awaiting confirmation.
    pub fn set_nowait(&self, name: &str, raw: u16) -> Result<(), DeviceError> {
        let Some(parameter) = self.parameter(name) else {
            return Err(DeviceError::UnknownParameter(name.to_string()));
        };
        parameter.set_nowait(raw)
    }

    /// Handle to a named schedule; `None` for names the protocol does
    /// not define.
    #[must_use]
    pub fn schedule(&self, name: &str) -> Option<Schedule> {
        let id = schedule_id(name)?;
        Some(Schedule::new(Arc::clone(&self.inner.schedules), id))
    }

    /// Mixer by index, if the controller mentioned it.
    #[must_use]
    pub fn mixer(&self, index: u8) -> Option<Mixer> {
        lock(&self.inner.mixers).get(&index).cloned()
    }

    /// Every known mixer, by index.
    #[must_use]
    pub fn mixers(&self) -> BTreeMap<u8, Mixer> {
        lock(&self.inner.mixers).clone()
    }

    /// Thermostat by index, if the controller mentioned it.
    #[must_use]
    pub fn thermostat(&self, index: u8) -> Option<Thermostat> {
        lock(&self.inner.thermostats).get(&index).cloned()
    }

    /// Every known thermostat, by index.
    #[must_use]
    pub fn thermostats(&self) -> BTreeMap<u8, Thermostat> {
        lock(&self.inner.thermostats).clone()
    }

    /// Indices of every known mixer.
    #[must_use]
    pub fn mixer_indices(&self) -> Vec<u8> {
        lock(&self.inner.mixers).keys().copied().collect()
    }

    /// Indices of every known thermostat.
    #[must_use]
    pub fn thermostat_indices(&self) -> Vec<u8> {
        lock(&self.inner.thermostats).keys().copied().collect()
    }

    /// The regulator-data schema, once it arrived.
    #[must_use]
    pub fn regulator_schema(&self) -> Option<RegulatorSchema> {
        lock(&self.inner.schema).clone()
    }

    /// Switch the controller on; `Ok(false)` when no ack arrived.
    pub async fn turn_on(&self) -> Result<bool, DeviceError> {
        self.control(true).await
    }

    /// Switch the controller off; `Ok(false)` when no ack arrived.
    pub async fn turn_off(&self) -> Result<bool, DeviceError> {
        self.control(false).await
    }

    async fn control(&self, state: bool) -> Result<bool, DeviceError> {
        let frame = Frame::request(Payload::EcomaxControlRequest(params::ControlState(state)));
        match command::request(&self.inner.sink, &self.inner.config, frame, None).await {
            Ok(_) => Ok(true),
            Err(DeviceError::Timeout) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Fetch the service password from the controller.
    pub async fn password(&self) -> Result<Option<String>, DeviceError> {
        let frame = Frame::request(Payload::PasswordRequest);
        match command::request(&self.inner.sink, &self.inner.config, frame, None).await? {
            Payload::PasswordResponse(password) => Ok(password),
            _ => Ok(None),
        }
    }

    /// Destroy the device tree: waiters on the root and every sub-device
    /// resolve with `ConnectionClosed`.
    pub fn close(&self) {
        self.inner.device.close();
        for mixer in lock(&self.inner.mixers).values() {
            mixer.inner.device.close();
        }
        for thermostat in lock(&self.inner.thermostats).values() {
            thermostat.inner.device.close();
        }
    }

    fn ensure_mixer(&self, index: u8) -> Mixer {
        lock(&self.inner.mixers)
            .entry(index)
            .or_insert_with(|| Mixer {
                inner: Arc::new(SubdeviceInner::new(
                    SubdeviceKind::Mixer,
                    index,
                    self.inner.sink.clone(),
                    self.inner.config.clone(),
                )),
            })
            .clone()
    }

    fn ensure_thermostat(&self, index: u8) -> Thermostat {
        lock(&self.inner.thermostats)
            .entry(index)
            .or_insert_with(|| Thermostat {
                inner: Arc::new(SubdeviceInner::new(
                    SubdeviceKind::Thermostat,
                    index,
                    self.inner.sink.clone(),
                    self.inner.config.clone(),
                )),
            })
            .clone()
    }

    /// Apply one inbound payload to the device tree.
    ///
    /// Responses with no pending waiter land here as well, so the model
    /// always reflects the newest information.
    pub fn handle_payload(&self, payload: &Payload) {
        match payload {
            Payload::SensorData(data) => self.apply_sensor_data(data),
            Payload::RegulatorData(data) => self.apply_regulator_data(data),
            Payload::RegulatorDataSchemaResponse(schema) => {
                *lock(&self.inner.schema) = Some(schema.clone());
                let pending = lock(&self.inner.pending_regdata).take();
                if let Some(data) = pending {
                    self.apply_regulator_data(&data);
                }
            }
            Payload::EcomaxParametersResponse(batch) => {
                apply_parameter_batch(
                    &params::ECOMAX,
                    ParameterTarget::Ecomax,
                    &self.inner.device,
                    &self.inner.parameters,
                    &self.inner.sink,
                    &self.inner.config,
                    batch,
                );
            }
            Payload::MixerParametersResponse(batch) => {
                self.ensure_mixer(batch.device_index).inner.apply_batch(&batch.batch);
            }
            Payload::ThermostatParametersResponse(batch) => {
                self.ensure_thermostat(batch.device_index).inner.apply_batch(&batch.batch);
            }
            Payload::SchedulesResponse(data) => self.inner.schedules.absorb(data),
            Payload::AlertsResponse(batch) => {
                let alerts = batch
                    .alerts
                    .iter()
                    .map(|alert| {
                        let mut map = BTreeMap::new();
                        map.insert("code".to_string(), Value::from(alert.code));
                        map.insert("from".to_string(), Value::from(alert.from.to_string()));
                        if let Some(to) = alert.to {
                            map.insert("to".to_string(), Value::from(to.to_string()));
                        }
                        Value::Map(map)
                    })
                    .collect();
                self.inner.device.insert("alerts", Value::List(alerts));
            }
            Payload::UidResponse(info) => {
                self.inner.device.insert("product_uid", Value::from(info.uid_string()));
                self.inner.device.insert("product_model", Value::from(info.model.clone()));
                self.inner.device.insert("product_type", Value::from(info.product_type));
                self.inner.device.insert("product_id", Value::from(info.id));
            }
            Payload::PasswordResponse(Some(password)) => {
                self.inner.device.insert("password", Value::from(password.clone()));
            }
            Payload::ProgramVersionResponse(info) => {
                self.inner.device.insert("software_version", Value::from(info.version.to_string()));
            }
            _ => {}
        }
    }

    fn apply_sensor_data(&self, data: &SensorData) {
        let device = &self.inner.device;

        device.insert("state", Value::from(data.state.to_wire()));
        for (name, state) in data.outputs.named() {
            device.insert(name, Value::Bool(state));
        }
        for (index, temperature) in &data.temperatures {
            let Some(name) = probe_name(*index) else { continue };
            if temperature.is_nan() {
                continue;
            }
            device.insert(name, Value::from(*temperature));
        }

        device.insert("heating_target", Value::from(data.heating_target));
        device.insert("heating_status", Value::from(data.heating_status));
        device.insert("water_heater_target", Value::from(data.water_heater_target));
        device.insert("water_heater_status", Value::from(data.water_heater_status));
        device.insert("pending_alerts", Value::from(data.pending_alerts));
        device.insert("fuel_level", Value::from(data.fuel_level));
        device.insert("fan_power", Value::from(data.fan_power));
        device.insert("boiler_load", Value::from(data.boiler_load));
        device.insert("boiler_power", Value::from(data.boiler_power));
        device.insert("fuel_consumption", Value::from(data.fuel_consumption));
        device.insert("fuel_burned", Value::from(data.fuel_burned));

        for (name, version) in [
            ("module_a_version", data.modules.module_a),
            ("module_b_version", data.modules.module_b),
            ("module_c_version", data.modules.module_c),
            ("ecolan_version", data.modules.ecolan),
            ("ecoster_version", data.modules.ecoster),
            ("panel_version", data.modules.panel),
        ] {
            if let Some(version) = version {
                device.insert(name, Value::from(version.to_string()));
            }
        }

        let mut thermostats_connected = 0u32;
        for (index, block) in data.thermostats.iter().enumerate() {
            if !block.is_present() {
                continue;
            }
            thermostats_connected += 1;
            let thermostat = self.ensure_thermostat(index as u8);
            thermostat.inner.device.insert("state", Value::from(block.state));
            thermostat.inner.device.insert("current_temp", Value::from(block.current_temp));
            thermostat.inner.device.insert("target_temp", Value::from(block.target_temp));
        }
        device.insert("thermostats_connected", Value::from(thermostats_connected));

        let mut mixers_connected = 0u32;
        for (index, block) in data.mixers.iter().enumerate() {
            if !block.is_present() {
                continue;
            }
            mixers_connected += 1;
            let mixer = self.ensure_mixer(index as u8);
            mixer.inner.device.insert("current_temp", Value::from(block.current_temp));
            mixer.inner.device.insert("target_temp", Value::from(block.target_temp));
            mixer.inner.device.insert("pump", Value::Bool(block.pump));
        }
        device.insert("mixers_connected", Value::from(mixers_connected));
    }

    fn apply_regulator_data(&self, data: &RegulatorData) {
        let schema = lock(&self.inner.schema).clone();
        let Some(schema) = schema else {
            tracing::debug!("regulator data before schema; holding one message back");
            *lock(&self.inner.pending_regdata) = Some(data.clone());
            return;
        };

        match data.decode_values(&schema) {
            Ok(values) => {
                for (key, value) in values {
                    self.inner.device.insert(&format!("regdata.{key}"), value);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "regulator data does not match the schema");
            }
        }
    }
}

fn apply_parameter_batch(
    catalogue: &'static Catalogue,
    target: ParameterTarget,
    device: &Arc<DeviceData>,
    parameters: &Mutex<BTreeMap<String, Parameter>>,
    sink: &CommandSink,
    config: &ProtocolConfig,
    batch: &ParameterBatch,
) {
    // Create or look up under the lock, update outside it: updates fan
    // out to subscribers that may reach back into the parameter map.
    let mut updates = Vec::with_capacity(batch.values.len());
    {
        let mut map = lock(parameters);
        for (index, values) in &batch.values {
            let Some(spec) = catalogue.get(*index) else { continue };
            let parameter = map
                .entry(spec.name.to_string())
                .or_insert_with(|| {
                    Parameter::new(
                        spec,
                        *index,
                        target,
                        *values,
                        Arc::clone(device),
                        sink.clone(),
                        config.clone(),
                    )
                })
                .clone();
            updates.push((parameter, *values));
        }
    }
    for (parameter, values) in updates {
        parameter.update(values);
    }
}
