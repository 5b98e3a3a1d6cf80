//! Fixed-layout sensor snapshot broadcast.
//!
//! SensorData is the controller's periodic heartbeat: output relay flags,
//! temperatures, targets, fuel metrics, attached module versions, and one
//! sensor block per thermostat and mixer. Temperatures of disconnected
//! probes arrive as NaN and their cells are simply omitted by the model;
//! thermostat and mixer slots with a NaN current temperature are
//! unoccupied and create no sub-device.

use crate::{
    codec::{ByteReader, ByteWriter, SoftwareVersion},
    errors::ProtocolError,
    payloads::versions::FrameVersions,
};

/// Wire byte marking an absent module-version slot.
const MODULE_ABSENT: u8 = 0xFF;

/// Temperature probe indices used by the snapshot.
const PROBE_NAMES: [&str; 9] = [
    "heating_temp",
    "feeder_temp",
    "water_heater_temp",
    "outside_temp",
    "return_temp",
    "exhaust_temp",
    "optical_temp",
    "upper_buffer_temp",
    "lower_buffer_temp",
];

/// Cell name for a probe index, if the index is known.
#[must_use]
pub fn probe_name(index: u8) -> Option<&'static str> {
    PROBE_NAMES.get(usize::from(index)).copied()
}

/// Output relay states, bit-packed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputStates {
    /// Exhaust fan running.
    pub fan: bool,
    /// Fuel feeder running.
    pub feeder: bool,
    /// Central-heating pump running.
    pub heating_pump: bool,
    /// Water-heater pump running.
    pub water_heater_pump: bool,
    /// Circulation pump running.
    pub circulation_pump: bool,
    /// Igniter energized.
    pub lighter: bool,
    /// Alarm output active.
    pub alarm: bool,
}

impl OutputStates {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let states = Self {
            fan: r.read_bool()?,
            feeder: r.read_bool()?,
            heating_pump: r.read_bool()?,
            water_heater_pump: r.read_bool()?,
            circulation_pump: r.read_bool()?,
            lighter: r.read_bool()?,
            alarm: r.read_bool()?,
        };
        r.align();
        Ok(states)
    }

    fn encode(&self, w: &mut ByteWriter) {
        for flag in [
            self.fan,
            self.feeder,
            self.heating_pump,
            self.water_heater_pump,
            self.circulation_pump,
            self.lighter,
            self.alarm,
        ] {
            w.put_bool(flag);
        }
        w.align();
    }

    /// `(cell name, state)` pairs for the device model.
    #[must_use]
    pub fn named(&self) -> [(&'static str, bool); 7] {
        [
            ("fan", self.fan),
            ("feeder", self.feeder),
            ("heating_pump", self.heating_pump),
            ("water_heater_pump", self.water_heater_pump),
            ("circulation_pump", self.circulation_pump),
            ("lighter", self.lighter),
            ("alarm", self.alarm),
        ]
    }
}

/// Controller operating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    /// Burner off.
    Off,
    /// Pre-ignition fanning.
    Fanning,
    /// Igniting.
    Kindling,
    /// Normal operation.
    Working,
    /// Supervision (ember-keeping) mode.
    Supervision,
    /// Cooling down.
    Cooling,
    /// State byte this library does not know, kept verbatim.
    Other(u8),
}

impl DeviceState {
    /// Decode a wire byte.
    #[must_use]
    pub fn from_wire(raw: u8) -> Self {
        match raw {
            0 => Self::Off,
            1 => Self::Fanning,
            2 => Self::Kindling,
            3 => Self::Working,
            4 => Self::Supervision,
            5 => Self::Cooling,
            other => Self::Other(other),
        }
    }

    /// Wire byte for this state.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::Off => 0,
            Self::Fanning => 1,
            Self::Kindling => 2,
            Self::Working => 3,
            Self::Supervision => 4,
            Self::Cooling => 5,
            Self::Other(raw) => raw,
        }
    }
}

/// Versions of the controller's pluggable modules; absent slots are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleVersions {
    /// Main board.
    pub module_a: Option<SoftwareVersion>,
    /// Expansion board B.
    pub module_b: Option<SoftwareVersion>,
    /// Expansion board C.
    pub module_c: Option<SoftwareVersion>,
    /// ecoLAN network module.
    pub ecolan: Option<SoftwareVersion>,
    /// ecoSTER room panel.
    pub ecoster: Option<SoftwareVersion>,
    /// Control panel.
    pub panel: Option<SoftwareVersion>,
}

impl ModuleVersions {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            module_a: Self::decode_slot(r)?,
            module_b: Self::decode_slot(r)?,
            module_c: Self::decode_slot(r)?,
            ecolan: Self::decode_slot(r)?,
            ecoster: Self::decode_slot(r)?,
            panel: Self::decode_slot(r)?,
        })
    }

    fn decode_slot(r: &mut ByteReader<'_>) -> Result<Option<SoftwareVersion>, ProtocolError> {
        let marker = r.read_u8()?;
        if marker == MODULE_ABSENT {
            return Ok(None);
        }
        // The marker byte is the BCD major component.
        let rest = r.read_bytes(2)?;
        let bytes = [marker, rest[0], rest[1]];
        let mut probe = ByteReader::new(&bytes);
        Ok(Some(probe.read_version()?))
    }

    fn encode(&self, w: &mut ByteWriter) {
        for slot in
            [self.module_a, self.module_b, self.module_c, self.ecolan, self.ecoster, self.panel]
        {
            match slot {
                Some(version) => w.put_version(&version),
                None => w.put_u8(MODULE_ABSENT),
            }
        }
    }
}

/// Per-thermostat sensor block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermostatSensors {
    /// Thermostat state byte (contact/schedule flags).
    pub state: u8,
    /// Measured room temperature; NaN marks an unoccupied slot.
    pub current_temp: f32,
    /// Target room temperature.
    pub target_temp: f32,
}

impl ThermostatSensors {
    /// True when the slot carries a live thermostat.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.current_temp.is_nan()
    }
}

/// Per-mixer sensor block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerSensors {
    /// Measured circuit temperature; NaN marks an unoccupied slot.
    pub current_temp: f32,
    /// Target circuit temperature.
    pub target_temp: u8,
    /// Mixer pump running.
    pub pump: bool,
}

impl MixerSensors {
    /// True when the slot carries a live mixer.
    #[must_use]
    pub fn is_present(&self) -> bool {
        !self.current_temp.is_nan()
    }
}

/// The full sensor snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SensorData {
    /// Frame-version table embedded at the head of the message.
    pub versions: FrameVersions,
    /// Output relay states.
    pub outputs: OutputStates,
    /// `(probe index, temperature)` pairs; see [`probe_name`].
    pub temperatures: Vec<(u8, f32)>,
    /// Heating-circuit target temperature.
    pub heating_target: u8,
    /// Heating-circuit status byte.
    pub heating_status: u8,
    /// Water-heater target temperature.
    pub water_heater_target: u8,
    /// Water-heater status byte.
    pub water_heater_status: u8,
    /// Number of alerts currently pending.
    pub pending_alerts: u8,
    /// Fuel level percentage.
    pub fuel_level: u8,
    /// Fan power percentage.
    pub fan_power: f32,
    /// Boiler load percentage.
    pub boiler_load: u8,
    /// Boiler power output in kW.
    pub boiler_power: f32,
    /// Fuel consumption in kg/h.
    pub fuel_consumption: f32,
    /// Fuel burned since the previous snapshot, in kg.
    pub fuel_burned: f32,
    /// Controller operating state.
    pub state: DeviceState,
    /// Attached module versions.
    pub modules: ModuleVersions,
    /// Thermostat sensor blocks in slot order.
    pub thermostats: Vec<ThermostatSensors>,
    /// Mixer sensor blocks in slot order.
    pub mixers: Vec<MixerSensors>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::Off
    }
}

impl SensorData {
    /// Decode the snapshot body.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let versions = FrameVersions::decode(r)?;
        let outputs = OutputStates::decode(r)?;

        let temp_count = usize::from(r.read_u8()?);
        let mut temperatures = Vec::with_capacity(temp_count);
        for _ in 0..temp_count {
            let index = r.read_u8()?;
            let value = r.read_f32()?;
            temperatures.push((index, value));
        }

        let heating_target = r.read_u8()?;
        let heating_status = r.read_u8()?;
        let water_heater_target = r.read_u8()?;
        let water_heater_status = r.read_u8()?;
        let pending_alerts = r.read_u8()?;

        let fuel_level = r.read_u8()?;
        let fan_power = r.read_f32()?;
        let boiler_load = r.read_u8()?;
        let boiler_power = r.read_f32()?;
        let fuel_consumption = r.read_f32()?;
        let fuel_burned = r.read_f32()?;
        let state = DeviceState::from_wire(r.read_u8()?);
        let modules = ModuleVersions::decode(r)?;

        let thermostat_count = usize::from(r.read_u8()?);
        let mut thermostats = Vec::with_capacity(thermostat_count);
        for _ in 0..thermostat_count {
            thermostats.push(ThermostatSensors {
                state: r.read_u8()?,
                current_temp: r.read_f32()?,
                target_temp: r.read_f32()?,
            });
        }

        let mixer_count = usize::from(r.read_u8()?);
        let mut mixers = Vec::with_capacity(mixer_count);
        for _ in 0..mixer_count {
            let current_temp = r.read_f32()?;
            let target_temp = r.read_u8()?;
            let pump = r.read_bool()?;
            r.align();
            mixers.push(MixerSensors { current_temp, target_temp, pump });
        }

        Ok(Self {
            versions,
            outputs,
            temperatures,
            heating_target,
            heating_status,
            water_heater_target,
            water_heater_status,
            pending_alerts,
            fuel_level,
            fan_power,
            boiler_load,
            boiler_power,
            fuel_consumption,
            fuel_burned,
            state,
            modules,
            thermostats,
            mixers,
        })
    }

    /// Encode the snapshot body.
    pub fn encode(&self, w: &mut ByteWriter) {
        self.versions.encode(w);
        self.outputs.encode(w);

        w.put_u8(self.temperatures.len().min(usize::from(u8::MAX)) as u8);
        for (index, value) in self.temperatures.iter().take(usize::from(u8::MAX)) {
            w.put_u8(*index);
            w.put_f32(*value);
        }

        w.put_u8(self.heating_target);
        w.put_u8(self.heating_status);
        w.put_u8(self.water_heater_target);
        w.put_u8(self.water_heater_status);
        w.put_u8(self.pending_alerts);

        w.put_u8(self.fuel_level);
        w.put_f32(self.fan_power);
        w.put_u8(self.boiler_load);
        w.put_f32(self.boiler_power);
        w.put_f32(self.fuel_consumption);
        w.put_f32(self.fuel_burned);
        w.put_u8(self.state.to_wire());
        self.modules.encode(w);

        w.put_u8(self.thermostats.len().min(usize::from(u8::MAX)) as u8);
        for block in self.thermostats.iter().take(usize::from(u8::MAX)) {
            w.put_u8(block.state);
            w.put_f32(block.current_temp);
            w.put_f32(block.target_temp);
        }

        w.put_u8(self.mixers.len().min(usize::from(u8::MAX)) as u8);
        for block in self.mixers.iter().take(usize::from(u8::MAX)) {
            w.put_f32(block.current_temp);
            w.put_u8(block.target_temp);
            w.put_bool(block.pump);
            w.align();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SensorData {
        SensorData {
            versions: [(49, 37), (50, 37)].into_iter().collect(),
            outputs: OutputStates { fan: true, heating_pump: true, ..OutputStates::default() },
            temperatures: vec![(0, 64.2), (2, 46.5), (5, 170.0)],
            heating_target: 65,
            heating_status: 0,
            water_heater_target: 50,
            water_heater_status: 128,
            pending_alerts: 0,
            fuel_level: 72,
            fan_power: 38.0,
            boiler_load: 57,
            boiler_power: 14.5,
            fuel_consumption: 2.75,
            fuel_burned: 0.02,
            state: DeviceState::Working,
            modules: ModuleVersions {
                module_a: Some(SoftwareVersion::new(6, 10, 32)),
                panel: Some(SoftwareVersion::new(6, 30, 36)),
                ..ModuleVersions::default()
            },
            thermostats: vec![ThermostatSensors {
                state: 2,
                current_temp: 21.5,
                target_temp: 22.0,
            }],
            mixers: vec![MixerSensors { current_temp: 38.5, target_temp: 40, pump: true }],
        }
    }

    #[test]
    fn snapshot_round_trips() {
        let data = sample();
        let mut w = ByteWriter::new();
        data.encode(&mut w);
        let bytes = w.freeze();

        let mut r = ByteReader::new(&bytes);
        let decoded = SensorData::decode(&mut r).unwrap();
        assert_eq!(decoded, data);
        assert!(r.is_empty());
    }

    #[test]
    fn absent_modules_are_one_byte() {
        let modules = ModuleVersions::default();
        let mut w = ByteWriter::new();
        modules.encode(&mut w);
        assert_eq!(w.len(), 6);
    }

    #[test]
    fn unknown_state_byte_survives() {
        assert_eq!(DeviceState::from_wire(23), DeviceState::Other(23));
        assert_eq!(DeviceState::Other(23).to_wire(), 23);
    }

    #[test]
    fn nan_slots_report_absent() {
        let block =
            ThermostatSensors { state: 0, current_temp: f32::NAN, target_temp: 0.0 };
        assert!(!block.is_present());
        let mixer = MixerSensors { current_temp: 38.5, target_temp: 40, pump: false };
        assert!(mixer.is_present());
    }

    #[test]
    fn probe_names_cover_the_known_indices() {
        assert_eq!(probe_name(0), Some("heating_temp"));
        assert_eq!(probe_name(5), Some("exhaust_temp"));
        assert_eq!(probe_name(200), None);
    }
}
