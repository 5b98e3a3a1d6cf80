//! Editable-parameter catalogues and their wire codecs.
//!
//! The controller reports parameters as `(value, min, max)` triples in
//! catalogue order. The catalogue fixes everything the wire leaves
//! implicit: the name, the field width (one or two bytes), whether the
//! parameter is a number or a switch, and the scale/offset that turns the
//! raw integer into a rendered value. A triple of all-0xFF bytes marks a
//! parameter the controller does not expose; such slots are filtered out.

use crate::{
    codec::{ByteReader, ByteWriter},
    errors::ProtocolError,
};

/// Whether a parameter is a free number or an on/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    /// Numeric parameter rendered as `raw * scale + offset`.
    Number,
    /// Boolean switch; raw 0 is off, raw 1 is on.
    Switch,
}

/// Static descriptor for one catalogue slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSpec {
    /// Cell name the parameter surfaces under.
    pub name: &'static str,
    /// Wire width of each triple field in bytes (1 or 2).
    pub size: u8,
    /// Number or switch.
    pub kind: ParameterKind,
    /// Multiplier applied to the raw value.
    pub scale: f64,
    /// Offset added after scaling.
    pub offset: f64,
    /// Display unit, if the parameter has one.
    pub unit: Option<&'static str>,
}

impl ParameterSpec {
    /// Plain one-byte numeric parameter.
    const fn number(name: &'static str) -> Self {
        Self { name, size: 1, kind: ParameterKind::Number, scale: 1.0, offset: 0.0, unit: None }
    }

    /// One-byte switch.
    const fn switch(name: &'static str) -> Self {
        Self { name, size: 1, kind: ParameterKind::Switch, scale: 1.0, offset: 0.0, unit: None }
    }

    /// Numeric parameter with an explicit width and scaling.
    const fn scaled(name: &'static str, size: u8, scale: f64, offset: f64) -> Self {
        Self { name, size, kind: ParameterKind::Number, scale, offset, unit: None }
    }

    const fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Rendered value for a raw integer.
    #[must_use]
    pub fn render(&self, raw: u16) -> f64 {
        f64::from(raw) * self.scale + self.offset
    }
}

/// An ordered parameter catalogue.
#[derive(Debug, Clone, Copy)]
pub struct Catalogue {
    /// Catalogue name, used in diagnostics.
    pub name: &'static str,
    specs: &'static [ParameterSpec],
}

impl Catalogue {
    /// Descriptor at a wire index.
    #[must_use]
    pub fn get(&self, index: u8) -> Option<&'static ParameterSpec> {
        self.specs.get(usize::from(index))
    }

    /// Wire index of a named parameter.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<u8> {
        self.specs.iter().position(|spec| spec.name == name).map(|i| i as u8)
    }

    /// Number of slots in the catalogue.
    #[must_use]
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// True when the catalogue has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Iterate `(index, spec)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, &'static ParameterSpec)> {
        self.specs.iter().enumerate().map(|(i, spec)| (i as u8, spec))
    }
}

/// ecoMAX controller parameters, in wire order.
pub static ECOMAX: Catalogue = Catalogue {
    name: "ecomax",
    specs: &[
        ParameterSpec::number("airflow_power_100").unit("%"),
        ParameterSpec::number("airflow_power_50").unit("%"),
        ParameterSpec::number("airflow_power_30").unit("%"),
        ParameterSpec::number("power_100").unit("%"),
        ParameterSpec::number("power_50").unit("%"),
        ParameterSpec::number("power_30").unit("%"),
        ParameterSpec::number("max_fan_boiler_power").unit("%"),
        ParameterSpec::number("min_fan_boiler_power").unit("%"),
        ParameterSpec::number("fuel_feeding_time_100").unit("s"),
        ParameterSpec::number("fuel_feeding_time_50").unit("s"),
        ParameterSpec::number("fuel_feeding_time_30").unit("s"),
        ParameterSpec::number("fuel_feeding_break_100").unit("s"),
        ParameterSpec::number("fuel_feeding_break_50").unit("s"),
        ParameterSpec::number("fuel_feeding_break_30").unit("s"),
        ParameterSpec::number("cycle_time").unit("s"),
        ParameterSpec::number("h2_hysteresis").unit("\u{b0}C"),
        ParameterSpec::number("h1_hysteresis").unit("\u{b0}C"),
        ParameterSpec::number("heating_hysteresis").unit("\u{b0}C"),
        ParameterSpec::switch("fuzzy_logic"),
        ParameterSpec::number("min_fuzzy_logic_power").unit("%"),
        ParameterSpec::number("max_fuzzy_logic_power").unit("%"),
        ParameterSpec::number("min_boiler_power").unit("kW"),
        ParameterSpec::number("max_boiler_power").unit("kW"),
        ParameterSpec::number("min_fan_power").unit("%"),
        ParameterSpec::number("max_fan_power").unit("%"),
        ParameterSpec::number("reduction_airflow_temp").unit("\u{b0}C"),
        ParameterSpec::number("fan_power_gain"),
        ParameterSpec::number("fuel_flow_correction").unit("%"),
        ParameterSpec::scaled("fuel_calorific_value", 1, 0.1, 0.0).unit("kWh/kg"),
        ParameterSpec::number("heating_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("min_heating_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("max_heating_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("heating_pump_enable_temp").unit("\u{b0}C"),
        ParameterSpec::number("pause_heating_for_water_heater").unit("min"),
        ParameterSpec::number("pause_term").unit("min"),
        ParameterSpec::number("work_term").unit("min"),
        ParameterSpec::number("increase_heating_temp_for_water_heater").unit("\u{b0}C"),
        ParameterSpec::switch("heating_weather_control"),
        ParameterSpec::scaled("heating_heat_curve", 1, 0.1, 0.0),
        ParameterSpec::scaled("heating_heat_curve_shift", 1, 1.0, -20.0).unit("\u{b0}C"),
        ParameterSpec::number("weather_factor"),
        ParameterSpec::number("term_boiler_operation"),
        ParameterSpec::number("term_boiler_mode"),
        ParameterSpec::number("decrease_set_heating_term").unit("\u{b0}C"),
        ParameterSpec::number("term_pump_off"),
        ParameterSpec::number("al_boiler_temp").unit("\u{b0}C"),
        ParameterSpec::number("max_feeder_temp").unit("\u{b0}C"),
        ParameterSpec::number("external_boiler_temp").unit("\u{b0}C"),
        ParameterSpec::switch("alarm_notify"),
        ParameterSpec::number("pump_hysteresis").unit("\u{b0}C"),
        ParameterSpec::number("water_heater_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("min_water_heater_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("max_water_heater_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("water_heater_work_mode"),
        ParameterSpec::number("water_heater_hysteresis").unit("\u{b0}C"),
        ParameterSpec::switch("water_heater_disinfection"),
        ParameterSpec::number("summer_mode"),
        ParameterSpec::number("summer_mode_on_temp").unit("\u{b0}C"),
        ParameterSpec::number("summer_mode_off_temp").unit("\u{b0}C"),
        ParameterSpec::number("water_heater_feeding_extension").unit("min"),
        ParameterSpec::switch("circulation_control"),
        ParameterSpec::number("circulation_pause_time").unit("min"),
        ParameterSpec::number("circulation_work_time").unit("min"),
        ParameterSpec::number("circulation_start_temp").unit("\u{b0}C"),
        ParameterSpec::switch("buffer_control"),
        ParameterSpec::number("min_buffer_temp").unit("\u{b0}C"),
        ParameterSpec::number("max_buffer_temp").unit("\u{b0}C"),
        ParameterSpec::number("buffer_hysteresis").unit("\u{b0}C"),
        ParameterSpec::number("buffer_load_start").unit("%"),
        ParameterSpec::number("buffer_load_stop").unit("%"),
    ],
};

/// Mixer sub-device parameters, in wire order.
pub static MIXER: Catalogue = Catalogue {
    name: "mixer",
    specs: &[
        ParameterSpec::number("mixer_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("min_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("max_target_temp").unit("\u{b0}C"),
        ParameterSpec::number("thermostat_decrease_temp").unit("\u{b0}C"),
        ParameterSpec::switch("weather_control"),
        ParameterSpec::scaled("heat_curve", 1, 0.1, 0.0),
        ParameterSpec::scaled("parallel_offset_heat_curve", 1, 1.0, -20.0).unit("\u{b0}C"),
        ParameterSpec::number("weather_temp_factor"),
        ParameterSpec::number("work_mode"),
        ParameterSpec::number("insensitivity_time").unit("min"),
        ParameterSpec::number("thermostat_operation"),
        ParameterSpec::number("thermostat_mode"),
        ParameterSpec::switch("disable_pump_on_thermostat"),
        ParameterSpec::switch("summer_work"),
    ],
};

/// Thermostat sub-device parameters, in wire order.
///
/// Temperatures travel as two-byte tenths of a degree.
pub static THERMOSTAT: Catalogue = Catalogue {
    name: "thermostat",
    specs: &[
        ParameterSpec::number("mode"),
        ParameterSpec::scaled("party_target_temp", 2, 0.1, 0.0).unit("\u{b0}C"),
        ParameterSpec::scaled("holidays_target_temp", 2, 0.1, 0.0).unit("\u{b0}C"),
        ParameterSpec::scaled("correction", 1, 0.1, 0.0).unit("\u{b0}C"),
        ParameterSpec::number("away_timer").unit("h"),
        ParameterSpec::number("vent_timer").unit("min"),
        ParameterSpec::number("party_timer").unit("h"),
        ParameterSpec::number("holiday_timer").unit("d"),
        ParameterSpec::scaled("hysteresis", 1, 0.1, 0.0).unit("\u{b0}C"),
        ParameterSpec::scaled("day_target_temp", 2, 0.1, 0.0).unit("\u{b0}C"),
        ParameterSpec::scaled("night_target_temp", 2, 0.1, 0.0).unit("\u{b0}C"),
        ParameterSpec::scaled("antifreeze_target_temp", 2, 0.1, 0.0).unit("\u{b0}C"),
    ],
};

/// Raw `(value, min, max)` triple at the catalogue width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterValues {
    /// Current raw value.
    pub value: u16,
    /// Lowest raw value the controller accepts.
    pub min: u16,
    /// Highest raw value the controller accepts.
    pub max: u16,
}

impl ParameterValues {
    fn decode(r: &mut ByteReader<'_>, size: u8) -> Result<Option<Self>, ProtocolError> {
        let (value, min, max) = if size == 2 {
            (r.read_u16()?, r.read_u16()?, r.read_u16()?)
        } else {
            (r.read_u8()?.into(), r.read_u8()?.into(), r.read_u8()?.into())
        };
        let absent = if size == 2 { 0xFFFF } else { 0xFF };
        if value == absent && min == absent && max == absent {
            return Ok(None);
        }
        Ok(Some(Self { value, min, max }))
    }

    fn encode(&self, w: &mut ByteWriter, size: u8) {
        if size == 2 {
            w.put_u16(self.value);
            w.put_u16(self.min);
            w.put_u16(self.max);
        } else {
            w.put_u8(self.value as u8);
            w.put_u8(self.min as u8);
            w.put_u8(self.max as u8);
        }
    }

    fn encode_absent(w: &mut ByteWriter, size: u8) {
        for _ in 0..(u16::from(size) * 3) {
            w.put_u8(0xFF);
        }
    }
}

/// Request body asking for a slice of a catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterRange {
    /// First wire index requested.
    pub start: u8,
    /// Number of slots requested; 255 asks for everything.
    pub count: u8,
}

impl ParameterRange {
    /// The whole catalogue.
    #[must_use]
    pub fn all() -> Self {
        Self { start: 0, count: u8::MAX }
    }

    /// Decode the two-byte body.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { start: r.read_u8()?, count: r.read_u8()? })
    }

    /// Encode the two-byte body.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.start);
        w.put_u8(self.count);
    }
}

/// [`ParameterRange`] scoped to one mixer or thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubdeviceParameterRange {
    /// Zero-based sub-device index.
    pub device_index: u8,
    /// Slice of the catalogue.
    pub range: ParameterRange,
}

impl SubdeviceParameterRange {
    /// Everything one sub-device exposes.
    #[must_use]
    pub fn all(device_index: u8) -> Self {
        Self { device_index, range: ParameterRange::all() }
    }

    /// Decode the three-byte body.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { device_index: r.read_u8()?, range: ParameterRange::decode(r)? })
    }

    /// Encode the three-byte body.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.device_index);
        self.range.encode(w);
    }
}

/// One parameter write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetParameter {
    /// Wire index of the parameter.
    pub index: u8,
    /// New raw value.
    pub value: u16,
}

impl SetParameter {
    /// Decode against a catalogue (the value width depends on the slot).
    pub fn decode(r: &mut ByteReader<'_>, catalogue: &Catalogue) -> Result<Self, ProtocolError> {
        let index = r.read_u8()?;
        let size = catalogue.get(index).map_or(1, |spec| spec.size);
        let value = if size == 2 { r.read_u16()? } else { r.read_u8()?.into() };
        Ok(Self { index, value })
    }

    /// Encode against a catalogue.
    pub fn encode(&self, w: &mut ByteWriter, catalogue: &Catalogue) {
        w.put_u8(self.index);
        let size = catalogue.get(self.index).map_or(1, |spec| spec.size);
        if size == 2 {
            w.put_u16(self.value);
        } else {
            w.put_u8(self.value as u8);
        }
    }
}

/// [`SetParameter`] scoped to one mixer or thermostat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSubdeviceParameter {
    /// Zero-based sub-device index.
    pub device_index: u8,
    /// The write itself.
    pub parameter: SetParameter,
}

impl SetSubdeviceParameter {
    /// Decode against a catalogue.
    pub fn decode(r: &mut ByteReader<'_>, catalogue: &Catalogue) -> Result<Self, ProtocolError> {
        Ok(Self { device_index: r.read_u8()?, parameter: SetParameter::decode(r, catalogue)? })
    }

    /// Encode against a catalogue.
    pub fn encode(&self, w: &mut ByteWriter, catalogue: &Catalogue) {
        w.put_u8(self.device_index);
        self.parameter.encode(w, catalogue);
    }
}

/// On/off body of the EcomaxControl request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState(pub bool);

impl ControlState {
    /// Decode the single-byte body.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self(r.read_u8()? != 0))
    }

    /// Encode the single-byte body.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(u8::from(self.0));
    }
}

/// Decoded catalogue slice from a parameters response.
///
/// Absent slots (all-0xFF triples) are filtered during decode but the
/// declared `count` is kept so encoding reproduces the holes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParameterBatch {
    /// First wire index covered.
    pub start: u8,
    /// Number of slots covered, holes included.
    pub count: u8,
    /// Present `(wire index, triple)` pairs.
    pub values: Vec<(u8, ParameterValues)>,
}

impl ParameterBatch {
    /// Decode a batch against a catalogue.
    ///
    /// Decoding stops early when the slice runs past the end of the
    /// catalogue; the widths of unknown slots are undefined and trailing
    /// bytes are tolerated by contract.
    pub fn decode(r: &mut ByteReader<'_>, catalogue: &Catalogue) -> Result<Self, ProtocolError> {
        let start = r.read_u8()?;
        let count = r.read_u8()?;
        let mut values = Vec::new();
        for slot in 0..count {
            let Some(index) = start.checked_add(slot) else { break };
            let Some(spec) = catalogue.get(index) else { break };
            if let Some(triple) = ParameterValues::decode(r, spec.size)? {
                values.push((index, triple));
            }
        }
        Ok(Self { start, count, values })
    }

    /// Encode a batch against a catalogue, writing 0xFF triples for holes.
    pub fn encode(&self, w: &mut ByteWriter, catalogue: &Catalogue) {
        w.put_u8(self.start);
        w.put_u8(self.count);
        for slot in 0..self.count {
            let Some(index) = self.start.checked_add(slot) else { break };
            let Some(spec) = catalogue.get(index) else { break };
            match self.values.iter().find(|(i, _)| *i == index) {
                Some((_, triple)) => triple.encode(w, spec.size),
                None => ParameterValues::encode_absent(w, spec.size),
            }
        }
    }
}

/// [`ParameterBatch`] scoped to one mixer or thermostat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubdeviceParameterBatch {
    /// Zero-based sub-device index the batch belongs to.
    pub device_index: u8,
    /// The batch itself.
    pub batch: ParameterBatch,
}

impl SubdeviceParameterBatch {
    /// Decode against a catalogue.
    pub fn decode(r: &mut ByteReader<'_>, catalogue: &Catalogue) -> Result<Self, ProtocolError> {
        Ok(Self { device_index: r.read_u8()?, batch: ParameterBatch::decode(r, catalogue)? })
    }

    /// Encode against a catalogue.
    pub fn encode(&self, w: &mut ByteWriter, catalogue: &Catalogue) {
        w.put_u8(self.device_index);
        self.batch.encode(w, catalogue);
    }
}
