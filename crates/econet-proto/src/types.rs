//! Frame-type registry and well-known device addresses.

/// Well-known device addresses on the ecoNET bus.
pub mod address {
    /// Broadcast to every listener.
    pub const BROADCAST: u8 = 0x00;
    /// The ecoMAX controller.
    pub const ECOMAX: u8 = 0x45;
    /// The ecoSTER room panel.
    pub const ECOSTER: u8 = 0x51;
    /// This library, when it answers the controller.
    pub const ECONET: u8 = 0x56;
}

/// Wire value for an enabled switch or a controller that is on.
pub const STATE_ON: u8 = 1;

/// Wire value for a disabled switch or a controller that is off.
pub const STATE_OFF: u8 = 0;

/// Directional category of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Solicits a response; the response code is the request code with the
    /// high bit set.
    Request,
    /// Answers a request.
    Response,
    /// Unsolicited broadcast or unicast.
    Message,
}

/// Every frame type the protocol defines, keyed by its base numeric code.
///
/// Requests go on the wire with their base code, responses with the base
/// code `| 0x80`; messages ([`FrameType::RegulatorData`] and
/// [`FrameType::SensorData`]) have no paired response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FrameType {
    /// Schema-driven telemetry broadcast.
    RegulatorData = 8,
    /// Tell the controller to stop talking to this master.
    StopMaster = 24,
    /// Tell the controller to resume talking to this master.
    StartMaster = 25,
    /// Controller probes whether this device is reachable.
    CheckDevice = 48,
    /// Fetch the ecoMAX parameter descriptors.
    EcomaxParameters = 49,
    /// Fetch one mixer's parameter descriptors.
    MixerParameters = 50,
    /// Write one ecoMAX parameter.
    SetEcomaxParameter = 51,
    /// Write one mixer parameter.
    SetMixerParameter = 52,
    /// Periodic sensor snapshot broadcast.
    SensorData = 53,
    /// Fetch the product info block (UID, model name).
    Uid = 57,
    /// Fetch the service password.
    Password = 58,
    /// Switch the controller on or off.
    EcomaxControl = 59,
    /// Fetch the alert log.
    Alerts = 61,
    /// Exchange program versions during the handshake.
    ProgramVersion = 64,
    /// Fetch every schedule.
    Schedules = 70,
    /// Replace every schedule.
    SetSchedule = 71,
    /// Fetch one thermostat's parameter descriptors.
    ThermostatParameters = 82,
    /// Write one thermostat parameter.
    SetThermostatParameter = 83,
    /// Fetch the regulator-data schema.
    RegulatorDataSchema = 85,
}

impl FrameType {
    /// Every known frame type, in code order.
    pub const ALL: [Self; 19] = [
        Self::RegulatorData,
        Self::StopMaster,
        Self::StartMaster,
        Self::CheckDevice,
        Self::EcomaxParameters,
        Self::MixerParameters,
        Self::SetEcomaxParameter,
        Self::SetMixerParameter,
        Self::SensorData,
        Self::Uid,
        Self::Password,
        Self::EcomaxControl,
        Self::Alerts,
        Self::ProgramVersion,
        Self::Schedules,
        Self::SetSchedule,
        Self::ThermostatParameters,
        Self::SetThermostatParameter,
        Self::RegulatorDataSchema,
    ];

    /// Base numeric code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Code a request of this type carries on the wire.
    #[must_use]
    pub const fn request_code(self) -> u8 {
        self.code()
    }

    /// Code the paired response carries on the wire.
    #[must_use]
    pub const fn response_code(self) -> u8 {
        self.code() | 0x80
    }

    /// True for unsolicited message types.
    #[must_use]
    pub const fn is_message(self) -> bool {
        matches!(self, Self::RegulatorData | Self::SensorData)
    }

    /// Look up a frame type by its base code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|ft| ft.code() == code)
    }

    /// Classify a raw wire code into a frame type and direction.
    ///
    /// Returns `None` for codes the registry does not know; callers keep
    /// such frames as [`crate::Payload::Unknown`].
    #[must_use]
    pub fn from_wire(code: u8) -> Option<(Self, Direction)> {
        if let Some(ft) = Self::from_code(code) {
            let direction = if ft.is_message() { Direction::Message } else { Direction::Request };
            return Some((ft, direction));
        }
        if code & 0x80 != 0 {
            if let Some(ft) = Self::from_code(code & 0x7F) {
                if !ft.is_message() {
                    return Some((ft, Direction::Response));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_codes_set_the_high_bit() {
        assert_eq!(FrameType::ProgramVersion.request_code(), 64);
        assert_eq!(FrameType::ProgramVersion.response_code(), 192);
        assert_eq!(FrameType::CheckDevice.response_code(), 176);
    }

    #[test]
    fn wire_classification_covers_all_directions() {
        assert_eq!(FrameType::from_wire(53), Some((FrameType::SensorData, Direction::Message)));
        assert_eq!(FrameType::from_wire(49), Some((FrameType::EcomaxParameters, Direction::Request)));
        assert_eq!(
            FrameType::from_wire(177),
            Some((FrameType::EcomaxParameters, Direction::Response))
        );
        assert_eq!(FrameType::from_wire(0x7E), None);
    }

    #[test]
    fn message_types_have_no_response_direction() {
        // 53 | 0x80: not a defined response, the registry rejects it.
        assert_eq!(FrameType::from_wire(53 | 0x80), None);
    }

    #[test]
    fn all_codes_are_unique() {
        for (i, a) in FrameType::ALL.iter().enumerate() {
            for b in &FrameType::ALL[i + 1..] {
                assert_ne!(a.code(), b.code());
            }
        }
    }
}
