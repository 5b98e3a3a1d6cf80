//! Network information block carried by the DeviceAvailable response.
//!
//! The controller forwards this block to the vendor cloud, so the library
//! answers CheckDevice with whatever the application configured: wired and
//! wireless interface state, signal quality, and the server connection
//! status.

use std::net::Ipv4Addr;

use crate::{
    codec::{ByteReader, ByteWriter},
    errors::ProtocolError,
};

/// Wireless encryption modes the controller understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    /// Open network.
    None,
    /// WEP.
    Wep,
    /// WPA.
    Wpa,
    /// WPA2.
    Wpa2,
    /// Unrecognized mode byte, kept verbatim.
    Other(u8),
}

impl Encryption {
    /// Wire byte for this mode.
    #[must_use]
    pub fn to_wire(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Wep => 1,
            Self::Wpa => 2,
            Self::Wpa2 => 3,
            Self::Other(raw) => raw,
        }
    }

    /// Decode a wire byte.
    #[must_use]
    pub fn from_wire(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Wep,
            2 => Self::Wpa,
            3 => Self::Wpa2,
            other => Self::Other(other),
        }
    }
}

/// Wired interface parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetParameters {
    /// Interface up/down status byte.
    pub status: u8,
    /// Assigned address.
    pub ip: Ipv4Addr,
    /// Netmask.
    pub netmask: Ipv4Addr,
    /// Gateway address.
    pub gateway: Ipv4Addr,
}

impl Default for EthernetParameters {
    fn default() -> Self {
        Self {
            status: 0,
            ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Wireless interface parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WirelessParameters {
    /// Interface up/down status byte.
    pub status: u8,
    /// Assigned address.
    pub ip: Ipv4Addr,
    /// Netmask.
    pub netmask: Ipv4Addr,
    /// Gateway address.
    pub gateway: Ipv4Addr,
    /// Signal quality, 0..=100 percent.
    pub signal_quality: u8,
    /// Encryption mode.
    pub encryption: Encryption,
    /// Network name.
    pub ssid: String,
}

impl Default for WirelessParameters {
    fn default() -> Self {
        Self {
            status: 0,
            ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            signal_quality: 100,
            encryption: Encryption::None,
            ssid: String::new(),
        }
    }
}

/// Full network information block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkInfo {
    /// Wired interface.
    pub eth: EthernetParameters,
    /// Wireless interface.
    pub wlan: WirelessParameters,
    /// Vendor-server connection status byte.
    pub server_status: u8,
    /// WAN uplink type byte.
    pub wan_type: u8,
}

impl NetworkInfo {
    /// Decode the block.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let eth = EthernetParameters {
            status: r.read_u8()?,
            ip: read_ipv4(r)?,
            netmask: read_ipv4(r)?,
            gateway: read_ipv4(r)?,
        };
        let wlan = WirelessParameters {
            status: r.read_u8()?,
            ip: read_ipv4(r)?,
            netmask: read_ipv4(r)?,
            gateway: read_ipv4(r)?,
            signal_quality: r.read_u8()?,
            encryption: Encryption::from_wire(r.read_u8()?),
            ssid: r.read_string()?,
        };
        Ok(Self { eth, wlan, server_status: r.read_u8()?, wan_type: r.read_u8()? })
    }

    /// Encode the block.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.eth.status);
        put_ipv4(w, self.eth.ip);
        put_ipv4(w, self.eth.netmask);
        put_ipv4(w, self.eth.gateway);

        w.put_u8(self.wlan.status);
        put_ipv4(w, self.wlan.ip);
        put_ipv4(w, self.wlan.netmask);
        put_ipv4(w, self.wlan.gateway);
        w.put_u8(self.wlan.signal_quality);
        w.put_u8(self.wlan.encryption.to_wire());
        w.put_string(&self.wlan.ssid);

        w.put_u8(self.server_status);
        w.put_u8(self.wan_type);
    }
}

fn read_ipv4(r: &mut ByteReader<'_>) -> Result<Ipv4Addr, ProtocolError> {
    let raw = r.read_bytes(4)?;
    Ok(Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]))
}

fn put_ipv4(w: &mut ByteWriter, addr: Ipv4Addr) {
    w.put_bytes(&addr.octets());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_info_round_trips() {
        let info = NetworkInfo {
            eth: EthernetParameters {
                status: 1,
                ip: Ipv4Addr::new(192, 168, 1, 12),
                netmask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: Ipv4Addr::new(192, 168, 1, 1),
            },
            wlan: WirelessParameters {
                status: 1,
                ip: Ipv4Addr::new(10, 0, 0, 7),
                netmask: Ipv4Addr::new(255, 0, 0, 0),
                gateway: Ipv4Addr::new(10, 0, 0, 1),
                signal_quality: 87,
                encryption: Encryption::Wpa2,
                ssid: "boiler-room".to_string(),
            },
            server_status: 1,
            wan_type: 2,
        };

        let mut w = ByteWriter::new();
        info.encode(&mut w);
        let bytes = w.freeze();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(NetworkInfo::decode(&mut r).unwrap(), info);
        assert!(r.is_empty());
    }

    #[test]
    fn unknown_encryption_byte_survives() {
        assert_eq!(Encryption::from_wire(9), Encryption::Other(9));
        assert_eq!(Encryption::Other(9).to_wire(), 9);
    }
}
