//! Program-version block exchanged during the handshake.

use crate::{
    codec::{ByteReader, ByteWriter, SoftwareVersion},
    errors::ProtocolError,
};

/// Software version of a protocol peer.
///
/// The controller opens the handshake by asking for this; the library
/// answers with its own version triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramVersionInfo {
    /// BCD-coded version triple.
    pub version: SoftwareVersion,
    /// Device index within the peer (0 for the main unit).
    pub device_index: u8,
    /// Processor signature word.
    pub processor_signature: u16,
}

impl ProgramVersionInfo {
    /// Version info describing this library.
    #[must_use]
    pub fn library() -> Self {
        Self {
            version: SoftwareVersion::new(
                env_version(env!("CARGO_PKG_VERSION_MAJOR")),
                env_version(env!("CARGO_PKG_VERSION_MINOR")),
                env_version(env!("CARGO_PKG_VERSION_PATCH")),
            ),
            device_index: 0,
            processor_signature: 0,
        }
    }

    /// Decode the block.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            version: r.read_version()?,
            device_index: r.read_u8()?,
            processor_signature: r.read_u16()?,
        })
    }

    /// Encode the block.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_version(&self.version);
        w.put_u8(self.device_index);
        w.put_u16(self.processor_signature);
    }
}

fn env_version(raw: &str) -> u8 {
    raw.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_version_round_trips() {
        let info = ProgramVersionInfo {
            version: SoftwareVersion::new(6, 10, 32),
            device_index: 0,
            processor_signature: 0x0204,
        };

        let mut w = ByteWriter::new();
        info.encode(&mut w);
        let bytes = w.freeze();

        let mut r = ByteReader::new(&bytes);
        assert_eq!(ProgramVersionInfo::decode(&mut r).unwrap(), info);
    }

    #[test]
    fn library_version_matches_the_crate() {
        let info = ProgramVersionInfo::library();
        assert_eq!(info.device_index, 0);
        assert_eq!(
            info.version.to_string(),
            format!(
                "{}.{}.{}",
                env!("CARGO_PKG_VERSION_MAJOR"),
                env!("CARGO_PKG_VERSION_MINOR"),
                env!("CARGO_PKG_VERSION_PATCH")
            )
        );
    }
}
