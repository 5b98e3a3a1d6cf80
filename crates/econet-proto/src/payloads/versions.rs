//! Frame-version table embedded in the telemetry messages.
//!
//! The controller bumps a 16-bit counter per frame type whenever the data
//! behind that type changes; clients compare the table against what they
//! last requested and re-fetch the divergent types. The table rides at the
//! head of both RegulatorData and SensorData. Type identifiers travel as
//! u16 even though every known code fits a byte; unknown high codes are
//! carried through untouched.

use crate::{
    codec::{ByteReader, ByteWriter},
    errors::ProtocolError,
};

/// Mapping of frame-type code to version counter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameVersions {
    /// `(frame type code, version)` pairs in wire order.
    pub entries: Vec<(u16, u16)>,
}

impl FrameVersions {
    /// Version for a frame-type code, if the table carries one.
    #[must_use]
    pub fn get(&self, code: u16) -> Option<u16> {
        self.entries.iter().find(|(c, _)| *c == code).map(|(_, v)| *v)
    }

    /// Decode a table: u8 count, then count x { type u16, version u16 }.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let count = usize::from(r.read_u8()?);
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let code = r.read_u16()?;
            let version = r.read_u16()?;
            entries.push((code, version));
        }
        Ok(Self { entries })
    }

    /// Encode the table in wire order.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.entries.len().min(usize::from(u8::MAX)) as u8);
        for (code, version) in self.entries.iter().take(usize::from(u8::MAX)) {
            w.put_u16(*code);
            w.put_u16(*version);
        }
    }
}

impl FromIterator<(u16, u16)> for FrameVersions {
    fn from_iter<I: IntoIterator<Item = (u16, u16)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}
