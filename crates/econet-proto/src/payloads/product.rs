//! Product information block returned by the UID request.

use bytes::Bytes;

use crate::{
    codec::{ByteReader, ByteWriter, render_uid},
    errors::ProtocolError,
};

/// Controller identity: product line, serial UID, model name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProductInfo {
    /// Product line discriminator.
    pub product_type: u8,
    /// Numeric product id.
    pub id: u16,
    /// Raw UID bytes as they appear on the wire.
    pub uid: Bytes,
    /// Boot logo id.
    pub logo: u16,
    /// Display image id.
    pub image: u16,
    /// Human-readable model name.
    pub model: String,
}

impl ProductInfo {
    /// UID in its display form, check characters appended.
    #[must_use]
    pub fn uid_string(&self) -> String {
        render_uid(&self.uid)
    }

    /// Decode the block.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            product_type: r.read_u8()?,
            id: r.read_u16()?,
            uid: r.read_uid()?,
            logo: r.read_u16()?,
            image: r.read_u16()?,
            model: r.read_string()?,
        })
    }

    /// Encode the block.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.product_type);
        w.put_u16(self.id);
        w.put_uid(&self.uid);
        w.put_u16(self.logo);
        w.put_u16(self.image);
        w.put_string(&self.model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_info_round_trips() {
        let info = ProductInfo {
            product_type: 0,
            id: 51,
            uid: Bytes::from_static(&[0x00, 0x16, 0x00, 0x11, 0x0D, 0x38, 0x33, 0x38]),
            logo: 13,
            image: 27,
            model: "ecoMAX 860P3-O".to_string(),
        };

        let mut w = ByteWriter::new();
        info.encode(&mut w);
        let bytes = w.freeze();

        let mut r = ByteReader::new(&bytes);
        let decoded = ProductInfo::decode(&mut r).unwrap();
        assert_eq!(decoded, info);
        assert_eq!(decoded.uid_string(), info.uid_string());
        assert!(!decoded.uid_string().is_empty());
    }
}
