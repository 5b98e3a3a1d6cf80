//! Frame envelope: delimiters, header, XOR checksum.
//!
//! Layout on the wire:
//!
//! ```text
//! [0x68][length: u16 LE][recipient][sender][sender type 0x30][version 0x05]
//! [frame type][payload ...][CRC][0x16]
//! ```
//!
//! `length` counts the whole frame, delimiters included. The CRC is the XOR
//! fold of every byte from the start delimiter through the last payload
//! byte. Decoding is the exact inverse of encoding; a frame that decodes
//! re-encodes to the same bytes.

use bytes::Bytes;

use crate::{
    Payload,
    errors::ProtocolError,
    types::address,
};

/// Start-of-frame delimiter.
pub const FRAME_START: u8 = 0x68;

/// End-of-frame delimiter.
pub const FRAME_END: u8 = 0x16;

/// Sender-type byte every peer sends.
pub const ECONET_TYPE: u8 = 0x30;

/// Protocol version byte every peer sends.
pub const ECONET_VERSION: u8 = 0x05;

/// Envelope header size: delimiter, length, addresses, type, version.
pub const HEADER_SIZE: usize = 7;

/// Smallest legal frame: header, frame type, CRC, end delimiter.
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + 3;

/// Decoded envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total frame length, delimiters included.
    pub length: u16,
    /// Destination address.
    pub recipient: u8,
    /// Source address.
    pub sender: u8,
    /// Sender-type byte (validated to be [`ECONET_TYPE`]).
    pub sender_type: u8,
    /// Protocol version byte (validated to be [`ECONET_VERSION`]).
    pub protocol_version: u8,
}

impl FrameHeader {
    /// Parse the 7-byte header at the start of `buf`.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MalformedFrame`] on a short buffer, a missing
    ///   start delimiter, or an impossible length field
    /// - [`ProtocolError::UnsupportedProtocol`] on an unexpected sender type
    ///   or protocol version
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let raw: &[u8; HEADER_SIZE] = buf
            .get(..HEADER_SIZE)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| ProtocolError::short("header", HEADER_SIZE, buf.len()))?;

        if raw[0] != FRAME_START {
            return Err(ProtocolError::MalformedFrame(format!(
                "expected start delimiter {FRAME_START:#04x}, found {:#04x}",
                raw[0]
            )));
        }

        let header = Self {
            length: u16::from_le_bytes([raw[1], raw[2]]),
            recipient: raw[3],
            sender: raw[4],
            sender_type: raw[5],
            protocol_version: raw[6],
        };

        if header.sender_type != ECONET_TYPE || header.protocol_version != ECONET_VERSION {
            return Err(ProtocolError::UnsupportedProtocol {
                sender_type: header.sender_type,
                version: header.protocol_version,
            });
        }

        if usize::from(header.length) < MIN_FRAME_SIZE {
            return Err(ProtocolError::MalformedFrame(format!(
                "declared length {} below the {MIN_FRAME_SIZE}-byte minimum",
                header.length
            )));
        }

        Ok(header)
    }

    /// Serialize the header back to its 7 wire bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let len = self.length.to_le_bytes();
        [
            FRAME_START,
            len[0],
            len[1],
            self.recipient,
            self.sender,
            self.sender_type,
            self.protocol_version,
        ]
    }

    /// Bytes still to read after the header: frame type, payload, CRC, end
    /// delimiter.
    #[must_use]
    pub fn body_len(&self) -> usize {
        usize::from(self.length).saturating_sub(HEADER_SIZE)
    }
}

/// A complete protocol frame: addresses plus a typed payload.
///
/// The frame type is implied by the payload variant; [`Frame::encode`] and
/// [`Frame::decode`] are exact inverses for every known type, and unknown
/// types round-trip byte-identically through [`Payload::Unknown`].
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Destination address.
    pub recipient: u8,
    /// Source address.
    pub sender: u8,
    /// Typed frame body.
    pub payload: Payload,
}

impl Frame {
    /// Build a frame with explicit addressing.
    #[must_use]
    pub fn new(recipient: u8, sender: u8, payload: Payload) -> Self {
        Self { recipient, sender, payload }
    }

    /// Build a request from this library to the controller.
    #[must_use]
    pub fn request(payload: Payload) -> Self {
        Self::new(address::ECOMAX, address::ECONET, payload)
    }

    /// Build a reply from this library to `recipient`.
    #[must_use]
    pub fn reply_to(recipient: u8, payload: Payload) -> Self {
        Self::new(recipient, address::ECONET, payload)
    }

    /// Wire code of the payload.
    #[must_use]
    pub fn wire_code(&self) -> u8 {
        self.payload.wire_code()
    }

    /// Serialize the frame, delimiters and CRC included.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MalformedFrame`] when the payload does not fit the
    /// u16 length field.
    pub fn encode(&self) -> Result<Bytes, ProtocolError> {
        let body = self.payload.encode_body()?;
        let total = MIN_FRAME_SIZE.checked_add(body.len()).filter(|t| *t <= usize::from(u16::MAX));
        let Some(total) = total else {
            return Err(ProtocolError::MalformedFrame(format!(
                "payload of {} bytes does not fit a frame",
                body.len()
            )));
        };

        let mut buf = Vec::with_capacity(total);
        buf.push(FRAME_START);
        buf.extend_from_slice(&(total as u16).to_le_bytes());
        buf.push(self.recipient);
        buf.push(self.sender);
        buf.push(ECONET_TYPE);
        buf.push(ECONET_VERSION);
        buf.push(self.wire_code());
        buf.extend_from_slice(&body);
        buf.push(xor_fold(&buf));
        buf.push(FRAME_END);

        Ok(Bytes::from(buf))
    }

    /// Decode one frame from the start of `buf`.
    ///
    /// `buf` must begin at the start delimiter; trailing bytes beyond the
    /// declared length are ignored.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::MalformedFrame`] on structural faults
    /// - [`ProtocolError::ChecksumError`] when the CRC does not match
    /// - [`ProtocolError::UnsupportedProtocol`] on header mismatches
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        let header = FrameHeader::decode(buf)?;
        let total = usize::from(header.length);
        let Some(frame) = buf.get(..total) else {
            return Err(ProtocolError::short("frame body", total, buf.len()));
        };
        Self::decode_body(&header, &frame[HEADER_SIZE..])
    }

    /// Decode the body that follows an already-parsed header.
    ///
    /// `body` is exactly [`FrameHeader::body_len`] bytes: frame type,
    /// payload, CRC, end delimiter. This entry point exists for stream
    /// readers that consume the header and body separately.
    pub fn decode_body(header: &FrameHeader, body: &[u8]) -> Result<Self, ProtocolError> {
        let expected = header.body_len();
        if body.len() != expected || expected < 3 {
            return Err(ProtocolError::short("frame body", expected.max(3), body.len()));
        }

        // body = [frame type][payload ...][CRC][end]; minimum length was
        // validated by the header parse.
        let end = body[body.len() - 1];
        if end != FRAME_END {
            return Err(ProtocolError::MalformedFrame(format!(
                "expected end delimiter {FRAME_END:#04x}, found {end:#04x}"
            )));
        }

        let received = body[body.len() - 2];
        let mut computed = xor_fold(&header.to_bytes());
        computed ^= xor_fold(&body[..body.len() - 2]);
        if computed != received {
            return Err(ProtocolError::ChecksumError { computed, received });
        }

        let code = body[0];
        let payload = Payload::decode(code, &body[1..body.len() - 2])?;

        Ok(Self { recipient: header.recipient, sender: header.sender, payload })
    }
}

fn xor_fold(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameType;

    #[test]
    fn program_version_request_round_trips() {
        let frame = Frame::new(address::ECONET, address::ECOMAX, Payload::ProgramVersionRequest);
        let wire = frame.encode().unwrap();

        assert_eq!(wire[0], FRAME_START);
        assert_eq!(wire[wire.len() - 1], FRAME_END);
        assert_eq!(wire.len(), MIN_FRAME_SIZE);
        assert_eq!(u16::from_le_bytes([wire[1], wire[2]]), wire.len() as u16);
        assert_eq!(wire[7], FrameType::ProgramVersion.request_code());

        let decoded = Frame::decode(&wire).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn corrupting_any_inner_byte_fails_decode() {
        let frame = Frame::new(address::ECONET, address::ECOMAX, Payload::ProgramVersionRequest);
        let wire = frame.encode().unwrap();

        // Every byte except the delimiters themselves; flipping one must
        // break either the checksum or the structural validation.
        for i in 1..wire.len() - 1 {
            let mut corrupted = wire.to_vec();
            corrupted[i] ^= 0x01;
            assert!(Frame::decode(&corrupted).is_err(), "offset {i} decoded after corruption");
        }
    }

    #[test]
    fn wrong_sender_type_is_unsupported_protocol() {
        let frame = Frame::request(Payload::CheckDeviceRequest);
        let mut wire = frame.encode().unwrap().to_vec();
        wire[5] = 0x31;
        // Fix the CRC so the header check is what trips.
        let total = wire.len();
        wire[total - 2] = xor_fold(&wire[..total - 2]);
        assert!(matches!(
            Frame::decode(&wire),
            Err(ProtocolError::UnsupportedProtocol { sender_type: 0x31, .. })
        ));
    }

    #[test]
    fn missing_start_delimiter_is_malformed() {
        let frame = Frame::request(Payload::UidRequest);
        let mut wire = frame.encode().unwrap().to_vec();
        wire[0] = 0x00;
        assert!(matches!(Frame::decode(&wire), Err(ProtocolError::MalformedFrame(_))));
    }

    #[test]
    fn truncated_frame_is_malformed() {
        let frame = Frame::request(Payload::UidRequest);
        let wire = frame.encode().unwrap();
        assert!(Frame::decode(&wire[..wire.len() - 2]).is_err());
    }

    #[test]
    fn unknown_frame_types_round_trip_opaquely() {
        let wire_code = 0x7E;
        let payload = Payload::Unknown { code: wire_code, body: Bytes::from_static(&[1, 2, 3]) };
        let frame = Frame::new(address::BROADCAST, address::ECOMAX, payload);
        let wire = frame.encode().unwrap();

        let decoded = Frame::decode(&wire).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.wire_code(), wire_code);
    }
}
