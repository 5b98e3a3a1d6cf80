//! Error types for the wire codec.
//!
//! Three failure classes cover the whole crate: structurally broken frames,
//! checksum mismatches, and protocol-header mismatches. All of them are
//! single-frame faults; callers log them, drop the frame, and keep reading.

use thiserror::Error;

/// Errors produced while encoding or decoding wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame or payload bytes do not match the expected layout.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// XOR checksum did not match the frame contents.
    #[error("frame checksum mismatch: computed {computed:#04x}, received {received:#04x}")]
    ChecksumError {
        /// Checksum computed over the received bytes.
        computed: u8,
        /// Checksum byte carried by the frame.
        received: u8,
    },

    /// Header carries an unexpected sender type or protocol version.
    #[error("unsupported protocol header: sender type {sender_type:#04x}, version {version:#04x}")]
    UnsupportedProtocol {
        /// Sender-type byte from the header (expected 0x30).
        sender_type: u8,
        /// Protocol-version byte from the header (expected 0x05).
        version: u8,
    },
}

impl ProtocolError {
    /// Truncated-input error for a named field.
    pub(crate) fn short(field: &'static str, needed: usize, available: usize) -> Self {
        Self::MalformedFrame(format!("{field}: need {needed} bytes, {available} available"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_names_the_field() {
        let err = ProtocolError::short("uid", 12, 3);
        assert_eq!(err.to_string(), "malformed frame: uid: need 12 bytes, 3 available");
    }

    #[test]
    fn checksum_error_formats_both_sides() {
        let err = ProtocolError::ChecksumError { computed: 0x5A, received: 0x00 };
        assert!(err.to_string().contains("0x5a"));
        assert!(err.to_string().contains("0x00"));
    }
}
