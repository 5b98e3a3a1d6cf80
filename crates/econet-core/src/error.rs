//! Error types for the device model.
//!
//! Strongly-typed errors for the layers above the wire codec: parameter
//! validation, schedule editing, request timeouts and connection
//! lifecycle. Wire-level faults convert in via `From`.

use econet_proto::ProtocolError;
use thiserror::Error;

/// Errors surfaced by the device model and its request paths.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Parameter write rejected locally: the raw value is outside the
    /// controller-reported range. No frame is sent.
    #[error("value {value} outside the allowed range {min}..={max}")]
    OutOfRange {
        /// Rejected raw value.
        value: u16,
        /// Lowest raw value the controller accepts.
        min: u16,
        /// Highest raw value the controller accepts.
        max: u16,
    },

    /// Request not answered within the configured window and retries.
    #[error("request timed out")]
    Timeout,

    /// Schedule time that is not a valid half-hour boundary.
    #[error("invalid schedule time: {0}")]
    InvalidTime(String),

    /// Named parameter that the controller never reported.
    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    /// The connection closed while the operation was pending.
    #[error("connection closed")]
    ConnectionClosed,

    /// Underlying wire-level fault.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl DeviceError {
    /// True when the operation may succeed if simply retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_the_bounds() {
        let err = DeviceError::OutOfRange { value: 150, min: 0, max: 100 };
        assert_eq!(err.to_string(), "value 150 outside the allowed range 0..=100");
    }

    #[test]
    fn only_timeouts_are_transient() {
        assert!(DeviceError::Timeout.is_transient());
        assert!(!DeviceError::ConnectionClosed.is_transient());
        assert!(!DeviceError::OutOfRange { value: 1, min: 2, max: 3 }.is_transient());
    }
}
