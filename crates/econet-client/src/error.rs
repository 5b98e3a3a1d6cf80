//! Client-facing error type.

use econet_core::DeviceError;
use thiserror::Error;

/// Errors surfaced by the connection façade.
#[derive(Error, Debug)]
pub enum ClientError {
    /// `connect` was called twice.
    #[error("connection already started")]
    AlreadyStarted,

    /// A device name the connection does not serve.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// Error from the device model or a request path.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(String),
}
