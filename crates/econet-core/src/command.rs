//! Outbound write queue items and the request helper.
//!
//! The device model never touches the transport: it hands
//! [`WriteCommand`]s to the driver's writer task through an mpsc sender.
//! A command is either fire-and-forget or a request carrying a one-shot
//! reply slot; the driver registers the slot in its correlation map keyed
//! by the expected response type (and sub-device index, where one
//! applies) before the bytes leave.

use econet_proto::{Frame, FrameType, Payload};
use tokio::sync::{mpsc, oneshot};

use crate::{config::ProtocolConfig, error::DeviceError};

/// Correlation slot for one pending request.
#[derive(Debug)]
pub struct ReplySlot {
    /// Frame type whose response resolves this slot.
    pub frame_type: FrameType,
    /// Sub-device index narrowing the match, when the response carries one.
    pub device_index: Option<u8>,
    /// Resolved with the response payload.
    pub tx: oneshot::Sender<Payload>,
}

/// One item of the outbound write queue.
#[derive(Debug)]
pub struct WriteCommand {
    /// Frame to serialize and write.
    pub frame: Frame,
    /// Present for requests; absent for fire-and-forget writes.
    pub reply: Option<ReplySlot>,
}

impl WriteCommand {
    /// Fire-and-forget write.
    #[must_use]
    pub fn send(frame: Frame) -> Self {
        Self { frame, reply: None }
    }
}

/// Handle the device model uses to enqueue outbound frames.
pub type CommandSink = mpsc::Sender<WriteCommand>;

/// Enqueue `frame` and await its correlated response.
///
/// Runs up to `config.request_retries` attempts, each with a fresh
/// correlation slot and a `config.request_timeout` window. Dropping the
/// returned future abandons the slot; the driver discards it on first
/// contact and any late response still reaches the device model.
///
/// # Errors
///
/// - [`DeviceError::Timeout`] when every attempt ran out of time
/// - [`DeviceError::ConnectionClosed`] when the driver went away
pub async fn request(
    sink: &CommandSink,
    config: &ProtocolConfig,
    frame: Frame,
    device_index: Option<u8>,
) -> Result<Payload, DeviceError> {
    let Some(frame_type) = frame.payload.frame_type() else {
        return Err(DeviceError::Protocol(econet_proto::ProtocolError::MalformedFrame(
            "cannot correlate an unknown frame type".to_string(),
        )));
    };

    let attempts = config.request_retries.max(1);
    for attempt in 1..=attempts {
        let (tx, rx) = oneshot::channel();
        let command = WriteCommand {
            frame: frame.clone(),
            reply: Some(ReplySlot { frame_type, device_index, tx }),
        };
        sink.send(command).await.map_err(|_| DeviceError::ConnectionClosed)?;

        match tokio::time::timeout(config.request_timeout, rx).await {
            Ok(Ok(payload)) => return Ok(payload),
            Ok(Err(_)) => return Err(DeviceError::ConnectionClosed),
            Err(_) => {
                tracing::debug!(
                    frame_type = ?frame_type,
                    attempt,
                    attempts,
                    "request attempt timed out"
                );
            }
        }
    }

    Err(DeviceError::Timeout)
}
