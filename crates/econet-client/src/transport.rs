//! Byte transports and frame-level stream I/O.
//!
//! The operating-system transports are opaque bidirectional byte
//! streams; a [`Transport`] is the factory that opens one, and the
//! driver does the rest. TCP ships here; a serial device (or anything
//! else) attaches by implementing the trait. [`DummyTransport`] hands
//! out in-memory streams for tests and tooling, with direct raw-frame
//! access on the peer side.

use std::io;

use async_trait::async_trait;
use econet_proto::{Frame, FrameHeader, HEADER_SIZE, ProtocolError};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::{mpsc, oneshot},
};

/// Opaque bidirectional byte stream.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Factory for the connection's byte stream.
///
/// `open` is called for the first connection and again for every
/// reconnect; each call must produce a fresh stream.
#[async_trait]
pub trait Transport: Send {
    /// Open (or reopen) the underlying byte stream.
    async fn open(&mut self) -> io::Result<Box<dyn ByteStream>>;

    /// Human-readable endpoint for logs.
    fn describe(&self) -> String;
}

/// TCP transport towards an ecoNET-to-network bridge.
#[derive(Debug, Clone)]
pub struct TcpTransport {
    host: String,
    port: u16,
}

impl TcpTransport {
    /// Transport connecting to `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(&mut self) -> io::Result<Box<dyn ByteStream>> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        stream.set_nodelay(true)?;
        Ok(Box::new(stream))
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// In-memory transport for tests and tooling.
///
/// Every `open` call rendezvouses with one
/// [`DummyTransportHandle::accept`]: the accept blocks until the driver
/// actually opens, then both sides receive their end of a fresh duplex
/// pipe. The handle's side plays the controller.
pub struct DummyTransport {
    requests: mpsc::Sender<oneshot::Sender<Box<dyn ByteStream>>>,
}

/// Test-side handle serving a [`DummyTransport`]'s `open` calls.
pub struct DummyTransportHandle {
    requests: mpsc::Receiver<oneshot::Sender<Box<dyn ByteStream>>>,
}

impl DummyTransport {
    /// Create a transport and the handle that serves its `open` calls.
    #[must_use]
    pub fn new() -> (Self, DummyTransportHandle) {
        let (tx, rx) = mpsc::channel(1);
        (Self { requests: tx }, DummyTransportHandle { requests: rx })
    }
}

#[async_trait]
impl Transport for DummyTransport {
    async fn open(&mut self) -> io::Result<Box<dyn ByteStream>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(reply_tx)
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "no peer attached"))?;
        reply_rx
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "peer went away"))
    }

    fn describe(&self) -> String {
        "dummy://".to_string()
    }
}

impl DummyTransportHandle {
    /// Accept the driver's next `open` and return the controller side of
    /// the pipe.
    ///
    /// # Errors
    ///
    /// [`io::Error`] when the transport was dropped.
    pub async fn accept(&mut self) -> io::Result<tokio::io::DuplexStream> {
        let reply = self
            .requests
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "transport dropped"))?;
        let (driver_side, controller_side) = tokio::io::duplex(4096);
        reply
            .send(Box::new(driver_side))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "open abandoned"))?;
        Ok(controller_side)
    }
}

/// Read one frame from a byte stream.
///
/// Scans to the next start delimiter; malformed frames and checksum
/// failures are logged, discarded, and never poison the stream. Only an
/// I/O failure ends the loop.
///
/// Returns the frame and the number of raw bytes consumed for it.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<(Frame, u64)>
where
    R: AsyncRead + Unpin,
{
    let mut consumed: u64 = 0;
    loop {
        // Scan for the start delimiter one byte at a time.
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte).await?;
        consumed += 1;
        if byte[0] != econet_proto::FRAME_START {
            continue;
        }

        let mut header = [0u8; HEADER_SIZE];
        header[0] = byte[0];
        reader.read_exact(&mut header[1..]).await?;
        consumed += (HEADER_SIZE - 1) as u64;

        let parsed = match FrameHeader::decode(&header) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!(error = %err, "discarding frame with a bad header");
                continue;
            }
        };

        let mut body = vec![0u8; parsed.body_len()];
        reader.read_exact(&mut body).await?;
        consumed += body.len() as u64;

        match Frame::decode_body(&parsed, &body) {
            Ok(frame) => return Ok((frame, consumed)),
            Err(err @ (ProtocolError::ChecksumError { .. } | ProtocolError::MalformedFrame(_))) => {
                tracing::warn!(error = %err, "discarding undecodable frame");
            }
            Err(err) => {
                tracing::warn!(error = %err, "discarding unsupported frame");
            }
        }
    }
}

/// Serialize and write one frame to a byte stream.
///
/// Returns the number of bytes written.
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let wire = frame
        .encode()
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
    writer.write_all(&wire).await?;
    writer.flush().await?;
    Ok(wire.len() as u64)
}
