//! Public connection façade.
//!
//! `open_tcp` (or [`Connection::with_transport`] for custom byte
//! streams) builds the device tree and the driver; `connect` starts the
//! driver task, `device` hands out the root device once telemetry
//! flows, and `close` tears everything down, resolving outstanding
//! waiters with `ConnectionClosed`.

use std::{sync::Mutex, time::Duration};

use econet_core::{CommandSink, EcoMax, ProtocolConfig, WriteCommand};
use econet_proto::payloads::NetworkInfo;
use tokio::sync::{mpsc, watch};

use crate::{
    driver::Driver,
    error::ClientError,
    stats::Statistics,
    transport::{TcpTransport, Transport},
};

/// Depth of the outbound write queue.
const WRITE_QUEUE_DEPTH: usize = 64;

/// Open a connection to an ecoNET TCP bridge.
///
/// The returned connection is idle until [`Connection::connect`] runs.
#[must_use]
pub fn open_tcp(host: impl Into<String>, port: u16, network_info: NetworkInfo) -> Connection {
    Connection::with_transport(Box::new(TcpTransport::new(host, port)), network_info)
}

enum DriverState {
    Idle(Driver),
    Running(tokio::task::JoinHandle<()>),
    Finished,
}

/// One independent connection to a controller.
///
/// No global state: every connection owns its transport, its device
/// tree, and its statistics.
pub struct Connection {
    ecomax: EcoMax,
    sink: CommandSink,
    stats: Statistics,
    shutdown: watch::Sender<bool>,
    driver: Mutex<DriverState>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").field("stats", &self.stats).finish()
    }
}

impl Connection {
    /// Build a connection over any byte transport with default timing.
    #[must_use]
    pub fn with_transport(transport: Box<dyn Transport>, network_info: NetworkInfo) -> Self {
        Self::with_config(transport, network_info, ProtocolConfig::default())
    }

    /// Build a connection with explicit timing configuration.
    #[must_use]
    pub fn with_config(
        transport: Box<dyn Transport>,
        network_info: NetworkInfo,
        config: ProtocolConfig,
    ) -> Self {
        let (sink, queue) = mpsc::channel::<WriteCommand>(WRITE_QUEUE_DEPTH);
        let (shutdown, shutdown_rx) = watch::channel(false);
        let ecomax = EcoMax::new(sink.clone(), config.clone());
        let stats = Statistics::default();
        let driver = Driver::new(
            transport,
            queue,
            ecomax.clone(),
            config,
            network_info,
            stats.clone(),
            shutdown_rx,
        );

        Self { ecomax, sink, stats, shutdown, driver: Mutex::new(DriverState::Idle(driver)) }
    }

    /// Start the connection driver.
    ///
    /// # Errors
    ///
    /// [`ClientError::AlreadyStarted`] when called twice.
    pub fn connect(&self) -> Result<(), ClientError> {
        let mut state = lock(&self.driver);
        match std::mem::replace(&mut *state, DriverState::Finished) {
            DriverState::Idle(driver) => {
                *state = DriverState::Running(tokio::spawn(driver.run()));
                Ok(())
            }
            other => {
                *state = other;
                Err(ClientError::AlreadyStarted)
            }
        }
    }

    /// Root device by name, waiting up to `timeout` for it to come up.
    ///
    /// The only name this connection serves is `"ecomax"`; the device is
    /// "up" once the first sensor snapshot arrived.
    ///
    /// # Errors
    ///
    /// - [`ClientError::UnknownDevice`] for any other name
    /// - [`ClientError::Device`] with a timeout when nothing arrived
    pub async fn device(&self, name: &str, timeout: Duration) -> Result<EcoMax, ClientError> {
        if name != "ecomax" {
            return Err(ClientError::UnknownDevice(name.to_string()));
        }
        self.ecomax.wait_for("state", timeout).await?;
        Ok(self.ecomax.clone())
    }

    /// Root device handle without waiting for readiness.
    #[must_use]
    pub fn ecomax(&self) -> EcoMax {
        self.ecomax.clone()
    }

    /// Raw write-queue handle, for tooling that builds its own frames.
    #[must_use]
    pub fn sink(&self) -> CommandSink {
        self.sink.clone()
    }

    /// Connection statistics.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.stats.clone()
    }

    /// Stop the driver and destroy the device tree.
    ///
    /// Outstanding `get`/`set` waiters resolve with
    /// [`econet_core::DeviceError::ConnectionClosed`].
    pub async fn close(&self) {
        let _ = self.shutdown.send(true);
        let handle = {
            let mut state = lock(&self.driver);
            match std::mem::replace(&mut *state, DriverState::Finished) {
                DriverState::Running(handle) => Some(handle),
                DriverState::Idle(_) | DriverState::Finished => None,
            }
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        // Cover the never-connected case as well.
        self.ecomax.close();
    }

    /// Wait for the driver to finish on its own (e.g. after `close` from
    /// another task).
    pub async fn wait_until_done(&self) {
        let handle = {
            let mut state = lock(&self.driver);
            match std::mem::replace(&mut *state, DriverState::Finished) {
                DriverState::Running(handle) => Some(handle),
                DriverState::Idle(driver) => {
                    *state = DriverState::Idle(driver);
                    None
                }
                DriverState::Finished => None,
            }
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use econet_core::Device;

    use crate::transport::DummyTransport;

    use super::*;

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let (transport, _handle) = DummyTransport::new();
        let connection = Connection::with_transport(Box::new(transport), NetworkInfo::default());
        connection.connect().unwrap();
        assert!(matches!(connection.connect(), Err(ClientError::AlreadyStarted)));
        connection.close().await;
    }

    #[tokio::test]
    async fn unknown_device_names_are_rejected() {
        let (transport, _handle) = DummyTransport::new();
        let connection = Connection::with_transport(Box::new(transport), NetworkInfo::default());
        let result = connection.device("ecoster", Duration::from_millis(10)).await;
        assert!(matches!(result, Err(ClientError::UnknownDevice(_))));
    }

    #[tokio::test]
    async fn close_without_connect_is_clean() {
        let (transport, _handle) = DummyTransport::new();
        let connection = Connection::with_transport(Box::new(transport), NetworkInfo::default());
        connection.close().await;
        assert!(connection.ecomax().device_data().is_closed());
    }
}
