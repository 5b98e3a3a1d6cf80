//! Async connection driver and public API for the ecoNET protocol.
//!
//! This crate turns the sans-IO pieces of `econet-core` into a live
//! connection: it owns the byte transport, runs exactly one reader task
//! and one writer loop, correlates requests with responses, re-fetches
//! version-bumped frame subsets, and reconnects with exponential
//! backoff when the transport drops.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use econet_client::open_tcp;
//! use econet_proto::payloads::NetworkInfo;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let connection = open_tcp("10.0.0.20", 8899, NetworkInfo::default());
//! connection.connect()?;
//!
//! let ecomax = connection.device("ecomax", Duration::from_secs(30)).await?;
//! let temp = ecomax.get("heating_temp", Duration::from_secs(10)).await?;
//! println!("heating: {temp:?}");
//!
//! if let Some(target) = ecomax.parameter("heating_target_temp") {
//!     target.set(65).await?;
//! }
//!
//! connection.close().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod connection;
mod driver;
mod error;
mod stats;
pub mod transport;

pub use connection::{Connection, open_tcp};
pub use error::ClientError;
pub use stats::Statistics;
pub use transport::{ByteStream, DummyTransport, DummyTransportHandle, TcpTransport, Transport};
