//! Device model, session state machine and event pipeline for the
//! ecoNET protocol.
//!
//! This crate is the sans-IO middle layer between the wire codec
//! (`econet-proto`) and the async driver (`econet-client`):
//!
//! - [`Session`]: pure handshake/keep-alive state machine in the action
//!   pattern; time comes in, frames to send come out.
//! - [`VersionTracker`]: the poll-on-change bookkeeping that turns
//!   embedded frame-version tables into re-fetch requests.
//! - [`EcoMax`] with its [`Mixer`]/[`Thermostat`] sub-devices: the live
//!   model of the controller, with cells, parameters and schedules.
//! - [`filters`]: composable delivery filters for subscriptions.
//!
//! Nothing here opens sockets; the driver owns the transport and feeds
//! frames in, and the model hands frames back through the write queue.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod command;
mod config;
mod device;
mod ecomax;
mod error;
pub mod event;
pub mod filters;
mod param;
mod schedule;
mod session;
mod versions;

pub use command::{CommandSink, ReplySlot, WriteCommand};
pub use config::ProtocolConfig;
pub use device::{Device, DeviceData};
pub use ecomax::{EcoMax, Mixer, Thermostat};
pub use error::DeviceError;
pub use event::{Callback, SubscriptionId};
pub use filters::{Filter, FilterChain};
pub use param::{Parameter, ParameterTarget};
pub use schedule::{Schedule, ScheduleTime, Weekday};
pub use session::{Backoff, Session, SessionAction, SessionState};
pub use versions::{RESOLUTION_ORDER, VersionTracker};
