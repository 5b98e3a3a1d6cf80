//! Controller-editable parameters with validated writes.
//!
//! A [`Parameter`] pairs a catalogue descriptor with the raw triple the
//! controller last reported. Writes validate against the reported range
//! before any frame is built, then go through the writer queue and await
//! the confirmation response; a timeout and an absent confirmation are
//! treated the same way.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use econet_proto::{
    Frame, Value,
    payloads::{
        ParameterKind, ParameterSpec, ParameterValues, SetParameter, SetSubdeviceParameter,
    },
};

use crate::{
    command::{self, CommandSink, WriteCommand},
    config::ProtocolConfig,
    device::{DeviceData, lock},
    error::DeviceError,
};

/// Which device a parameter belongs to, and therefore which Set frame a
/// write produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterTarget {
    /// The ecoMAX root device.
    Ecomax,
    /// A mixer, by zero-based index.
    Mixer(u8),
    /// A thermostat, by zero-based index.
    Thermostat(u8),
}

impl ParameterTarget {
    fn device_index(self) -> Option<u8> {
        match self {
            Self::Ecomax => None,
            Self::Mixer(index) | Self::Thermostat(index) => Some(index),
        }
    }

    fn set_payload(self, index: u8, value: u16) -> econet_proto::Payload {
        let parameter = SetParameter { index, value };
        match self {
            Self::Ecomax => econet_proto::Payload::SetEcomaxParameterRequest(parameter),
            Self::Mixer(device_index) => econet_proto::Payload::SetMixerParameterRequest(
                SetSubdeviceParameter { device_index, parameter },
            ),
            Self::Thermostat(device_index) => {
                econet_proto::Payload::SetThermostatParameterRequest(SetSubdeviceParameter {
                    device_index,
                    parameter,
                })
            }
        }
    }
}

struct ParameterInner {
    spec: &'static ParameterSpec,
    index: u8,
    target: ParameterTarget,
    state: Mutex<ParameterValues>,
    pending: AtomicBool,
    device: Arc<DeviceData>,
    sink: CommandSink,
    config: ProtocolConfig,
}

/// Handle to one editable parameter.
#[derive(Clone)]
pub struct Parameter {
    inner: Arc<ParameterInner>,
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.inner.state);
        f.debug_struct("Parameter")
            .field("name", &self.inner.spec.name)
            .field("index", &self.inner.index)
            .field("value", &state.value)
            .field("min", &state.min)
            .field("max", &state.max)
            .finish()
    }
}

impl Parameter {
    pub(crate) fn new(
        spec: &'static ParameterSpec,
        index: u8,
        target: ParameterTarget,
        values: ParameterValues,
        device: Arc<DeviceData>,
        sink: CommandSink,
        config: ProtocolConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ParameterInner {
                spec,
                index,
                target,
                state: Mutex::new(values),
                pending: AtomicBool::new(false),
                device,
                sink,
                config,
            }),
        }
    }

    /// Parameter name from the catalogue.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.spec.name
    }

    /// Catalogue index on the wire.
    #[must_use]
    pub fn index(&self) -> u8 {
        self.inner.index
    }

    /// Display unit, if the catalogue defines one.
    #[must_use]
    pub fn unit(&self) -> Option<&'static str> {
        self.inner.spec.unit
    }

    /// Current raw value.
    #[must_use]
    pub fn raw(&self) -> u16 {
        lock(&self.inner.state).value
    }

    /// Lowest raw value the controller accepts.
    #[must_use]
    pub fn min(&self) -> u16 {
        lock(&self.inner.state).min
    }

    /// Highest raw value the controller accepts.
    #[must_use]
    pub fn max(&self) -> u16 {
        lock(&self.inner.state).max
    }

    /// True while a write awaits its confirmation.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Rendered value: switches become booleans, numbers apply the
    /// catalogue scale and offset.
    #[must_use]
    pub fn value(&self) -> Value {
        Self::render(self.inner.spec, self.raw())
    }

    fn render(spec: &ParameterSpec, raw: u16) -> Value {
        match spec.kind {
            ParameterKind::Switch => Value::Bool(raw != 0),
            ParameterKind::Number => Value::Float(spec.render(raw)),
        }
    }

    /// Update from an inbound descriptor and refresh the device cell.
    pub(crate) fn update(&self, values: ParameterValues) {
        *lock(&self.inner.state) = values;
        self.inner.device.insert(self.inner.spec.name, Self::render(self.inner.spec, values.value));
    }

    fn validate(&self, raw: u16) -> Result<(), DeviceError> {
        let state = lock(&self.inner.state);
        if raw < state.min || raw > state.max {
            return Err(DeviceError::OutOfRange { value: raw, min: state.min, max: state.max });
        }
        Ok(())
    }

    fn set_frame(&self, raw: u16) -> Frame {
        Frame::request(self.inner.target.set_payload(self.inner.index, raw))
    }

    /// Write a raw value and await the confirmation.
    ///
    /// Returns `Ok(true)` on a positive acknowledgement and `Ok(false)`
    /// when no confirmation arrived in time.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::OutOfRange`] before any frame is sent
    /// - [`DeviceError::ConnectionClosed`] when the connection went away
    pub async fn set(&self, raw: u16) -> Result<bool, DeviceError> {
        self.validate(raw)?;

        self.inner.pending.store(true, Ordering::Release);
        let result = command::request(
            &self.inner.sink,
            &self.inner.config,
            self.set_frame(raw),
            self.inner.target.device_index(),
        )
        .await;
        self.inner.pending.store(false, Ordering::Release);

        match result {
            Ok(_) => {
                lock(&self.inner.state).value = raw;
                self.inner
                    .device
                    .insert(self.inner.spec.name, Self::render(self.inner.spec, raw));
                Ok(true)
            }
            Err(DeviceError::Timeout) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Write a raw value without awaiting the confirmation.
    ///
    /// The frame is queued fire-and-forget; the cell updates when the
    /// controller reports the parameter again.
    ///
    /// # Errors
    ///
    /// - [`DeviceError::OutOfRange`] before any frame is sent
    /// - [`DeviceError::ConnectionClosed`] when the queue is gone
    pub fn set_nowait(&self, raw: u16) -> Result<(), DeviceError> {
        self.validate(raw)?;
        self.inner
            .sink
            .try_send(WriteCommand::send(self.set_frame(raw)))
            .map_err(|_| DeviceError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use econet_proto::{Payload, payloads};
    use tokio::sync::mpsc;

    use super::*;

    fn test_parameter(queue_size: usize) -> (Parameter, mpsc::Receiver<WriteCommand>) {
        let (sink, queue) = mpsc::channel(queue_size);
        let index = payloads::params::ECOMAX.index_of("heating_target_temp").unwrap();
        let spec = payloads::params::ECOMAX.get(index).unwrap();
        let parameter = Parameter::new(
            spec,
            index,
            ParameterTarget::Ecomax,
            ParameterValues { value: 60, min: 0, max: 100 },
            Arc::new(DeviceData::new("ecomax")),
            sink,
            ProtocolConfig {
                request_timeout: Duration::from_millis(50),
                request_retries: 1,
                ..ProtocolConfig::default()
            },
        );
        (parameter, queue)
    }

    #[tokio::test]
    async fn out_of_range_set_sends_no_frame() {
        let (parameter, mut queue) = test_parameter(8);
        let result = parameter.set(150).await;
        assert_eq!(
            result,
            Err(DeviceError::OutOfRange { value: 150, min: 0, max: 100 })
        );
        assert!(queue.try_recv().is_err());
        assert_eq!(parameter.raw(), 60);
    }

    #[tokio::test]
    async fn confirmed_set_updates_value_and_cell() {
        let (parameter, mut queue) = test_parameter(8);
        let device = Arc::clone(&parameter.inner.device);

        let responder = tokio::spawn(async move {
            let command = queue.recv().await.unwrap();
            match &command.frame.payload {
                Payload::SetEcomaxParameterRequest(set) => assert_eq!(set.value, 65),
                other => panic!("unexpected payload {other:?}"),
            }
            command.reply.unwrap().tx.send(Payload::SetEcomaxParameterResponse).unwrap();
        });

        assert_eq!(parameter.set(65).await, Ok(true));
        assert_eq!(parameter.raw(), 65);
        assert_eq!(device.get_nowait("heating_target_temp"), Some(Value::Float(65.0)));
        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_set_returns_false() {
        let (parameter, mut queue) = test_parameter(8);

        let swallower = tokio::spawn(async move {
            let command = queue.recv().await.unwrap();
            std::mem::forget(command.reply);
            // Keep the queue open so the sender never errors.
            queue
        });

        assert_eq!(parameter.set(65).await, Ok(false));
        // The raw value only changes on confirmation.
        assert_eq!(parameter.raw(), 60);
        drop(swallower.await.unwrap());
    }

    #[test]
    fn set_nowait_validates_and_queues() {
        let (parameter, mut queue) = test_parameter(8);
        assert_eq!(
            parameter.set_nowait(200),
            Err(DeviceError::OutOfRange { value: 200, min: 0, max: 100 })
        );

        parameter.set_nowait(70).unwrap();
        let command = queue.try_recv().unwrap();
        assert!(command.reply.is_none());
    }

    #[test]
    fn switch_parameters_render_as_booleans() {
        let (sink, _queue) = mpsc::channel(1);
        let index = payloads::params::ECOMAX.index_of("fuzzy_logic").unwrap();
        let spec = payloads::params::ECOMAX.get(index).unwrap();
        let parameter = Parameter::new(
            spec,
            index,
            ParameterTarget::Ecomax,
            ParameterValues { value: 1, min: 0, max: 1 },
            Arc::new(DeviceData::new("ecomax")),
            sink,
            ProtocolConfig::default(),
        );
        assert_eq!(parameter.value(), Value::Bool(true));
    }
}
