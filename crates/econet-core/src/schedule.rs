//! Weekly schedules with dirty tracking and whole-set commits.
//!
//! Schedule edits are local until [`Schedule::commit`] runs; the protocol
//! requires a SetSchedule request to carry every schedule the controller
//! knows, so a commit snapshots the full set and re-sends unchanged
//! schedules verbatim.

use std::{collections::BTreeMap, sync::Mutex};

use econet_proto::{
    Frame, Payload,
    payloads::{ScheduleEntry, ScheduleGrid, SchedulesData, schedule_name},
};

use crate::{
    command::{self, CommandSink},
    config::ProtocolConfig,
    device::lock,
    error::DeviceError,
};

/// Day of week, Monday first, matching the wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    /// Day 0 on the wire.
    Monday,
    /// Day 1 on the wire.
    Tuesday,
    /// Day 2 on the wire.
    Wednesday,
    /// Day 3 on the wire.
    Thursday,
    /// Day 4 on the wire.
    Friday,
    /// Day 5 on the wire.
    Saturday,
    /// Day 6 on the wire.
    Sunday,
}

impl Weekday {
    /// Zero-based day index used on the wire.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::Monday => 0,
            Self::Tuesday => 1,
            Self::Wednesday => 2,
            Self::Thursday => 3,
            Self::Friday => 4,
            Self::Saturday => 5,
            Self::Sunday => 6,
        }
    }
}

/// A time of day aligned to the schedule's half-hour raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTime {
    minutes: u16,
}

impl ScheduleTime {
    /// Midnight.
    pub const MIDNIGHT: Self = Self { minutes: 0 };

    /// Parse `"HH:MM"`; minutes must be a half-hour boundary and the
    /// whole value at most 24:00.
    pub fn parse(text: &str) -> Result<Self, DeviceError> {
        let (hours, minutes) = text
            .split_once(':')
            .ok_or_else(|| DeviceError::InvalidTime(format!("expected HH:MM, got {text:?}")))?;
        let hours: u16 = hours
            .parse()
            .map_err(|_| DeviceError::InvalidTime(format!("bad hour in {text:?}")))?;
        let minutes: u16 = minutes
            .parse()
            .map_err(|_| DeviceError::InvalidTime(format!("bad minute in {text:?}")))?;
        Self::from_minutes(hours * 60 + minutes)
    }

    /// Build from minutes since midnight; must land on a half-hour.
    pub fn from_minutes(minutes: u16) -> Result<Self, DeviceError> {
        if minutes > 24 * 60 {
            return Err(DeviceError::InvalidTime(format!("{minutes} minutes is past midnight")));
        }
        if minutes % 30 != 0 {
            return Err(DeviceError::InvalidTime(format!(
                "{minutes} minutes is not a half-hour boundary"
            )));
        }
        Ok(Self { minutes })
    }

    /// Half-hour slot index, 0..=48.
    #[must_use]
    pub fn slot(self) -> usize {
        usize::from(self.minutes / 30)
    }
}

pub(crate) struct ScheduleSlot {
    pub entry: ScheduleEntry,
    pub dirty: bool,
}

/// Shared storage for every schedule of one controller.
pub(crate) struct ScheduleStore {
    pub slots: Mutex<BTreeMap<u8, ScheduleSlot>>,
    pub sink: CommandSink,
    pub config: ProtocolConfig,
}

impl ScheduleStore {
    pub(crate) fn new(sink: CommandSink, config: ProtocolConfig) -> Self {
        Self { slots: Mutex::new(BTreeMap::new()), sink, config }
    }

    /// Absorb an inbound schedule set; locally-edited schedules keep
    /// their pending edits until they commit.
    pub(crate) fn absorb(&self, data: &SchedulesData) {
        let mut slots = lock(&self.slots);
        for entry in &data.schedules {
            match slots.get_mut(&entry.id) {
                Some(slot) if slot.dirty => {}
                Some(slot) => slot.entry = *entry,
                None => {
                    slots.insert(entry.id, ScheduleSlot { entry: *entry, dirty: false });
                }
            }
        }
    }

    fn full_set(&self) -> SchedulesData {
        let slots = lock(&self.slots);
        SchedulesData { schedules: slots.values().map(|slot| slot.entry).collect() }
    }

    fn clear_dirty(&self) {
        for slot in lock(&self.slots).values_mut() {
            slot.dirty = false;
        }
    }
}

/// Handle to one named schedule.
#[derive(Clone)]
pub struct Schedule {
    store: std::sync::Arc<ScheduleStore>,
    id: u8,
}

impl std::fmt::Debug for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Schedule").field("id", &self.id).field("name", &self.name()).finish()
    }
}

impl Schedule {
    pub(crate) fn new(store: std::sync::Arc<ScheduleStore>, id: u8) -> Self {
        Self { store, id }
    }

    /// Schedule name, e.g. `heating`.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        schedule_name(self.id)
    }

    /// Wire id of the schedule.
    #[must_use]
    pub fn id(&self) -> u8 {
        self.id
    }

    /// Snapshot of the weekly grid.
    #[must_use]
    pub fn grid(&self) -> ScheduleGrid {
        lock(&self.store.slots).get(&self.id).map(|slot| slot.entry.grid).unwrap_or_default()
    }

    /// True when local edits have not been committed yet.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        lock(&self.store.slots).get(&self.id).is_some_and(|slot| slot.dirty)
    }

    /// Mark a day range active. Defaults: from midnight to end of day.
    pub fn set_on(
        &self,
        day: Weekday,
        start: Option<ScheduleTime>,
        end: Option<ScheduleTime>,
    ) -> Result<(), DeviceError> {
        self.set_state(day, true, start, end)
    }

    /// Mark a day range inactive. Defaults: from midnight to end of day.
    pub fn set_off(
        &self,
        day: Weekday,
        start: Option<ScheduleTime>,
        end: Option<ScheduleTime>,
    ) -> Result<(), DeviceError> {
        self.set_state(day, false, start, end)
    }

    /// Set every half-hour slot in `[start, end)` to `state`.
    ///
    /// `start` defaults to midnight; `end` defaults to midnight as well,
    /// which wraps to the end of the day.
    ///
    /// # Errors
    ///
    /// [`DeviceError::InvalidTime`] when the range is empty or reversed.
    pub fn set_state(
        &self,
        day: Weekday,
        state: bool,
        start: Option<ScheduleTime>,
        end: Option<ScheduleTime>,
    ) -> Result<(), DeviceError> {
        let start_slot = start.unwrap_or(ScheduleTime::MIDNIGHT).slot();
        let mut end_slot = end.unwrap_or(ScheduleTime::MIDNIGHT).slot();
        // An end of 00:00 means "until the end of the day".
        if end_slot == 0 {
            end_slot = econet_proto::payloads::schedules::SLOTS_PER_DAY;
        }
        if start_slot >= end_slot {
            return Err(DeviceError::InvalidTime(format!(
                "empty schedule range: slots {start_slot}..{end_slot}"
            )));
        }

        let mut slots = lock(&self.store.slots);
        let slot = slots.entry(self.id).or_insert_with(|| ScheduleSlot {
            entry: ScheduleEntry {
                id: self.id,
                switch: 0,
                parameter: 0,
                grid: ScheduleGrid::new(),
            },
            dirty: false,
        });
        for index in start_slot..end_slot {
            slot.entry.grid.set(day.index(), index, state);
        }
        slot.dirty = true;
        Ok(())
    }

    /// Set the schedule's master switch byte.
    pub fn set_switch(&self, on: bool) {
        let mut slots = lock(&self.store.slots);
        if let Some(slot) = slots.get_mut(&self.id) {
            slot.entry.switch = u8::from(on);
            slot.dirty = true;
        }
    }

    /// Set the schedule's associated parameter byte.
    pub fn set_parameter(&self, value: u8) {
        let mut slots = lock(&self.store.slots);
        if let Some(slot) = slots.get_mut(&self.id) {
            slot.entry.parameter = value;
            slot.dirty = true;
        }
    }

    /// Send every known schedule to the controller and await the ack.
    ///
    /// Returns `Ok(true)` on acknowledgement (clearing all dirty flags)
    /// and `Ok(false)` when no acknowledgement arrived.
    pub async fn commit(&self) -> Result<bool, DeviceError> {
        let data = self.store.full_set();
        let frame = Frame::request(Payload::SetScheduleRequest(data));
        match command::request(&self.store.sink, &self.store.config, frame, None).await {
            Ok(_) => {
                self.store.clear_dirty();
                Ok(true)
            }
            Err(DeviceError::Timeout) => Ok(false),
            Err(err) => Err(err),
        }
    }
}
