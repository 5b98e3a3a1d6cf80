//! Weekly schedule grids.
//!
//! Each schedule covers seven days at half-hour resolution: 7 x 48 = 336
//! bits, packed LSB-first with Monday first, one set bit per active slot.
//! Alongside the grid every schedule carries a switch byte and a parameter
//! byte. A SetSchedule request must carry every schedule the controller
//! knows, even when only one changed.

use crate::{
    codec::{ByteReader, ByteWriter},
    errors::ProtocolError,
};

/// Half-hour slots per day.
pub const SLOTS_PER_DAY: usize = 48;

/// Days per schedule, Monday first.
pub const DAYS_PER_WEEK: usize = 7;

/// Known schedule ids in wire order.
const SCHEDULE_NAMES: [&str; 11] = [
    "heating",
    "water_heater",
    "circulation_pump",
    "boiler_work",
    "boiler_clean",
    "boiler_protection",
    "mixer_1",
    "mixer_2",
    "mixer_3",
    "mixer_4",
    "mixer_5",
];

/// Name for a schedule id, if the id is known.
#[must_use]
pub fn schedule_name(id: u8) -> Option<&'static str> {
    SCHEDULE_NAMES.get(usize::from(id)).copied()
}

/// Schedule id for a name, if the name is known.
#[must_use]
pub fn schedule_id(name: &str) -> Option<u8> {
    SCHEDULE_NAMES.iter().position(|n| *n == name).map(|i| i as u8)
}

/// One week of half-hour on/off slots.
///
/// Stored as one u64 bitfield per day; bit `n` is slot `n` counted from
/// midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScheduleGrid {
    days: [u64; DAYS_PER_WEEK],
}

impl ScheduleGrid {
    /// Grid with every slot off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one slot. Out-of-range coordinates read as off.
    #[must_use]
    pub fn get(&self, day: usize, slot: usize) -> bool {
        if day >= DAYS_PER_WEEK || slot >= SLOTS_PER_DAY {
            return false;
        }
        self.days[day] >> slot & 1 != 0
    }

    /// Set one slot. Out-of-range coordinates are ignored.
    pub fn set(&mut self, day: usize, slot: usize, state: bool) {
        if day >= DAYS_PER_WEEK || slot >= SLOTS_PER_DAY {
            return;
        }
        if state {
            self.days[day] |= 1 << slot;
        } else {
            self.days[day] &= !(1 << slot);
        }
    }

    /// Day bitfield, bit `n` = slot `n`.
    #[must_use]
    pub fn day_bits(&self, day: usize) -> u64 {
        self.days.get(day).copied().unwrap_or(0)
    }

    /// Decode 336 packed bits.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let mut days = [0u64; DAYS_PER_WEEK];
        for day in &mut days {
            for slot in 0..SLOTS_PER_DAY {
                if r.read_bool()? {
                    *day |= 1 << slot;
                }
            }
        }
        r.align();
        Ok(Self { days })
    }

    /// Encode 336 packed bits.
    pub fn encode(&self, w: &mut ByteWriter) {
        for day in 0..DAYS_PER_WEEK {
            for slot in 0..SLOTS_PER_DAY {
                w.put_bool(self.get(day, slot));
            }
        }
        w.align();
    }
}

/// One schedule as it travels on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Schedule id; see [`schedule_name`].
    pub id: u8,
    /// Master switch byte for the schedule.
    pub switch: u8,
    /// Associated numeric parameter byte.
    pub parameter: u8,
    /// The weekly grid.
    pub grid: ScheduleGrid,
}

impl ScheduleEntry {
    /// Decode one entry.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self {
            id: r.read_u8()?,
            switch: r.read_u8()?,
            parameter: r.read_u8()?,
            grid: ScheduleGrid::decode(r)?,
        })
    }

    /// Encode one entry.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.id);
        w.put_u8(self.switch);
        w.put_u8(self.parameter);
        self.grid.encode(w);
    }
}

/// Body shared by the Schedules response and the SetSchedule request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulesData {
    /// Every schedule, in wire order.
    pub schedules: Vec<ScheduleEntry>,
}

impl SchedulesData {
    /// Decode the full set.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let count = usize::from(r.read_u8()?);
        let mut schedules = Vec::with_capacity(count);
        for _ in 0..count {
            schedules.push(ScheduleEntry::decode(r)?);
        }
        Ok(Self { schedules })
    }

    /// Encode the full set.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.schedules.len().min(usize::from(u8::MAX)) as u8);
        for entry in self.schedules.iter().take(usize::from(u8::MAX)) {
            entry.encode(w);
        }
    }
}
