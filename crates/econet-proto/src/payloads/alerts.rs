//! Alert log entries.
//!
//! Alert timestamps use the controller's padded calendar: a u32 of
//! "seconds" where every month has 31 days and the epoch is 2000-01-01.
//! An all-ones `to` timestamp marks an alert that is still active.

use crate::{
    codec::{ByteReader, ByteWriter},
    errors::ProtocolError,
};

/// Sentinel wire value for "alert still active".
const ONGOING: u32 = u32::MAX;

/// Padded-calendar seconds per unit.
const SECONDS_PER_MINUTE: u64 = 60;
const SECONDS_PER_HOUR: u64 = 3600;
const SECONDS_PER_DAY: u64 = 86_400;
const SECONDS_PER_MONTH: u64 = 31 * SECONDS_PER_DAY;
const SECONDS_PER_YEAR: u64 = 12 * SECONDS_PER_MONTH;

/// Calendar timestamp in the controller's padded encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AlertTimestamp {
    /// Full year (2000-based on the wire).
    pub year: u16,
    /// Month, 1..=12.
    pub month: u8,
    /// Day of month, 1..=31.
    pub day: u8,
    /// Hour, 0..=23.
    pub hour: u8,
    /// Minute, 0..=59.
    pub minute: u8,
    /// Second, 0..=59.
    pub second: u8,
}

impl AlertTimestamp {
    /// Decode from the padded-calendar second count.
    #[must_use]
    pub fn from_wire(raw: u32) -> Self {
        let mut rest = u64::from(raw);
        let year = rest / SECONDS_PER_YEAR;
        rest %= SECONDS_PER_YEAR;
        let month = rest / SECONDS_PER_MONTH;
        rest %= SECONDS_PER_MONTH;
        let day = rest / SECONDS_PER_DAY;
        rest %= SECONDS_PER_DAY;
        let hour = rest / SECONDS_PER_HOUR;
        rest %= SECONDS_PER_HOUR;
        let minute = rest / SECONDS_PER_MINUTE;
        let second = rest % SECONDS_PER_MINUTE;

        Self {
            year: 2000 + year as u16,
            month: month as u8 + 1,
            day: day as u8 + 1,
            hour: hour as u8,
            minute: minute as u8,
            second: second as u8,
        }
    }

    /// Encode to the padded-calendar second count.
    #[must_use]
    pub fn to_wire(self) -> u32 {
        let years = u64::from(self.year.saturating_sub(2000));
        let months = u64::from(self.month.saturating_sub(1));
        let days = u64::from(self.day.saturating_sub(1));
        let total = years * SECONDS_PER_YEAR
            + months * SECONDS_PER_MONTH
            + days * SECONDS_PER_DAY
            + u64::from(self.hour) * SECONDS_PER_HOUR
            + u64::from(self.minute) * SECONDS_PER_MINUTE
            + u64::from(self.second);
        total.min(u64::from(ONGOING - 1)) as u32
    }
}

impl std::fmt::Display for AlertTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

/// One alert-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    /// Manufacturer alert code.
    pub code: u8,
    /// When the alert was raised.
    pub from: AlertTimestamp,
    /// When the alert cleared; `None` while it is still active.
    pub to: Option<AlertTimestamp>,
}

impl Alert {
    /// Decode one entry.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let code = r.read_u8()?;
        let from = AlertTimestamp::from_wire(r.read_u32()?);
        let to_raw = r.read_u32()?;
        let to = (to_raw != ONGOING).then(|| AlertTimestamp::from_wire(to_raw));
        Ok(Self { code, from, to })
    }

    /// Encode one entry.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.code);
        w.put_u32(self.from.to_wire());
        w.put_u32(self.to.map_or(ONGOING, AlertTimestamp::to_wire));
    }
}

/// Request body: which alert-log slice to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertsRange {
    /// First alert index requested.
    pub start: u8,
    /// Number of alerts requested.
    pub count: u8,
}

impl AlertsRange {
    /// Newest slice of a reasonable size.
    #[must_use]
    pub fn latest() -> Self {
        Self { start: 0, count: 100 }
    }

    /// Decode the two-byte body.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        Ok(Self { start: r.read_u8()?, count: r.read_u8()? })
    }

    /// Encode the two-byte body.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.start);
        w.put_u8(self.count);
    }
}

/// Response body: a slice of the alert log.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlertsBatch {
    /// First index of the slice.
    pub start: u8,
    /// Total alerts the controller holds.
    pub total: u8,
    /// The alerts carried by this frame.
    pub alerts: Vec<Alert>,
}

impl AlertsBatch {
    /// Decode the batch.
    pub fn decode(r: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        let start = r.read_u8()?;
        let total = r.read_u8()?;
        let count = usize::from(r.read_u8()?);
        let mut alerts = Vec::with_capacity(count);
        for _ in 0..count {
            alerts.push(Alert::decode(r)?);
        }
        Ok(Self { start, total, alerts })
    }

    /// Encode the batch.
    pub fn encode(&self, w: &mut ByteWriter) {
        w.put_u8(self.start);
        w.put_u8(self.total);
        w.put_u8(self.alerts.len().min(usize::from(u8::MAX)) as u8);
        for alert in self.alerts.iter().take(usize::from(u8::MAX)) {
            alert.encode(w);
        }
    }
}
