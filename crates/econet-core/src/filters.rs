//! Composable delivery filters for subscriptions.
//!
//! A filter is a stateful unary step `(value, now) -> Option<value>`;
//! chains compose left-to-right, and a `None` anywhere stops the
//! delivery. Stateful filters (throttle, debounce, aggregate) keep their
//! state inside the subscription that owns them. Time arrives as a
//! parameter so the pipeline stays pure and deterministic under test.

use std::{collections::BTreeMap, time::Duration};

use econet_proto::Value;
use tokio::time::Instant;

/// One step of a filter chain.
pub trait Filter: Send {
    /// Feed a value; return the value to forward, or `None` to drop it.
    fn feed(&mut self, value: &Value, now: Instant) -> Option<Value>;
}

/// Left-to-right composition of filters.
#[derive(Default)]
pub struct FilterChain {
    steps: Vec<Box<dyn Filter>>,
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain").field("steps", &self.steps.len()).finish()
    }
}

impl FilterChain {
    /// Chain that forwards everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step to the chain.
    #[must_use]
    pub fn then(mut self, step: Box<dyn Filter>) -> Self {
        self.steps.push(step);
        self
    }

    /// Run a value through every step in order.
    pub fn feed(&mut self, value: &Value, now: Instant) -> Option<Value> {
        let mut current = value.clone();
        for step in &mut self.steps {
            current = step.feed(&current, now)?;
        }
        Some(current)
    }
}

/// Forward only when the value differs from the previously forwarded one.
///
/// The first value always passes. Floats compare bit-identically, so a
/// NaN cell does not re-fire forever.
#[must_use]
pub fn on_change() -> Box<dyn Filter> {
    Box::new(OnChange { last: None })
}

struct OnChange {
    last: Option<Value>,
}

impl Filter for OnChange {
    fn feed(&mut self, value: &Value, _now: Instant) -> Option<Value> {
        if self.last.as_ref().is_some_and(|last| last.loose_eq(value)) {
            return None;
        }
        self.last = Some(value.clone());
        Some(value.clone())
    }
}

/// Forward the first value in each window; drop the rest.
#[must_use]
pub fn throttle(window: Duration) -> Box<dyn Filter> {
    Box::new(Throttle { window, last_forward: None })
}

struct Throttle {
    window: Duration,
    last_forward: Option<Instant>,
}

impl Filter for Throttle {
    fn feed(&mut self, value: &Value, now: Instant) -> Option<Value> {
        if let Some(last) = self.last_forward {
            if now.saturating_duration_since(last) < self.window {
                return None;
            }
        }
        self.last_forward = Some(now);
        Some(value.clone())
    }
}

/// Forward only once the same value has arrived `min_calls` times in a
/// row.
#[must_use]
pub fn debounce(min_calls: u32) -> Box<dyn Filter> {
    Box::new(Debounce { required: min_calls.max(1), last: None, streak: 0 })
}

struct Debounce {
    required: u32,
    last: Option<Value>,
    streak: u32,
}

impl Filter for Debounce {
    fn feed(&mut self, value: &Value, _now: Instant) -> Option<Value> {
        match &self.last {
            Some(last) if last.loose_eq(value) => self.streak += 1,
            _ => {
                self.last = Some(value.clone());
                self.streak = 1;
            }
        }
        (self.streak >= self.required).then(|| value.clone())
    }
}

/// Forward the difference against the previous value.
///
/// Numbers yield `new - old`; maps yield a per-key difference over the
/// keys of the new map; lists yield an element-wise difference. The first
/// value produces nothing, and non-numeric cells are dropped.
#[must_use]
pub fn delta() -> Box<dyn Filter> {
    Box::new(Delta { last: None })
}

struct Delta {
    last: Option<Value>,
}

impl Filter for Delta {
    fn feed(&mut self, value: &Value, _now: Instant) -> Option<Value> {
        let previous = self.last.replace(value.clone());
        diff_values(previous.as_ref()?, value)
    }
}

fn diff_values(old: &Value, new: &Value) -> Option<Value> {
    match (old, new) {
        (Value::Map(old), Value::Map(new)) => {
            let mut out = BTreeMap::new();
            for (key, new_value) in new {
                let Some(old_value) = old.get(key) else { continue };
                if let Some(diff) = diff_values(old_value, new_value) {
                    out.insert(key.clone(), diff);
                }
            }
            Some(Value::Map(out))
        }
        (Value::List(old), Value::List(new)) => {
            let diffs = old
                .iter()
                .zip(new.iter())
                .filter_map(|(o, n)| diff_values(o, n))
                .collect();
            Some(Value::List(diffs))
        }
        (Value::Int(old), Value::Int(new)) => Some(Value::Int(new - old)),
        _ => {
            let (old, new) = (old.as_f64()?, new.as_f64()?);
            Some(Value::Float(new - old))
        }
    }
}

/// Accumulate a running sum and forward it once per window.
///
/// Numeric values only; everything else is dropped. The sum that closes a
/// window includes the value that closed it, so no input is counted twice
/// or lost.
#[must_use]
pub fn aggregate(window: Duration) -> Box<dyn Filter> {
    Box::new(Aggregate { window, sum: 0.0, opened: None })
}

struct Aggregate {
    window: Duration,
    sum: f64,
    opened: Option<Instant>,
}

impl Filter for Aggregate {
    fn feed(&mut self, value: &Value, now: Instant) -> Option<Value> {
        let value = value.as_f64()?;
        let opened = *self.opened.get_or_insert(now);
        self.sum += value;
        if now.saturating_duration_since(opened) >= self.window {
            let total = self.sum;
            self.sum = 0.0;
            self.opened = Some(now);
            return Some(Value::Float(total));
        }
        None
    }
}

/// Forward only values the predicate accepts.
#[must_use]
pub fn custom<F>(predicate: F) -> Box<dyn Filter>
where
    F: Fn(&Value) -> bool + Send + 'static,
{
    Box::new(Custom { predicate })
}

struct Custom<F> {
    predicate: F,
}

impl<F> Filter for Custom<F>
where
    F: Fn(&Value) -> bool + Send,
{
    fn feed(&mut self, value: &Value, _now: Instant) -> Option<Value> {
        (self.predicate)(value).then(|| value.clone())
    }
}
