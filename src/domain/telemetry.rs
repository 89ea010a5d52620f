// Telemetry data domain models
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// One decoded inbound frame. Produced by the message decoder,
/// consumed once by the owning session.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    IntegerSample { value: i64 },
    FloatSample { value: f64 },
    Malformed { raw: String },
}

impl TelemetryEvent {
    /// Numeric view of the event, for history appends. `None` for
    /// malformed frames.
    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            TelemetryEvent::IntegerSample { value } => Some(*value as f64),
            TelemetryEvent::FloatSample { value } => Some(*value),
            TelemetryEvent::Malformed { .. } => None,
        }
    }
}

/// A single timestamped reading. Never mutated after insertion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Fixed-capacity rolling history of samples, oldest evicted first.
/// Insertion order is temporal order; `len() <= capacity()` always.
#[derive(Debug)]
pub struct HistoryBuffer {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Push to the tail, evicting from the head once full.
    pub fn append(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Owned copy of the retained samples, oldest first. Renders never
    /// observe a partially-mutated buffer.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
