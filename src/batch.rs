/// Capture batch buffer: a bounded, insertion-ordered set of measurements.
///
/// Duplicate addresses are rejected. The insert that brings the buffer to
/// capacity reports `Full` so the owner can flush before taking more input.
use heapless::Vec;

use crate::packet::Measurement;

/// Result of offering a measurement to the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insert {
    /// Stored; room remains
    Stored,
    /// Stored, and the buffer just reached capacity
    Full,
    /// Already present, nothing changed
    Duplicate,
    /// Buffer was already at capacity, measurement discarded
    Rejected,
}

/// Set of up to `N` measurements in arrival order.
#[derive(Debug, Clone)]
pub struct BatchBuffer<const N: usize> {
    entries: Vec<Measurement, N>,
    capacity: usize,
}

impl<const N: usize> BatchBuffer<N> {
    /// Buffer with capacity `N`.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            capacity: N,
        }
    }

    /// Buffer with a runtime capacity, clamped to `1..=N`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.clamp(1, N),
        }
    }

    pub fn try_insert(&mut self, measurement: Measurement) -> Insert {
        if self.entries.contains(&measurement) {
            return Insert::Duplicate;
        }
        if self.is_full() || self.entries.push(measurement).is_err() {
            return Insert::Rejected;
        }
        if self.is_full() {
            Insert::Full
        } else {
            Insert::Stored
        }
    }

    /// Take every buffered measurement in insertion order, leaving the
    /// buffer empty.
    pub fn drain(&mut self) -> Vec<Measurement, N> {
        core::mem::take(&mut self.entries)
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.entries
    }

    pub fn contains(&self, measurement: &Measurement) -> bool {
        self.entries.contains(measurement)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<const N: usize> Default for BatchBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
