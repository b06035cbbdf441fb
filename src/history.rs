/// Bounded FIFO of chart points
use std::collections::VecDeque;

use crate::models::ChartPoint;

/// Chart capacity for tick-driven ingestion (telemetry and uniform simulation)
pub const DEFAULT_CAPACITY: usize = 15;
/// Chart capacity for the continuous drift simulation
pub const DRIFT_CAPACITY: usize = 20;

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    points: VecDeque<ChartPoint>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point at the tail, evicting the oldest one when full
    pub fn append(&mut self, point: ChartPoint) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&ChartPoint> {
        self.points.back()
    }

    /// Iterate points oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter()
    }
}
