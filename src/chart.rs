//! ==============================================================================
//! chart.rs - sliding window of chart points per channel
//! ==============================================================================
//!
//! fixed-capacity, oldest-evicted buffers for the three plotted series.
//! all channels sit behind ONE lock so `clear()` is atomic with respect to a
//! reader taking a snapshot; the lock is only held across push/evict or a
//! copy-out, never across I/O.
//!
//! ==============================================================================

use std::collections::VecDeque;

use parking_lot::RwLock;
use serde::Serialize;

use crate::domain::{HistoryPoint, SensorReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    BoilingPoint,
    Pressure,
}

impl Channel {
    fn index(self) -> usize {
        match self {
            Channel::Temperature => 0,
            Channel::BoilingPoint => 1,
            Channel::Pressure => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub timestamp_ms: i64,
    pub value: f64,
}

/// owned copy of every channel, oldest point first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSnapshot {
    pub temperature: Vec<ChartPoint>,
    pub boiling_point: Vec<ChartPoint>,
    pub pressure: Vec<ChartPoint>,
}

pub struct ChartBuffer {
    max_points: usize,
    channels: RwLock<[VecDeque<ChartPoint>; 3]>,
}

impl ChartBuffer {
    pub fn new(max_points: usize) -> Self {
        let max_points = max_points.max(1);
        Self {
            max_points,
            channels: RwLock::new(std::array::from_fn(|_| VecDeque::with_capacity(max_points + 1))),
        }
    }

    pub fn max_points(&self) -> usize {
        self.max_points
    }

    pub fn push(&self, channel: Channel, timestamp_ms: i64, value: f64) {
        let mut channels = self.channels.write();
        push_bounded(&mut channels[channel.index()], self.max_points, timestamp_ms, value);
    }

    /// push every series of a reading under a single lock
    ///
    /// a reading without a probe temperature leaves the temperature series
    /// untouched; boiling point and pressure are always present. the channels
    /// can therefore differ in length and must be aligned by `timestamp_ms`,
    /// never by index.
    pub fn push_reading(&self, reading: &SensorReading) {
        let ts = reading.timestamp_ms;
        let mut channels = self.channels.write();
        if let Some(t) = reading.temperature_c {
            push_bounded(&mut channels[Channel::Temperature.index()], self.max_points, ts, t);
        }
        push_bounded(
            &mut channels[Channel::BoilingPoint.index()],
            self.max_points,
            ts,
            reading.boiling_point_c(),
        );
        push_bounded(&mut channels[Channel::Pressure.index()], self.max_points, ts, reading.pressure_atm);
    }

    /// replay recorded history (oldest first); only the newest `max_points` survive
    pub fn extend_history(&self, history: &[HistoryPoint]) {
        let mut channels = self.channels.write();
        for p in history {
            let ts = p.timestamp_ms;
            push_bounded(&mut channels[Channel::Temperature.index()], self.max_points, ts, p.temperature_c);
            push_bounded(&mut channels[Channel::BoilingPoint.index()], self.max_points, ts, p.boiling_point_c);
            push_bounded(&mut channels[Channel::Pressure.index()], self.max_points, ts, p.pressure_atm);
        }
    }

    pub fn clear(&self) {
        let mut channels = self.channels.write();
        for c in channels.iter_mut() {
            c.clear();
        }
    }

    pub fn len(&self, channel: Channel) -> usize {
        self.channels.read()[channel.index()].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().iter().all(VecDeque::is_empty)
    }

    /// copy of one channel, oldest first
    pub fn series(&self, channel: Channel) -> Vec<ChartPoint> {
        self.channels.read()[channel.index()].iter().copied().collect()
    }

    /// consistent copy of all channels taken under one read lock
    pub fn snapshot(&self) -> ChartSnapshot {
        let channels = self.channels.read();
        let copy = |c: Channel| -> Vec<ChartPoint> { channels[c.index()].iter().copied().collect() };
        ChartSnapshot {
            temperature: copy(Channel::Temperature),
            boiling_point: copy(Channel::BoilingPoint),
            pressure: copy(Channel::Pressure),
        }
    }
}

fn push_bounded(series: &mut VecDeque<ChartPoint>, max: usize, timestamp_ms: i64, value: f64) {
    series.push_back(ChartPoint { timestamp_ms, value });
    while series.len() > max {
        series.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_newest_points_in_order() {
        let buffer = ChartBuffer::new(3);
        for i in 0..5 {
            buffer.push(Channel::Pressure, i, i as f64);
        }
        let values: Vec<f64> = buffer.series(Channel::Pressure).iter().map(|p| p.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(buffer.len(Channel::Temperature), 0);
    }

    #[test]
    fn reading_fills_all_channels_with_derived_boiling_point() {
        let buffer = ChartBuffer::new(50);
        buffer.push_reading(&SensorReading::new(Some(60.0), 0.96, true, 100.0, 10));
        buffer.push_reading(&SensorReading::new(None, 1.0, true, 100.0, 20));

        let snap = buffer.snapshot();
        assert_eq!(snap.temperature.len(), 1);
        assert_eq!(snap.pressure.len(), 2);
        // no temperature at t=20, the other channels still get a point
        let stamps = |s: &[ChartPoint]| s.iter().map(|p| p.timestamp_ms).collect::<Vec<_>>();
        assert_eq!(stamps(&snap.temperature), vec![10]);
        assert_eq!(stamps(&snap.pressure), vec![10, 20]);
        assert_eq!(stamps(&snap.boiling_point), vec![10, 20]);
        assert!((snap.boiling_point[0].value - 99.0).abs() < 1e-9);
        assert_eq!(snap.boiling_point[1].timestamp_ms, 20);
    }

    #[test]
    fn clear_empties_everything() {
        let buffer = ChartBuffer::new(5);
        buffer.push_reading(&SensorReading::new(Some(20.0), 1.0, false, 100.0, 1));
        assert!(!buffer.is_empty());
        buffer.clear();
        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), ChartSnapshot::default());
    }

    #[test]
    fn history_is_trimmed_to_window() {
        let buffer = ChartBuffer::new(4);
        let history: Vec<HistoryPoint> =
            (0..10).map(|i| HistoryPoint::new(i * 1000, 20.0 + i as f64, 1.0)).collect();
        buffer.extend_history(&history);
        let temps = buffer.series(Channel::Temperature);
        assert_eq!(temps.len(), 4);
        assert_eq!(temps[0].timestamp_ms, 6000);
        assert_eq!(temps[3].value, 29.0);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let buffer = ChartBuffer::new(0);
        buffer.push(Channel::Temperature, 1, 1.0);
        buffer.push(Channel::Temperature, 2, 2.0);
        assert_eq!(buffer.series(Channel::Temperature), vec![ChartPoint { timestamp_ms: 2, value: 2.0 }]);
    }
}
