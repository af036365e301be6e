//! Adaptive write pacing.
//!
//! [QueueState] holds the counters of one queue and is only touched with the queue lock held.
//! All time-dependent methods take `now` so the arithmetic can be driven by a test clock.
use crate::config::PacingConfig;
use log::{debug, info};
use std::time::{Duration, SystemTime};

/// How a writer's budget for the current interval is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacingMode {
    /// Each writer gets an equal share of what readers consumed, smoothed with an EWMA.
    #[default]
    PerWriter,
    /// Writers as a whole may not exceed the smoothed aggregate write rate; an ideal reader
    /// position trails the tail by that rate.
    WriteBehind,
}

#[derive(Debug, Clone)]
pub struct QueueState {
    pub(crate) head: u64,
    pub(crate) tail: u64,
    capacity: usize,
    config: PacingConfig,
    /// Writes per writer slot in the current interval. Freed slots are `None`.
    write_counts: Vec<Option<u64>>,
    read_count: u64,
    reader_count: usize,
    writes_limit: f64,
    pacing_active: bool,
    pacing_activations: u64,
    interval_start: SystemTime,
    writes_ewma: f64,
    interval_write_count: u64,
    ideal_reader_position: u64,
}

impl QueueState {
    pub fn new(capacity: usize, config: PacingConfig, now: SystemTime) -> Self {
        QueueState {
            head: 0,
            tail: 0,
            capacity,
            write_counts: vec![],
            read_count: 0,
            reader_count: 0,
            writes_limit: config.min_writes_per_interval as f64,
            pacing_active: false,
            pacing_activations: 0,
            interval_start: now,
            writes_ewma: 0.0,
            interval_write_count: 0,
            ideal_reader_position: 0,
            config,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn occupancy(&self) -> u64 {
        self.tail - self.head
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() >= self.capacity as u64
    }

    pub fn utilization(&self) -> f64 {
        self.occupancy() as f64 / self.capacity as f64
    }

    pub fn writer_count(&self) -> usize {
        self.write_counts.iter().filter(|c| c.is_some()).count()
    }

    pub fn reader_count(&self) -> usize {
        self.reader_count
    }

    pub fn writes_limit(&self) -> f64 {
        self.writes_limit
    }

    pub fn writes_ewma(&self) -> f64 {
        self.writes_ewma
    }

    pub fn ideal_reader_position(&self) -> u64 {
        self.ideal_reader_position
    }

    pub fn pacing_active(&self) -> bool {
        self.pacing_active
    }

    pub fn pacing_activations(&self) -> u64 {
        self.pacing_activations
    }

    /// Claims a writer slot, reusing freed ones first.
    pub fn add_writer(&mut self) -> usize {
        match self.write_counts.iter().position(Option::is_none) {
            Some(slot) => {
                self.write_counts[slot] = Some(0);
                slot
            }
            None => {
                self.write_counts.push(Some(0));
                self.write_counts.len() - 1
            }
        }
    }

    pub fn remove_writer(&mut self, slot: usize) {
        if let Some(count) = self.write_counts.get_mut(slot) {
            *count = None;
        }
    }

    pub fn add_reader(&mut self) {
        self.reader_count += 1;
    }

    pub fn remove_reader(&mut self) {
        self.reader_count = self.reader_count.saturating_sub(1);
    }

    pub fn record_write(&mut self, slot: usize) {
        if let Some(Some(count)) = self.write_counts.get_mut(slot) {
            *count += 1;
        }
        self.interval_write_count += 1;
        self.tail += 1;
    }

    pub fn record_read(&mut self) {
        self.read_count += 1;
    }

    /// Closes every interval that ended at or before `now`.
    pub fn update_interval(&mut self, now: SystemTime) {
        let interval = self.config.interval();
        while now >= self.interval_start + interval {
            self.interval_start += interval;
            match self.config.mode {
                PacingMode::PerWriter => {
                    self.calculate_writes_limit();
                    debug!(
                        "utilization {:.3}, pacing {}, writes limit {:.1}, reads {}",
                        self.utilization(),
                        self.pacing_active,
                        self.writes_limit,
                        self.read_count
                    );
                    self.read_count = 0;
                    for count in self.write_counts.iter_mut().flatten() {
                        *count = 0;
                    }
                }
                PacingMode::WriteBehind => {
                    self.ideal_reader_position = (self.ideal_reader_position
                        + self.writes_ewma as u64)
                        .min(self.tail);
                    self.calculate_ewma_writes();
                    debug!(
                        "ideal reader at {}, head {}, tail {}, {} readers",
                        self.ideal_reader_position, self.head, self.tail, self.reader_count
                    );
                    self.interval_write_count = 0;
                }
            }
        }
    }

    /// Turns pacing on when needed and returns how long the writer in `slot` must wait before
    /// writing again, if at all.
    pub fn apply_pacing(&mut self, slot: usize, now: SystemTime) -> Option<Duration> {
        if self.utilization() >= self.config.on_threshold {
            if !self.pacing_active {
                self.pacing_activations += 1;
                info!(
                    "pacing on at {}/{} queued items",
                    self.occupancy(),
                    self.capacity
                );
            }
            self.pacing_active = true;
        }
        if !self.pacing_active {
            return None;
        }

        let over_budget = match self.config.mode {
            PacingMode::PerWriter => {
                let written = self.write_counts.get(slot).copied().flatten().unwrap_or(0);
                written as f64 >= self.writes_limit
            }
            PacingMode::WriteBehind => {
                let budget = self
                    .writes_ewma
                    .max(self.config.min_writes_per_interval as f64);
                self.interval_write_count as f64 >= budget
            }
        };
        if !over_budget {
            return None;
        }
        let wait = (self.interval_start + self.config.interval())
            .duration_since(now)
            .ok()?;
        debug!("writer {} paced for {:?}", slot, wait);
        Some(wait)
    }

    /// Called by readers; pacing turns off only once occupancy falls below the off threshold.
    pub fn check_pacing_stop(&mut self) {
        if self.pacing_active && self.utilization() < self.config.off_threshold {
            self.pacing_active = false;
            info!(
                "pacing off at {}/{} queued items",
                self.occupancy(),
                self.capacity
            );
        }
    }

    /// Recomputes the per-writer budget from the reads of the interval just closed.
    ///
    /// The budget is capped at half of the free space and floored at the configured minimum.
    /// Without readers or writers it is left unchanged.
    pub fn calculate_writes_limit(&mut self) {
        let writers = self.writer_count();
        if self.reader_count == 0 || writers == 0 {
            return;
        }
        let instant_limit = self.read_count as f64 / self.reader_count as f64 / writers as f64;
        let alpha = self.config.alpha;
        let mut limit = (1.0 - alpha) * self.writes_limit + alpha * instant_limit;

        let upbound = (self.capacity as u64).saturating_sub(self.occupancy()) / 2;
        limit = limit.min(upbound as f64);
        limit = limit.max(self.config.min_writes_per_interval as f64);
        self.writes_limit = limit;
    }

    /// Folds the interval's aggregate write count into the moving average. The first non-zero
    /// average is seeded with the raw sample.
    pub fn calculate_ewma_writes(&mut self) {
        let sample = self.interval_write_count as f64;
        if self.writes_ewma == 0.0 {
            self.writes_ewma = sample;
        } else {
            let alpha = self.config.alpha;
            self.writes_ewma = (1.0 - alpha) * self.writes_ewma + alpha * sample;
        }
    }
}
