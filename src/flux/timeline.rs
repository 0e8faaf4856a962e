/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! A [FluxTimeline] is the raw material of flux decoding: an ordered list of the times
//! between consecutive flux reversals, captured from one track and head. A timeline may span
//! more than one revolution of the disk.
//!
//! A timeline is append-only while it is being captured and is treated as immutable once
//! handed to a decoder. Noisy or implausible intervals are kept as recorded - it is the job
//! of the [FluxCursor](crate::flux::FluxCursor) to tolerate them.

use crate::{format_ms, format_us};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("A flux interval of zero length was appended at index {0}")]
    ZeroInterval(usize),
}

/// An append-only sequence of flux reversal intervals in nanoseconds.
#[derive(Clone, Debug, Default)]
pub struct FluxTimeline {
    /// The time between each pair of flux reversals.
    intervals: Vec<u32>,
    /// The absolute time at which each interval ends. Kept alongside `intervals` so that
    /// lookups by absolute time are a binary search.
    ends: Vec<u64>,
    /// Absolute times of index pulses seen during capture, if the source reported any.
    index_times: Vec<u64>,
}

impl FluxTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        FluxTimeline {
            intervals: Vec::with_capacity(capacity),
            ends: Vec::with_capacity(capacity),
            index_times: Vec::new(),
        }
    }

    /// Create a timeline from a slice of intervals in nanoseconds.
    pub fn from_intervals(intervals: &[u32]) -> Result<Self, TimelineError> {
        let mut timeline = FluxTimeline::with_capacity(intervals.len());
        for &interval in intervals {
            timeline.append(interval)?;
        }
        Ok(timeline)
    }

    /// Create a timeline from a list of intervals given in integer ticks of a sample clock with
    /// period `timebase_ns`. Zero-length cells (no flux area markers in some capture formats)
    /// are skipped.
    pub fn from_u16(data: &[u16], timebase_ns: f64) -> Self {
        let mut timeline = FluxTimeline::with_capacity(data.len());
        let mut nfa_count = 0;
        for cell in data {
            let ns = (*cell as f64 * timebase_ns).round() as u32;
            if ns == 0 {
                nfa_count += 1;
                continue;
            }
            timeline.push_unchecked(ns);
        }

        if nfa_count > 0 {
            log::warn!("FluxTimeline::from_u16(): {} NFA cells skipped", nfa_count);
        }
        timeline
    }

    /// Create a timeline from a sequence of raw bitcells, where each set bit represents a flux
    /// reversal at the end of its cell. Leading zero cells become part of the first interval;
    /// zero cells after the final reversal cannot be represented and are dropped.
    pub fn from_bitcells<I: IntoIterator<Item = bool>>(bits: I, cell_ns: u32) -> Self {
        let mut timeline = FluxTimeline::new();
        let mut cells_since_flux: u32 = 0;
        for bit in bits {
            cells_since_flux += 1;
            if bit {
                timeline.push_unchecked(cells_since_flux * cell_ns);
                cells_since_flux = 0;
            }
        }
        timeline
    }

    /// Append a single flux reversal interval.
    pub fn append(&mut self, interval_ns: u32) -> Result<(), TimelineError> {
        if interval_ns == 0 {
            return Err(TimelineError::ZeroInterval(self.intervals.len()));
        }
        self.push_unchecked(interval_ns);
        Ok(())
    }

    /// Append an interval already known to be positive.
    pub(crate) fn push_unchecked(&mut self, interval_ns: u32) {
        let end = self.total_duration() + interval_ns as u64;
        self.intervals.push(interval_ns);
        self.ends.push(end);
    }

    /// Record an index pulse at the current end of the timeline.
    pub fn mark_index(&mut self) {
        self.index_times.push(self.total_duration());
    }

    /// Return the absolute times of recorded index pulses.
    pub fn index_times(&self) -> &[u64] {
        &self.index_times
    }

    /// Return the duration of the first complete revolution, if two index pulses were recorded.
    pub fn revolution_ns(&self) -> Option<u64> {
        match self.index_times.as_slice() {
            [first, second, ..] => Some(second - first),
            _ => None,
        }
    }

    /// Return the sum of all intervals in nanoseconds.
    pub fn total_duration(&self) -> u64 {
        self.ends.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Return the interval at `index`, if present.
    pub fn interval(&self, index: usize) -> Option<u32> {
        self.intervals.get(index).copied()
    }

    /// Return the index of the interval in progress at absolute time `time_ns`, or `None` if
    /// the time lies beyond the end of the timeline.
    pub fn interval_at_time(&self, time_ns: u64) -> Option<usize> {
        let index = self.ends.partition_point(|&end| end <= time_ns);
        (index < self.intervals.len()).then_some(index)
    }

    /// Create an iterator over the flux intervals.
    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, u32>> {
        self.intervals.iter().copied()
    }

    /// Retrieve the average flux interval in nanoseconds.
    /// Note: this value is probably not reliable for determining any specific heuristics.
    pub fn interval_avg(&self) -> f64 {
        if self.intervals.is_empty() {
            return 0.0;
        }
        self.total_duration() as f64 / self.intervals.len() as f64
    }

    /// Return the intervals as a slice.
    pub fn intervals(&self) -> &[u32] {
        &self.intervals
    }

    pub(crate) fn log_summary(&self) {
        log::debug!(
            "FluxTimeline::log_summary(): {} transitions over {}, avg: {}, {} index pulses",
            self.len(),
            format_ms!(self.total_duration()),
            format_us!(self.interval_avg()),
            self.index_times.len()
        );
    }
}

impl<'a> IntoIterator for &'a FluxTimeline {
    type Item = u32;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, u32>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
