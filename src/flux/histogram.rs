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

//! This module defines a [FluxHistogram] structure which is used to estimate the bitcell
//! period of a flux timeline so that the PLL may be properly initialized for decoding when
//! no clock hint was configured.

use crate::{flux::FluxTimeline, format_us, types::TrackDataEncoding};
use histogram::{Bucket, Histogram};

pub struct FluxHistogram {
    histogram: Histogram,
    maxima: Vec<(u64, std::ops::RangeInclusive<u64>)>,
    total_time: u64,
}

impl FluxHistogram {
    /// Produce a [FluxHistogram] over a fraction of the intervals in a timeline.
    /// # Arguments
    /// * `timeline` - The timeline to sample.
    /// * `fraction` - The fraction of the intervals to use in the histogram
    pub fn new(timeline: &FluxTimeline, fraction: f64) -> Option<Self> {
        // Max value power of 2^14 = 16384 (16us)
        // Grouping power of 3 produces sharp spikes without false maxima
        let mut histogram = Histogram::new(3, 14).ok()?;

        let take_count = (timeline.len() as f64 * fraction).round() as usize;
        log::debug!("FluxHistogram::new(): Taking {} flux intervals", take_count);
        let mut total_time = 0;
        for interval in timeline.iter().take(take_count) {
            total_time += interval as u64;
            // Intervals beyond the histogram range are long no-flux areas; they tell us nothing
            // about the clock.
            _ = histogram.increment(interval as u64);
        }

        Some(FluxHistogram {
            histogram,
            maxima: Vec::new(),
            total_time,
        })
    }

    pub fn total_time(&self) -> u64 {
        self.total_time
    }

    /// Locate local maxima in a histogram by bucket.
    fn find_local_maxima(&mut self, threshold: Option<f64>) -> &Vec<(u64, std::ops::RangeInclusive<u64>)> {
        let mut peaks = vec![];
        let mut previous_bucket: Option<Bucket> = None;
        let mut current_bucket: Option<Bucket> = None;

        // Calculate total count for threshold
        let total_count: u64 = self.histogram.into_iter().map(|bucket| bucket.count()).sum();
        let threshold = (total_count as f64 * threshold.unwrap_or(0.005)).round() as u64;

        for bucket in self.histogram.into_iter() {
            if let (Some(prev), Some(curr)) = (previous_bucket.as_ref(), current_bucket.as_ref()) {
                if curr.count() >= prev.count() && curr.count() > bucket.count() && curr.count() >= threshold {
                    peaks.push((curr.count(), curr.start()..=curr.end()));
                }
            }
            previous_bucket = current_bucket.take();
            current_bucket = Some(bucket.clone());
        }

        self.maxima = peaks;
        &self.maxima
    }

    /// Attempt to calculate the base (shortest) transition time in nanoseconds.
    pub fn base_transition_time(&mut self) -> Option<f64> {
        if self.maxima.is_empty() {
            self.find_local_maxima(None);
        }

        let first_peak = &self.maxima.first()?.1;
        let range_median = (first_peak.start() + first_peak.end()) / 2;
        Some(range_median as f64)
    }

    /// Estimate the bitcell period in nanoseconds for a track of the given encoding.
    pub fn estimate_clock_ns(&mut self, encoding: TrackDataEncoding) -> Option<f64> {
        let base = self.base_transition_time()?;
        self.print_debug();
        let clock = base / encoding.shortest_transition_cells();
        log::debug!(
            "FluxHistogram::estimate_clock_ns(): base transition {} gives {} bitcell for {}",
            format_us!(base),
            format_us!(clock),
            encoding
        );
        Some(clock)
    }

    fn print_debug(&self) {
        for peak in self.maxima.iter() {
            log::debug!("FluxHistogram::print_debug(): Peak at range: {:?} ct: {}", peak.1, peak.0);
        }
    }
}
