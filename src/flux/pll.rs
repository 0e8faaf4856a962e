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

//! Clock recovery for flux decoding.
//!
//! The [Pll] quantizes each flux interval into a whole number of bitcells under its current
//! working period, then re-estimates that period from a short history of recently quantized
//! intervals. The working period is allowed to drift within `max_adjust` of the nominal
//! period, which tolerates the speed variation between the drive that wrote a disk and the
//! drive that captured it.

use crate::format_us;
use std::collections::VecDeque;

/// The default bitcell period for a 300RPM, 250Kbps MFM disk, in nanoseconds.
pub const BASE_CLOCK_NS: f64 = 2000.0;
/// The default length of the clock-recovery history window.
pub const DEFAULT_WINDOW: usize = 32;
/// The default maximum fractional deviation of the working period from the nominal period.
pub const DEFAULT_MAX_ADJUST: f64 = 0.15;

/// Intervals longer than this many cells are no-flux areas or damage and are not used to
/// estimate the clock.
const MAX_TRACKING_CELLS: u32 = 8;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum PllPreset {
    /// Fast-converging clock with a short history window.
    Aggressive,
    /// Slow-converging clock with a long history window.
    #[default]
    Conservative,
}

#[derive(Clone, Debug)]
pub struct Pll {
    /// The nominal bitcell period, in nanoseconds.
    pub pll_period: f64,
    /// The currently recovered bitcell period, in nanoseconds.
    pub working_period: f64,
    pub max_adjust: f64,
    pub clock_gain: f64,

    window_len: usize,
    window: VecDeque<(f64, u32)>,
    window_time: f64,
    window_cells: u64,
    /// Time of sub-cell flux intervals not yet assigned to a bitcell.
    carry: f64,
}

impl Default for Pll {
    fn default() -> Self {
        Pll::new()
    }
}

impl Pll {
    pub fn new() -> Self {
        Pll {
            pll_period: BASE_CLOCK_NS,
            working_period: BASE_CLOCK_NS,
            max_adjust: DEFAULT_MAX_ADJUST,
            clock_gain: 0.10,
            window_len: DEFAULT_WINDOW,
            window: VecDeque::with_capacity(DEFAULT_WINDOW),
            window_time: 0.0,
            window_cells: 0,
            carry: 0.0,
        }
    }

    pub fn from_preset(preset: PllPreset) -> Pll {
        let mut pll = Pll::new();
        match preset {
            PllPreset::Aggressive => {
                pll.clock_gain = 0.25;
                pll.set_window(16);
            }
            PllPreset::Conservative => {
                pll.clock_gain = 0.10;
                pll.set_window(DEFAULT_WINDOW);
            }
        }
        pll
    }

    /// Create a [Pll] with the given nominal period in nanoseconds.
    pub fn with_period(period_ns: f64) -> Pll {
        let mut pll = Pll::new();
        pll.set_clock(period_ns, None);
        pll
    }

    /// Set the length of the clock-recovery history window. A window of zero is treated as one.
    pub fn set_window(&mut self, len: usize) {
        self.window_len = len.max(1);
        self.clear_history();
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Set the nominal bitcell period in nanoseconds, and optionally the maximum fractional
    /// adjustment of the working period. Non-positive periods are ignored.
    pub fn set_clock(&mut self, period_ns: f64, max_adj: Option<f64>) {
        if !(period_ns > 0.0) {
            log::warn!("Pll::set_clock(): Ignoring invalid period: {}", period_ns);
            return;
        }
        self.pll_period = period_ns;
        self.working_period = period_ns;
        if let Some(adj) = max_adj {
            self.max_adjust = adj.clamp(0.0, 0.95);
        }
        self.clear_history();
        log::debug!(
            "Pll::set_clock(): Setting period to {}, max adjust: {:.2}",
            format_us!(self.pll_period),
            self.max_adjust,
        );
    }

    /// Return the working period to the nominal period and forget all history.
    pub fn reset_clock(&mut self) {
        self.working_period = self.pll_period;
        self.clear_history();
        log::debug!(
            "Pll::reset_clock(): Resetting clock to nominal period: {}",
            format_us!(self.pll_period)
        );
    }

    /// Scale the nominal period by `factor`.
    pub fn adjust_clock(&mut self, factor: f64) {
        if !(factor > 0.0) {
            return;
        }
        let old_period = self.pll_period;
        self.pll_period *= factor;
        self.working_period = self.pll_period;
        self.clear_history();
        log::debug!(
            "Pll::adjust_clock(): Adjusting clock by factor: {:.4} old: {} new: {}",
            factor,
            format_us!(old_period),
            format_us!(self.pll_period)
        );
    }

    /// Return the current recovered bitcell period in nanoseconds.
    pub fn period(&self) -> f64 {
        self.working_period
    }

    fn clear_history(&mut self) {
        self.window.clear();
        self.window_time = 0.0;
        self.window_cells = 0;
        self.carry = 0.0;
    }

    fn min_period(&self) -> f64 {
        self.pll_period * (1.0 - self.max_adjust)
    }

    fn max_period(&self) -> f64 {
        self.pll_period * (1.0 + self.max_adjust)
    }

    /// Quantize a single flux interval into a number of bitcells, updating the recovered clock.
    ///
    /// An interval shorter than half a bitcell produces no cells; its time is carried into the
    /// next interval.
    pub fn process(&mut self, interval_ns: f64) -> u32 {
        let t = interval_ns + self.carry;
        let cells = (t / self.working_period).round();
        if cells < 1.0 {
            self.carry = t;
            return 0;
        }
        self.carry = 0.0;
        let cells = cells.min(u32::MAX as f64) as u32;

        if cells <= MAX_TRACKING_CELLS {
            self.track(t, cells);
        }
        cells
    }

    fn track(&mut self, time: f64, cells: u32) {
        if self.window.len() == self.window_len {
            if let Some((old_time, old_cells)) = self.window.pop_front() {
                self.window_time -= old_time;
                self.window_cells -= old_cells as u64;
            }
        }
        self.window.push_back((time, cells));
        self.window_time += time;
        self.window_cells += cells as u64;

        let estimate = self.window_time / self.window_cells as f64;
        let adjusted = self.working_period + self.clock_gain * (estimate - self.working_period);
        self.working_period = adjusted.clamp(self.min_period(), self.max_period());
    }
}
