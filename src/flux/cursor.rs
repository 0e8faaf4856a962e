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

    src/flux/cursor.rs

    Implements a bitstream cursor over a flux timeline with clock recovery and sync mark search.
*/

//! A [FluxCursor] reads a [FluxTimeline] as a stream of bitcells.
//!
//! Bitcells are produced lazily: each flux interval is quantized by the cursor's [Pll] as the
//! cursor advances, so the recovered clock always reflects the flux immediately preceding the
//! read position. A set bit marks a flux reversal at the end of its cell.
//!
//! A cursor is created for a single decode pass over a single timeline and is not shared.

use crate::{
    flux::{FluxTimeline, Pll},
    format_us,
    pattern::{PatternSet, RecordKind},
};
use bit_vec::BitVec;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("Flux timeline exhausted: requested {requested} bits, {available} available")]
    Exhausted { requested: usize, available: usize },
}

/// A synchronization mark located by [FluxCursor::seek_to_next_match].
#[derive(Clone, Debug, PartialEq)]
pub struct SeekMatch {
    /// Index of the matching mark within the searched [PatternSet].
    pub mark_index: usize,
    pub kind: RecordKind,
    /// Bit index of the first bitcell of the mark.
    pub bit_index: usize,
    /// Absolute time of the start of the mark within the timeline.
    pub time_ns: u64,
    /// Time between the cursor position at the start of the search and the start of the mark.
    pub elapsed_ns: u64,
    /// The recovered bitcell period at the mark.
    pub clock_ns: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SeekOutcome {
    Found(SeekMatch),
    /// The timeline was exhausted without a match. `elapsed_ns` is the time from the search
    /// start to the end of the timeline.
    NotFound { elapsed_ns: u64 },
}

impl SeekOutcome {
    pub fn elapsed_ns(&self) -> u64 {
        match self {
            SeekOutcome::Found(m) => m.elapsed_ns,
            SeekOutcome::NotFound { elapsed_ns } => *elapsed_ns,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SeekOutcome::Found(_))
    }
}

pub struct FluxCursor<'a> {
    timeline: &'a FluxTimeline,
    pll: Pll,
    /// Index of the next flux interval to quantize.
    next_flux: usize,
    /// Absolute time at the end of the last quantized interval.
    flux_time: u64,
    /// Absolute time of the last flux reversal that produced a bitcell.
    last_edge: u64,
    bits: BitVec,
    /// Absolute time at the end of each bitcell.
    bit_times: Vec<u64>,
    /// Index of the next bit to be read.
    position: usize,
}

impl<'a> FluxCursor<'a> {
    /// Create a cursor at the start of `timeline`, recovering the clock with `pll`.
    pub fn new(timeline: &'a FluxTimeline, pll: Pll) -> Self {
        // Roughly 2.5 cells per MFM transition.
        let capacity = timeline.len() * 5 / 2;
        FluxCursor {
            timeline,
            pll,
            next_flux: 0,
            flux_time: 0,
            last_edge: 0,
            bits: BitVec::with_capacity(capacity),
            bit_times: Vec::with_capacity(capacity),
            position: 0,
        }
    }

    /// Create a cursor with a fresh [Pll] at the given nominal bitcell period.
    pub fn with_clock(timeline: &'a FluxTimeline, clock_ns: f64) -> Self {
        FluxCursor::new(timeline, Pll::with_period(clock_ns))
    }

    pub fn timeline(&self) -> &FluxTimeline {
        self.timeline
    }

    /// Return the current bit position.
    pub fn tell(&self) -> usize {
        self.position
    }

    /// Return the absolute time of the current position: the end of the last consumed bitcell.
    pub fn position_ns(&self) -> u64 {
        self.time_before(self.position)
    }

    /// Return the currently recovered bitcell period in nanoseconds.
    pub fn clock_ns(&self) -> f64 {
        self.pll.period()
    }

    pub fn pll(&self) -> &Pll {
        &self.pll
    }

    /// Return true if no further bits can be read.
    pub fn is_eof(&self) -> bool {
        self.position >= self.bits.len() && self.next_flux >= self.timeline.len()
    }

    fn time_before(&self, bit_index: usize) -> u64 {
        match bit_index {
            0 => 0,
            i => self.bit_times.get(i - 1).copied().unwrap_or(self.flux_time),
        }
    }

    /// Quantize the next flux interval into bitcells. Returns false at the end of the timeline.
    fn decode_next_flux(&mut self) -> bool {
        let Some(interval) = self.timeline.interval(self.next_flux) else {
            return false;
        };
        self.next_flux += 1;
        self.flux_time += interval as u64;

        let cells = self.pll.process(interval as f64);
        if cells == 0 {
            // Too short to be a bitcell; merged into the following interval.
            return true;
        }

        let span = self.flux_time - self.last_edge;
        for i in 1..=cells as u64 {
            self.bits.push(i == cells as u64);
            self.bit_times.push(self.last_edge + span * i / cells as u64);
        }
        self.last_edge = self.flux_time;
        true
    }

    /// Decode flux until at least `len` bits are available. Returns false if the timeline ran
    /// out first.
    fn fill_to(&mut self, len: usize) -> bool {
        while self.bits.len() < len {
            if !self.decode_next_flux() {
                return false;
            }
        }
        true
    }

    /// Scan forward from the current position for the first bit position at which any pattern
    /// in `patterns` ends. On a match the cursor is left at the first bit of the mark, so the
    /// caller may re-read it with [FluxCursor::read_raw_u64] to advance past it.
    ///
    /// On failure the cursor is left at the end of the timeline.
    pub fn seek_to_next_match(&mut self, patterns: &PatternSet) -> SeekOutcome {
        let start_ns = self.position_ns();
        let mut shift_reg: u64 = 0;
        let mut filled: usize = 0;
        let mut bi = self.position;

        while self.fill_to(bi + 1) {
            shift_reg = (shift_reg << 1) | self.bits[bi] as u64;
            filled += 1;
            bi += 1;

            if let Some((mark_index, mark)) = patterns.first_match(shift_reg, filled) {
                let bit_index = bi - mark.pattern.len;
                let time_ns = self.time_before(bit_index);
                self.position = bit_index;
                let clock_ns = self.pll.period();
                log::trace!(
                    "FluxCursor::seek_to_next_match(): Found {} mark '{}' at bit {} ({}) clock: {}",
                    mark.kind,
                    mark.name,
                    bit_index,
                    format_us!(time_ns),
                    format_us!(clock_ns)
                );
                return SeekOutcome::Found(SeekMatch {
                    mark_index,
                    kind: mark.kind,
                    bit_index,
                    time_ns,
                    elapsed_ns: time_ns.saturating_sub(start_ns),
                    clock_ns,
                });
            }
        }

        self.position = self.bits.len();
        let elapsed_ns = self.timeline.total_duration().saturating_sub(start_ns);
        log::trace!(
            "FluxCursor::seek_to_next_match(): No match after {}",
            format_us!(elapsed_ns)
        );
        SeekOutcome::NotFound { elapsed_ns }
    }

    /// Consume exactly `n` bits from the current position. If fewer than `n` bits remain the
    /// cursor is not advanced and [CursorError::Exhausted] is returned.
    pub fn read_raw_bits(&mut self, n: usize) -> Result<BitVec, CursorError> {
        let end = self.position + n;
        if !self.fill_to(end) {
            return Err(CursorError::Exhausted {
                requested: n,
                available: self.bits.len().saturating_sub(self.position),
            });
        }
        let mut out = BitVec::with_capacity(n);
        for bi in self.position..end {
            out.push(self.bits[bi]);
        }
        self.position = end;
        Ok(out)
    }

    /// Consume `width` bits (at most 64) and return them as an integer, first bit most
    /// significant.
    pub fn read_raw_u64(&mut self, width: usize) -> Result<u64, CursorError> {
        let width = width.min(64);
        let end = self.position + width;
        if !self.fill_to(end) {
            return Err(CursorError::Exhausted {
                requested: width,
                available: self.bits.len().saturating_sub(self.position),
            });
        }
        let mut value: u64 = 0;
        for bi in self.position..end {
            value = (value << 1) | self.bits[bi] as u64;
        }
        self.position = end;
        Ok(value)
    }
}
