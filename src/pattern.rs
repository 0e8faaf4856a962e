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

//! Synchronization mark patterns.
//!
//! A [FluxPattern] is the *effective* bitstream value of a mark as it appears on the medium,
//! clock bits included. Some formats generate marks by shifting a modulated symbol one bitcell
//! out of phase, so the value stored here is not necessarily a valid encoding of any data byte.
//!
//! A [PatternSet] groups every mark that may legally appear at one decode stage so that the
//! [FluxCursor](crate::flux::FluxCursor) can test all of them in a single scan.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use strum::Display as StrumDisplay;

/// A fixed-width bit pattern, up to 64 bits.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FluxPattern {
    pub bits: u64,
    pub mask: u64,
    pub len: usize,
}

impl FluxPattern {
    /// Create a pattern of `len` bits. The value may not have bits set above `len`.
    pub fn new(len: usize, bits: u64) -> Result<Self, ConfigError> {
        if len == 0 || len > 64 {
            return Err(ConfigError::InvalidPattern(format!("width {} is not in 1..=64", len)));
        }
        let mask = if len == 64 { u64::MAX } else { (1u64 << len) - 1 };
        if bits & !mask != 0 {
            return Err(ConfigError::InvalidPattern(format!(
                "value {:#X} does not fit in {} bits",
                bits, len
            )));
        }
        Ok(FluxPattern { bits, mask, len })
    }

    /// Create a full-width 64-bit pattern.
    pub const fn full(bits: u64) -> Self {
        FluxPattern {
            bits,
            mask: u64::MAX,
            len: 64,
        }
    }

    /// Test the pattern against a shift register holding `filled` valid bits, newest bit in the
    /// least significant position.
    #[inline]
    pub fn matches(&self, shift_reg: u64, filled: usize) -> bool {
        filled >= self.len && (shift_reg & self.mask) == self.bits
    }

    /// Test the pattern against a value read at full pattern width.
    #[inline]
    pub fn matches_value(&self, value: u64) -> bool {
        (value & self.mask) == self.bits
    }
}

impl Display for FluxPattern {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let digits = self.len.div_ceil(4);
        write!(f, "{:#0width$X}/{}", self.bits, self.len, width = digits + 2)
    }
}

/// The kind of record introduced by a synchronization mark.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, StrumDisplay)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecordKind {
    Header,
    Data,
}

/// A named synchronization mark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncMark {
    pub name: String,
    pub kind: RecordKind,
    pub pattern: FluxPattern,
}

impl SyncMark {
    pub fn new(name: impl Into<String>, kind: RecordKind, pattern: FluxPattern) -> Self {
        SyncMark {
            name: name.into(),
            kind,
            pattern,
        }
    }
}

/// An ordered set of marks that may legally appear at the same decode stage. When two marks
/// match at the same bit position, the one added first wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternSet {
    marks: Vec<SyncMark>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mark: SyncMark) {
        self.marks.push(mark);
    }

    pub fn with_mark(mut self, mark: SyncMark) -> Self {
        self.push(mark);
        self
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SyncMark> {
        self.marks.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SyncMark> {
        self.marks.iter()
    }

    /// Return the width of the widest pattern in the set.
    pub fn max_width(&self) -> usize {
        self.marks.iter().map(|m| m.pattern.len).max().unwrap_or(0)
    }

    /// Return a new set holding only the marks of the given kind.
    pub fn of_kind(&self, kind: RecordKind) -> PatternSet {
        PatternSet {
            marks: self.marks.iter().filter(|m| m.kind == kind).cloned().collect(),
        }
    }

    pub fn contains_kind(&self, kind: RecordKind) -> bool {
        self.marks.iter().any(|m| m.kind == kind)
    }

    /// Return the index and mark of the first pattern matching the shift register.
    pub fn first_match(&self, shift_reg: u64, filled: usize) -> Option<(usize, &SyncMark)> {
        self.marks
            .iter()
            .enumerate()
            .find(|(_, m)| m.pattern.matches(shift_reg, filled))
    }
}

impl<'a> IntoIterator for &'a PatternSet {
    type Item = &'a SyncMark;
    type IntoIter = std::slice::Iter<'a, SyncMark>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
