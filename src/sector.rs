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

//! Decoded sector records.
//!
//! A [Sector] is the unit of output of flux decoding. Its [SectorStatus] records how much of it
//! has been recovered; statuses only ever move toward more complete values when results from
//! several decode attempts are merged.

use crate::types::{DiskCh, DiskChs};
use std::fmt::{self, Display, Formatter};
use strum::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

/// The recovery status of a sector. The textual forms are a stable vocabulary shared with
/// external tools and must not change.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, Hash, StrumDisplay, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SectorStatus {
    /// Never located.
    #[default]
    Missing,
    /// The header was located, but the payload has not been recovered.
    DataMissing,
    /// The payload was found but its checksum did not match. The payload is retained.
    BadChecksum,
    /// The payload was found and its checksum matched.
    Ok,
    /// Persisted metadata for this sector was malformed. Never produced by flux decoding.
    InternalError,
}

impl SectorStatus {
    /// Parse a status name. Unknown names map to [SectorStatus::InternalError].
    pub fn from_name(name: &str) -> SectorStatus {
        name.trim().parse().unwrap_or(SectorStatus::InternalError)
    }

    /// Return the rank of this status by information completeness. Higher is more complete.
    pub fn completeness(&self) -> u8 {
        match self {
            SectorStatus::Missing | SectorStatus::InternalError => 0,
            SectorStatus::DataMissing => 1,
            SectorStatus::BadChecksum => 2,
            SectorStatus::Ok => 3,
        }
    }

    /// Return true if the payload of a sector with this status is present.
    pub fn has_data(&self) -> bool {
        matches!(self, SectorStatus::BadChecksum | SectorStatus::Ok)
    }
}

/// A span of time within a flux timeline, in nanoseconds.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TimeSpan {
    pub start_ns: u64,
    pub end_ns: u64,
}

impl TimeSpan {
    pub fn new(start_ns: u64, end_ns: u64) -> Self {
        TimeSpan { start_ns, end_ns }
    }

    pub fn duration_ns(&self) -> u64 {
        self.end_ns.saturating_sub(self.start_ns)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sector {
    pub status: SectorStatus,
    /// The physical track the sector was read from.
    pub physical: DiskCh,
    /// The logical address recorded in the sector header.
    pub logical: DiskChs,
    pub data: Vec<u8>,
    /// The recovered bitcell period at the sector header.
    pub clock_ns: Option<f64>,
    pub header_span: Option<TimeSpan>,
    pub data_span: Option<TimeSpan>,
    /// Offset in bitcells of the first payload bit from the start of the pass.
    pub data_bit_offset: Option<usize>,
}

impl Sector {
    /// Create an empty sector on the given physical track.
    pub fn new(physical: DiskCh) -> Self {
        Sector {
            physical,
            ..Sector::default()
        }
    }

    /// Return the logical address of the sector.
    pub fn chs(&self) -> DiskChs {
        self.logical
    }

    /// Replace this sector with `other` if `other` is strictly more complete. Returns true if
    /// the sector was replaced.
    pub fn merge_from(&mut self, other: &Sector) -> bool {
        if other.status.completeness() > self.status.completeness() {
            *self = other.clone();
            true
        }
        else {
            false
        }
    }
}

impl Display for Sector {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} from {} status: {} len: {}",
            self.logical,
            self.physical,
            self.status,
            self.data.len()
        )
    }
}
