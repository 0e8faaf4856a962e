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

use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fmt::{Display, Formatter},
};

/// The type of data encoding used by a track.
/// * Fm: Frequency Modulation encoding. Every data bit is preceded by a clock bit that is
///   always set.
/// * Mfm: Modified Frequency Modulation encoding. A clock bit is only set between two zero
///   data bits.
///
/// In both encodings clock and data bits alternate, so the same demodulator recovers data
/// from either once the bitstream phase is known.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackDataEncoding {
    Fm,
    #[default]
    Mfm,
}

impl TrackDataEncoding {
    /// Return the number of raw bitcells used to encode a single data byte.
    pub fn byte_size(&self) -> usize {
        match self {
            TrackDataEncoding::Fm => 16,
            TrackDataEncoding::Mfm => 16,
        }
    }

    /// Return the number of bitcells spanned by the shortest legal flux transition.
    /// This is used to convert the first peak of a flux histogram into a bitcell period.
    pub fn shortest_transition_cells(&self) -> f64 {
        match self {
            TrackDataEncoding::Fm => 1.0,
            TrackDataEncoding::Mfm => 2.0,
        }
    }
}

impl Display for TrackDataEncoding {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            TrackDataEncoding::Fm => write!(f, "FM"),
            TrackDataEncoding::Mfm => write!(f, "MFM"),
        }
    }
}

/// The density of data recording on a disk track.
///
/// * `Standard` density: typically referring to FM encoding, typically used by 8" diskettes.
/// * `Double` density: typically referring to MFM encoding at 250/300Kbps.
/// * `High` density: typically referring to MFM encoding at 500Kbps.
/// * `Extended` density: typically referring to MFM encoding at 1Mbps.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackDensity {
    Standard,
    #[default]
    Double,
    High,
    Extended,
}

impl Display for TrackDensity {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        use TrackDensity::*;
        match self {
            Standard => write!(f, "Standard"),
            Double => write!(f, "Double"),
            High => write!(f, "High"),
            Extended => write!(f, "Extended"),
        }
    }
}

impl TrackDensity {
    /// Return a value in nanoseconds representing the nominal bitcell period of a PLL for a
    /// given disk density, assuming a 300RPM drive.
    pub fn base_clock_ns(&self) -> f64 {
        match self {
            TrackDensity::Standard => 4000.0,
            TrackDensity::Double => 2000.0,
            TrackDensity::High => 1000.0,
            TrackDensity::Extended => 500.0,
        }
    }

    /// Attempt to determine the disk density from the bitcell period of a PLL.
    pub fn from_base_clock_ns(clock: f64) -> Option<TrackDensity> {
        match clock {
            375.0..625.0 => Some(TrackDensity::Extended),
            750.0..1250.0 => Some(TrackDensity::High),
            1500.0..2500.0 => Some(TrackDensity::Double),
            3000.0..5000.0 => Some(TrackDensity::Standard),
            _ => None,
        }
    }
}

/// The rotation rate of a disk, used to derive the duration of a single revolution.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum DiskRpm {
    #[default]
    Rpm300,
    Rpm360,
    Other(f64),
}

impl From<f64> for DiskRpm {
    fn from(rpm: f64) -> Self {
        match rpm {
            291.0..309.0 => DiskRpm::Rpm300,
            349.0..371.0 => DiskRpm::Rpm360,
            _ => DiskRpm::Other(rpm),
        }
    }
}

impl DiskRpm {
    /// Return the duration of a single revolution in nanoseconds.
    pub fn revolution_ns(&self) -> u64 {
        match self {
            DiskRpm::Rpm300 => 200_000_000,
            DiskRpm::Rpm360 => 166_666_667,
            DiskRpm::Other(rpm) if *rpm > 0.0 => (60.0e9 / rpm) as u64,
            DiskRpm::Other(_) => 200_000_000,
        }
    }
}

impl Display for DiskRpm {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            DiskRpm::Rpm300 => write!(f, "300RPM"),
            DiskRpm::Rpm360 => write!(f, "360RPM"),
            DiskRpm::Other(rpm) => write!(f, "{:.1}RPM", rpm),
        }
    }
}
