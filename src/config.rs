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

//! Decoder and flux source configuration.
//!
//! A [DecoderConfig] carries everything a format decoder needs: the format selector, its sync
//! marks, magic bytes, payload size, checksum and clock hints. It is built once, validated
//! before any flux is acquired, and handed explicitly to each decoder instance.
//!
//! Configuration may be loaded from TOML:
//! ```toml
//! format = "agat"
//! density = "double"
//! max_clock_adjust = 0.10
//! revolutions = 3
//! sectors_per_track = 21
//!
//! [[marks]]
//! kind = "header"
//! value = "0x8924555549111444"
//! width = 64
//! ```
//! Mark values are hex strings, as TOML integers are signed.

use crate::{
    checksum::ChecksumKind,
    flux::pll::{DEFAULT_MAX_ADJUST, DEFAULT_WINDOW},
    pattern::{FluxPattern, PatternSet, RecordKind, SyncMark},
    types::{DiskRpm, TrackDataEncoding, TrackDensity},
};
use serde::{Deserialize, Serialize};
use std::{fs, ops::RangeInclusive, path::Path, str::FromStr};
use strum::{Display, EnumString};
use thiserror::Error;

/// Agat sector header mark: 0xA4 shifted out of phase, then 0xFF 0x95 0x6A.
pub const AGAT_SECTOR_ID: u64 = 0x8924_5555_4911_1444;
/// Agat data mark: 0xA4 shifted out of phase, then 0xFF 0x6A 0x95.
pub const AGAT_DATA_ID: u64 = 0x8924_5555_1444_4911;
/// Trailing magic byte of Agat header and data records.
pub const AGAT_MAGIC: u8 = 0x5A;
pub const AGAT_SECTOR_SIZE: usize = 256;
pub const AGAT_SECTORS_PER_TRACK: usize = 21;

/// IBM System 34 ID address mark: three A1 sync bytes with a missing clock bit, then 0xFE.
pub const IBM_IDAM: u64 = 0x4489_4489_4489_5554;
/// IBM System 34 data address mark (0xFB).
pub const IBM_DAM: u64 = 0x4489_4489_4489_5545;
/// IBM System 34 deleted data address mark (0xF8).
pub const IBM_DDAM: u64 = 0x4489_4489_4489_554A;

/// The range of rotation rates accepted from configuration.
pub const RPM_RANGE: RangeInclusive<f64> = 30.0..=3600.0;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported format selector: '{0}'")]
    UnsupportedFormat(String),
    #[error("Unknown checksum algorithm: '{0}'")]
    UnknownChecksum(String),
    #[error("Checksum {checksum} cannot be used with format {format}")]
    IncompatibleChecksum {
        format: FormatSelector,
        checksum: ChecksumKind,
    },
    #[error("Invalid sync pattern: {0}")]
    InvalidPattern(String),
    #[error("No {0} sync mark was configured")]
    MissingMark(RecordKind),
    #[error("Invalid payload size: {0}")]
    InvalidPayloadSize(usize),
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Unknown flux source type: '{0}'")]
    UnknownSourceType(String),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("An IO error occurred reading the configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Selects the concrete decoder to instantiate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum FormatSelector {
    /// Agat 840K MFM.
    Agat,
    /// IBM System 34 MFM.
    IbmMfm,
}

impl FormatSelector {
    fn default_checksum(&self) -> ChecksumKind {
        match self {
            FormatSelector::Agat => ChecksumKind::AgatSum8,
            FormatSelector::IbmMfm => ChecksumKind::CrcIbm3740,
        }
    }

    fn default_marks(&self) -> PatternSet {
        match self {
            FormatSelector::Agat => PatternSet::new()
                .with_mark(SyncMark::new("agat_sector", RecordKind::Header, FluxPattern::full(AGAT_SECTOR_ID)))
                .with_mark(SyncMark::new("agat_data", RecordKind::Data, FluxPattern::full(AGAT_DATA_ID))),
            FormatSelector::IbmMfm => PatternSet::new()
                .with_mark(SyncMark::new("idam", RecordKind::Header, FluxPattern::full(IBM_IDAM)))
                .with_mark(SyncMark::new("dam", RecordKind::Data, FluxPattern::full(IBM_DAM)))
                .with_mark(SyncMark::new("ddam", RecordKind::Data, FluxPattern::full(IBM_DDAM))),
        }
    }
}

/// A sync mark as written in a configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkConfig {
    pub kind: RecordKind,
    #[serde(default)]
    pub name: Option<String>,
    /// The effective on-medium bit pattern as a hex string, e.g. "0x4489".
    pub value: String,
    pub width: usize,
}

impl MarkConfig {
    pub fn new(kind: RecordKind, value: u64, width: usize) -> Self {
        MarkConfig {
            kind,
            name: None,
            value: format!("{:#X}", value),
            width,
        }
    }

    fn to_sync_mark(&self, index: usize) -> Result<SyncMark, ConfigError> {
        let digits = self.value.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits)
            .replace('_', "");
        let value = u64::from_str_radix(&digits, 16)
            .map_err(|_| ConfigError::InvalidPattern(format!("'{}' is not a hex value", self.value)))?;
        let pattern = FluxPattern::new(self.width, value)?;
        let name = self.name.clone().unwrap_or_else(|| format!("{}_{}", self.kind, index));
        Ok(SyncMark::new(name, self.kind, pattern))
    }
}

/// Validated, format-specific decoding parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct FormatParams {
    pub format: FormatSelector,
    pub encoding: TrackDataEncoding,
    pub patterns: PatternSet,
    pub header_magic: u8,
    pub data_magic: u8,
    /// Payload size in bytes. Formats that record the size in the sector header ignore this.
    pub payload_size: usize,
    pub checksum: ChecksumKind,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub format: String,
    pub encoding: TrackDataEncoding,
    /// Sync marks. An empty list selects the marks of the chosen format.
    pub marks: Vec<MarkConfig>,
    pub header_magic: Option<u8>,
    pub data_magic: Option<u8>,
    pub payload_size: Option<usize>,
    pub checksum: Option<String>,
    /// Explicit nominal bitcell period in nanoseconds.
    pub clock_ns: Option<f64>,
    pub density: Option<TrackDensity>,
    /// Estimate the nominal bitcell period from a histogram of each timeline.
    pub auto_clock: bool,
    pub max_clock_adjust: f64,
    pub clock_window: usize,
    pub rpm: Option<f64>,
    /// Maximum number of revolutions to decode per track.
    pub revolutions: usize,
    /// Stop reading revolutions of a track once this many sectors are good.
    pub sectors_per_track: Option<usize>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            format: FormatSelector::IbmMfm.to_string(),
            encoding: TrackDataEncoding::Mfm,
            marks: Vec::new(),
            header_magic: None,
            data_magic: None,
            payload_size: None,
            checksum: None,
            clock_ns: None,
            density: None,
            auto_clock: false,
            max_clock_adjust: DEFAULT_MAX_ADJUST,
            clock_window: DEFAULT_WINDOW,
            rpm: None,
            revolutions: 1,
            sectors_per_track: None,
        }
    }
}

impl DecoderConfig {
    /// A complete configuration for Agat 840K disks.
    pub fn agat() -> Self {
        DecoderConfig {
            format: FormatSelector::Agat.to_string(),
            marks: vec![
                MarkConfig::new(RecordKind::Header, AGAT_SECTOR_ID, 64),
                MarkConfig::new(RecordKind::Data, AGAT_DATA_ID, 64),
            ],
            header_magic: Some(AGAT_MAGIC),
            data_magic: Some(AGAT_MAGIC),
            payload_size: Some(AGAT_SECTOR_SIZE),
            checksum: Some(ChecksumKind::AgatSum8.to_string()),
            density: Some(TrackDensity::Double),
            sectors_per_track: Some(AGAT_SECTORS_PER_TRACK),
            ..DecoderConfig::default()
        }
    }

    /// A complete configuration for IBM System 34 MFM disks.
    pub fn ibm_mfm() -> Self {
        DecoderConfig {
            format: FormatSelector::IbmMfm.to_string(),
            marks: vec![
                MarkConfig::new(RecordKind::Header, IBM_IDAM, 64),
                MarkConfig::new(RecordKind::Data, IBM_DAM, 64),
                MarkConfig::new(RecordKind::Data, IBM_DDAM, 64),
            ],
            checksum: Some(ChecksumKind::CrcIbm3740.to_string()),
            density: Some(TrackDensity::Double),
            ..DecoderConfig::default()
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: DecoderConfig = toml::from_str(s)?;
        Ok(config)
    }

    /// Parse the format selector.
    pub fn format(&self) -> Result<FormatSelector, ConfigError> {
        FormatSelector::from_str(self.format.trim()).map_err(|_| ConfigError::UnsupportedFormat(self.format.clone()))
    }

    /// Validate the configuration and resolve it into [FormatParams].
    pub fn format_params(&self) -> Result<FormatParams, ConfigError> {
        let format = self.format()?;

        let checksum = match &self.checksum {
            Some(name) => {
                ChecksumKind::from_str(name.trim()).map_err(|_| ConfigError::UnknownChecksum(name.clone()))?
            }
            None => format.default_checksum(),
        };
        if checksum != format.default_checksum() {
            return Err(ConfigError::IncompatibleChecksum { format, checksum });
        }

        let patterns = self.resolve_patterns(format)?;

        let payload_size = match (format, self.payload_size) {
            (_, Some(size)) if size == 0 || size > crate::MAXIMUM_SECTOR_SIZE => {
                return Err(ConfigError::InvalidPayloadSize(size));
            }
            (_, Some(size)) => size,
            (FormatSelector::Agat, None) => AGAT_SECTOR_SIZE,
            (FormatSelector::IbmMfm, None) => crate::DEFAULT_SECTOR_SIZE,
        };

        self.validate_clock()?;

        Ok(FormatParams {
            format,
            encoding: self.encoding,
            patterns,
            header_magic: self.header_magic.unwrap_or(AGAT_MAGIC),
            data_magic: self.data_magic.unwrap_or(AGAT_MAGIC),
            payload_size,
            checksum,
        })
    }

    /// Validate every option without building a decoder.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.format_params().map(|_| ())
    }

    /// Build the [PatternSet] for the configured marks, falling back to the format's own marks.
    pub fn resolve_patterns(&self, format: FormatSelector) -> Result<PatternSet, ConfigError> {
        let patterns = if self.marks.is_empty() {
            format.default_marks()
        }
        else {
            let mut set = PatternSet::new();
            for (i, mark) in self.marks.iter().enumerate() {
                set.push(mark.to_sync_mark(i)?);
            }
            set
        };

        for kind in [RecordKind::Header, RecordKind::Data] {
            if !patterns.contains_kind(kind) {
                return Err(ConfigError::MissingMark(kind));
            }
        }
        Ok(patterns)
    }

    fn validate_clock(&self) -> Result<(), ConfigError> {
        if let Some(clock) = self.clock_ns {
            if !(clock > 0.0) {
                return Err(ConfigError::InvalidParameter(format!("clock_ns must be positive, got {}", clock)));
            }
        }
        if !(0.0..1.0).contains(&self.max_clock_adjust) {
            return Err(ConfigError::InvalidParameter(format!(
                "max_clock_adjust must be in 0.0..1.0, got {}",
                self.max_clock_adjust
            )));
        }
        if self.clock_window == 0 {
            return Err(ConfigError::InvalidParameter("clock_window must be at least 1".to_string()));
        }
        if self.revolutions == 0 {
            return Err(ConfigError::InvalidParameter("revolutions must be at least 1".to_string()));
        }
        if let Some(rpm) = self.rpm {
            if !RPM_RANGE.contains(&rpm) {
                return Err(ConfigError::InvalidParameter(format!(
                    "rpm must be in {:?}, got {}",
                    RPM_RANGE, rpm
                )));
            }
        }
        Ok(())
    }

    /// Return the nominal bitcell period implied by the configuration, ignoring `auto_clock`.
    pub fn nominal_clock_ns(&self) -> f64 {
        match (self.clock_ns, self.density) {
            (Some(clock), _) => clock,
            (None, Some(density)) => density.base_clock_ns(),
            (None, None) => TrackDensity::default().base_clock_ns(),
        }
    }

    /// Return the duration of one revolution, if a rotation rate was configured.
    pub fn revolution_ns(&self) -> Option<u64> {
        self.rpm.map(|rpm| DiskRpm::from(rpm).revolution_ns())
    }
}

/// Load a [DecoderConfig] from a TOML file.
pub fn load_decoder_config(path: impl AsRef<Path>) -> Result<DecoderConfig, ConfigError> {
    let config_str = fs::read_to_string(path)?;
    let config = DecoderConfig::from_toml_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

/// Selects and parameterizes a built-in flux source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluxSourceConfig {
    /// Source type: `erase` or `test_pattern`.
    #[serde(rename = "type")]
    pub kind: String,
    pub tracks: u16,
    pub heads: u8,
    pub revolutions: usize,
    /// Repeating flux interval pattern for `test_pattern`, in nanoseconds.
    pub intervals: Vec<u32>,
    /// Maximum jitter applied to each interval for `test_pattern`, in nanoseconds.
    pub jitter_ns: u32,
    pub seed: u64,
    pub rpm: f64,
}

impl Default for FluxSourceConfig {
    fn default() -> Self {
        FluxSourceConfig {
            kind: "erase".to_string(),
            tracks: 80,
            heads: 2,
            revolutions: 1,
            intervals: vec![4000, 6000, 8000],
            jitter_ns: 0,
            seed: 0,
            rpm: 300.0,
        }
    }
}

impl FluxSourceConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: FluxSourceConfig = toml::from_str(s)?;
        Ok(config)
    }
}
