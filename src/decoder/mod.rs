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

//! The decoder framework.
//!
//! A [FormatDecoder] knows the record layout of one family of disk formats: its sync marks,
//! how to demodulate and validate a sector header, and how to demodulate and validate a sector
//! payload. It never sees a [FluxTimeline] directly; it works through a [FluxCursor].
//!
//! [decode_track] drives a decoder over one timeline, producing [Sector]s. Validation failures
//! inside a record are never errors: the record is skipped and scanning resumes. Running out of
//! flux ends the pass.

pub mod agat;
mod dispatch;
pub mod ibm;

pub use agat::AgatDecoder;
pub use ibm::IbmDecoder;

use crate::{
    config::{ConfigError, DecoderConfig, FormatSelector},
    flux::{CursorError, FluxCursor, FluxHistogram, FluxTimeline, Pll, PllPreset, SeekOutcome},
    format_ms,
    format_us,
    pattern::{PatternSet, RecordKind},
    pipeline::CancelToken,
    sector::{Sector, SectorStatus, TimeSpan},
    types::DiskCh,
};

/// The fraction of a timeline sampled when estimating its clock.
const HISTOGRAM_FRACTION: f64 = 0.25;

/// The per-format record decoding contract.
pub trait FormatDecoder: Send {
    /// Return the format this decoder implements.
    fn format(&self) -> FormatSelector;

    /// Return every sync mark this decoder recognizes.
    fn patterns(&self) -> &PatternSet;

    /// Scan forward to the next sync mark of any kind. The cursor is left at the start of the
    /// mark.
    fn advance_to_next_record(&mut self, cursor: &mut FluxCursor) -> SeekOutcome;

    /// Decode a sector header. The cursor is expected at the start of the mark just matched.
    /// On success the sector's logical address is set and its status becomes
    /// [SectorStatus::DataMissing]. If the record is not a valid header the sector is untouched.
    fn decode_sector_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError>;

    /// Decode a sector payload. The cursor is expected at the start of the mark just matched.
    /// On success the payload is stored and the status becomes [SectorStatus::Ok] or
    /// [SectorStatus::BadChecksum]. If the record is not a valid data record the sector is
    /// untouched.
    fn decode_data_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError>;
}

/// A decoder for any supported format, selected at runtime.
pub enum TrackDecoder {
    Agat(AgatDecoder),
    IbmMfm(IbmDecoder),
}

/// Construct the decoder selected by `config`. Configuration problems are fatal and are
/// reported before any flux is read.
pub fn create_decoder(config: &DecoderConfig) -> Result<TrackDecoder, ConfigError> {
    let params = config.format_params()?;
    log::debug!(
        "create_decoder(): Creating {} decoder with {} sync marks",
        params.format,
        params.patterns.len()
    );
    Ok(match params.format {
        FormatSelector::Agat => TrackDecoder::Agat(AgatDecoder::new(params)),
        FormatSelector::IbmMfm => TrackDecoder::IbmMfm(IbmDecoder::new(params)),
    })
}

/// Sync mark bookkeeping shared by the format decoders. Remembers which mark was last matched so
/// that a record decoder can re-read it at the right width.
#[derive(Clone, Debug)]
pub struct MarkTracker {
    patterns: PatternSet,
    last_match: Option<usize>,
}

impl MarkTracker {
    pub fn new(patterns: PatternSet) -> Self {
        MarkTracker {
            patterns,
            last_match: None,
        }
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn seek(&mut self, cursor: &mut FluxCursor) -> SeekOutcome {
        let outcome = cursor.seek_to_next_match(&self.patterns);
        self.last_match = match &outcome {
            SeekOutcome::Found(m) => Some(m.mark_index),
            SeekOutcome::NotFound { .. } => None,
        };
        outcome
    }

    /// Read the mark at the cursor, advancing past it. Returns the raw mark value and its width
    /// if it is a mark of the requested kind.
    pub fn read_mark(&mut self, cursor: &mut FluxCursor, kind: RecordKind) -> Result<Option<(u64, usize)>, CursorError> {
        let width = self
            .last_match
            .take()
            .and_then(|i| self.patterns.get(i))
            .map(|m| m.pattern.len)
            .unwrap_or_else(|| self.patterns.of_kind(kind).max_width());

        let value = cursor.read_raw_u64(width)?;
        let found = self
            .patterns
            .iter()
            .any(|m| m.kind == kind && m.pattern.len == width && m.pattern.matches_value(value));
        Ok(found.then_some((value, width)))
    }
}

/// The result of decoding one timeline.
#[derive(Clone, Debug, Default)]
pub struct TrackDecodeResult {
    pub ch: DiskCh,
    /// Every sector header found, in timeline order. A sector may appear more than once if the
    /// timeline spans more than one revolution.
    pub sectors: Vec<Sector>,
    /// The pass ended because the timeline ran out during a record read.
    pub exhausted: bool,
    pub cancelled: bool,
    /// The recovered bitcell period at the end of the pass.
    pub clock_ns: f64,
}

impl TrackDecodeResult {
    pub fn count_status(&self, status: SectorStatus) -> usize {
        self.sectors.iter().filter(|s| s.status == status).count()
    }
}

/// Build the [Pll] used to decode `timeline`. An explicit clock wins; otherwise, if requested,
/// the clock is estimated from a histogram of the timeline; otherwise the density or default
/// clock is used.
pub fn build_pll(config: &DecoderConfig, timeline: &FluxTimeline) -> Pll {
    let mut clock_ns = config.nominal_clock_ns();

    if config.clock_ns.is_none() && config.auto_clock {
        let estimate = FluxHistogram::new(timeline, HISTOGRAM_FRACTION)
            .and_then(|mut histogram| histogram.estimate_clock_ns(config.encoding));
        match estimate {
            Some(estimate) => clock_ns = estimate,
            None => log::warn!(
                "build_pll(): Could not estimate clock from histogram, using {}",
                format_us!(clock_ns)
            ),
        }
    }

    let mut pll = Pll::from_preset(PllPreset::Conservative);
    pll.set_window(config.clock_window);
    pll.set_clock(clock_ns, Some(config.max_clock_adjust));
    pll
}

/// Decode a single timeline with a freshly constructed decoder. The clock and revolution
/// length are resolved from `config` and the timeline.
pub fn decode_timeline(
    config: &DecoderConfig,
    timeline: &FluxTimeline,
    physical: DiskCh,
) -> Result<TrackDecodeResult, ConfigError> {
    let mut decoder = create_decoder(config)?;
    let pll = build_pll(config, timeline);
    let revolution_ns = config.revolution_ns().or(timeline.revolution_ns());
    Ok(decode_track(
        &mut decoder,
        timeline,
        physical,
        pll,
        &CancelToken::new(),
        revolution_ns,
    ))
}

/// Decode every record in `timeline`, which was captured from physical track `physical`.
///
/// The pass ends when the timeline is exhausted, when `cancel` is set, or when more than
/// `revolution_ns` elapses between records.
pub fn decode_track<D: FormatDecoder + ?Sized>(
    decoder: &mut D,
    timeline: &FluxTimeline,
    physical: DiskCh,
    pll: Pll,
    cancel: &CancelToken,
    revolution_ns: Option<u64>,
) -> TrackDecodeResult {
    let mut cursor = FluxCursor::new(timeline, pll);
    let mut result = TrackDecodeResult {
        ch: physical,
        ..TrackDecodeResult::default()
    };
    let gap_exceeded = |elapsed: u64| revolution_ns.is_some_and(|rev| elapsed > rev);

    loop {
        if cancel.is_cancelled() {
            result.cancelled = true;
            break;
        }

        let header_match = match decoder.advance_to_next_record(&mut cursor) {
            SeekOutcome::Found(m) => m,
            SeekOutcome::NotFound { elapsed_ns } => {
                log::trace!("decode_track(): No further records after {}", format_ms!(elapsed_ns));
                break;
            }
        };
        if gap_exceeded(header_match.elapsed_ns) {
            log::debug!(
                "decode_track(): {} elapsed without a record, ending pass",
                format_ms!(header_match.elapsed_ns)
            );
            break;
        }

        let mut sector = Sector::new(physical);
        if decoder.decode_sector_record(&mut cursor, &mut sector).is_err() {
            result.exhausted = true;
            break;
        }
        if sector.status != SectorStatus::DataMissing {
            // Not a valid header; keep scanning.
            continue;
        }
        sector.clock_ns = Some(header_match.clock_ns);
        sector.header_span = Some(TimeSpan::new(header_match.time_ns, cursor.position_ns()));

        match decoder.advance_to_next_record(&mut cursor) {
            SeekOutcome::Found(data_match) if data_match.kind == RecordKind::Data => {
                if gap_exceeded(data_match.elapsed_ns) {
                    result.sectors.push(sector);
                    break;
                }
                let mark_len = decoder
                    .patterns()
                    .get(data_match.mark_index)
                    .map(|m| m.pattern.len)
                    .unwrap_or(0);
                if decoder.decode_data_record(&mut cursor, &mut sector).is_err() {
                    result.sectors.push(sector);
                    result.exhausted = true;
                    break;
                }
                if sector.status.has_data() {
                    sector.data_span = Some(TimeSpan::new(data_match.time_ns, cursor.position_ns()));
                    sector.data_bit_offset = Some(data_match.bit_index + mark_len);
                }
            }
            // Another header: this sector has no data. The header is picked up next iteration.
            SeekOutcome::Found(_) => {}
            SeekOutcome::NotFound { .. } => {
                result.sectors.push(sector);
                break;
            }
        }

        log::trace!("decode_track(): {}", sector);
        result.sectors.push(sector);
    }

    result.clock_ns = cursor.clock_ns();
    log::debug!(
        "decode_track(): {} found {} headers, {} ok, {} bad checksum, {} no data{}{}",
        physical,
        result.sectors.len(),
        result.count_status(SectorStatus::Ok),
        result.count_status(SectorStatus::BadChecksum),
        result.count_status(SectorStatus::DataMissing),
        if result.exhausted { ", exhausted" } else { "" },
        if result.cancelled { ", cancelled" } else { "" },
    );
    result
}
