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

//! # fluxdec
//!
//! fluxdec reconstructs sector data from raw magnetic flux timing captured from floppy disks.
//!
//! The crate is organized leaves first:
//! * [flux] holds the [FluxTimeline] of captured flux reversal intervals and the [FluxCursor]
//!   that recovers a bitcell clock and searches the resulting bitstream for sync marks.
//! * [pattern] describes sync marks as fixed-width bit patterns.
//! * [codec] and [checksum] provide FM/MFM demodulation and per-format checksums.
//! * [decoder] defines the [FormatDecoder] contract, the Agat and IBM System 34 decoders, and
//!   the per-track decode driver.
//! * [sector] and [image] hold the decoded output.
//! * [source] and [pipeline] connect flux acquisition to decoding for a whole disk.
//!
//! All configuration is explicit; see [DecoderConfig].

pub mod checksum;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod flux;
pub mod image;
pub mod pattern;
pub mod pipeline;
pub mod sector;
pub mod source;
pub mod types;

use thiserror::Error;

pub const MAXIMUM_SECTOR_SIZE: usize = 8192;
pub const DEFAULT_SECTOR_SIZE: usize = 512;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid decoder configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to acquire flux for {ch}: {source}")]
    FluxSource { ch: DiskCh, source: FluxSourceError },
    #[error("A decode worker thread panicked")]
    WorkerPanic,
}

pub use crate::{
    checksum::ChecksumKind,
    config::{load_decoder_config, ConfigError, DecoderConfig, FluxSourceConfig, FormatSelector},
    decoder::{create_decoder, decode_timeline, decode_track, FormatDecoder, TrackDecodeResult, TrackDecoder},
    flux::{CursorError, FluxCursor, FluxTimeline, Pll, SeekOutcome},
    image::{layout::LayoutError, Geometry, Image, SectorRef},
    pattern::{FluxPattern, PatternSet, RecordKind, SyncMark},
    pipeline::{decode_disk, CancelToken, DecodeOptions, DecodeReport},
    sector::{Sector, SectorStatus, TimeSpan},
    source::{create_flux_source, FluxSource, FluxSourceError, MemoryFluxSource},
    types::{DiskCh, DiskChs, TrackDataEncoding, TrackDensity},
};
