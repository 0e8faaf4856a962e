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

//! Static dispatch of [FormatDecoder] for [TrackDecoder].

use crate::{
    config::FormatSelector,
    decoder::{FormatDecoder, TrackDecoder},
    flux::{CursorError, FluxCursor, SeekOutcome},
    pattern::PatternSet,
    sector::Sector,
};

impl FormatDecoder for TrackDecoder {
    fn format(&self) -> FormatSelector {
        match self {
            TrackDecoder::Agat(d) => d.format(),
            TrackDecoder::IbmMfm(d) => d.format(),
        }
    }

    fn patterns(&self) -> &PatternSet {
        match self {
            TrackDecoder::Agat(d) => d.patterns(),
            TrackDecoder::IbmMfm(d) => d.patterns(),
        }
    }

    fn advance_to_next_record(&mut self, cursor: &mut FluxCursor) -> SeekOutcome {
        match self {
            TrackDecoder::Agat(d) => d.advance_to_next_record(cursor),
            TrackDecoder::IbmMfm(d) => d.advance_to_next_record(cursor),
        }
    }

    fn decode_sector_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError> {
        match self {
            TrackDecoder::Agat(d) => d.decode_sector_record(cursor, sector),
            TrackDecoder::IbmMfm(d) => d.decode_sector_record(cursor, sector),
        }
    }

    fn decode_data_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError> {
        match self {
            TrackDecoder::Agat(d) => d.decode_data_record(cursor, sector),
            TrackDecoder::IbmMfm(d) => d.decode_data_record(cursor, sector),
        }
    }
}
