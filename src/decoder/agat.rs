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

    src/decoder/agat.rs

    Sector record decoding for the Agat 840K MFM disk format.
*/

//! Decoder for the Agat 840K MFM format.
//!
//! Agat marks begin with 0xA4 written in MFM and then shifted out of phase by a single zero
//! bitcell, so its data bits become clock bits and vice versa:
//! ```text
//!  X - X - - X - -   = 0xA4
//! 0100010010010010   = MFM encoded
//!  1000100100100100  = with trailing zero
//!   - - - X - - X -  = effective bitstream = 0x12
//! ```
//! The header mark continues with 0xFF 0x95 0x6A and the data mark with 0xFF 0x6A 0x95.
//!
//! A header record is four bytes: volume, `track << 1 | side`, sector and a 0x5A magic byte.
//! A data record is a 256-byte payload, an 8-bit end-around-carry checksum and a 0x5A magic
//! byte.

use crate::{
    codec::decode_fm_mfm,
    config::{FormatParams, FormatSelector},
    decoder::{FormatDecoder, MarkTracker},
    flux::{CursorError, FluxCursor, SeekOutcome},
    pattern::{PatternSet, RecordKind},
    sector::{Sector, SectorStatus},
    types::DiskChs,
};

/// Bytes in a header record, including the magic byte.
const HEADER_BYTES: usize = 4;

pub struct AgatDecoder {
    params: FormatParams,
    marks: MarkTracker,
}

impl AgatDecoder {
    pub fn new(params: FormatParams) -> Self {
        let marks = MarkTracker::new(params.patterns.clone());
        AgatDecoder { params, marks }
    }

    pub fn params(&self) -> &FormatParams {
        &self.params
    }
}

impl FormatDecoder for AgatDecoder {
    fn format(&self) -> FormatSelector {
        FormatSelector::Agat
    }

    fn patterns(&self) -> &PatternSet {
        self.marks.patterns()
    }

    fn advance_to_next_record(&mut self, cursor: &mut FluxCursor) -> SeekOutcome {
        self.marks.seek(cursor)
    }

    fn decode_sector_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError> {
        if self.marks.read_mark(cursor, RecordKind::Header)?.is_none() {
            return Ok(());
        }

        let bytes = decode_fm_mfm(&cursor.read_raw_bits(HEADER_BYTES * self.params.encoding.byte_size())?);
        let &[_volume, track_side, sector_id, magic] = bytes.as_slice()
        else {
            return Ok(());
        };
        if magic != self.params.header_magic {
            log::trace!(
                "AgatDecoder::decode_sector_record(): Bad header magic {:02X} at bit {}",
                magic,
                cursor.tell()
            );
            return Ok(());
        }

        sector.logical = DiskChs::new((track_side >> 1) as u16, track_side & 1, sector_id);
        // The location is known; the content is not.
        sector.status = SectorStatus::DataMissing;
        Ok(())
    }

    fn decode_data_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError> {
        if self.marks.read_mark(cursor, RecordKind::Data)?.is_none() {
            return Ok(());
        }

        let size = self.params.payload_size;
        let bytes = decode_fm_mfm(&cursor.read_raw_bits((size + 2) * self.params.encoding.byte_size())?);
        let (Some(&want_checksum), Some(&magic)) = (bytes.get(size), bytes.get(size + 1))
        else {
            return Ok(());
        };
        if magic != self.params.data_magic {
            log::trace!(
                "AgatDecoder::decode_data_record(): Bad data magic {:02X} for {}",
                magic,
                sector.logical
            );
            return Ok(());
        }

        let data = bytes[..size].to_vec();
        let got_checksum = self.params.checksum.compute(&data) as u8;
        sector.status = if want_checksum == got_checksum {
            SectorStatus::Ok
        }
        else {
            log::trace!(
                "AgatDecoder::decode_data_record(): Checksum mismatch for {}: recorded {:02X} calculated {:02X}",
                sector.logical,
                want_checksum,
                got_checksum
            );
            SectorStatus::BadChecksum
        };
        sector.data = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{bits_from_u64, encode_mfm},
        config::{DecoderConfig, AGAT_SECTOR_ID},
        flux::FluxTimeline,
        types::DiskCh,
    };

    fn header_timeline(header: [u8; 4]) -> FluxTimeline {
        let mut bits = encode_mfm(&[0x00; 4], false);
        bits.extend(bits_from_u64(AGAT_SECTOR_ID, 64).iter());
        bits.extend(encode_mfm(&header, false).iter());
        bits.extend(encode_mfm(&[0x00; 4], false).iter());
        FluxTimeline::from_bitcells(bits.iter(), 2000)
    }

    fn decoder() -> AgatDecoder {
        AgatDecoder::new(DecoderConfig::agat().format_params().unwrap())
    }

    #[test]
    fn test_header_decodes() {
        let timeline = header_timeline([0xFE, 17 << 1 | 1, 5, 0x5A]);
        let mut cursor = FluxCursor::with_clock(&timeline, 2000.0);
        let mut decoder = decoder();
        assert!(decoder.advance_to_next_record(&mut cursor).is_found());
        let mut sector = Sector::new(DiskCh::new(17, 1));
        decoder.decode_sector_record(&mut cursor, &mut sector).unwrap();
        assert_eq!(sector.status, SectorStatus::DataMissing);
        assert_eq!(sector.logical, DiskChs::new(17, 1, 5));
    }

    #[test]
    fn test_bad_header_magic_is_noop() {
        let timeline = header_timeline([0xFE, 4, 5, 0x5B]);
        let mut cursor = FluxCursor::with_clock(&timeline, 2000.0);
        let mut decoder = decoder();
        assert!(decoder.advance_to_next_record(&mut cursor).is_found());
        let mut sector = Sector::new(DiskCh::new(2, 0));
        let before = sector.clone();
        decoder.decode_sector_record(&mut cursor, &mut sector).unwrap();
        assert_eq!(sector, before);
    }
}
