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

    src/decoder/ibm.rs

    Sector record decoding for IBM System 34 MFM disk formats.
*/

//! Decoder for IBM System 34 MFM formats, as used by the IBM PC and most other MFM systems.
//!
//! Records are introduced by three 0xA1 sync bytes written with a missing clock bit, followed
//! by an address mark byte: 0xFE for a sector header (IDAM), 0xFB for data (DAM) or 0xF8 for
//! deleted data (DDAM). A header is `C H R N` followed by a CRC; a data record is `128 << N`
//! bytes followed by a CRC. Both CRCs cover the sync bytes and the mark byte.

use crate::{
    checksum::crc_ibm_3740,
    codec::{bits_from_u64, decode_fm_mfm},
    config::{FormatParams, FormatSelector},
    decoder::{FormatDecoder, MarkTracker},
    flux::{CursorError, FluxCursor, SeekOutcome},
    pattern::{PatternSet, RecordKind},
    sector::{Sector, SectorStatus},
    types::DiskChs,
    MAXIMUM_SECTOR_SIZE,
};

/// Bytes in a header record, including the CRC.
const HEADER_BYTES: usize = 6;

/// Convert the size code N of a sector header into a size in bytes.
pub fn sector_size_from_n(n: u8) -> usize {
    (128usize << (n & 0x07)).min(MAXIMUM_SECTOR_SIZE)
}

pub struct IbmDecoder {
    params: FormatParams,
    marks: MarkTracker,
    /// The payload size given by the most recently decoded header.
    pending_size: usize,
}

impl IbmDecoder {
    pub fn new(params: FormatParams) -> Self {
        let marks = MarkTracker::new(params.patterns.clone());
        let pending_size = params.payload_size;
        IbmDecoder {
            params,
            marks,
            pending_size,
        }
    }

    pub fn params(&self) -> &FormatParams {
        &self.params
    }

    /// Demodulate a raw mark value into the bytes covered by the record CRC.
    fn mark_bytes((value, width): (u64, usize)) -> Vec<u8> {
        decode_fm_mfm(&bits_from_u64(value, width))
    }
}

impl FormatDecoder for IbmDecoder {
    fn format(&self) -> FormatSelector {
        FormatSelector::IbmMfm
    }

    fn patterns(&self) -> &PatternSet {
        self.marks.patterns()
    }

    fn advance_to_next_record(&mut self, cursor: &mut FluxCursor) -> SeekOutcome {
        self.marks.seek(cursor)
    }

    fn decode_sector_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError> {
        let Some(mark) = self.marks.read_mark(cursor, RecordKind::Header)?
        else {
            return Ok(());
        };

        let bytes = decode_fm_mfm(&cursor.read_raw_bits(HEADER_BYTES * self.params.encoding.byte_size())?);
        let &[c, h, r, n, crc_hi, crc_lo] = bytes.as_slice()
        else {
            return Ok(());
        };

        let recorded = u16::from_be_bytes([crc_hi, crc_lo]);
        let calculated = crc_ibm_3740(&bytes[..4], Some(crc_ibm_3740(&Self::mark_bytes(mark), None)));
        if recorded != calculated {
            log::trace!(
                "IbmDecoder::decode_sector_record(): Header CRC mismatch at bit {}: recorded {:04X} calculated {:04X}",
                cursor.tell(),
                recorded,
                calculated
            );
            return Ok(());
        }

        self.pending_size = sector_size_from_n(n);
        sector.logical = DiskChs::new(c as u16, h, r);
        sector.status = SectorStatus::DataMissing;
        Ok(())
    }

    fn decode_data_record(&mut self, cursor: &mut FluxCursor, sector: &mut Sector) -> Result<(), CursorError> {
        let Some(mark) = self.marks.read_mark(cursor, RecordKind::Data)?
        else {
            return Ok(());
        };

        let size = self.pending_size;
        let bytes = decode_fm_mfm(&cursor.read_raw_bits((size + 2) * self.params.encoding.byte_size())?);
        if bytes.len() < size + 2 {
            return Ok(());
        }

        let recorded = u16::from_be_bytes([bytes[size], bytes[size + 1]]);
        let calculated = crc_ibm_3740(
            &bytes[..size],
            Some(crc_ibm_3740(&Self::mark_bytes(mark), None)),
        );

        sector.status = if recorded == calculated {
            SectorStatus::Ok
        }
        else {
            log::trace!(
                "IbmDecoder::decode_data_record(): Data CRC mismatch for {}: recorded {:04X} calculated {:04X}",
                sector.logical,
                recorded,
                calculated
            );
            SectorStatus::BadChecksum
        };
        sector.data = bytes[..size].to_vec();
        Ok(())
    }
}
