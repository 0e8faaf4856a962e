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

    tests/common/mod.rs

    Common support routines for tests
*/
#![allow(dead_code)]

use bit_vec::BitVec;
use fluxdec::{
    checksum::{agat_checksum, crc_ibm_3740},
    codec::{bits_from_u64, encode_mfm},
    config::{AGAT_DATA_ID, AGAT_MAGIC, AGAT_SECTOR_ID, IBM_DAM, IBM_DDAM, IBM_IDAM},
    flux::FluxTimeline,
    source::{FluxRevolutions, FluxSource, FluxSourceError},
    DiskCh,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// The nominal bitcell period of a double density MFM disk.
pub const CELL_NS: u32 = 2000;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Builds an MFM bitstream record by record and converts it to flux.
#[derive(Default)]
pub struct TrackBuilder {
    bits: BitVec,
}

impl TrackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn last_bit(&self) -> bool {
        !self.bits.is_empty() && self.bits[self.bits.len() - 1]
    }

    /// Append MFM-encoded bytes.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        let encoded = encode_mfm(data, self.last_bit());
        self.bits.extend(encoded.iter());
        self
    }

    pub fn fill(self, byte: u8, count: usize) -> Self {
        self.bytes(&vec![byte; count])
    }

    /// Append a raw bit pattern, such as a sync mark, without encoding.
    pub fn raw(mut self, value: u64, width: usize) -> Self {
        self.bits.extend(bits_from_u64(value, width).iter());
        self
    }

    pub fn agat_header(self, volume: u8, track: u8, side: u8, sector: u8) -> Self {
        self.agat_header_with_magic(volume, track, side, sector, AGAT_MAGIC)
    }

    pub fn agat_header_with_magic(self, volume: u8, track: u8, side: u8, sector: u8, magic: u8) -> Self {
        self.fill(0xFF, 8)
            .raw(AGAT_SECTOR_ID, 64)
            .bytes(&[volume, track << 1 | side, sector, magic])
            .fill(0xFF, 4)
    }

    pub fn agat_data(self, payload: &[u8]) -> Self {
        let checksum = agat_checksum(payload);
        self.agat_data_with_checksum(payload, checksum)
    }

    pub fn agat_data_with_checksum(self, payload: &[u8], checksum: u8) -> Self {
        self.fill(0xFF, 4)
            .raw(AGAT_DATA_ID, 64)
            .bytes(payload)
            .bytes(&[checksum, AGAT_MAGIC])
            .fill(0xFF, 8)
    }

    /// Append a complete Agat sector.
    pub fn agat_sector(self, track: u8, side: u8, sector: u8, payload: &[u8]) -> Self {
        self.agat_header(0xFE, track, side, sector).agat_data(payload)
    }

    pub fn ibm_header(self, c: u8, h: u8, r: u8, n: u8) -> Self {
        let crc = crc_ibm_3740(&[0xA1, 0xA1, 0xA1, 0xFE, c, h, r, n], None);
        self.ibm_header_with_crc(c, h, r, n, crc)
    }

    pub fn ibm_header_with_crc(self, c: u8, h: u8, r: u8, n: u8, crc: u16) -> Self {
        let [crc_hi, crc_lo] = crc.to_be_bytes();
        self.fill(0x00, 12)
            .raw(IBM_IDAM, 64)
            .bytes(&[c, h, r, n, crc_hi, crc_lo])
            .fill(0x4E, 22)
    }

    pub fn ibm_data(self, payload: &[u8], deleted: bool) -> Self {
        let mark_byte = if deleted { 0xF8 } else { 0xFB };
        let mut crc = crc_ibm_3740(&[0xA1, 0xA1, 0xA1, mark_byte], None);
        crc = crc_ibm_3740(payload, Some(crc));
        self.ibm_data_with_crc(payload, deleted, crc)
    }

    pub fn ibm_data_with_crc(self, payload: &[u8], deleted: bool, crc: u16) -> Self {
        self.fill(0x00, 12)
            .raw(if deleted { IBM_DDAM } else { IBM_DAM }, 64)
            .bytes(payload)
            .bytes(&crc.to_be_bytes())
            .fill(0x4E, 40)
    }

    pub fn bits(&self) -> &BitVec {
        &self.bits
    }

    /// Convert the bitstream to flux at the nominal bitcell period.
    pub fn build(self) -> FluxTimeline {
        self.build_with_cell(CELL_NS)
    }

    pub fn build_with_cell(self, cell_ns: u32) -> FluxTimeline {
        FluxTimeline::from_bitcells(self.fill(0x4E, 4).bits.iter(), cell_ns)
    }

    /// Convert the bitstream to flux, displacing each interval by up to `jitter_ns`.
    pub fn build_with_jitter(self, seed: u64, jitter_ns: i64) -> FluxTimeline {
        let clean = self.build();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut timeline = FluxTimeline::new();
        for interval in clean.iter() {
            let offset = rng.gen_range(-jitter_ns..=jitter_ns);
            timeline.append((interval as i64 + offset) as u32).unwrap();
        }
        timeline
    }
}

/// A sector payload with a recognizable pattern.
pub fn test_payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(7).wrapping_add(seed)).collect()
}

/// Build one revolution of a complete Agat track.
pub fn agat_track(track: u8, side: u8) -> FluxTimeline {
    let mut builder = TrackBuilder::new().fill(0xFF, 32);
    for sector in 0..21 {
        builder = builder.agat_sector(track, side, sector, &test_payload(sector ^ track, 256));
    }
    builder.build()
}

/// Build one revolution of a complete IBM track of nine 512-byte sectors.
pub fn ibm_track(c: u8, h: u8) -> FluxTimeline {
    let mut builder = TrackBuilder::new().fill(0x4E, 80);
    for r in 1..=9 {
        builder = builder.ibm_header(c, h, r, 2).ibm_data(&test_payload(r, 512), false);
    }
    builder.build()
}

/// A source that provides flux for some tracks and fails on others.
pub struct FailingFluxSource {
    pub good: Vec<(DiskCh, FluxTimeline)>,
    pub failing: DiskCh,
}

impl FluxSource for FailingFluxSource {
    fn locations(&self) -> Vec<DiskCh> {
        let mut locations: Vec<DiskCh> = self.good.iter().map(|(ch, _)| *ch).collect();
        locations.push(self.failing);
        locations
    }

    fn read_flux(&mut self, ch: DiskCh) -> Result<FluxRevolutions<'_>, FluxSourceError> {
        if ch == self.failing {
            return Err(FluxSourceError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "drive not responding",
            )));
        }
        let index = self
            .good
            .iter()
            .position(|(c, _)| *c == ch)
            .ok_or(FluxSourceError::Unavailable(ch))?;
        let (_, timeline) = self.good.remove(index);
        Ok(Box::new(std::iter::once(Ok::<_, FluxSourceError>(timeline))))
    }
}
