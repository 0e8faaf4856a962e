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

//! FM/MFM modulation primitives.
//!
//! Raw bitstreams are stored as [BitVec]s in medium order. In a correctly phased stream, bits
//! at even indices are clock bits and bits at odd indices are data bits.

use bit_vec::BitVec;

/// Demodulate an interleaved clock/data bitstream into bytes.
///
/// The clock bit of each pair is discarded unconditionally and the data bits are packed MSB
/// first. A trailing partial byte is left-aligned and padded with zero bits. A dangling clock
/// bit with no data bit is ignored.
pub fn decode_fm_mfm(bits: &BitVec) -> Vec<u8> {
    let data_bits = bits.len() / 2;
    let mut out = Vec::with_capacity(data_bits.div_ceil(8));

    let mut byte = 0u8;
    let mut filled = 0;
    for di in 0..data_bits {
        byte = (byte << 1) | bits[di * 2 + 1] as u8;
        filled += 1;
        if filled == 8 {
            out.push(byte);
            byte = 0;
            filled = 0;
        }
    }
    if filled > 0 {
        out.push(byte << (8 - filled));
    }
    out
}

/// MFM-encode a slice of bytes. `prev_bit` is the last data bit written before `data`, which
/// determines the first clock bit.
pub fn encode_mfm(data: &[u8], prev_bit: bool) -> BitVec {
    let mut bitvec = BitVec::with_capacity(data.len() * 16);
    let mut previous_bit = prev_bit;

    for &byte in data {
        for i in 0..8 {
            let bit = (byte & (0x80 >> i)) != 0;
            if bit {
                // 1 is encoded as 01
                bitvec.push(false);
                bitvec.push(true);
            }
            else {
                // 0 is encoded as 10 if previous bit was 0, otherwise 00
                bitvec.push(!previous_bit);
                bitvec.push(false);
            }
            previous_bit = bit;
        }
    }
    bitvec
}

/// FM-encode a slice of bytes. Every clock bit is set.
pub fn encode_fm(data: &[u8]) -> BitVec {
    let mut bitvec = BitVec::with_capacity(data.len() * 16);
    for &byte in data {
        for i in 0..8 {
            bitvec.push(true);
            bitvec.push((byte & (0x80 >> i)) != 0);
        }
    }
    bitvec
}

/// MFM-encode four bytes into a 64-bit marker value. A mark is always preceded by a sync block
/// of zeros, so the previous data bit is taken to be 0. Missing clock bits of special address
/// marks are not produced here; use the raw marker value for those.
pub fn encode_marker(data: &[u8; 4]) -> u64 {
    let mut accum: u64 = 0;
    let mut previous_bit = false;

    for &byte in data {
        for i in (0..8).rev() {
            let bit = (byte & (1 << i)) != 0;
            if bit {
                accum = (accum << 2) | 0b01;
            }
            else if !previous_bit {
                accum = (accum << 2) | 0b10;
            }
            else {
                accum <<= 2;
            }
            previous_bit = bit;
        }
    }
    accum
}

/// Expand the low `width` bits of `value` into a [BitVec], most significant bit first.
pub fn bits_from_u64(value: u64, width: usize) -> BitVec {
    let width = width.min(64);
    let mut bitvec = BitVec::with_capacity(width);
    for i in (0..width).rev() {
        bitvec.push(value & (1u64 << i) != 0);
    }
    bitvec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_a4() {
        let encoded = encode_mfm(&[0xA4], false);
        let mut value = 0u16;
        for bit in encoded.iter() {
            value = (value << 1) | bit as u16;
        }
        assert_eq!(value, 0x4492);
    }

    #[test]
    fn test_phase_shifted_a4_reads_as_12() {
        // 0x4492 shifted one bitcell left is 0x8924, which demodulates as 0x12.
        let shifted = bits_from_u64(0x8924, 16);
        assert_eq!(decode_fm_mfm(&shifted), vec![0x12]);
    }

    #[test]
    fn test_clock_bits_discarded() {
        // 0xFF at the data positions with every combination of clock bits.
        for clocks in 0..=0xFFu16 {
            let mut bits = BitVec::new();
            for i in 0..8 {
                bits.push(clocks & (0x80 >> i) != 0);
                bits.push(true);
            }
            assert_eq!(decode_fm_mfm(&bits), vec![0xFF]);
        }
    }

    #[test]
    fn test_decode_is_deterministic() {
        let data: Vec<u8> = (0..=255u8).collect();
        let encoded = encode_mfm(&data, false);
        let first = decode_fm_mfm(&encoded);
        let second = decode_fm_mfm(&encoded);
        assert_eq!(first, data);
        assert_eq!(first, second);
        assert_eq!(decode_fm_mfm(&encode_fm(&data)), data);
    }

    #[test]
    fn test_partial_byte_is_padded() {
        // Three data bits: 1 0 1
        let bits = bits_from_u64(0b01_00_01, 6);
        assert_eq!(decode_fm_mfm(&bits), vec![0b1010_0000]);
        assert!(decode_fm_mfm(&BitVec::new()).is_empty());
    }

    #[test]
    fn test_marker_matches_stream_encoding() {
        let data = [0xFE, 0x00, 0xA5, 0x5A];
        assert_eq!(bits_from_u64(encode_marker(&data), 64), encode_mfm(&data, false));
    }
}
