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

//! Per-format payload checksums.
//!
//! A checksum is a pure function over payload bytes. The decoder framework only decides where a
//! checksum is computed and how the comparison maps to a [SectorStatus](crate::SectorStatus).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The checksum algorithms known to the decoder.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ChecksumKind {
    /// Apple II Agat 8-bit sum with end-around carry.
    AgatSum8,
    /// CRC-16/IBM-3740 as used by IBM System 34 formats.
    #[serde(rename = "crc_ibm_3740")]
    #[strum(serialize = "crc_ibm_3740")]
    CrcIbm3740,
}

impl ChecksumKind {
    /// Return the width in bytes of the stored checksum value.
    pub fn width_bytes(&self) -> usize {
        match self {
            ChecksumKind::AgatSum8 => 1,
            ChecksumKind::CrcIbm3740 => 2,
        }
    }

    /// Compute the checksum over `data`.
    pub fn compute(&self, data: &[u8]) -> u16 {
        match self {
            ChecksumKind::AgatSum8 => agat_checksum(data) as u16,
            ChecksumKind::CrcIbm3740 => crc_ibm_3740(data, None),
        }
    }
}

/// Calculate the Agat sector checksum: an 8-bit sum in which a carry out of the previous
/// addition is added back in before the next byte.
pub fn agat_checksum(data: &[u8]) -> u8 {
    let mut checksum: u16 = 0;
    for &byte in data {
        if checksum > 0xFF {
            checksum = (checksum + 1) & 0xFF;
        }
        checksum += byte as u16;
    }
    (checksum & 0xFF) as u8
}

/// Calculate a CRC-16/IBM-3740 over a byte slice: poly 0x1021, init 0xFFFF, no reflection,
/// no final XOR. `start` continues a calculation from a previous result.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    const POLY: u16 = 0x1021;
    let mut crc: u16 = start.unwrap_or(0xFFFF);

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if (crc & 0x8000) != 0 {
                crc = (crc << 1) ^ POLY;
            }
            else {
                crc <<= 1;
            }
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_crc_check_value() {
        assert_eq!(crc_ibm_3740(b"123456789", None), 0x29B1);
        let partial = crc_ibm_3740(b"1234", None);
        assert_eq!(crc_ibm_3740(b"56789", Some(partial)), 0x29B1);
    }

    #[test]
    fn test_crc_of_sync_and_idam() {
        // A1 A1 A1 FE followed by its CRC yields a residue of zero.
        let mut bytes = vec![0xA1, 0xA1, 0xA1, 0xFE, 0x00, 0x00, 0x01, 0x02];
        let crc = crc_ibm_3740(&bytes, None);
        bytes.extend_from_slice(&crc.to_be_bytes());
        assert_eq!(crc_ibm_3740(&bytes, None), 0);
    }

    #[test]
    fn test_agat_end_around_carry() {
        assert_eq!(agat_checksum(&[]), 0x00);
        assert_eq!(agat_checksum(&[0x12, 0x34]), 0x46);
        // The carry is only folded in when the next byte arrives.
        assert_eq!(agat_checksum(&[0xFF, 0x01]), 0x00);
        assert_eq!(agat_checksum(&[0xFF, 0x01, 0x00]), 0x01);
        assert_eq!(agat_checksum(&[0x80, 0x80, 0x05]), 0x06);
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ChecksumKind::from_str("agat_sum8").unwrap(), ChecksumKind::AgatSum8);
        assert_eq!(ChecksumKind::from_str("CRC_IBM_3740").unwrap(), ChecksumKind::CrcIbm3740);
        assert!(ChecksumKind::from_str("crc32").is_err());
        assert_eq!(ChecksumKind::CrcIbm3740.to_string(), "crc_ibm_3740");
        assert_eq!(ChecksumKind::CrcIbm3740.width_bytes(), 2);
    }
}
