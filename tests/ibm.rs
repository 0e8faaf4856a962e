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
mod common;

use common::*;
use fluxdec::{
    decode_disk,
    decode_timeline,
    DecodeOptions,
    DecoderConfig,
    DiskCh,
    DiskChs,
    Image,
    MemoryFluxSource,
    SectorStatus,
};

fn track_with_bad_sector(c: u8, h: u8, bad: u8) -> fluxdec::FluxTimeline {
    let mut builder = TrackBuilder::new().fill(0x4E, 80);
    for r in 1..=9 {
        builder = builder.ibm_header(c, h, r, 2);
        builder = if r == bad {
            builder.ibm_data_with_crc(&test_payload(r, 512), false, 0xDEAD)
        }
        else {
            builder.ibm_data(&test_payload(r, 512), false)
        };
    }
    builder.build()
}

#[test]
fn test_ibm_full_track() {
    init();
    let timeline = ibm_track(2, 1);
    let result = decode_timeline(&DecoderConfig::ibm_mfm(), &timeline, DiskCh::new(2, 1)).unwrap();
    assert_eq!(result.sectors.len(), 9);
    for (i, sector) in result.sectors.iter().enumerate() {
        let r = i as u8 + 1;
        assert_eq!(sector.status, SectorStatus::Ok);
        assert_eq!(sector.logical, DiskChs::new(2, 1, r));
        assert_eq!(sector.data, test_payload(r, 512));
    }
}

#[test]
fn test_ibm_header_crc_error_skips_sector() {
    init();
    let timeline = TrackBuilder::new()
        .fill(0x4E, 80)
        .ibm_header_with_crc(0, 0, 1, 2, 0x1234)
        .ibm_data(&test_payload(1, 512), false)
        .ibm_header(0, 0, 2, 2)
        .ibm_data(&test_payload(2, 512), false)
        .build();
    let result = decode_timeline(&DecoderConfig::ibm_mfm(), &timeline, DiskCh::new(0, 0)).unwrap();
    assert_eq!(result.sectors.len(), 1);
    assert_eq!(result.sectors[0].logical, DiskChs::new(0, 0, 2));
    assert_eq!(result.sectors[0].status, SectorStatus::Ok);
}

#[test]
fn test_ibm_data_crc_error() {
    init();
    let timeline = track_with_bad_sector(0, 0, 4);
    let result = decode_timeline(&DecoderConfig::ibm_mfm(), &timeline, DiskCh::new(0, 0)).unwrap();
    assert_eq!(result.sectors.len(), 9);
    assert_eq!(result.count_status(SectorStatus::Ok), 8);
    let bad = &result.sectors[3];
    assert_eq!(bad.logical, DiskChs::new(0, 0, 4));
    assert_eq!(bad.status, SectorStatus::BadChecksum);
    assert_eq!(bad.data, test_payload(4, 512));
}

#[test]
fn test_ibm_deleted_data_mark() {
    init();
    let timeline = TrackBuilder::new()
        .fill(0x4E, 80)
        .ibm_header(10, 0, 1, 1)
        .ibm_data(&test_payload(1, 256), true)
        .build();
    let result = decode_timeline(&DecoderConfig::ibm_mfm(), &timeline, DiskCh::new(10, 0)).unwrap();
    assert_eq!(result.sectors.len(), 1);
    assert_eq!(result.sectors[0].status, SectorStatus::Ok);
    assert_eq!(result.sectors[0].data.len(), 256);
}

fn merge_revolutions(first: fluxdec::FluxTimeline, second: fluxdec::FluxTimeline) -> Image {
    let ch = DiskCh::new(0, 0);
    let mut source = MemoryFluxSource::new()
        .with_revolution(ch, first)
        .with_revolution(ch, second);
    let config = DecoderConfig {
        revolutions: 2,
        ..DecoderConfig::ibm_mfm()
    };
    let options = DecodeOptions {
        workers: 1,
        ..DecodeOptions::default()
    };
    let image = Image::new();
    let report = decode_disk(&mut source, &config, &options, &image).unwrap();
    assert_eq!(report.revolutions.len(), 2);
    image
}

#[test]
fn test_ibm_better_revolution_replaces_bad_checksum() {
    init();
    let image = merge_revolutions(track_with_bad_sector(0, 0, 5), ibm_track(0, 0));
    assert_eq!(image.len(), 9);
    assert_eq!(image.count_status_for(DiskCh::new(0, 0), SectorStatus::Ok), 9);
}

#[test]
fn test_ibm_worse_revolution_does_not_replace() {
    init();
    let image = merge_revolutions(ibm_track(0, 0), track_with_bad_sector(0, 0, 5));
    let sector = image.get(DiskChs::new(0, 0, 5)).unwrap();
    let sector = sector.read().unwrap();
    assert_eq!(sector.status, SectorStatus::Ok);
    assert_eq!(sector.data, test_payload(5, 512));
}
