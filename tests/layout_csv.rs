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
    image::layout::{read_layout_csv, write_layout_csv},
    DecodeOptions,
    DecoderConfig,
    DiskCh,
    Image,
    LayoutError,
    MemoryFluxSource,
    SectorStatus,
};

fn decoded_image() -> Image {
    // Track 0 is complete; track 1 has a header without data and a bad checksum.
    let mut damaged = TrackBuilder::new().fill(0xFF, 32);
    for sector in 0..21 {
        let payload = test_payload(sector, 256);
        damaged = match sector {
            3 => damaged.agat_header(0xFE, 1, 0, sector),
            7 => damaged
                .agat_header(0xFE, 1, 0, sector)
                .agat_data_with_checksum(&payload, fluxdec::checksum::agat_checksum(&payload) ^ 0x80),
            _ => damaged.agat_sector(1, 0, sector, &payload),
        };
    }
    let mut source = MemoryFluxSource::new()
        .with_revolution(DiskCh::new(0, 0), agat_track(0, 0))
        .with_revolution(DiskCh::new(1, 0), damaged.build());

    let image = Image::new();
    decode_disk(&mut source, &DecoderConfig::agat(), &DecodeOptions::default(), &image).unwrap();
    image
}

#[test]
fn test_layout_round_trip() {
    init();
    let image = decoded_image();
    assert_eq!(image.count_status_for(DiskCh::new(1, 0), SectorStatus::DataMissing), 1);
    assert_eq!(image.count_status_for(DiskCh::new(1, 0), SectorStatus::BadChecksum), 1);

    let mut csv = Vec::new();
    write_layout_csv(&image, &mut csv).unwrap();
    let text = String::from_utf8(csv.clone()).unwrap();
    assert_eq!(text.lines().count(), 1 + 42);
    assert!(text.contains("DATA_MISSING"));
    assert!(text.contains("BAD_CHECKSUM"));

    let imported = read_layout_csv(csv.as_slice()).unwrap();
    assert_eq!(imported.geometry(), image.geometry());

    let original = image.snapshot();
    let restored = imported.snapshot();
    assert_eq!(original.len(), restored.len());
    for (a, b) in original.iter().zip(restored.iter()) {
        assert_eq!(a.logical, b.logical);
        assert_eq!(a.physical, b.physical);
        assert_eq!(a.status, b.status);
        // Clocks are written to a tenth of a nanosecond.
        let (clock_a, clock_b) = (a.clock_ns.unwrap(), b.clock_ns.unwrap());
        assert!((clock_a - clock_b).abs() < 0.051);
        assert_eq!(a.header_span, b.header_span);
        assert_eq!(a.data_span, b.data_span);
        assert_eq!(a.data_bit_offset, b.data_bit_offset);
        assert_eq!(a.data.len(), b.data.len());
    }
}

#[test]
fn test_layout_rejects_bad_status() {
    let mut csv = Vec::new();
    write_layout_csv(&decoded_image(), &mut csv).unwrap();
    let text = String::from_utf8(csv).unwrap().replacen(",OK\n", ",GREAT\n", 1);

    match read_layout_csv(text.as_bytes()) {
        Err(LayoutError::BadStatus { line, value }) => {
            assert_eq!(line, 2);
            assert_eq!(value, "GREAT");
        }
        other => panic!("expected a bad status error, got {:?}", other.map(|i| i.len())),
    }
}

#[test]
fn test_layout_rejects_short_rows() {
    let text = "a,b,c\n";
    assert!(matches!(
        read_layout_csv(text.as_bytes()),
        Err(LayoutError::ColumnCount { line: 1, found: 3 })
    ));
    assert!(matches!(read_layout_csv("".as_bytes()), Err(LayoutError::Empty)));
}
