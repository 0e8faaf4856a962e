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
    checksum::agat_checksum,
    codec::{bits_from_u64, decode_fm_mfm},
    config::AGAT_SECTOR_ID,
    decode_timeline,
    decode_track,
    decoder::{build_pll, create_decoder},
    flux::{FluxCursor, Pll, SeekOutcome},
    CancelToken,
    DecoderConfig,
    DiskCh,
    DiskChs,
    FluxPattern,
    FluxTimeline,
    FormatDecoder,
    Image,
    PatternSet,
    RecordKind,
    SectorStatus,
    SyncMark,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

#[test]
fn test_agat_full_track() {
    init();
    let timeline = agat_track(17, 1);
    let result = decode_timeline(&DecoderConfig::agat(), &timeline, DiskCh::new(17, 1)).unwrap();

    assert_eq!(result.sectors.len(), 21);
    assert!(!result.exhausted);
    for (i, sector) in result.sectors.iter().enumerate() {
        let id = i as u8;
        assert_eq!(sector.status, SectorStatus::Ok, "sector {}", sector);
        assert_eq!(sector.logical, DiskChs::new(17, 1, id));
        assert_eq!(sector.physical, DiskCh::new(17, 1));
        assert_eq!(sector.data, test_payload(id ^ 17, 256));
        assert!(sector.header_span.is_some());
        let data_span = sector.data_span.unwrap();
        assert!(data_span.start_ns > sector.header_span.unwrap().end_ns);
        assert!(sector.clock_ns.is_some());
    }
}

#[test]
fn test_agat_bad_checksum_keeps_payload() {
    init();
    let payload = test_payload(3, 256);
    let timeline = TrackBuilder::new()
        .fill(0xFF, 16)
        .agat_header(0xFE, 2, 0, 3)
        .agat_data_with_checksum(&payload, agat_checksum(&payload).wrapping_add(1))
        .build();
    let result = decode_timeline(&DecoderConfig::agat(), &timeline, DiskCh::new(2, 0)).unwrap();
    assert_eq!(result.sectors.len(), 1);
    assert_eq!(result.sectors[0].status, SectorStatus::BadChecksum);
    assert_eq!(result.sectors[0].data, payload);
}

#[test]
fn test_agat_header_without_data() {
    init();
    let timeline = TrackBuilder::new()
        .fill(0xFF, 16)
        .agat_header(0xFE, 5, 1, 0)
        .agat_sector(5, 1, 1, &test_payload(1, 256))
        .build();
    let result = decode_timeline(&DecoderConfig::agat(), &timeline, DiskCh::new(5, 1)).unwrap();
    assert_eq!(result.sectors.len(), 2);
    assert_eq!(result.sectors[0].logical, DiskChs::new(5, 1, 0));
    assert_eq!(result.sectors[0].status, SectorStatus::DataMissing);
    assert!(result.sectors[0].data.is_empty());
    assert_eq!(result.sectors[1].status, SectorStatus::Ok);
}

#[test]
fn test_agat_bad_header_magic_skipped() {
    init();
    let timeline = TrackBuilder::new()
        .fill(0xFF, 16)
        .agat_header_with_magic(0xFE, 5, 0, 9, 0xA5)
        .agat_data(&test_payload(9, 256))
        .agat_sector(5, 0, 10, &test_payload(10, 256))
        .build();
    let result = decode_timeline(&DecoderConfig::agat(), &timeline, DiskCh::new(5, 0)).unwrap();
    // The orphaned data record is not attributed to any sector.
    assert_eq!(result.sectors.len(), 1);
    assert_eq!(result.sectors[0].logical, DiskChs::new(5, 0, 10));
    assert_eq!(result.sectors[0].status, SectorStatus::Ok);
}

#[test]
fn test_agat_truncated_data() {
    init();
    let payload = test_payload(0, 256);
    let builder = TrackBuilder::new().fill(0xFF, 16).agat_header(0xFE, 0, 0, 4);
    // Cut the capture part way through the data record.
    let builder = builder.fill(0xFF, 4).raw(fluxdec::config::AGAT_DATA_ID, 64).bytes(&payload[..100]);
    let timeline = FluxTimeline::from_bitcells(builder.bits().iter(), CELL_NS);

    let result = decode_timeline(&DecoderConfig::agat(), &timeline, DiskCh::new(0, 0)).unwrap();
    assert!(result.exhausted);
    assert_eq!(result.sectors.len(), 1);
    assert_eq!(result.sectors[0].status, SectorStatus::DataMissing);
}

#[test]
fn test_agat_slow_drive() {
    init();
    // Written 6% slow relative to the nominal clock.
    let mut builder = TrackBuilder::new().fill(0xFF, 32);
    for sector in 0..21 {
        builder = builder.agat_sector(40, 0, sector, &test_payload(sector, 256));
    }
    let timeline = builder.build_with_cell(2120);
    let result = decode_timeline(&DecoderConfig::agat(), &timeline, DiskCh::new(40, 0)).unwrap();
    assert_eq!(result.count_status(SectorStatus::Ok), 21);
    assert!((result.clock_ns - 2120.0).abs() < 40.0, "clock {}", result.clock_ns);
}

#[test]
fn test_agat_jitter() {
    init();
    let mut builder = TrackBuilder::new().fill(0xFF, 32);
    for sector in 0..21 {
        builder = builder.agat_sector(1, 0, sector, &test_payload(sector, 256));
    }
    let timeline = builder.build_with_jitter(0xF1F0, 250);
    let result = decode_timeline(&DecoderConfig::agat(), &timeline, DiskCh::new(1, 0)).unwrap();
    assert_eq!(result.count_status(SectorStatus::Ok), 21);
}

#[test]
fn test_agat_auto_clock() {
    init();
    let mut builder = TrackBuilder::new().fill(0xFF, 32);
    for sector in 0..21 {
        builder = builder.agat_sector(3, 1, sector, &test_payload(sector, 256));
    }
    // High density timing, but no clock hint beyond the histogram.
    let timeline = builder.build_with_cell(1000);
    let config = DecoderConfig {
        auto_clock: true,
        density: None,
        ..DecoderConfig::agat()
    };
    let pll = build_pll(&config, &timeline);
    assert!((pll.period() - 1000.0).abs() < 100.0, "period {}", pll.period());
    let result = decode_timeline(&config, &timeline, DiskCh::new(3, 1)).unwrap();
    assert_eq!(result.count_status(SectorStatus::Ok), 21);
}

#[test]
fn test_phase_shifted_sync() {
    // 0xA4 MFM encoded is 0x4492; one bitcell out of phase it is read as 0x8924.
    let window = bits_from_u64(AGAT_SECTOR_ID, 64);
    let mut first = bit_vec::BitVec::new();
    first.extend(window.iter().take(16));
    assert_eq!(decode_fm_mfm(&first), vec![0x12]);

    // A matcher on the effective value finds the Agat window and not an IBM one.
    let set = PatternSet::new().with_mark(SyncMark::new(
        "shifted_a4",
        RecordKind::Header,
        FluxPattern::new(16, 0x8924).unwrap(),
    ));
    let agat = TrackBuilder::new().fill(0xFF, 8).raw(AGAT_SECTOR_ID, 64).build();
    let mut cursor = FluxCursor::with_clock(&agat, 2000.0);
    match cursor.seek_to_next_match(&set) {
        SeekOutcome::Found(m) => assert_eq!(m.bit_index, 8 * 16),
        other => panic!("expected a match, got {:?}", other),
    }

    let ibm = TrackBuilder::new()
        .fill(0x00, 12)
        .raw(fluxdec::config::IBM_IDAM, 64)
        .build();
    let mut cursor = FluxCursor::with_clock(&ibm, 2000.0);
    assert!(!cursor.seek_to_next_match(&set).is_found());
}

#[test]
fn test_seek_ignores_surrounding_noise() {
    init();
    let mut rng = StdRng::seed_from_u64(1234);
    let noise: Vec<u32> = (0..500).map(|_| rng.gen_range(2..=4) * CELL_NS).collect();
    let noise_ns: u64 = noise.iter().map(|&n| n as u64).sum();

    let marked = TrackBuilder::new().fill(0xFF, 8).raw(AGAT_SECTOR_ID, 64).fill(0xFF, 8).build();
    let mut intervals = noise.clone();
    intervals.extend(marked.iter());
    intervals.extend(noise.iter());
    let timeline = FluxTimeline::from_intervals(&intervals).unwrap();

    let config = DecoderConfig::agat();
    let mut decoder = create_decoder(&config).unwrap();
    let mut cursor = FluxCursor::new(&timeline, Pll::with_period(2000.0));
    match decoder.advance_to_next_record(&mut cursor) {
        SeekOutcome::Found(m) => {
            assert_eq!(m.kind, RecordKind::Header);
            assert_eq!(m.elapsed_ns, noise_ns + 8 * 16 * CELL_NS as u64);
        }
        other => panic!("expected a match, got {:?}", other),
    }
}

#[test]
fn test_no_marks_leaves_sectors_missing() {
    init();
    let timeline = FluxTimeline::from_intervals(&[4000; 5000]).unwrap();
    let config = DecoderConfig::agat();
    let mut decoder = create_decoder(&config).unwrap();

    let mut cursor = FluxCursor::new(&timeline, Pll::with_period(2000.0));
    assert_eq!(
        decoder.advance_to_next_record(&mut cursor),
        SeekOutcome::NotFound {
            elapsed_ns: timeline.total_duration()
        }
    );

    let result = decode_track(
        &mut decoder,
        &timeline,
        DiskCh::new(0, 0),
        build_pll(&config, &timeline),
        &CancelToken::new(),
        None,
    );
    assert!(result.sectors.is_empty());

    let image = Image::new();
    let expected = image.put(DiskChs::new(0, 0, 0));
    for sector in &result.sectors {
        image.merge(sector);
    }
    assert_eq!(expected.read().unwrap().status, SectorStatus::Missing);
}

#[test]
fn test_cancelled_pass_reads_nothing() {
    let timeline = agat_track(0, 0);
    let config = DecoderConfig::agat();
    let mut decoder = create_decoder(&config).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = decode_track(
        &mut decoder,
        &timeline,
        DiskCh::new(0, 0),
        build_pll(&config, &timeline),
        &cancel,
        None,
    );
    assert!(result.cancelled);
    assert!(result.sectors.is_empty());
}
