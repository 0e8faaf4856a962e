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

    src/pipeline.rs

    Concurrent whole-disk decode pipeline.
*/

//! Whole-disk decoding.
//!
//! [decode_disk] reads every track of a [FluxSource] and decodes it into an [Image]. Flux is
//! acquired sequentially on the calling thread and handed to a pool of decode workers through a
//! bounded channel. The channel capacity is the prefetch depth: when decoding falls behind,
//! acquisition blocks rather than buffering more timelines.
//!
//! Sectors are merged into the caller's [Image] as each revolution is decoded, so sectors
//! recovered before a source error or cancellation are kept.

use crate::{
    config::DecoderConfig,
    decoder::{build_pll, create_decoder, decode_track, TrackDecoder},
    flux::FluxTimeline,
    format_us,
    image::{Geometry, Image},
    sector::SectorStatus,
    source::FluxSource,
    types::DiskCh,
    DecodeError,
};
use crossbeam_channel::{bounded, Receiver};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

/// A cooperative cancellation flag shared between the caller, acquisition and decoding.
/// Cancellation stops further records from being read; sectors already merged are untouched.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Clone, Debug)]
pub struct DecodeOptions {
    /// The number of timelines that may be acquired ahead of decoding.
    pub prefetch: usize,
    /// The number of decode worker threads.
    pub workers: usize,
    pub cancel: CancelToken,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            prefetch: 2,
            workers: thread::available_parallelism().map(|n| n.get().min(4)).unwrap_or(1),
            cancel: CancelToken::new(),
        }
    }
}

/// A summary of decoding one revolution of one track.
#[derive(Clone, Debug, PartialEq)]
pub struct RevolutionSummary {
    pub ch: DiskCh,
    pub revolution: usize,
    pub headers: usize,
    pub ok: usize,
    pub bad_checksum: usize,
    pub data_missing: usize,
    pub exhausted: bool,
    pub clock_ns: f64,
}

#[derive(Clone, Debug, Default)]
pub struct DecodeReport {
    /// One entry per decoded revolution, ordered by track and revolution.
    pub revolutions: Vec<RevolutionSummary>,
    /// The number of tracks for which flux was acquired.
    pub tracks_read: usize,
    pub cancelled: bool,
    pub geometry: Geometry,
}

struct FluxJob {
    ch: DiskCh,
    revolution: usize,
    timeline: FluxTimeline,
}

fn decode_worker(
    mut decoder: TrackDecoder,
    jobs: Receiver<FluxJob>,
    config: &DecoderConfig,
    image: &Image,
    cancel: &CancelToken,
) -> Vec<RevolutionSummary> {
    let mut summaries = Vec::new();
    for job in jobs.iter() {
        if cancel.is_cancelled() {
            // Drain without decoding so acquisition is never blocked on a full channel.
            continue;
        }
        let pll = build_pll(config, &job.timeline);
        let revolution_ns = config.revolution_ns().or(job.timeline.revolution_ns());
        let result = decode_track(&mut decoder, &job.timeline, job.ch, pll, cancel, revolution_ns);

        for sector in &result.sectors {
            image.merge(sector);
        }
        summaries.push(RevolutionSummary {
            ch: job.ch,
            revolution: job.revolution,
            headers: result.sectors.len(),
            ok: result.count_status(SectorStatus::Ok),
            bad_checksum: result.count_status(SectorStatus::BadChecksum),
            data_missing: result.count_status(SectorStatus::DataMissing),
            exhausted: result.exhausted,
            clock_ns: result.clock_ns,
        });
    }
    summaries
}

/// Decode every track provided by `source` into `image`.
///
/// Up to `config.revolutions` revolutions are read per track. If `config.sectors_per_track` is
/// set, further revolutions of a track are skipped once that many of its sectors are good.
///
/// Configuration errors are reported before any flux is acquired. A source error stops
/// acquisition and is returned once the revolutions already acquired have been decoded.
pub fn decode_disk(
    source: &mut dyn FluxSource,
    config: &DecoderConfig,
    options: &DecodeOptions,
    image: &Image,
) -> Result<DecodeReport, DecodeError> {
    let workers = options.workers.max(1);
    let decoders = (0..workers)
        .map(|_| create_decoder(config))
        .collect::<Result<Vec<_>, _>>()?;

    let cancel = &options.cancel;
    let (sender, receiver) = bounded::<FluxJob>(options.prefetch.max(1));
    let mut source_error = None;
    let mut tracks_read = 0;
    let mut worker_panicked = false;
    let mut revolutions = Vec::new();

    log::debug!(
        "decode_disk(): Decoding {} tracks with {} workers, prefetch {}",
        source.locations().len(),
        workers,
        options.prefetch.max(1)
    );

    thread::scope(|scope| {
        let handles: Vec<_> = decoders
            .into_iter()
            .map(|decoder| {
                let jobs = receiver.clone();
                scope.spawn(move || decode_worker(decoder, jobs, config, image, cancel))
            })
            .collect();
        drop(receiver);

        'tracks: for ch in source.locations() {
            if cancel.is_cancelled() {
                break;
            }
            let revs = match source.read_flux(ch) {
                Ok(revs) => revs,
                Err(e) => {
                    log::error!("decode_disk(): Failed to read flux for {}: {}", ch, e);
                    source_error = Some(DecodeError::FluxSource { ch, source: e });
                    break;
                }
            };
            tracks_read += 1;

            for (revolution, timeline) in revs.take(config.revolutions).enumerate() {
                if cancel.is_cancelled() {
                    break 'tracks;
                }
                if revolution > 0 {
                    if let Some(wanted) = config.sectors_per_track {
                        if image.count_ok_for(ch) >= wanted {
                            log::debug!("decode_disk(): {} complete after {} revolutions", ch, revolution);
                            break;
                        }
                    }
                }

                let timeline = match timeline {
                    Ok(timeline) => timeline,
                    Err(e) => {
                        log::error!("decode_disk(): Failed to read revolution {} of {}: {}", revolution, ch, e);
                        source_error = Some(DecodeError::FluxSource { ch, source: e });
                        break 'tracks;
                    }
                };
                if timeline.is_empty() {
                    log::warn!("decode_disk(): Revolution {} of {} contains no flux", revolution, ch);
                }
                timeline.log_summary();

                // Blocks while the channel is full.
                if sender.send(FluxJob { ch, revolution, timeline }).is_err() {
                    break 'tracks;
                }
            }
        }
        drop(sender);

        for handle in handles {
            match handle.join() {
                Ok(summaries) => revolutions.extend(summaries),
                Err(_) => worker_panicked = true,
            }
        }
    });

    if worker_panicked {
        return Err(DecodeError::WorkerPanic);
    }
    if let Some(e) = source_error {
        return Err(e);
    }

    revolutions.sort_by_key(|r| (r.ch, r.revolution));
    let geometry = image.calculate_geometry();
    let report = DecodeReport {
        revolutions,
        tracks_read,
        cancelled: cancel.is_cancelled(),
        geometry,
    };
    log::debug!(
        "decode_disk(): Read {} tracks, {} sectors, geometry: {}",
        report.tracks_read,
        image.len(),
        report.geometry
    );
    if let Some(avg) = report.average_clock_ns() {
        log::debug!("decode_disk(): Average recovered clock: {}", format_us!(avg));
    }
    Ok(report)
}

impl DecodeReport {
    /// Return the mean recovered clock across all decoded revolutions.
    pub fn average_clock_ns(&self) -> Option<f64> {
        if self.revolutions.is_empty() {
            return None;
        }
        Some(self.revolutions.iter().map(|r| r.clock_ns).sum::<f64>() / self.revolutions.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::EraseFluxSource;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_erased_disk_has_no_sectors() {
        let mut source = EraseFluxSource::new(3, 2, 1);
        let image = Image::new();
        let report = decode_disk(&mut source, &DecoderConfig::agat(), &DecodeOptions::default(), &image).unwrap();
        assert_eq!(report.tracks_read, 6);
        assert_eq!(report.revolutions.len(), 6);
        assert!(image.is_empty());
        assert_eq!(report.geometry, Geometry::default());
    }

    #[test]
    fn test_config_error_before_acquisition() {
        let mut source = EraseFluxSource::new(1, 1, 1);
        let config = DecoderConfig {
            format: "nope".to_string(),
            ..DecoderConfig::default()
        };
        let result = decode_disk(&mut source, &config, &DecodeOptions::default(), &Image::new());
        assert!(matches!(result, Err(DecodeError::Config(_))));
    }
}
