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

//! Flux sources that synthesize their flux rather than reading it.

use crate::{
    config::{ConfigError, FluxSourceConfig, RPM_RANGE},
    flux::FluxTimeline,
    source::{FluxRevolutions, FluxSource, FluxSourceError},
    types::{DiskCh, DiskRpm},
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn all_locations(tracks: u16, heads: u8) -> Vec<DiskCh> {
    (0..tracks)
        .flat_map(|c| (0..heads).map(move |h| DiskCh::new(c, h)))
        .collect()
}

fn check_location(ch: DiskCh, tracks: u16, heads: u8) -> Result<(), FluxSourceError> {
    if ch.c() >= tracks || ch.h() >= heads {
        return Err(FluxSourceError::Unavailable(ch));
    }
    Ok(())
}

/// A source representing an erased disk: every revolution is free of flux reversals.
pub struct EraseFluxSource {
    tracks: u16,
    heads: u8,
    revolutions: usize,
}

impl EraseFluxSource {
    pub fn new(tracks: u16, heads: u8, revolutions: usize) -> Self {
        EraseFluxSource {
            tracks,
            heads,
            revolutions: revolutions.max(1),
        }
    }
}

impl FluxSource for EraseFluxSource {
    fn locations(&self) -> Vec<DiskCh> {
        all_locations(self.tracks, self.heads)
    }

    fn read_flux(&mut self, ch: DiskCh) -> Result<FluxRevolutions<'_>, FluxSourceError> {
        check_location(ch, self.tracks, self.heads)?;
        Ok(Box::new((0..self.revolutions).map(|_| Ok::<_, FluxSourceError>(FluxTimeline::new()))))
    }
}

/// A source producing one revolution's worth of a repeating interval pattern per read, with
/// optional deterministic jitter.
pub struct TestPatternFluxSource {
    tracks: u16,
    heads: u8,
    revolutions: usize,
    intervals: Vec<u32>,
    jitter_ns: u32,
    revolution_ns: u64,
    rng: StdRng,
}

impl TestPatternFluxSource {
    pub fn from_config(config: &FluxSourceConfig) -> Result<Self, ConfigError> {
        if config.intervals.is_empty() || config.intervals.contains(&0) {
            return Err(ConfigError::InvalidParameter(
                "test_pattern intervals must be non-empty and positive".to_string(),
            ));
        }
        if !RPM_RANGE.contains(&config.rpm) {
            return Err(ConfigError::InvalidParameter(format!(
                "rpm must be in {:?}, got {}",
                RPM_RANGE, config.rpm
            )));
        }
        Ok(TestPatternFluxSource {
            tracks: config.tracks,
            heads: config.heads,
            revolutions: config.revolutions.max(1),
            intervals: config.intervals.clone(),
            jitter_ns: config.jitter_ns,
            revolution_ns: DiskRpm::from(config.rpm).revolution_ns(),
            rng: StdRng::seed_from_u64(config.seed),
        })
    }

    fn generate(&mut self) -> FluxTimeline {
        let mut timeline = FluxTimeline::new();
        timeline.mark_index();
        let jitter = self.jitter_ns as i64;
        for &interval in self.intervals.iter().cycle() {
            if timeline.total_duration() >= self.revolution_ns {
                break;
            }
            let offset = if jitter > 0 { self.rng.gen_range(-jitter..=jitter) } else { 0 };
            let interval = (interval as i64 + offset).max(1) as u32;
            timeline.push_unchecked(interval);
        }
        timeline.mark_index();
        timeline
    }
}

impl FluxSource for TestPatternFluxSource {
    fn locations(&self) -> Vec<DiskCh> {
        all_locations(self.tracks, self.heads)
    }

    fn read_flux(&mut self, ch: DiskCh) -> Result<FluxRevolutions<'_>, FluxSourceError> {
        check_location(ch, self.tracks, self.heads)?;
        let revolutions = self.revolutions;
        Ok(Box::new((0..revolutions).map(move |_| Ok::<_, FluxSourceError>(self.generate()))))
    }
}
