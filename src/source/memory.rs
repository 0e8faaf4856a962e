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

use crate::{
    flux::FluxTimeline,
    source::{FluxRevolutions, FluxSource, FluxSourceError},
    types::DiskCh,
};
use std::collections::BTreeMap;

/// A [FluxSource] over timelines held in memory, for programmatic capture and tests.
#[derive(Default)]
pub struct MemoryFluxSource {
    tracks: BTreeMap<DiskCh, Vec<FluxTimeline>>,
}

impl MemoryFluxSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a revolution for track `ch`. Revolutions are yielded in the order added.
    pub fn add_revolution(&mut self, ch: DiskCh, timeline: FluxTimeline) {
        self.tracks.entry(ch).or_default().push(timeline);
    }

    pub fn with_revolution(mut self, ch: DiskCh, timeline: FluxTimeline) -> Self {
        self.add_revolution(ch, timeline);
        self
    }
}

impl FluxSource for MemoryFluxSource {
    fn locations(&self) -> Vec<DiskCh> {
        self.tracks.keys().copied().collect()
    }

    /// Each track may be read once.
    fn read_flux(&mut self, ch: DiskCh) -> Result<FluxRevolutions<'_>, FluxSourceError> {
        let revolutions = self.tracks.remove(&ch).ok_or(FluxSourceError::Unavailable(ch))?;
        Ok(Box::new(revolutions.into_iter().map(Ok::<_, FluxSourceError>)))
    }
}
