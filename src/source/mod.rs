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

//! The boundary to flux acquisition.
//!
//! A [FluxSource] produces [FluxTimeline]s for physical tracks, one per revolution captured.
//! Sources are read sequentially and are not restartable: each timeline is yielded once.
//! Failures to acquire flux are [FluxSourceError]s and are kept distinct from failures to
//! decode acquired flux, which are recorded as sector status.

mod generated;
mod memory;

pub use generated::{EraseFluxSource, TestPatternFluxSource};
pub use memory::MemoryFluxSource;

use crate::{
    config::{ConfigError, FluxSourceConfig},
    flux::FluxTimeline,
    types::DiskCh,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FluxSourceError {
    #[error("An IO error occurred reading flux: {0}")]
    Io(#[from] std::io::Error),
    #[error("No flux is available for track {0}")]
    Unavailable(DiskCh),
    #[error("The flux source data is corrupt: {0}")]
    Corrupt(String),
}

/// A lazily produced sequence of revolutions for one track.
pub type FluxRevolutions<'a> = Box<dyn Iterator<Item = Result<FluxTimeline, FluxSourceError>> + 'a>;

pub trait FluxSource {
    /// Return the physical tracks this source can provide, in acquisition order.
    fn locations(&self) -> Vec<DiskCh>;

    /// Begin reading the revolutions captured for `ch`.
    fn read_flux(&mut self, ch: DiskCh) -> Result<FluxRevolutions<'_>, FluxSourceError>;
}

/// Create a built-in flux source from its configuration. An unknown source type is fatal.
pub fn create_flux_source(config: &FluxSourceConfig) -> Result<Box<dyn FluxSource>, ConfigError> {
    log::debug!("create_flux_source(): Creating '{}' flux source", config.kind);
    match config.kind.trim().to_ascii_lowercase().as_str() {
        "erase" => Ok(Box::new(EraseFluxSource::new(config.tracks, config.heads, config.revolutions))),
        "test_pattern" => Ok(Box::new(TestPatternFluxSource::from_config(config)?)),
        _ => Err(ConfigError::UnknownSourceType(config.kind.clone())),
    }
}
