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

//! The [Image] is the output of a decode: every [Sector] recovered from a disk, keyed by its
//! logical address, plus the disk [Geometry].
//!
//! An [Image] may be shared between decode workers. Each sector lives behind its own lock, so
//! workers decoding distinct tracks do not contend, and merges into the same sector are
//! serialized and obey the never-downgrade rule of [Sector::merge_from].

pub mod layout;

use crate::{
    sector::{Sector, SectorStatus},
    types::{DiskCh, DiskChs},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display, Formatter},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

/// A shared reference to a sector owned by an [Image].
pub type SectorRef = Arc<RwLock<Sector>>;

/// Read a lock, recovering the data if a writer panicked.
pub(crate) fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Geometry {
    pub num_tracks: u16,
    pub num_sides: u8,
    /// The lowest sector number seen.
    pub first_sector: u8,
    /// The largest number of sectors seen on any one track.
    pub num_sectors: usize,
    /// The largest sector payload size seen.
    pub sector_size: usize,
    /// Set when the sector count or size varies between tracks.
    pub irregular: bool,
}

impl Display for Geometry {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{} tracks, {} sides, {} sectors of {} bytes from {}{}",
            self.num_tracks,
            self.num_sides,
            self.num_sectors,
            self.sector_size,
            self.first_sector,
            if self.irregular { " (irregular)" } else { "" }
        )
    }
}

/// The range of sector IDs and payload sizes seen on one track.
struct TrackSpan {
    first: u8,
    last: u8,
    sizes: BTreeSet<usize>,
}

impl TrackSpan {
    fn new(id: u8) -> Self {
        TrackSpan {
            first: id,
            last: id,
            sizes: BTreeSet::new(),
        }
    }

    fn count(&self) -> usize {
        (self.last - self.first) as usize + 1
    }
}

#[derive(Debug, Default)]
pub struct Image {
    sectors: RwLock<BTreeMap<DiskChs, SectorRef>>,
    geometry: RwLock<Geometry>,
}

impl Image {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sector at `chs`, inserting an empty [SectorStatus::Missing] sector if there
    /// is none. Repeated calls with the same address return the same sector.
    pub fn put(&self, chs: impl Into<DiskChs>) -> SectorRef {
        let chs = chs.into();
        let mut sectors = write_lock(&self.sectors);
        sectors
            .entry(chs)
            .or_insert_with(|| {
                Arc::new(RwLock::new(Sector {
                    logical: chs,
                    ..Sector::default()
                }))
            })
            .clone()
    }

    /// Return the sector at `chs`, if present.
    pub fn get(&self, chs: impl Into<DiskChs>) -> Option<SectorRef> {
        read_lock(&self.sectors).get(&chs.into()).cloned()
    }

    /// Merge a decoded sector into the image at its logical address. The stored sector is only
    /// replaced if `sector` is strictly more complete. Returns true if it was replaced.
    pub fn merge(&self, sector: &Sector) -> bool {
        let sector_ref = self.put(sector.logical);
        let mut stored = write_lock(&sector_ref);
        let old_status = stored.status;
        let replaced = stored.merge_from(sector);
        if replaced {
            log::trace!(
                "Image::merge(): {} {} -> {}",
                sector.logical,
                old_status,
                stored.status
            );
        }
        replaced
    }

    /// Return all sectors ordered by logical address.
    pub fn sectors(&self) -> Vec<SectorRef> {
        read_lock(&self.sectors).values().cloned().collect()
    }

    /// Return a copy of every sector, ordered by logical address.
    pub fn snapshot(&self) -> Vec<Sector> {
        self.sectors().iter().map(|s| read_lock(s).clone()).collect()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.sectors).len()
    }

    pub fn is_empty(&self) -> bool {
        read_lock(&self.sectors).is_empty()
    }

    /// Count the sectors read from physical track `ch` with the given status.
    pub fn count_status_for(&self, ch: DiskCh, status: SectorStatus) -> usize {
        self.sectors()
            .iter()
            .filter(|s| {
                let s = read_lock(s);
                s.physical == ch && s.status == status
            })
            .count()
    }

    /// Count the good sectors read from physical track `ch`.
    pub fn count_ok_for(&self, ch: DiskCh) -> usize {
        self.count_status_for(ch, SectorStatus::Ok)
    }

    pub fn geometry(&self) -> Geometry {
        *read_lock(&self.geometry)
    }

    pub fn set_geometry(&self, geometry: Geometry) {
        *write_lock(&self.geometry) = geometry;
    }

    /// Infer the disk geometry from the stored sectors and store it. Sectors that were never
    /// located are ignored.
    ///
    /// The sector count of a track is the span of its sector IDs, so a damaged sector inside
    /// the range does not make the track look shorter.
    pub fn calculate_geometry(&self) -> Geometry {
        let mut tracks: BTreeMap<(u16, u8), TrackSpan> = BTreeMap::new();
        let mut geometry = Geometry::default();
        let mut first_sector: Option<u8> = None;

        for sector_ref in self.sectors() {
            let sector = read_lock(&sector_ref);
            if sector.status.completeness() == 0 {
                continue;
            }
            let chs = sector.logical;
            geometry.num_tracks = geometry.num_tracks.max(chs.c() + 1);
            geometry.num_sides = geometry.num_sides.max(chs.h() + 1);
            first_sector = Some(first_sector.map_or(chs.s(), |s| s.min(chs.s())));

            let span = tracks.entry((chs.c(), chs.h())).or_insert_with(|| TrackSpan::new(chs.s()));
            span.first = span.first.min(chs.s());
            span.last = span.last.max(chs.s());
            if sector.status.has_data() {
                span.sizes.insert(sector.data.len());
            }
        }

        let counts: BTreeSet<usize> = tracks.values().map(TrackSpan::count).collect();
        let sizes: BTreeSet<usize> = tracks.values().flat_map(|t| t.sizes.iter().copied()).collect();

        geometry.first_sector = first_sector.unwrap_or(0);
        geometry.num_sectors = counts.iter().max().copied().unwrap_or(0);
        geometry.sector_size = sizes.iter().max().copied().unwrap_or(0);
        geometry.irregular = counts.len() > 1 || sizes.len() > 1;

        log::debug!("Image::calculate_geometry(): {}", geometry);
        self.set_geometry(geometry);
        geometry
    }
}
