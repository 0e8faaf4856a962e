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

    src/image/layout.rs

    Sector layout CSV export and import.
*/

//! Diagnostic sector layout export and import.
//!
//! The layout is a CSV file of one row per located sector, giving its physical and logical
//! address, recovered clock, where its header and data records lie in the flux timeline, and
//! its status. Payload bytes are not part of the layout; imported sectors with a payload carry
//! a zero-filled payload of the recorded length.
//!
//! Columns, in order:
//! `physical track, physical side, logical track, logical side, logical sector, clock (ns),
//! header start (ns), header end (ns), data start (ns), data end (ns), data bit offset,
//! payload length, status`.

use crate::{
    image::{read_lock, write_lock, Image},
    sector::{SectorStatus, TimeSpan},
    types::{DiskCh, DiskChs},
    MAXIMUM_SECTOR_SIZE,
};
use std::{
    io::{BufRead, Write},
    str::FromStr,
};
use thiserror::Error;

pub const LAYOUT_COLUMNS: usize = 13;

const LAYOUT_HEADER: [&str; LAYOUT_COLUMNS] = [
    "Physical track",
    "Physical side",
    "Logical track",
    "Logical side",
    "Logical sector",
    "Clock (ns)",
    "Header start (ns)",
    "Header end (ns)",
    "Data start (ns)",
    "Data end (ns)",
    "Data bit offset",
    "Payload length",
    "Status",
];

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("An IO error occurred reading or writing the layout: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bad CSV file format: line {line} has {found} columns, expected {}", LAYOUT_COLUMNS)]
    ColumnCount { line: usize, found: usize },
    #[error("Bad CSV file format: line {line} has unrecognized status '{value}'")]
    BadStatus { line: usize, value: String },
    #[error("Bad CSV file format: line {line} column {column} has invalid value '{value}'")]
    BadField { line: usize, column: usize, value: String },
    #[error("Bad CSV file format: the file is empty")]
    Empty,
}

fn opt_to_string<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Write the layout of every located sector in `image`.
pub fn write_layout_csv<W: Write>(image: &Image, mut writer: W) -> Result<(), LayoutError> {
    writeln!(writer, "{}", LAYOUT_HEADER.join(","))?;

    let mut rows = 0;
    for sector_ref in image.sectors() {
        let sector = read_lock(&sector_ref);
        // Neither status can be imported.
        if matches!(sector.status, SectorStatus::Missing | SectorStatus::InternalError) {
            continue;
        }
        let header = sector.header_span;
        let data = sector.data_span;
        writeln!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{}",
            sector.physical.c(),
            sector.physical.h(),
            sector.logical.c(),
            sector.logical.h(),
            sector.logical.s(),
            sector.clock_ns.map(|c| format!("{:.1}", c)).unwrap_or_default(),
            opt_to_string(header.map(|s| s.start_ns)),
            opt_to_string(header.map(|s| s.end_ns)),
            opt_to_string(data.map(|s| s.start_ns)),
            opt_to_string(data.map(|s| s.end_ns)),
            opt_to_string(sector.data_bit_offset),
            sector.data.len(),
            sector.status
        )?;
        rows += 1;
    }
    log::debug!("write_layout_csv(): Wrote {} sector rows", rows);
    Ok(())
}

struct RowParser<'a> {
    line: usize,
    fields: &'a [&'a str],
}

impl RowParser<'_> {
    fn bad(&self, column: usize) -> LayoutError {
        LayoutError::BadField {
            line: self.line,
            column,
            value: self.fields[column].to_string(),
        }
    }

    fn required<T: FromStr>(&self, column: usize) -> Result<T, LayoutError> {
        self.fields[column].parse().map_err(|_| self.bad(column))
    }

    fn optional<T: FromStr>(&self, column: usize) -> Result<Option<T>, LayoutError> {
        match self.fields[column] {
            "" => Ok(None),
            s => s.parse().map(Some).map_err(|_| self.bad(column)),
        }
    }

    /// Times may have been written with a fractional part.
    fn time(&self, column: usize) -> Result<Option<u64>, LayoutError> {
        match self.optional::<f64>(column)? {
            Some(t) if t.is_finite() && t >= 0.0 => Ok(Some(t.round() as u64)),
            Some(_) => Err(self.bad(column)),
            None => Ok(None),
        }
    }

    fn span(&self, start_column: usize) -> Result<Option<TimeSpan>, LayoutError> {
        match (self.time(start_column)?, self.time(start_column + 1)?) {
            (Some(start), Some(end)) => Ok(Some(TimeSpan::new(start, end))),
            _ => Ok(None),
        }
    }
}

fn read_row(line: usize, fields: &[&str], image: &Image) -> Result<(), LayoutError> {
    if fields.len() != LAYOUT_COLUMNS {
        return Err(LayoutError::ColumnCount {
            line,
            found: fields.len(),
        });
    }

    let status = SectorStatus::from_name(fields[12]);
    match status {
        SectorStatus::InternalError => {
            return Err(LayoutError::BadStatus {
                line,
                value: fields[12].to_string(),
            })
        }
        SectorStatus::Missing => return Ok(()),
        _ => {}
    }

    let row = RowParser { line, fields };
    let physical = DiskCh::new(row.required(0)?, row.required(1)?);
    let logical = DiskChs::new(row.required(2)?, row.required(3)?, row.required(4)?);
    let clock_ns = row.optional::<f64>(5)?;
    let header_span = row.span(6)?;
    let data_span = row.span(8)?;
    let data_bit_offset = row.optional::<usize>(10)?;
    let payload_len = row.optional::<usize>(11)?.unwrap_or(0);
    if payload_len > MAXIMUM_SECTOR_SIZE {
        return Err(row.bad(11));
    }

    let sector_ref = image.put(logical);
    let mut sector = write_lock(&sector_ref);
    sector.physical = physical;
    sector.logical = logical;
    sector.clock_ns = clock_ns;
    sector.header_span = header_span;
    sector.data_span = data_span;
    sector.data_bit_offset = data_bit_offset;
    sector.data = if status.has_data() { vec![0; payload_len] } else { Vec::new() };
    sector.status = status;
    Ok(())
}

/// Read a layout into a new [Image] and calculate its geometry. `MISSING` rows are skipped.
pub fn read_layout_csv<R: BufRead>(reader: R) -> Result<Image, LayoutError> {
    let mut lines = reader.lines();

    let header = lines.next().ok_or(LayoutError::Empty)??;
    let found = header.split(',').count();
    if found != LAYOUT_COLUMNS {
        return Err(LayoutError::ColumnCount { line: 1, found });
    }

    let image = Image::new();
    for (i, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        read_row(i + 2, &fields, &image)?;
    }

    image.calculate_geometry();
    Ok(image)
}
