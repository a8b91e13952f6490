// SRF Engine - Event Settings Persistence
//
// Whitespace-separated text records, one line per initiated event, in a
// fixed column order. Read mode replays the first record of each cell.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::core::waveform::{SigmoidBump, Waveform};
use crate::error::SrfError;

/// Number of columns in a settings line.
pub const SETTINGS_COLUMNS: usize = 16;

/// Column header, in file order.
pub const SETTINGS_HEADER: &str = "cellIndex duration tset+ti tset+ti_plateau NRyRo_peak \
    NRyRo_plateau t_to_peak+tinit ti+tinit thalf1 thalf2 k1_waveform k2_waveform \
    thalf_plateau1 thalf_plateau2 k1_plateau k2_plateau";

/// One recorded event. All times are absolute simulation times (ms).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    pub cell: usize,
    pub duration: f64,
    /// Spike start (`tset + ti`).
    pub spike_start: f64,
    /// Plateau start (`tset + ti_plateau`); equals `spike_start` for short events.
    pub plateau_start: f64,
    pub peak: f64,
    /// Zero for short events.
    pub plateau: f64,
    /// Diagnostic: initiation time plus time to peak.
    pub peak_time: f64,
    /// Diagnostic: initiation time plus sampled initiation offset.
    pub initiation_marker: f64,
    pub thalf1: f64,
    pub thalf2: f64,
    pub k1: f64,
    pub k2: f64,
    pub thalf_plateau1: f64,
    pub thalf_plateau2: f64,
    pub k1_plateau: f64,
    pub k2_plateau: f64,
}

impl EventRecord {
    /// Formats the record as one settings line (no trailing newline).
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            self.cell,
            self.duration,
            self.spike_start,
            self.plateau_start,
            self.peak,
            self.plateau,
            self.peak_time,
            self.initiation_marker,
            self.thalf1,
            self.thalf2,
            self.k1,
            self.k2,
            self.thalf_plateau1,
            self.thalf_plateau2,
            self.k1_plateau,
            self.k2_plateau,
        )
    }

    /// Parses one settings line. `line_no` is 1-based and only used in errors.
    pub fn parse(line: &str, line_no: usize) -> Result<Self, SrfError> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != SETTINGS_COLUMNS {
            return Err(SrfError::Parse {
                line: line_no,
                message: format!(
                    "expected {} columns, found {}",
                    SETTINGS_COLUMNS,
                    fields.len()
                ),
            });
        }
        let cell = fields[0].parse::<usize>().map_err(|e| SrfError::Parse {
            line: line_no,
            message: format!("cellIndex '{}': {}", fields[0], e),
        })?;
        let mut values = [0.0f64; SETTINGS_COLUMNS - 1];
        for (slot, field) in values.iter_mut().zip(&fields[1..]) {
            *slot = field.parse::<f64>().map_err(|e| SrfError::Parse {
                line: line_no,
                message: format!("'{}': {}", field, e),
            })?;
        }
        let [
            duration,
            spike_start,
            plateau_start,
            peak,
            plateau,
            peak_time,
            initiation_marker,
            thalf1,
            thalf2,
            k1,
            k2,
            thalf_plateau1,
            thalf_plateau2,
            k1_plateau,
            k2_plateau,
        ] = values;
        Ok(Self {
            cell,
            duration,
            spike_start,
            plateau_start,
            peak,
            plateau,
            peak_time,
            initiation_marker,
            thalf1,
            thalf2,
            k1,
            k2,
            thalf_plateau1,
            thalf_plateau2,
            k1_plateau,
            k2_plateau,
        })
    }

    /// Rebuilds the waveform the record was written from.
    pub fn waveform(&self) -> Waveform {
        let plateau = (self.plateau > 0.0).then(|| SigmoidBump {
            amplitude: self.plateau,
            thalf1: self.thalf_plateau1,
            thalf2: self.thalf_plateau2,
            k1: self.k1_plateau,
            k2: self.k2_plateau,
        });
        Waveform {
            spike: SigmoidBump {
                amplitude: self.peak,
                thalf1: self.thalf1,
                thalf2: self.thalf2,
                k1: self.k1,
                k2: self.k2,
            },
            plateau,
            end: self.plateau_start.min(self.spike_start) + self.duration,
        }
    }
}

/// Appends event records in settings format.
pub struct SettingsWriter<W: Write> {
    inner: W,
}

impl SettingsWriter<BufWriter<File>> {
    /// Creates (truncating) a settings file that starts with the column
    /// header as a `#` comment line.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SrfError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| SrfError::io(path, e))?;
        let mut writer = Self::new(BufWriter::new(file));
        writer.write_header().map_err(|e| SrfError::io(path, e))?;
        Ok(writer)
    }
}

impl<W: Write> SettingsWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Writes `SETTINGS_HEADER` as a comment line, which readers skip.
    pub fn write_header(&mut self) -> std::io::Result<()> {
        writeln!(self.inner, "# {}", SETTINGS_HEADER)
    }

    pub fn write_record(&mut self, record: &EventRecord) -> std::io::Result<()> {
        writeln!(self.inner, "{}", record.to_line())
    }

    pub fn write_records<'a>(
        &mut self,
        records: impl IntoIterator<Item = &'a EventRecord>,
    ) -> std::io::Result<()> {
        for record in records {
            self.write_record(record)?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads settings lines, keeping only the first record of each cell.
///
/// Blank lines and lines starting with `#` are ignored.
pub fn read_settings<R: BufRead>(reader: R) -> Result<BTreeMap<usize, EventRecord>, SrfError> {
    let mut records = BTreeMap::new();
    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| SrfError::Parse {
            line: line_no,
            message: e.to_string(),
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record = EventRecord::parse(trimmed, line_no)?;
        if records.contains_key(&record.cell) {
            tracing::warn!(
                cell = record.cell,
                line = line_no,
                "skipping later record for already populated cell"
            );
            continue;
        }
        records.insert(record.cell, record);
    }
    Ok(records)
}

/// Loads a settings file for Read mode.
///
/// # Errors
///
/// Returns `SrfError::Io` naming the file if it cannot be opened, or
/// `SrfError::Parse` for a malformed line.
#[tracing::instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn load_settings(path: impl AsRef<Path>) -> Result<BTreeMap<usize, EventRecord>, SrfError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| SrfError::io(path, e))?;
    let records = read_settings(BufReader::new(file))?;
    tracing::debug!(cells = records.len(), "loaded event settings");
    Ok(records)
}
