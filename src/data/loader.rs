use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use thiserror::Error;

use super::metadata::scan_metadata;
use super::model::{format_g, parse_real, split_records, Curve, RawRecord, SweepMetadata};
use super::segment::{split_segments, SplitRequest};

/// Marker in the first field of a column-header record.
pub const HEADER_MARKER: &str = "DataName";
/// Marker in the first field of a value record.
pub const VALUE_MARKER: &str = "DataValue";
/// Key carrying the per-sweep sample count near a data block.
const DIMENSION_KEY: &str = "dimension1";
/// How far above a header record to look for [`DIMENSION_KEY`].
const DIMENSION_LOOKBACK: usize = 60;

const IV_VOLTAGE: &[&str] = &["vd", "v_d", "v drain", "v"];
const IV_CURRENT: &[&str] = &["id", "i_d", "i drain", "i"];
const CV_VOLTAGE: &[&str] = &["vbias", "v", "vd", "vg", "v gate"];
const CV_QUANTITY: &[&str] = &["c", "cap", "capacitance"];

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no input files given")]
    NoInput,
}

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load every sweep from one export file.
///
/// When the file holds exactly one curve, its generated label is replaced
/// by the file's base name.
pub fn load_file(path: &Path) -> Result<Vec<Curve>, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = decode_text(&bytes);
    let mut curves = parse_export_text(&text);

    if let [only] = curves.as_mut_slice() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            only.relabel(stem);
        }
    }
    info!("{}: {} curves", path.display(), curves.len());
    Ok(curves)
}

/// Load a set of files, each expected to hold one sweep, in the given order.
pub fn load_files(paths: &[PathBuf]) -> Result<Vec<Curve>, LoadError> {
    if paths.is_empty() {
        return Err(LoadError::NoInput);
    }
    let mut curves = Vec::new();
    for path in paths {
        curves.extend(load_file(path)?);
    }
    info!("loaded {} curves from {} files", curves.len(), paths.len());
    Ok(curves)
}

/// All `*.csv` files directly inside `dir`, sorted by path.
pub fn list_export_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_err = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Decode file bytes as UTF-8, dropping undecodable bytes if that fails.
pub fn decode_text(bytes: &[u8]) -> String {
    let text = match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(e) => {
            warn!("input is not valid UTF-8 ({e}); dropping undecodable bytes");
            String::from_utf8_lossy(bytes).replace('\u{FFFD}', "")
        }
    };
    match text.strip_prefix('\u{FEFF}') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Curve extraction
// ---------------------------------------------------------------------------

/// Extract every I–V and C–V curve from export text.
///
/// Header records (`DataName, col, col, ...`) are followed by value
/// records (`DataValue, x, y, ...`).  Blocks that cannot be classified or
/// parsed are skipped; the scan always continues with the next record.
pub fn parse_export_text(text: &str) -> Vec<Curve> {
    let records = split_records(text);
    let metadata = scan_metadata(&records);

    let mut curves = Vec::new();
    let mut next_index = 0usize;
    let mut i = 0;

    while i < records.len() {
        if !records[i].has_marker(HEADER_MARKER) {
            i += 1;
            continue;
        }
        let header_idx = i;
        let names: Vec<String> = records[i]
            .tail()
            .iter()
            .filter(|n| !n.is_empty())
            .map(|n| n.to_ascii_lowercase())
            .collect();

        i += 1;
        let block_start = i;
        while i < records.len() && records[i].has_marker(VALUE_MARKER) {
            i += 1;
        }
        let rows: Vec<&[String]> = records[block_start..i].iter().map(RawRecord::tail).collect();
        if rows.is_empty() {
            continue;
        }

        let block = Block { names: &names, rows: &rows };
        if let Some((voltage, current)) = block.as_current_voltage() {
            next_index += 1;
            debug!("block at record {header_idx}: I-V, {} samples", voltage.len());
            curves.push(Curve::current_voltage(
                format!("Sweep_{next_index}"),
                voltage,
                current,
            ));
        } else if let Some((voltage, capacitance)) = block.as_capacitance_voltage() {
            let hint = find_dimension_hint(&records, header_idx);
            debug!(
                "block at record {header_idx}: C-V, {} samples, dimension hint {:?}",
                voltage.len(),
                hint
            );
            curves.extend(split_capacitance_block(
                &voltage,
                &capacitance,
                &metadata,
                hint,
                &mut next_index,
            ));
        } else {
            warn!("skipping unclassifiable data block at record {header_idx} (columns {names:?})");
        }
    }
    curves
}

fn split_capacitance_block(
    voltage: &[f64],
    capacitance: &[f64],
    metadata: &SweepMetadata,
    hint: Option<usize>,
    next_index: &mut usize,
) -> Vec<Curve> {
    let req = SplitRequest::new(metadata).with_samples_per_segment(hint);
    split_segments(voltage, &req)
        .into_iter()
        .enumerate()
        .map(|(k, seg)| {
            let label = match metadata.frequencies.get(k) {
                Some(&f) => format_frequency(f),
                None => format!("CV_{}", *next_index + 1),
            };
            *next_index += 1;
            Curve::capacitance_voltage(
                label,
                seg.slice(voltage).to_vec(),
                seg.slice(capacitance).to_vec(),
            )
        })
        .collect()
}

/// Column names plus the value rows of one header/value block.
struct Block<'a> {
    names: &'a [String],
    rows: &'a [&'a [String]],
}

impl Block<'_> {
    fn is_two_column(&self) -> bool {
        self.names.len() == 2
    }

    fn as_current_voltage(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        let v = find_column(self.names, IV_VOLTAGE);
        let i = find_column(self.names, IV_CURRENT);
        let cols = match (v, i) {
            (Some(v), Some(i)) => (v, i),
            (None, _) if self.is_two_column() && find_column(self.names, CV_QUANTITY).is_none() => {
                (0, 1)
            }
            _ => return None,
        };
        self.columns(cols)
    }

    fn as_capacitance_voltage(&self) -> Option<(Vec<f64>, Vec<f64>)> {
        let v = find_column(self.names, CV_VOLTAGE);
        let c = find_column(self.names, CV_QUANTITY);
        let cols = match (v, c) {
            (Some(v), Some(c)) => (v, c),
            (_, Some(_)) if self.is_two_column() => (0, 1),
            _ => return None,
        };
        self.columns(cols)
    }

    fn columns(&self, (x, y): (usize, usize)) -> Option<(Vec<f64>, Vec<f64>)> {
        Some((self.column(x)?, self.column(y)?))
    }

    fn column(&self, idx: usize) -> Option<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(idx).and_then(|f| parse_real(f)))
            .collect()
    }
}

/// Position of the first candidate present among the lower-cased names.
fn find_column(names: &[String], candidates: &[&str]) -> Option<usize> {
    candidates
        .iter()
        .find_map(|c| names.iter().position(|n| n == c))
}

/// Look above a header record for a `dimension1` sample-count record.
/// Only the nearest such record counts.
fn find_dimension_hint(records: &[RawRecord], header_idx: usize) -> Option<usize> {
    let rec = (1..DIMENSION_LOOKBACK)
        .map_while(|look| header_idx.checked_sub(look))
        .map(|j| &records[j])
        .find(|r| r.key().as_deref() == Some(DIMENSION_KEY))?;

    let value = rec.values().iter().find_map(|v| parse_real(v))?;
    (value.is_finite() && value >= 0.0).then(|| value.trunc() as usize)
}

/// Human-readable frequency label: `1 kHz`, `2.5 MHz`, `50 Hz`.
pub fn format_frequency(f: f64) -> String {
    if f >= 1e6 {
        format!("{} MHz", format_g(f / 1e6))
    } else if f >= 1e3 {
        format!("{} kHz", format_g(f / 1e3))
    } else {
        format!("{} Hz", format_g(f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::CurveKind;

    fn iv_block(names: &str, rows: &[(f64, f64)]) -> String {
        let mut s = format!("DataName,{names}\n");
        for (v, i) in rows {
            s.push_str(&format!("DataValue,{v},{i}\n"));
        }
        s
    }

    #[test]
    fn frequency_labels() {
        assert_eq!(format_frequency(1000.0), "1 kHz");
        assert_eq!(format_frequency(10000.0), "10 kHz");
        assert_eq!(format_frequency(2.5e6), "2.5 MHz");
        assert_eq!(format_frequency(120.0), "120 Hz");
    }

    #[test]
    fn column_lookup_follows_candidate_order() {
        let names: Vec<String> = ["v", "vd", "id"].iter().map(|s| s.to_string()).collect();
        assert_eq!(find_column(&names, IV_VOLTAGE), Some(1));
        assert_eq!(find_column(&names, CV_QUANTITY), None);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(parse_export_text("").is_empty());
        assert!(parse_export_text("just,some\nrandom,text\n").is_empty());
    }

    #[test]
    fn named_iv_columns_in_any_position() {
        let text = "\
DataName,Time,Id,Vd
DataValue,0,1e-3,1
DataValue,1,2e-3,2
DataValue,2,3e-3,3
";
        let curves = parse_export_text(text);
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].kind(), CurveKind::CurrentVoltage);
        assert_eq!(curves[0].voltage(), &[1.0, 2.0, 3.0]);
        assert_eq!(curves[0].current().unwrap(), &[1e-3, 2e-3, 3e-3]);
        assert_eq!(curves[0].label(), "Sweep_1");
    }

    #[test]
    fn bare_two_column_block_is_iv() {
        let text = iv_block("X,Y", &[(0.0, 0.0), (1.0, 0.5)]);
        let curves = parse_export_text(&text);
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].kind(), CurveKind::CurrentVoltage);
    }

    #[test]
    fn two_column_capacitance_block_is_cv() {
        let text = iv_block("Vbias,C", &[(0.0, 1e-12), (1.0, 2e-12), (2.0, 3e-12)]);
        let curves = parse_export_text(&text);
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].kind(), CurveKind::CapacitanceVoltage);
        assert_eq!(curves[0].label(), "CV_1");
    }

    #[test]
    fn unparseable_iv_falls_back_to_cv() {
        let text = "\
DataName,V,I,C
DataValue,0,n/a,1e-12
DataValue,1,n/a,2e-12
";
        let curves = parse_export_text(text);
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].kind(), CurveKind::CapacitanceVoltage);
    }

    #[test]
    fn bad_blocks_do_not_stop_the_scan() {
        let mut text = String::from("DataName,Vd,Id\nDataValue,oops,1\n");
        text.push_str("DataName,Vd,Id\n");
        text.push_str("DataName,Foo,Bar,Baz\nDataValue,1,2,3\n");
        text.push_str(&iv_block("Vd,Id", &[(0.0, 0.0), (1.0, 1.0)]));
        let curves = parse_export_text(&text);
        assert_eq!(curves.len(), 1);
        assert_eq!(curves[0].label(), "Sweep_1");
    }

    #[test]
    fn indices_run_across_kinds() {
        let mut text = iv_block("Vd,Id", &[(0.0, 0.0), (1.0, 1.0)]);
        text.push_str(&iv_block("V,C", &[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)]));
        text.push_str(&iv_block("Vd,Id", &[(0.0, 0.0), (1.0, 1.0)]));
        let labels: Vec<_> = parse_export_text(&text)
            .iter()
            .map(|c| c.label().to_string())
            .collect();
        assert_eq!(labels, vec!["Sweep_1", "CV_2", "Sweep_3"]);
    }

    #[test]
    fn nearest_dimension_record_wins() {
        let text = "\
X,Dimension1,50
X,dimension1,abc
X,other,1
DataName,V,C
";
        let records = split_records(text);
        assert_eq!(find_dimension_hint(&records, 3), None);

        let text = "X,dimension1,100,1\nX,other\nDataName,V,C\n";
        let records = split_records(text);
        assert_eq!(find_dimension_hint(&records, 2), Some(100));
    }

    #[test]
    fn invalid_utf8_is_tolerated() {
        let mut bytes = b"DataName,Vd,Id\nDataValue,0,0\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b"\nDataValue,1,1\n");
        let text = decode_text(&bytes);
        assert!(!text.contains('\u{FFFD}'));
        assert_eq!(parse_export_text(&text).len(), 1);
    }
}
