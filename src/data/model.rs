use std::fmt;

use csv::{ReaderBuilder, StringRecord, Trim};
use log::warn;
use serde::Serialize;

// ---------------------------------------------------------------------------
// RawRecord – one line of the export, split into fields
// ---------------------------------------------------------------------------

/// Field delimiter used by the instrument export.
pub const DELIMITER: u8 = b',';

/// One non-blank line of an export file, split on [`DELIMITER`] with every
/// field trimmed.  Records have no identity beyond their position.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    fields: Vec<String>,
}

impl From<&StringRecord> for RawRecord {
    fn from(rec: &StringRecord) -> Self {
        RawRecord {
            fields: rec.iter().map(str::to_string).collect(),
        }
    }
}

impl RawRecord {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, idx: usize) -> Option<&str> {
        self.fields.get(idx).map(String::as_str)
    }

    /// Fields after the leading marker column.
    pub fn tail(&self) -> &[String] {
        self.fields.get(1..).unwrap_or(&[])
    }

    /// Fields after the dotted key column (field 2 onward).
    pub fn values(&self) -> &[String] {
        self.fields.get(2..).unwrap_or(&[])
    }

    /// Lower-cased dotted key in the second field, if present.
    pub fn key(&self) -> Option<String> {
        self.field(1).map(str::to_ascii_lowercase)
    }

    /// Whether the first field equals `marker`, ignoring ASCII case.
    pub fn has_marker(&self, marker: &str) -> bool {
        self.field(0)
            .is_some_and(|f| f.eq_ignore_ascii_case(marker))
    }

    /// A whitespace-only line: one field, empty after trimming.
    fn is_blank(&self) -> bool {
        matches!(self.fields.as_slice(), [] | [_]) && self.field(0).map_or(true, str::is_empty)
    }
}

/// Plain-delimiter reader: no quoting, no header row, any number of fields
/// per line.
fn export_reader(text: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .delimiter(DELIMITER)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
}

/// Split export text into records, dropping blank lines.
pub fn split_records(text: &str) -> Vec<RawRecord> {
    export_reader(text)
        .records()
        .filter_map(|rec| match rec {
            Ok(rec) => Some(RawRecord::from(&rec)),
            Err(e) => {
                warn!("skipping unreadable record: {e}");
                None
            }
        })
        .filter(|rec| !rec.is_blank())
        .collect()
}

// ---------------------------------------------------------------------------
// SweepMetadata – global sweep shape scanned from the file header
// ---------------------------------------------------------------------------

/// Sweep locus mode: one-way or forward-and-back between start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locus {
    #[default]
    Single,
    Double,
}

impl Locus {
    /// Interpret the instrument's locus text.  Anything that does not start
    /// with `double` is a single sweep.
    pub fn from_text(text: &str) -> Self {
        if text.to_ascii_lowercase().starts_with("double") {
            Locus::Double
        } else {
            Locus::Single
        }
    }
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locus::Single => write!(f, "single"),
            Locus::Double => write!(f, "double"),
        }
    }
}

/// Sweep-shape parameters found once per file.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SweepMetadata {
    pub locus: Locus,
    pub start_voltage: Option<f64>,
    pub stop_voltage: Option<f64>,
    /// Per-segment secondary frequencies, in file order.  Empty when absent.
    pub frequencies: Vec<f64>,
}

impl SweepMetadata {
    /// Expected segment count, derived from the frequency list when present.
    pub fn expected_segments(&self) -> Option<usize> {
        if self.frequencies.is_empty() {
            None
        } else {
            Some(self.frequencies.len())
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentRange – half-open index interval into a sample stream
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SegmentRange {
    pub start: usize,
    pub end: usize,
}

impl SegmentRange {
    pub fn new(start: usize, end: usize) -> Self {
        SegmentRange { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn slice<'a, T>(&self, data: &'a [T]) -> &'a [T] {
        &data[self.start..self.end]
    }
}

// ---------------------------------------------------------------------------
// Curve – one sweep (the atomic measurement unit)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    CurrentVoltage,
    CapacitanceVoltage,
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveKind::CurrentVoltage => write!(f, "I-V"),
            CurveKind::CapacitanceVoltage => write!(f, "C-V"),
        }
    }
}

/// Measured quantity of a sweep; exactly one per curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Current(Vec<f64>),
    Capacitance(Vec<f64>),
}

/// A single sweep.  Sample arrays are fixed once the extractor emits the
/// curve; downstream code derives new arrays instead of mutating these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Curve {
    label: String,
    voltage: Vec<f64>,
    response: Response,
}

impl Curve {
    pub fn current_voltage(label: impl Into<String>, voltage: Vec<f64>, current: Vec<f64>) -> Self {
        debug_assert_eq!(voltage.len(), current.len());
        Curve {
            label: label.into(),
            voltage,
            response: Response::Current(current),
        }
    }

    pub fn capacitance_voltage(
        label: impl Into<String>,
        voltage: Vec<f64>,
        capacitance: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(voltage.len(), capacitance.len());
        Curve {
            label: label.into(),
            voltage,
            response: Response::Capacitance(capacitance),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Replace the generated label with a source identifier.  Only the
    /// loader does this, before the curve list is handed out.
    pub(crate) fn relabel(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn voltage(&self) -> &[f64] {
        &self.voltage
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn kind(&self) -> CurveKind {
        match self.response {
            Response::Current(_) => CurveKind::CurrentVoltage,
            Response::Capacitance(_) => CurveKind::CapacitanceVoltage,
        }
    }

    pub fn current(&self) -> Option<&[f64]> {
        match &self.response {
            Response::Current(i) => Some(i),
            Response::Capacitance(_) => None,
        }
    }

    pub fn capacitance(&self) -> Option<&[f64]> {
        match &self.response {
            Response::Capacitance(c) => Some(c),
            Response::Current(_) => None,
        }
    }

    /// The measured samples, whichever quantity they are.
    pub fn samples(&self) -> &[f64] {
        match &self.response {
            Response::Current(v) | Response::Capacitance(v) => v,
        }
    }

    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// `(min, max)` of the voltage axis.
    pub fn voltage_range(&self) -> (f64, f64) {
        min_max(&self.voltage)
    }

    /// `(min, max)` of the measured quantity.
    pub fn response_range(&self) -> (f64, f64) {
        min_max(self.samples())
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

// ---------------------------------------------------------------------------
// Numeric helpers shared by the parsers
// ---------------------------------------------------------------------------

/// Parse a trimmed field as a real number.
pub fn parse_real(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok()
}

/// Format a value like C's `%g`: six significant digits, trailing zeros
/// stripped, scientific notation outside `1e-4 ..= 1e6`.
pub fn format_g(value: f64) -> String {
    format_sig(value, 6)
}

/// `%.<digits>g` formatting.
pub fn format_sig(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "nan".to_string()
        } else if value > 0.0 {
            "inf".to_string()
        } else {
            "-inf".to_string()
        };
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let digits = digits.max(1);
    let precision = digits - 1;

    // Round to the requested digits first so the exponent reflects it.
    let sci = format!("{value:.precision$e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= digits as i32 {
        let mantissa = trim_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    } else {
        let decimals = (precision as i32 - exp).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_fields_are_trimmed() {
        let recs = split_records(" DataValue , 0.1 ,  2e-3,\n");
        assert_eq!(recs.len(), 1);
        let rec = &recs[0];
        assert_eq!(rec.fields(), &["DataValue", "0.1", "2e-3", ""]);
        assert!(rec.has_marker("datavalue"));
        assert_eq!(rec.tail().len(), 3);
    }

    #[test]
    fn blank_lines_are_dropped() {
        let recs = split_records("a,b\n\n   \nc,d\r\n\t\n");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1].fields(), &["c", "d"]);
    }

    #[test]
    fn ragged_lines_keep_their_own_width() {
        let text = "\
SetupTitle,Measurement.Primary.Locus,,Double
DataName,Vd,Id
DataValue,1,,
 x ,
";
        let recs = split_records(text);
        assert_eq!(recs.len(), 4);
        assert_eq!(
            recs[0].fields(),
            &["SetupTitle", "Measurement.Primary.Locus", "", "Double"]
        );
        assert_eq!(recs[1].fields().len(), 3);
        assert_eq!(recs[2].fields(), &["DataValue", "1", "", ""]);
        assert_eq!(recs[3].fields(), &["x", ""]);
    }

    #[test]
    fn quotes_are_plain_characters() {
        let recs = split_records("DataName,\"V,I\"\n");
        assert_eq!(recs[0].fields(), &["DataName", "\"V", "I\""]);
    }

    #[test]
    fn segment_range_bounds() {
        let seg = SegmentRange::new(2, 5);
        assert_eq!(seg.len(), 3);
        assert!(!seg.is_empty());
        assert_eq!(seg.slice(&[0, 1, 2, 3, 4, 5]), &[2, 3, 4]);
        assert!(SegmentRange::new(4, 4).is_empty());
    }

    #[test]
    fn locus_text() {
        assert_eq!(Locus::from_text("DOUBLE"), Locus::Double);
        assert_eq!(Locus::from_text("double_sweep"), Locus::Double);
        assert_eq!(Locus::from_text("single"), Locus::Single);
        assert_eq!(Locus::from_text("weird"), Locus::Single);
    }

    #[test]
    fn format_g_matches_printf() {
        assert_eq!(format_g(1.0), "1");
        assert_eq!(format_g(10.0), "10");
        assert_eq!(format_g(1.5), "1.5");
        assert_eq!(format_g(250.0), "250");
        assert_eq!(format_g(0.1), "0.1");
        assert_eq!(format_g(123456.0), "123456");
        assert_eq!(format_g(1234567.0), "1.23457e+06");
        assert_eq!(format_g(0.00001), "1e-05");
        assert_eq!(format_g(-2.5), "-2.5");
        assert_eq!(format_sig(1234.56789, 9), "1234.56789");
        assert_eq!(format_sig(3.0e-7, 3), "3e-07");
    }

    #[test]
    fn curve_accessors() {
        let c = Curve::capacitance_voltage("1 kHz", vec![-1.0, 0.0, 1.0], vec![3.0, 2.0, 1.0]);
        assert_eq!(c.kind(), CurveKind::CapacitanceVoltage);
        assert!(c.current().is_none());
        assert_eq!(c.voltage_range(), (-1.0, 1.0));
        assert_eq!(c.response_range(), (1.0, 3.0));
    }
}
