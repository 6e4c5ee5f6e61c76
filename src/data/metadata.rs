use log::debug;

use super::model::{parse_real, Locus, RawRecord, SweepMetadata};

/// Header metadata precedes the data blocks, so only this many records are
/// inspected.
pub const SCAN_WINDOW: usize = 800;

const KEY_LOCUS: &str = "measurement.primary.locus";
const KEY_START: &str = "measurement.primary.start";
const KEY_STOP: &str = "measurement.primary.stop";
const KEY_FREQUENCY: &str = "measurement.secondary.frequency";

/// Scan the leading records for the sweep-shape keys.
///
/// Missing keys leave their defaults in place: single locus, unknown
/// start/stop, no frequencies.
pub fn scan_metadata(records: &[RawRecord]) -> SweepMetadata {
    let mut meta = SweepMetadata::default();

    for rec in records.iter().take(SCAN_WINDOW) {
        let Some(key) = rec.key() else {
            continue;
        };
        let values = rec.values();
        match key.as_str() {
            KEY_LOCUS => {
                if let Some(text) = values.iter().find(|v| !v.is_empty()) {
                    meta.locus = Locus::from_text(text);
                }
            }
            KEY_START => meta.start_voltage = first_real(values),
            KEY_STOP => meta.stop_voltage = first_real(values),
            KEY_FREQUENCY => {
                // A repeated key replaces the earlier list.
                meta.frequencies = values.iter().filter_map(|v| parse_real(v)).collect();
            }
            _ => {}
        }
    }

    debug!(
        "sweep metadata: locus={}, start={:?}, stop={:?}, {} frequencies",
        meta.locus,
        meta.start_voltage,
        meta.stop_voltage,
        meta.frequencies.len()
    );
    meta
}

fn first_real(values: &[String]) -> Option<f64> {
    values.iter().find_map(|v| parse_real(v))
}
