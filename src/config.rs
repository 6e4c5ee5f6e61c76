use std::path::Path;

use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;

use crate::analysis::{parse_parameter, Parameters};
use crate::data::selection::{SpacingTable, GROUP_COUNT};
use crate::state::Session;

// ---------------------------------------------------------------------------
// Analysis configuration file
// ---------------------------------------------------------------------------

/// A scalar as the user typed it: a JSON number or free text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Text(String),
}

impl Scalar {
    /// The value, or `None` if it is not a finite number.
    pub fn value(&self) -> Option<f64> {
        match self {
            Scalar::Number(v) => Some(*v).filter(|v| v.is_finite()),
            Scalar::Text(s) => parse_parameter(s),
        }
    }
}

/// Per-curve override, addressed by 1-based curve number.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct SweepOverride {
    pub index: usize,
    #[serde(rename = "use")]
    pub included: Option<bool>,
    pub follow: Option<bool>,
    pub group: Option<usize>,
    pub label: Option<String>,
}

/// Expected JSON layout (every field optional):
///
/// ```json
/// {
///   "zero_bias_window": 0.5,
///   "contact_length_um": "100",
///   "spacing_table": ["5 um", "10 um", "15 um"],
///   "sweeps": [ { "index": 2, "use": false }, { "index": 3, "group": 7 } ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub zero_bias_window: Option<Scalar>,
    pub contact_length_um: Option<Scalar>,
    pub spacing_table: Option<Vec<String>>,
    pub sweeps: Vec<SweepOverride>,
}

impl AnalysisConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("invalid analysis config")
    }

    /// Resolve the scalars over the defaults.  A present but malformed
    /// value makes the parameter unavailable rather than falling back.
    pub fn parameters(&self) -> Parameters {
        let defaults = Parameters::default();
        Parameters {
            zero_bias_window: match &self.zero_bias_window {
                Some(s) => s.value(),
                None => defaults.zero_bias_window,
            },
            contact_length: match &self.contact_length_um {
                Some(s) => s.value(),
                None => defaults.contact_length,
            },
        }
    }

    /// Apply parameters, spacing table and per-curve overrides to a session.
    pub fn apply(&self, session: &mut Session) {
        session.parameters = self.parameters();
        if let Some(labels) = &self.spacing_table {
            if labels.len() > GROUP_COUNT {
                warn!("spacing table has {} entries, only {GROUP_COUNT} used", labels.len());
            }
            session.spacing_table = SpacingTable::from_labels(labels);
        }

        for o in &self.sweeps {
            let Some(idx) = o.index.checked_sub(1).filter(|&i| i < session.curves().len()) else {
                warn!("config override for sweep {} ignored: no such sweep", o.index);
                continue;
            };
            if let Some(label) = &o.label {
                session.set_label(idx, label);
            }
            let row = &mut session.rows[idx];
            if let Some(included) = o.included {
                row.included = included;
            }
            if let Some(follow) = o.follow {
                row.follow_global = follow;
            }
            if let Some(group) = o.group {
                session.set_group(idx, group);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Curve;
    use crate::state::LoadMode;

    fn session(n: usize) -> Session {
        let curves = (0..n)
            .map(|k| Curve::current_voltage(format!("Sweep_{}", k + 1), vec![0.0], vec![0.0]))
            .collect();
        Session::new(curves, LoadMode::SingleFile, Vec::new())
    }

    #[test]
    fn empty_config_keeps_defaults() {
        let cfg = AnalysisConfig::from_json("{}").unwrap();
        assert_eq!(cfg.parameters(), Parameters::default());
    }

    #[test]
    fn scalars_accept_numbers_and_text() {
        let cfg = AnalysisConfig::from_json(
            r#"{ "zero_bias_window": "0.2", "contact_length_um": 150 }"#,
        )
        .unwrap();
        let p = cfg.parameters();
        assert_eq!(p.zero_bias_window, Some(0.2));
        assert_eq!(p.contact_length, Some(150.0));
    }

    #[test]
    fn malformed_scalar_is_unavailable() {
        let cfg = AnalysisConfig::from_json(r#"{ "contact_length_um": "R2?" }"#).unwrap();
        assert_eq!(cfg.parameters().contact_length, None);
        assert_eq!(cfg.parameters().zero_bias_window, Some(0.5));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = AnalysisConfig::from_json(
            r#"{
                "spacing_table": ["5 um"],
                "sweeps": [
                    { "index": 1, "group": 3 },
                    { "index": 2, "use": false },
                    { "index": 3, "label": "D3" },
                    { "index": 9 }
                ]
            }"#,
        )
        .unwrap();
        let mut s = session(3);
        cfg.apply(&mut s);
        assert_eq!(s.spacing_table.entry(1), "5 um");
        assert_eq!(s.rows[0].group, 3);
        assert!(!s.rows[1].included);
        assert_eq!(s.rows[2].label, "D3");
        assert!(!s.rows[2].follow_global);
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(AnalysisConfig::from_json("{ not json").is_err());
    }
}
