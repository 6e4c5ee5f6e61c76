/// Data layer: core types, export parsing, sweep splitting and selection.
///
/// Architecture:
/// ```text
///  instrument export (.csv text)
///        │
///        ▼
///   ┌──────────┐      ┌───────────┐
///   │ metadata  │ ───▶ │  segment   │  locus / start / stop / frequencies
///   └──────────┘      └───────────┘  → per-sweep index ranges
///        │                  │
///        ▼                  ▼
///   ┌──────────────────────────┐
///   │          loader           │  DataName / DataValue blocks → Vec<Curve>
///   └──────────────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │ selection │  inclusion, labels, spacing groups → displayed curves
///   └──────────┘
/// ```

pub mod loader;
pub mod metadata;
pub mod model;
pub mod segment;
pub mod selection;
